use std::collections::HashMap;

use hotspots_core::{decode_message, Bucket, Bucketer, ProcessableRecord};

use crate::aggregates_client::AggregatesServiceClient;
use crate::buffered_consumer::{OwnedMessage, Writer};

/// Buckets decoded records by time/geohash and POSTs the resulting counts
/// to the aggregates service. Records without coordinates contribute to
/// no bucket and are silently excluded from the flush.
pub struct AggregateWriter {
    bucketer: Bucketer,
    client: AggregatesServiceClient,
}

impl AggregateWriter {
    pub fn new(bucketer: Bucketer, client: AggregatesServiceClient) -> Self {
        Self { bucketer, client }
    }

    fn bucket_counts(&self, messages: &[OwnedMessage]) -> HashMap<Bucket, i64> {
        let mut counts: HashMap<Bucket, i64> = HashMap::new();
        for message in messages {
            let headers = message.header_pairs();
            let raw = hotspots_core::RawMessage {
                headers: &headers,
                payload: &message.payload,
            };
            let Ok(record) = decode_message(&raw) else {
                continue;
            };
            if let Some(bucket) = self.bucketer.make_bucket(record.timestamp(), record.coordinates()) {
                *counts.entry(bucket).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl Writer for AggregateWriter {
    async fn write(&mut self, messages: &[OwnedMessage]) -> anyhow::Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let counts = self.bucket_counts(messages);
        self.client.post_aggregates(&counts).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use reqwest::Client;
    use std::time::Duration;

    fn avro_a311_case(lat: f32, lon: f32, opened_at_millis: i64) -> Vec<u8> {
        let schema = apache_avro::Schema::parse_str(
            r#"{"type":"record","name":"A311Case","fields":[
                {"name":"case_id","type":"string"},
                {"name":"opened_at","type":{"type":"long","logicalType":"timestamp-millis"}},
                {"name":"case_type","type":"string"},
                {"name":"status","type":"string"},
                {"name":"latitude","type":"float"},
                {"name":"longitude","type":"float"},
                {"name":"neighborhood","type":["null","string"],"default":null}
            ]}"#,
        )
        .unwrap();

        let mut record = apache_avro::types::Record::new(&schema).unwrap();
        record.put("case_id", "case-1");
        record.put("opened_at", apache_avro::types::Value::TimestampMillis(opened_at_millis));
        record.put("case_type", "noise_complaint");
        record.put("status", "open");
        record.put("latitude", lat);
        record.put("longitude", lon);
        record.put("neighborhood", None::<String>);
        apache_avro::to_avro_datum(&schema, record).unwrap()
    }

    #[tokio::test]
    async fn skips_records_without_coordinates_via_full_decode_path() {
        // police_incident has optional coordinates; omit them so decode
        // succeeds but bucketing must skip the record.
        let schema = apache_avro::Schema::parse_str(
            r#"{"type":"record","name":"PoliceIncident","fields":[
                {"name":"incident_id","type":"string"},
                {"name":"occurred_at","type":{"type":"long","logicalType":"timestamp-millis"}},
                {"name":"category","type":"string"},
                {"name":"resolution","type":["null","string"],"default":null},
                {"name":"latitude","type":["null","float"],"default":null},
                {"name":"longitude","type":["null","float"],"default":null}
            ]}"#,
        )
        .unwrap();
        let mut record = apache_avro::types::Record::new(&schema).unwrap();
        record.put("incident_id", "case-1");
        record.put("occurred_at", apache_avro::types::Value::TimestampMillis(0));
        record.put("category", "theft");
        record.put("resolution", None::<String>);
        record.put("latitude", None::<f32>);
        record.put("longitude", None::<f32>);
        let payload = apache_avro::to_avro_datum(&schema, record).unwrap();

        let writer = AggregateWriter::new(
            Bucketer::new(TimeDelta::minutes(1), 7),
            AggregatesServiceClient::new(Client::new(), "http://localhost:8080", 0, Duration::from_millis(1)),
        );

        let message = OwnedMessage {
            headers: vec![("schema_name".to_string(), b"police_incident".to_vec())],
            payload,
        };
        let counts = writer.bucket_counts(std::slice::from_ref(&message));
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn buckets_a_record_with_coordinates() {
        let payload = avro_a311_case(37.7749, -122.4194, 0);
        let writer = AggregateWriter::new(
            Bucketer::new(TimeDelta::minutes(1), 7),
            AggregatesServiceClient::new(Client::new(), "http://localhost:8080", 0, Duration::from_millis(1)),
        );
        let message = OwnedMessage {
            headers: vec![("schema_name".to_string(), b"a311_case".to_vec())],
            payload,
        };
        let counts = writer.bucket_counts(std::slice::from_ref(&message));
        assert_eq!(counts.values().sum::<i64>(), 1);
    }
}
