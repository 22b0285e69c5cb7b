use clickhouse::{Client, Row};
use hotspots_core::records::{
    SCHEMA_A311_CASE, SCHEMA_FIRE_EMS_CALL, SCHEMA_FIRE_INCIDENT, SCHEMA_POLICE_INCIDENT,
    SCHEMA_TRAFFIC_CRASH,
};
use hotspots_core::{decode_message, Bucketer, ProcessableRecord, Record};
use serde::Serialize;

use crate::buffered_consumer::{OwnedMessage, Writer};

#[derive(Debug, Serialize, Row)]
struct A311CaseRow {
    case_id: String,
    opened_at: i64,
    case_type: String,
    status: String,
    latitude: f32,
    longitude: f32,
    neighborhood: Option<String>,
    geohash: String,
    loaded_at: i64,
}

#[derive(Debug, Serialize, Row)]
struct FireEmsCallRow {
    call_number: String,
    received_at: i64,
    call_type: String,
    unit_id: Option<String>,
    latitude: f32,
    longitude: f32,
    response_seconds: Option<i32>,
    geohash: String,
    loaded_at: i64,
}

#[derive(Debug, Serialize, Row)]
struct FireIncidentRow {
    incident_number: String,
    alarm_at: i64,
    property_use: Option<String>,
    number_of_alarms: Option<i32>,
    floor_of_fire_origin: Option<i32>,
    latitude: f32,
    longitude: f32,
    geohash: String,
    loaded_at: i64,
}

#[derive(Debug, Serialize, Row)]
struct PoliceIncidentRow {
    incident_id: String,
    occurred_at: i64,
    category: String,
    resolution: Option<String>,
    latitude: Option<f32>,
    longitude: Option<f32>,
    geohash: Option<String>,
    loaded_at: i64,
}

#[derive(Debug, Serialize, Row)]
struct TrafficCrashRow {
    crash_id: String,
    occurred_at: i64,
    number_of_injuries: Option<i32>,
    number_of_fatalities: Option<i32>,
    primary_contributing_factor: Option<String>,
    latitude: Option<f32>,
    longitude: Option<f32>,
    geohash: Option<String>,
    loaded_at: i64,
}

const TABLE_NAMES: [(&str, &str); 5] = [
    (SCHEMA_A311_CASE, "a311_cases"),
    (SCHEMA_FIRE_EMS_CALL, "fire_ems_calls"),
    (SCHEMA_FIRE_INCIDENT, "fire_incidents"),
    (SCHEMA_POLICE_INCIDENT, "police_incidents"),
    (SCHEMA_TRAFFIC_CRASH, "traffic_crashes"),
];

/// Persists decoded records verbatim into per-schema warehouse tables.
/// Every flush prepares all five batches unconditionally, regardless of
/// whether this flush contains any record of that schema; flushing is
/// not atomic across schemas, so a late failure may leave some tables
/// updated and others not.
pub struct RawWriter {
    client: Client,
    geo_precision: usize,
}

impl RawWriter {
    pub fn new(client: Client, geo_precision: usize) -> Self {
        Self { client, geo_precision }
    }
}

impl Writer for RawWriter {
    async fn write(&mut self, messages: &[OwnedMessage]) -> anyhow::Result<()> {
        let loaded_at = chrono::Utc::now().timestamp_millis();

        let mut a311_cases = self.client.insert::<A311CaseRow>(TABLE_NAMES[0].1)?;
        let mut fire_ems_calls = self.client.insert::<FireEmsCallRow>(TABLE_NAMES[1].1)?;
        let mut fire_incidents = self.client.insert::<FireIncidentRow>(TABLE_NAMES[2].1)?;
        let mut police_incidents = self.client.insert::<PoliceIncidentRow>(TABLE_NAMES[3].1)?;
        let mut traffic_crashes = self.client.insert::<TrafficCrashRow>(TABLE_NAMES[4].1)?;

        for message in messages {
            let headers = message.header_pairs();
            let raw = hotspots_core::RawMessage {
                headers: &headers,
                payload: &message.payload,
            };
            let Ok(record) = decode_message(&raw) else {
                continue;
            };

            let geohash = record
                .coordinates()
                .map(|c| hotspots_core::encode_location(c, self.geo_precision));

            match record {
                Record::A311Case(r) => {
                    a311_cases
                        .write(&A311CaseRow {
                            case_id: r.case_id,
                            opened_at: r.opened_at.timestamp_millis(),
                            case_type: r.case_type,
                            status: r.status,
                            latitude: r.latitude,
                            longitude: r.longitude,
                            neighborhood: r.neighborhood,
                            geohash: geohash.unwrap_or_default(),
                            loaded_at,
                        })
                        .await?;
                }
                Record::FireEmsCall(r) => {
                    fire_ems_calls
                        .write(&FireEmsCallRow {
                            call_number: r.call_number,
                            received_at: r.received_at.timestamp_millis(),
                            call_type: r.call_type,
                            unit_id: r.unit_id,
                            latitude: r.latitude,
                            longitude: r.longitude,
                            response_seconds: r.response_seconds,
                            geohash: geohash.unwrap_or_default(),
                            loaded_at,
                        })
                        .await?;
                }
                Record::FireIncident(r) => {
                    fire_incidents
                        .write(&FireIncidentRow {
                            incident_number: r.incident_number,
                            alarm_at: r.alarm_at.timestamp_millis(),
                            property_use: r.property_use,
                            number_of_alarms: r.number_of_alarms,
                            floor_of_fire_origin: r.floor_of_fire_origin,
                            latitude: r.latitude,
                            longitude: r.longitude,
                            geohash: geohash.unwrap_or_default(),
                            loaded_at,
                        })
                        .await?;
                }
                Record::PoliceIncident(r) => {
                    police_incidents
                        .write(&PoliceIncidentRow {
                            incident_id: r.incident_id,
                            occurred_at: r.occurred_at.timestamp_millis(),
                            category: r.category,
                            resolution: r.resolution,
                            latitude: r.latitude,
                            longitude: r.longitude,
                            geohash,
                            loaded_at,
                        })
                        .await?;
                }
                Record::TrafficCrash(r) => {
                    traffic_crashes
                        .write(&TrafficCrashRow {
                            crash_id: r.crash_id,
                            occurred_at: r.occurred_at.timestamp_millis(),
                            number_of_injuries: r.number_of_injuries,
                            number_of_fatalities: r.number_of_fatalities,
                            primary_contributing_factor: r.primary_contributing_factor,
                            latitude: r.latitude,
                            longitude: r.longitude,
                            geohash,
                            loaded_at,
                        })
                        .await?;
                }
            }
        }

        a311_cases.end().await?;
        fire_ems_calls.end().await?;
        fire_incidents.end().await?;
        police_incidents.end().await?;
        traffic_crashes.end().await?;
        Ok(())
    }
}
