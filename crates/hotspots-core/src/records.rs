use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Header key carrying the schema tag on each log message.
pub const SCHEMA_NAME_HEADER: &str = "schema_name";

pub const SCHEMA_A311_CASE: &str = "a311_case";
pub const SCHEMA_FIRE_EMS_CALL: &str = "fire_ems_call";
pub const SCHEMA_FIRE_INCIDENT: &str = "fire_incident";
pub const SCHEMA_POLICE_INCIDENT: &str = "police_incident";
pub const SCHEMA_TRAFFIC_CRASH: &str = "traffic_crash";

/// A WGS-84 lat/lon pair. `None` anywhere upstream means "do not bucket",
/// never `(0.0, 0.0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f32,
    pub longitude: f32,
}

/// Shared capability set every decoded record exposes to the bucketer and
/// the raw writer.
pub trait ProcessableRecord {
    fn schema_name(&self) -> &'static str;
    fn coordinates(&self) -> Option<Coordinates>;
    fn timestamp(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct A311Case {
    pub case_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub opened_at: DateTime<Utc>,
    pub case_type: String,
    pub status: String,
    pub latitude: f32,
    pub longitude: f32,
    pub neighborhood: Option<String>,
}

impl ProcessableRecord for A311Case {
    fn schema_name(&self) -> &'static str {
        SCHEMA_A311_CASE
    }

    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.opened_at
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FireEmsCall {
    pub call_number: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub received_at: DateTime<Utc>,
    pub call_type: String,
    pub unit_id: Option<String>,
    pub latitude: f32,
    pub longitude: f32,
    pub response_seconds: Option<i32>,
}

impl ProcessableRecord for FireEmsCall {
    fn schema_name(&self) -> &'static str {
        SCHEMA_FIRE_EMS_CALL
    }

    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.received_at
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FireIncident {
    pub incident_number: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub alarm_at: DateTime<Utc>,
    pub property_use: Option<String>,
    pub number_of_alarms: Option<i32>,
    pub floor_of_fire_origin: Option<i32>,
    pub latitude: f32,
    pub longitude: f32,
}

impl ProcessableRecord for FireIncident {
    fn schema_name(&self) -> &'static str {
        SCHEMA_FIRE_INCIDENT
    }

    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.alarm_at
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoliceIncident {
    pub incident_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub occurred_at: DateTime<Utc>,
    pub category: String,
    pub resolution: Option<String>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
}

impl ProcessableRecord for PoliceIncident {
    fn schema_name(&self) -> &'static str {
        SCHEMA_POLICE_INCIDENT
    }

    fn coordinates(&self) -> Option<Coordinates> {
        // Either both present or neither; a single missing axis means "no
        // coordinates", matching the source's nil-either-means-None rule.
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrafficCrash {
    pub crash_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub occurred_at: DateTime<Utc>,
    pub number_of_injuries: Option<i32>,
    pub number_of_fatalities: Option<i32>,
    pub primary_contributing_factor: Option<String>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
}

impl ProcessableRecord for TrafficCrash {
    fn schema_name(&self) -> &'static str {
        SCHEMA_TRAFFIC_CRASH
    }

    fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

/// The closed set of record variants. Extending the system to a new
/// schema means adding a case here, in [`crate::decode::new_record`], and in
/// the raw writer's per-schema table.
#[derive(Debug, Clone)]
pub enum Record {
    A311Case(A311Case),
    FireEmsCall(FireEmsCall),
    FireIncident(FireIncident),
    PoliceIncident(PoliceIncident),
    TrafficCrash(TrafficCrash),
}

impl ProcessableRecord for Record {
    fn schema_name(&self) -> &'static str {
        match self {
            Record::A311Case(r) => r.schema_name(),
            Record::FireEmsCall(r) => r.schema_name(),
            Record::FireIncident(r) => r.schema_name(),
            Record::PoliceIncident(r) => r.schema_name(),
            Record::TrafficCrash(r) => r.schema_name(),
        }
    }

    fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Record::A311Case(r) => r.coordinates(),
            Record::FireEmsCall(r) => r.coordinates(),
            Record::FireIncident(r) => r.coordinates(),
            Record::PoliceIncident(r) => r.coordinates(),
            Record::TrafficCrash(r) => r.coordinates(),
        }
    }

    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Record::A311Case(r) => r.timestamp(),
            Record::FireEmsCall(r) => r.timestamp(),
            Record::FireIncident(r) => r.timestamp(),
            Record::PoliceIncident(r) => r.timestamp(),
            Record::TrafficCrash(r) => r.timestamp(),
        }
    }
}

impl Record {
    /// Decode an avro-encoded payload known to carry the given schema.
    pub fn decode(schema_name: &str, payload: &[u8]) -> Result<Record, DecodeError> {
        match schema_name {
            SCHEMA_A311_CASE => {
                decode_avro::<A311Case>(SCHEMA_A311_CASE, payload).map(Record::A311Case)
            }
            SCHEMA_FIRE_EMS_CALL => {
                decode_avro::<FireEmsCall>(SCHEMA_FIRE_EMS_CALL, payload).map(Record::FireEmsCall)
            }
            SCHEMA_FIRE_INCIDENT => {
                decode_avro::<FireIncident>(SCHEMA_FIRE_INCIDENT, payload).map(Record::FireIncident)
            }
            SCHEMA_POLICE_INCIDENT => decode_avro::<PoliceIncident>(SCHEMA_POLICE_INCIDENT, payload)
                .map(Record::PoliceIncident),
            SCHEMA_TRAFFIC_CRASH => {
                decode_avro::<TrafficCrash>(SCHEMA_TRAFFIC_CRASH, payload).map(Record::TrafficCrash)
            }
            other => Err(DecodeError::UnrecognizedSchema(other.to_string())),
        }
    }
}

const A311_CASE_SCHEMA: &str = r#"{
    "type": "record", "name": "A311Case",
    "fields": [
        {"name": "case_id", "type": "string"},
        {"name": "opened_at", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "case_type", "type": "string"},
        {"name": "status", "type": "string"},
        {"name": "latitude", "type": "float"},
        {"name": "longitude", "type": "float"},
        {"name": "neighborhood", "type": ["null", "string"], "default": null}
    ]
}"#;

const FIRE_EMS_CALL_SCHEMA: &str = r#"{
    "type": "record", "name": "FireEmsCall",
    "fields": [
        {"name": "call_number", "type": "string"},
        {"name": "received_at", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "call_type", "type": "string"},
        {"name": "unit_id", "type": ["null", "string"], "default": null},
        {"name": "latitude", "type": "float"},
        {"name": "longitude", "type": "float"},
        {"name": "response_seconds", "type": ["null", "int"], "default": null}
    ]
}"#;

const FIRE_INCIDENT_SCHEMA: &str = r#"{
    "type": "record", "name": "FireIncident",
    "fields": [
        {"name": "incident_number", "type": "string"},
        {"name": "alarm_at", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "property_use", "type": ["null", "string"], "default": null},
        {"name": "number_of_alarms", "type": ["null", "int"], "default": null},
        {"name": "floor_of_fire_origin", "type": ["null", "int"], "default": null},
        {"name": "latitude", "type": "float"},
        {"name": "longitude", "type": "float"}
    ]
}"#;

const POLICE_INCIDENT_SCHEMA: &str = r#"{
    "type": "record", "name": "PoliceIncident",
    "fields": [
        {"name": "incident_id", "type": "string"},
        {"name": "occurred_at", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "category", "type": "string"},
        {"name": "resolution", "type": ["null", "string"], "default": null},
        {"name": "latitude", "type": ["null", "float"], "default": null},
        {"name": "longitude", "type": ["null", "float"], "default": null}
    ]
}"#;

const TRAFFIC_CRASH_SCHEMA: &str = r#"{
    "type": "record", "name": "TrafficCrash",
    "fields": [
        {"name": "crash_id", "type": "string"},
        {"name": "occurred_at", "type": {"type": "long", "logicalType": "timestamp-millis"}},
        {"name": "number_of_injuries", "type": ["null", "int"], "default": null},
        {"name": "number_of_fatalities", "type": ["null", "int"], "default": null},
        {"name": "primary_contributing_factor", "type": ["null", "string"], "default": null},
        {"name": "latitude", "type": ["null", "float"], "default": null},
        {"name": "longitude", "type": ["null", "float"], "default": null}
    ]
}"#;

fn schema_json_for(schema_name: &str) -> Option<&'static str> {
    match schema_name {
        SCHEMA_A311_CASE => Some(A311_CASE_SCHEMA),
        SCHEMA_FIRE_EMS_CALL => Some(FIRE_EMS_CALL_SCHEMA),
        SCHEMA_FIRE_INCIDENT => Some(FIRE_INCIDENT_SCHEMA),
        SCHEMA_POLICE_INCIDENT => Some(POLICE_INCIDENT_SCHEMA),
        SCHEMA_TRAFFIC_CRASH => Some(TRAFFIC_CRASH_SCHEMA),
        _ => None,
    }
}

fn schema_for(schema_name: &str) -> Option<&'static apache_avro::Schema> {
    use std::collections::HashMap;
    use std::sync::OnceLock;

    static SCHEMAS: OnceLock<HashMap<&'static str, apache_avro::Schema>> = OnceLock::new();
    let schemas = SCHEMAS.get_or_init(|| {
        [
            SCHEMA_A311_CASE,
            SCHEMA_FIRE_EMS_CALL,
            SCHEMA_FIRE_INCIDENT,
            SCHEMA_POLICE_INCIDENT,
            SCHEMA_TRAFFIC_CRASH,
        ]
        .into_iter()
        .map(|name| {
            let json = schema_json_for(name).expect("schema name in closed set");
            let schema = apache_avro::Schema::parse_str(json)
                .unwrap_or_else(|e| panic!("built-in schema for {name} is invalid: {e}"));
            (name, schema)
        })
        .collect()
    });
    schemas.get(schema_name)
}

fn decode_avro<T>(schema_name: &'static str, payload: &[u8]) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    let schema = schema_for(schema_name).expect("schema name in closed set");
    apache_avro::from_avro_datum(schema, &mut std::io::Cursor::new(payload), None)
        .and_then(|value| apache_avro::from_value::<T>(&value))
        .map_err(|source| DecodeError::Avro {
            schema: schema_name,
            source,
        })
}
