//! Shared data model and pure logic for the incident-hotspots pipeline:
//! record decoding, time/space bucketing, and rollup. Kept free of any
//! I/O so both the consumer and the aggregates service depend on it
//! without pulling in each other's drivers.

pub mod bucket;
pub mod decode;
pub mod error;
pub mod params;
pub mod records;
pub mod rollup;

pub use bucket::{bucket_time, encode_location, truncate_geohash, Bucket, Bucketer};
pub use decode::{decode_message, decode_messages, get_schema_name, RawMessage};
pub use error::{DecodeError, ParamError};
pub use params::AggregatesReqParams;
pub use records::{Coordinates, ProcessableRecord, Record};
pub use rollup::{rollup, Aggregate, AggregateRow};
