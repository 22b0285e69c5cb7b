use chrono::{DateTime, TimeDelta, Utc};

use crate::records::Coordinates;

/// A time x place key that one or more records fold into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bucket {
    pub occurred_at: DateTime<Utc>,
    pub geohash: String,
}

/// Round `t` **up** to the next multiple of `precision`, as measured from
/// the Unix epoch. If `t` already sits on a boundary, it is returned
/// unchanged — this is a ceiling, not a round-half-up.
///
/// `precision` must be positive.
pub fn bucket_time(t: DateTime<Utc>, precision: TimeDelta) -> DateTime<Utc> {
    assert!(precision > TimeDelta::zero(), "bucket precision must be positive");

    let epoch_nanos = t.timestamp_nanos_opt().expect("timestamp out of range");
    let precision_nanos = precision
        .num_nanoseconds()
        .expect("precision does not overflow i64 nanoseconds");

    let truncated_nanos = (epoch_nanos.div_euclid(precision_nanos)) * precision_nanos;
    let rounded_nanos = if truncated_nanos == epoch_nanos {
        truncated_nanos
    } else {
        truncated_nanos + precision_nanos
    };

    DateTime::from_timestamp_nanos(rounded_nanos)
}

/// Encode a coordinate pair to a geohash at a fixed precision.
pub fn encode_location(coordinates: Coordinates, precision: usize) -> String {
    geohash::encode(
        geohash::Coord {
            x: coordinates.longitude as f64,
            y: coordinates.latitude as f64,
        },
        precision,
    )
    .expect("latitude/longitude within WGS-84 range")
}

/// Truncate an already-encoded geohash to its first `precision` characters.
pub fn truncate_geohash(geohash: &str, precision: usize) -> String {
    geohash.chars().take(precision).collect()
}

/// Fixed-precision bucketer used by the consumer to fold a record's
/// timestamp and location into a `Bucket`, or `None` when the record
/// carries no coordinates.
pub struct Bucketer {
    time_precision: TimeDelta,
    geo_precision: usize,
}

impl Bucketer {
    /// # Panics
    /// Panics if `time_precision` is not positive or `geo_precision` is zero.
    pub fn new(time_precision: TimeDelta, geo_precision: usize) -> Self {
        assert!(time_precision > TimeDelta::zero(), "time precision must be positive");
        assert!(geo_precision > 0, "geo precision must be positive");
        Self {
            time_precision,
            geo_precision,
        }
    }

    /// Derive the bucket for a timestamp/coordinates pair. Returns `None`
    /// when coordinates are absent — such records are never aggregated,
    /// though they may still be stored verbatim in raw mode.
    pub fn make_bucket(
        &self,
        occurred_at: DateTime<Utc>,
        coordinates: Option<Coordinates>,
    ) -> Option<Bucket> {
        let coordinates = coordinates?;
        Some(Bucket {
            occurred_at: bucket_time(occurred_at, self.time_precision),
            geohash: encode_location(coordinates, self.geo_precision),
        })
    }
}
