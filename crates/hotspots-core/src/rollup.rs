use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::bucket::{bucket_time, truncate_geohash, Bucket};

/// A row as stored in the row store, already summed per `(occurred_at,
/// geo_id)` by the query that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub occurred_at: DateTime<Utc>,
    pub geo_id: String,
    pub incident_count: i64,
}

/// A rolled-up count, as returned by `GET /aggregates` and exchanged with
/// the row store over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Aggregate {
    pub occurred_at: DateTime<Utc>,
    pub geohash: String,
    pub count: i64,
}

/// Collapse rows already ordered by `(occurred_at, geo_id)` into buckets
/// keyed by `(bucket_time(occurred_at, time_precision), geohash prefix of
/// length geo_precision)`.
///
/// Output preserves first-appearance order of buckets: two rows that map
/// to the same bucket but are separated by a different bucket both fold
/// into the earliest slot, not a re-sorted position.
pub fn rollup(rows: &[AggregateRow], time_precision: TimeDelta, geo_precision: usize) -> Vec<Aggregate> {
    let mut slots: Vec<Aggregate> = Vec::new();
    let mut index: std::collections::HashMap<Bucket, usize> = std::collections::HashMap::new();

    for row in rows {
        let bucket = Bucket {
            occurred_at: bucket_time(row.occurred_at, time_precision),
            geohash: truncate_geohash(&row.geo_id, geo_precision),
        };

        match index.get(&bucket) {
            Some(&slot) => slots[slot].count += row.incident_count,
            None => {
                let slot = slots.len();
                slots.push(Aggregate {
                    occurred_at: bucket.occurred_at,
                    geohash: bucket.geohash.clone(),
                    count: row.incident_count,
                });
                index.insert(bucket, slot);
            }
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn row(y: i32, mo: u32, d: u32, h: u32, mi: u32, geo: &str, count: i64) -> AggregateRow {
        AggregateRow {
            occurred_at: dt(y, mo, d, h, mi, 0),
            geo_id: geo.to_string(),
            incident_count: count,
        }
    }

    #[test]
    fn rollup_passes_through_at_native_precision() {
        let rows = vec![
            row(2025, 1, 1, 13, 5, "abcdefg", 1),
            row(2025, 1, 1, 13, 5, "abcdefg", 1),
            row(2025, 1, 3, 4, 0, "abcdefg", 2),
            row(2025, 1, 7, 15, 0, "abcdefg", 3),
        ];
        let out = rollup(&rows, TimeDelta::minutes(1), 7);
        assert_eq!(
            out,
            vec![
                Aggregate { occurred_at: dt(2025, 1, 1, 13, 5, 0), geohash: "abcdefg".into(), count: 2 },
                Aggregate { occurred_at: dt(2025, 1, 3, 4, 0, 0), geohash: "abcdefg".into(), count: 2 },
                Aggregate { occurred_at: dt(2025, 1, 7, 15, 0, 0), geohash: "abcdefg".into(), count: 3 },
            ]
        );
    }

    #[test]
    fn rollup_merges_by_spatial_precision() {
        let rows = vec![
            row(2025, 1, 1, 13, 5, "abcde11", 1),
            row(2025, 1, 1, 13, 5, "abcde12", 1),
            row(2025, 1, 1, 13, 5, "abcde21", 1),
        ];
        let out = rollup(&rows, TimeDelta::minutes(1), 6);
        assert_eq!(
            out,
            vec![
                Aggregate { occurred_at: dt(2025, 1, 1, 13, 5, 0), geohash: "abcde1".into(), count: 2 },
                Aggregate { occurred_at: dt(2025, 1, 1, 13, 5, 0), geohash: "abcde2".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn rollup_merges_by_temporal_precision_with_ceiling() {
        let rows = vec![
            row(2025, 1, 1, 13, 5, "abcde11", 1),
            row(2025, 1, 1, 13, 8, "abcde12", 3),
            row(2025, 1, 1, 13, 9, "abcde11", 1),
        ];
        let out = rollup(&rows, TimeDelta::hours(1), 7);
        assert_eq!(
            out,
            vec![
                Aggregate { occurred_at: dt(2025, 1, 1, 14, 0, 0), geohash: "abcde11".into(), count: 2 },
                Aggregate { occurred_at: dt(2025, 1, 1, 14, 0, 0), geohash: "abcde12".into(), count: 3 },
            ]
        );
    }

    #[test]
    fn rollup_merges_by_both_axes_at_once() {
        let rows = vec![
            row(2025, 1, 1, 13, 5, "abcde11", 1),
            row(2025, 1, 1, 13, 8, "abcde12", 2),
            row(2025, 1, 1, 15, 0, "abcde11", 1),
        ];
        let out = rollup(&rows, TimeDelta::hours(1), 6);
        assert_eq!(
            out,
            vec![
                Aggregate { occurred_at: dt(2025, 1, 1, 14, 0, 0), geohash: "abcde1".into(), count: 3 },
                Aggregate { occurred_at: dt(2025, 1, 1, 15, 0, 0), geohash: "abcde1".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn rollup_of_empty_input_is_empty() {
        assert!(rollup(&[], TimeDelta::minutes(1), 7).is_empty());
    }
}
