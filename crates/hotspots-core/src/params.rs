use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::error::ParamError;

pub const DEFAULT_GEO_PRECISION: i64 = 7;
pub const MIN_GEO_PRECISION: i64 = 1;
pub const MAX_GEO_PRECISION: i64 = 7;

/// Wire format for request-parameter timestamps: no seconds, always `Z`.
const REQUEST_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

/// Parse a request-parameter timestamp (`2025-01-02T15:04Z`).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ParamError> {
    chrono::NaiveDateTime::parse_from_str(raw, REQUEST_TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ParamError::InvalidTimestamp(raw.to_string()))
}

/// Parse one of the six accepted time-precision tokens into a [`TimeDelta`].
pub fn parse_time_precision(raw: &str) -> Result<TimeDelta, ParamError> {
    match raw {
        "1m" => Ok(TimeDelta::minutes(1)),
        "15m" => Ok(TimeDelta::minutes(15)),
        "1h" => Ok(TimeDelta::hours(1)),
        "6h" => Ok(TimeDelta::hours(6)),
        "12h" => Ok(TimeDelta::hours(12)),
        "24h" => Ok(TimeDelta::hours(24)),
        other => Err(ParamError::InvalidTimePrecision(other.to_string())),
    }
}

/// Parse and range-check a geo-precision query parameter.
pub fn parse_geo_precision(raw: &str) -> Result<usize, ParamError> {
    let value: i64 = raw
        .parse()
        .map_err(|_| ParamError::GeoPrecisionNotANumber(raw.to_string()))?;
    if !(MIN_GEO_PRECISION..=MAX_GEO_PRECISION).contains(&value) {
        return Err(ParamError::InvalidGeoPrecision(value));
    }
    Ok(value as usize)
}

/// Parsed, validated parameters for `GET /aggregates`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatesReqParams {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub time_precision: TimeDelta,
    pub geo_precision: usize,
}

impl AggregatesReqParams {
    /// `end_time` defaults to the current wall clock rounded down to the
    /// minute, in UTC, when the caller omits it.
    pub fn default_end_time(now: DateTime<Utc>) -> DateTime<Utc> {
        now.duration_trunc(TimeDelta::minutes(1))
            .expect("truncating to one minute never overflows")
    }

    /// `start_time` defaults to the Unix epoch when the caller omits it,
    /// i.e. an open lower bound rather than `end_time` — a bare request
    /// returns every row up to `end_time`, not only rows exactly at it.
    /// Chosen over `DateTime::<Utc>::MIN_UTC` because the row store's
    /// timestamp column cannot represent a date that extreme.
    pub fn default_start_time() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).expect("unix epoch is always representable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_start_time_is_an_open_lower_bound() {
        assert_eq!(
            AggregatesReqParams::default_start_time(),
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn default_end_time_truncates_down_to_the_minute() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 13, 0, 31).unwrap();
        assert_eq!(
            AggregatesReqParams::default_end_time(now),
            Utc.with_ymd_and_hms(2025, 1, 1, 13, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_request_timestamp() {
        let got = parse_timestamp("2025-01-02T15:04Z").unwrap();
        assert_eq!(got, Utc.with_ymd_and_hms(2025, 1, 2, 15, 4, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_timestamp() {
        assert!(parse_timestamp("not-a-timestamp").is_err());
    }

    #[test]
    fn parses_all_six_time_precisions() {
        for (raw, expected) in [
            ("1m", TimeDelta::minutes(1)),
            ("15m", TimeDelta::minutes(15)),
            ("1h", TimeDelta::hours(1)),
            ("6h", TimeDelta::hours(6)),
            ("12h", TimeDelta::hours(12)),
            ("24h", TimeDelta::hours(24)),
        ] {
            assert_eq!(parse_time_precision(raw).unwrap(), expected);
        }
    }

    #[test]
    fn rejects_unknown_time_precision() {
        assert!(parse_time_precision("2h").is_err());
    }

    #[test]
    fn parses_geo_precision_in_range() {
        assert_eq!(parse_geo_precision("7").unwrap(), 7);
        assert_eq!(parse_geo_precision("1").unwrap(), 1);
    }

    #[test]
    fn rejects_geo_precision_out_of_range() {
        assert!(parse_geo_precision("0").is_err());
        assert!(parse_geo_precision("8").is_err());
    }

    #[test]
    fn rejects_non_numeric_geo_precision() {
        assert!(parse_geo_precision("abc").is_err());
    }
}
