use hotspots_core::{AggregatesReqParams, Aggregate};
use redis::AsyncCommands;

use crate::service::Cacher;

/// Redis-backed result cache, keyed by the textual encoding of request
/// parameters. Two requests with differing textual encodings of
/// equivalent parameters (e.g. fractional seconds) are distinct keys by
/// design — the cache trades a few redundant rollups for a key scheme
/// simple enough to reason about.
#[derive(Clone)]
pub struct Cache {
    client: redis::Client,
    prefix: String,
    ttl_seconds: u64,
}

/// Mirrors the source system's distinction between "the key is not
/// present" and "the backend failed": only the former is a normal,
/// silent fall-through to the database.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no such key")]
    NoSuchKey,

    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

impl Cache {
    pub fn new(client: redis::Client, prefix: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            ttl_seconds,
        }
    }

    pub fn make_key(&self, params: &AggregatesReqParams) -> String {
        format!(
            "{}:{}|{}|{}|{}",
            self.prefix,
            params.start_time.to_rfc3339(),
            params.end_time.to_rfc3339(),
            params.time_precision.num_seconds(),
            params.geo_precision,
        )
    }

    pub async fn get(&self, key: &str) -> Result<Vec<Aggregate>, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        let raw = raw.ok_or(CacheError::NoSuchKey)?;
        serde_json::from_str(&raw).map_err(|e| {
            CacheError::Backend(redis::RedisError::from(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )))
        })
    }

    pub async fn set(&self, key: &str, value: &[Aggregate]) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw = serde_json::to_string(value).expect("Aggregate serialization never fails");
        conn.set_ex::<_, _, ()>(key, raw, self.ttl_seconds).await?;
        Ok(())
    }
}

impl Cacher for Cache {
    fn make_key(&self, params: &AggregatesReqParams) -> String {
        Cache::make_key(self, params)
    }

    async fn get(&self, key: &str) -> Result<Vec<Aggregate>, CacheError> {
        Cache::get(self, key).await
    }

    async fn set(&self, key: &str, value: &[Aggregate]) -> Result<(), CacheError> {
        Cache::set(self, key, value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, Utc};

    #[test]
    fn make_key_is_a_function_of_params_alone() {
        let cache = Cache::new(redis::Client::open("redis://localhost").unwrap(), "aggregates", 300);
        let params = AggregatesReqParams {
            start_time: Utc::now(),
            end_time: Utc::now(),
            time_precision: TimeDelta::hours(1),
            geo_precision: 7,
        };
        assert_eq!(cache.make_key(&params), cache.make_key(&params.clone()));
    }
}
