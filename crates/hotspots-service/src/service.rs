use chrono::{DateTime, Utc};
use hotspots_core::{rollup, Aggregate, AggregateRow, AggregatesReqParams};
use tracing::warn;

use crate::cache::CacheError;
use crate::error::ServiceError;

/// Row-store access needed by [`AggregatesService`]. Abstracted behind a
/// trait so the cache-aside algorithm can be exercised against an
/// in-memory fake.
pub trait Repoer {
    fn get_aggregate_rows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl std::future::Future<Output = anyhow::Result<Vec<AggregateRow>>> + Send;

    fn insert_aggregates(
        &self,
        items: &[Aggregate],
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;

    fn upsert_aggregates(
        &self,
        items: &[Aggregate],
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// Result cache needed by [`AggregatesService`].
pub trait Cacher {
    fn make_key(&self, params: &AggregatesReqParams) -> String;

    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Aggregate>, CacheError>> + Send;

    fn set(
        &self,
        key: &str,
        value: &[Aggregate],
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;
}

pub struct AggregatesService<R, C> {
    repo: R,
    cache: C,
}

impl<R, C> AggregatesService<R, C>
where
    R: Repoer,
    C: Cacher,
{
    pub fn new(repo: R, cache: C) -> Self {
        Self { repo, cache }
    }

    /// Cache-aside rollup: a cache hit short-circuits the database
    /// entirely; a miss (or any cache read failure, logged and treated as
    /// a miss) falls through to the row store and the rollup algorithm,
    /// then asynchronously repopulates the cache. Cache write failures
    /// are logged and never surfaced to the caller.
    pub async fn get_aggregates(&self, params: &AggregatesReqParams) -> Result<Vec<Aggregate>, ServiceError> {
        let key = self.cache.make_key(params);

        match self.cache.get(&key).await {
            Ok(cached) => return Ok(cached),
            Err(CacheError::NoSuchKey) => {}
            Err(e) => warn!(error = %e, "cache read failed, falling through to the row store"),
        }

        let rows = self
            .repo
            .get_aggregate_rows(params.start_time, params.end_time)
            .await
            .map_err(ServiceError::Storage)?;

        let result = rollup(&rows, params.time_precision, params.geo_precision);

        if let Err(e) = self.cache.set(&key, &result).await {
            warn!(error = %e, "cache write failed");
        }

        Ok(result)
    }

    /// Append-insert: duplicates are expected and reconciled by `SUM` at
    /// read time.
    pub async fn insert_aggregates(&self, items: &[Aggregate]) -> Result<(), ServiceError> {
        self.repo.insert_aggregates(items).await.map_err(ServiceError::Storage)
    }

    /// Idempotent upsert: delete-then-insert per key, in one transaction
    /// per call.
    pub async fn upsert_aggregates(&self, items: &[Aggregate]) -> Result<(), ServiceError> {
        self.repo.upsert_aggregates(items).await.map_err(ServiceError::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct FakeRepo {
        rows: Vec<AggregateRow>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Repoer for FakeRepo {
        async fn get_aggregate_rows(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> anyhow::Result<Vec<AggregateRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("database is down");
            }
            Ok(self.rows.clone())
        }

        async fn insert_aggregates(&self, _items: &[Aggregate]) -> anyhow::Result<()> {
            Ok(())
        }

        async fn upsert_aggregates(&self, _items: &[Aggregate]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeCache {
        hit: Option<Vec<Aggregate>>,
        sets: Arc<std::sync::Mutex<Vec<Vec<Aggregate>>>>,
    }

    impl Cacher for FakeCache {
        fn make_key(&self, _params: &AggregatesReqParams) -> String {
            "fixed-key".to_string()
        }

        async fn get(&self, _key: &str) -> Result<Vec<Aggregate>, CacheError> {
            self.hit.clone().ok_or(CacheError::NoSuchKey)
        }

        async fn set(&self, _key: &str, value: &[Aggregate]) -> Result<(), CacheError> {
            self.sets.lock().unwrap().push(value.to_vec());
            Ok(())
        }
    }

    fn params() -> AggregatesReqParams {
        AggregatesReqParams {
            start_time: Utc::now(),
            end_time: Utc::now(),
            time_precision: TimeDelta::minutes(1),
            geo_precision: 7,
        }
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_the_database() {
        let cached = vec![Aggregate {
            occurred_at: Utc::now(),
            geohash: "abcdefg".into(),
            count: 5,
        }];
        let repo = FakeRepo::default();
        let cache = FakeCache {
            hit: Some(cached.clone()),
            ..Default::default()
        };
        let service = AggregatesService::new(repo.clone(), cache);

        let got = service.get_aggregates(&params()).await.unwrap();
        assert_eq!(got, cached);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cache_miss_falls_through_to_the_database_and_repopulates() {
        let row = AggregateRow {
            occurred_at: Utc::now(),
            geo_id: "abcdefg".into(),
            incident_count: 3,
        };
        let repo = FakeRepo {
            rows: vec![row],
            ..Default::default()
        };
        let cache = FakeCache::default();
        let sets = cache.sets.clone();
        let service = AggregatesService::new(repo.clone(), cache);

        let got = service.get_aggregates(&params()).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn database_error_propagates_without_a_cache_write() {
        let repo = FakeRepo {
            fail: true,
            ..Default::default()
        };
        let cache = FakeCache::default();
        let sets = cache.sets.clone();
        let service = AggregatesService::new(repo, cache);

        assert!(service.get_aggregates(&params()).await.is_err());
        assert!(sets.lock().unwrap().is_empty());
    }
}
