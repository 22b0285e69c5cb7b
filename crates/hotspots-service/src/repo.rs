use chrono::{DateTime, Utc};
use hotspots_core::{Aggregate, AggregateRow};
use sqlx::PgPool;

use crate::service::Repoer;

const AGGREGATES_QUERY: &str = r#"
    SELECT occurred_at, geo_id, SUM(incident_count)::BIGINT AS incident_count
    FROM aggregate_buckets
    WHERE occurred_at >= $1 AND occurred_at <= $2
    GROUP BY occurred_at, geo_id
    ORDER BY occurred_at, geo_id
"#;

/// Row-store access for `aggregate_buckets`. Holds no state beyond the
/// connection pool.
#[derive(Clone)]
pub struct Repo {
    pool: PgPool,
}

impl Repo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_aggregate_rows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AggregateRow>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (DateTime<Utc>, String, i64)>(AGGREGATES_QUERY)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(occurred_at, geo_id, incident_count)| AggregateRow {
                occurred_at,
                geo_id,
                incident_count,
            })
            .collect())
    }

    /// Append-insert: bulk-inserts every row. Duplicates are expected and
    /// reconciled by `SUM` at read time.
    pub async fn insert_aggregates(&self, items: &[Aggregate]) -> Result<(), sqlx::Error> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                "INSERT INTO aggregate_buckets (occurred_at, geo_id, incident_count) VALUES ($1, $2, $3)",
            )
            .bind(item.occurred_at)
            .bind(&item.geohash)
            .bind(item.count)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    /// Idempotent upsert: for each incoming row, delete any existing rows
    /// at that `(occurred_at, geo_id)` key and insert the supplied count,
    /// all within one transaction.
    pub async fn upsert_aggregates(&self, items: &[Aggregate]) -> Result<(), sqlx::Error> {
        if items.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query("DELETE FROM aggregate_buckets WHERE occurred_at = $1 AND geo_id = $2")
                .bind(item.occurred_at)
                .bind(&item.geohash)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO aggregate_buckets (occurred_at, geo_id, incident_count) VALUES ($1, $2, $3)",
            )
            .bind(item.occurred_at)
            .bind(&item.geohash)
            .bind(item.count)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }
}

impl Repoer for Repo {
    async fn get_aggregate_rows(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> anyhow::Result<Vec<AggregateRow>> {
        Ok(Repo::get_aggregate_rows(self, start, end).await?)
    }

    async fn insert_aggregates(&self, items: &[Aggregate]) -> anyhow::Result<()> {
        Ok(Repo::insert_aggregates(self, items).await?)
    }

    async fn upsert_aggregates(&self, items: &[Aggregate]) -> anyhow::Result<()> {
        Ok(Repo::upsert_aggregates(self, items).await?)
    }
}
