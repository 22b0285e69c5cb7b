use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hotspots_core::Bucket;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::error::DispatchError;

/// Wire form of one bucketed count, as POSTed to the aggregates service.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AggregateItem {
    pub occurred_at: DateTime<Utc>,
    pub geohash: String,
    pub count: i64,
}

/// Flatten a per-flush bucket-count map into a list sorted by
/// `(occurred_at, geohash, count)`, so repeated requests with the same
/// logical contents serialize identically.
pub fn flatten_bucket_counts(counts: &HashMap<Bucket, i64>) -> Vec<AggregateItem> {
    let mut items: Vec<AggregateItem> = counts
        .iter()
        .map(|(bucket, count)| AggregateItem {
            occurred_at: bucket.occurred_at,
            geohash: bucket.geohash.clone(),
            count: *count,
        })
        .collect();
    items.sort_by(|a, b| {
        a.occurred_at
            .cmp(&b.occurred_at)
            .then_with(|| a.geohash.cmp(&b.geohash))
            .then_with(|| a.count.cmp(&b.count))
    });
    items
}

/// HTTP client for `POST /aggregates`, with bounded retry on 429/5xx.
pub struct AggregatesServiceClient {
    http: Client,
    base_url: String,
    retries: u32,
    backoff: Duration,
}

impl AggregatesServiceClient {
    pub fn new(http: Client, base_url: impl Into<String>, retries: u32, backoff: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            retries,
            backoff,
        }
    }

    pub async fn post_aggregates(&self, counts: &HashMap<Bucket, i64>) -> Result<(), DispatchError> {
        if counts.is_empty() {
            return Ok(());
        }
        let body = flatten_bucket_counts(counts);
        self.dispatch(&body).await
    }

    /// Send the request, retrying on 429/5xx with linear backoff
    /// `(attempt + 1) * backoff`. Total attempts made is `retries + 1`.
    /// Any other non-2xx status fails immediately; a transport error
    /// fails immediately without retrying.
    async fn dispatch(&self, body: &[AggregateItem]) -> Result<(), DispatchError> {
        let url = format!("{}/aggregates", self.base_url.trim_end_matches('/'));
        let mut last_status = StatusCode::INTERNAL_SERVER_ERROR;

        for attempt in 0..=self.retries {
            let response = self
                .http
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(DispatchError::Transport)?;

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                last_status = status;
                if attempt < self.retries {
                    tokio::time::sleep(self.backoff * (attempt + 1)).await;
                    continue;
                }
                return Err(DispatchError::RetriesExhausted {
                    attempts: attempt + 1,
                    status,
                });
            }

            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError::NonRetryableStatus { status, body: text });
        }

        Err(DispatchError::RetriesExhausted {
            attempts: self.retries + 1,
            status: last_status,
        })
    }
}
