use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::TimeDelta;
use hotspots_core::params::parse_time_precision;

const RAW_CONSUMER_TYPE: &str = "raw";
const AGGREGATES_CONSUMER_TYPE: &str = "aggregates";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerType {
    Raw,
    Aggregates,
}

/// Environment-sourced configuration for the consumer binary. There is no
/// file layer: every field is read directly from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub kafka_topic: String,
    pub kafka_url: String,
    pub consumer_group_id: String,
    pub buffer_size: usize,
    pub flush_interval: Duration,
    pub bucket_time_precision: TimeDelta,
    pub bucket_geohash_precision: usize,
    pub consumer_type: ConsumerType,
    pub warehouse_url: Option<String>,
    pub app_url: Option<String>,
    pub http_request_timeout: Duration,
    pub http_request_retries: u32,
    pub http_request_backoff: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let consumer_type = match get_env_string("CONSUMER_TYPE")?.as_str() {
            RAW_CONSUMER_TYPE => ConsumerType::Raw,
            AGGREGATES_CONSUMER_TYPE => ConsumerType::Aggregates,
            other => bail!("CONSUMER_TYPE must be \"raw\" or \"aggregates\", got {other:?}"),
        };

        let config = Config {
            kafka_topic: get_env_string("KAFKA_TOPIC")?,
            kafka_url: get_env_string("KAFKA_URL")?,
            consumer_group_id: get_env_string("CONSUMER_GROUP_ID")?,
            buffer_size: get_env_usize("BUFFER_SIZE")?,
            flush_interval: get_env_duration_seconds("FLUSH_INTERVAL")?,
            bucket_time_precision: parse_time_precision(&get_env_string("BUCKET_TIME_PRECISION")?)
                .map_err(|e| anyhow::anyhow!("BUCKET_TIME_PRECISION: {e}"))?,
            bucket_geohash_precision: get_env_usize("BUCKET_GEOHASH_PRECISION")?,
            consumer_type,
            warehouse_url: get_env_string_opt("WAREHOUSE_URL"),
            app_url: get_env_string_opt("APP_URL"),
            http_request_timeout: get_env_duration_seconds("HTTP_REQUEST_TIMEOUT")
                .unwrap_or(Duration::from_secs(5)),
            http_request_retries: get_env_usize("HTTP_REQUEST_RETRIES").unwrap_or(3) as u32,
            http_request_backoff: get_env_duration_seconds("HTTP_REQUEST_BACKOFF")
                .unwrap_or(Duration::from_millis(500)),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: match std::env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("BUFFER_SIZE must be positive");
        }
        if self.flush_interval.is_zero() {
            bail!("FLUSH_INTERVAL must be positive");
        }
        if self.bucket_geohash_precision == 0 || self.bucket_geohash_precision > 12 {
            bail!("BUCKET_GEOHASH_PRECISION must be in 1..=12");
        }
        match self.consumer_type {
            ConsumerType::Raw if self.warehouse_url.is_none() => {
                bail!("WAREHOUSE_URL is required when CONSUMER_TYPE=raw")
            }
            ConsumerType::Aggregates if self.app_url.is_none() => {
                bail!("APP_URL is required when CONSUMER_TYPE=aggregates")
            }
            _ => {}
        }
        if self.http_request_retries > 10 {
            tracing::warn!(
                retries = self.http_request_retries,
                "HTTP_REQUEST_RETRIES is unusually high"
            );
        }
        Ok(())
    }
}

fn get_env_string(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn get_env_string_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn get_env_usize(key: &str) -> Result<usize> {
    get_env_string(key)?
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer"))
}

fn get_env_duration_seconds(key: &str) -> Result<Duration> {
    let seconds: u64 = get_env_string(key)?
        .parse()
        .with_context(|| format!("{key} must be an integer number of seconds"))?;
    Ok(Duration::from_secs(seconds))
}
