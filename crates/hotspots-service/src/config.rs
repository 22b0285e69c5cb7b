use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Environment-sourced configuration for the aggregates service. There
/// is no file layer: every field is read directly from the process
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub aggregates_db_url: String,
    pub redis_url: String,
    pub cache_aggregates_prefix: String,
    pub cache_aggregates_ttl_seconds: u64,
    pub app_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            aggregates_db_url: get_env_string("AGGREGATES_DB_URL")?,
            redis_url: get_env_string("REDIS_URL")?,
            cache_aggregates_prefix: std::env::var("CACHE_AGGREGATES_PREFIX")
                .unwrap_or_else(|_| "aggregates".to_string()),
            cache_aggregates_ttl_seconds: get_env_u64("CACHE_AGGREGATES_TTL").unwrap_or(300),
            app_port: get_env_u64("APP_PORT").unwrap_or(8080) as u16,
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
        if self.cache_aggregates_prefix.is_empty() {
            bail!("CACHE_AGGREGATES_PREFIX must not be empty");
        }
        if self.app_port == 0 {
            bail!("APP_PORT must be a valid non-zero port");
        }
        Ok(())
    }
}

fn get_env_string(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn get_env_u64(key: &str) -> Result<u64> {
    get_env_string(key)?
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            aggregates_db_url: "postgres://localhost/aggregates".into(),
            redis_url: "redis://localhost".into(),
            cache_aggregates_prefix: "aggregates".into(),
            cache_aggregates_ttl_seconds: 300,
            app_port: 8080,
            log_level: "info".into(),
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_empty_cache_prefix() {
        let mut config = base_config();
        config.cache_aggregates_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = base_config();
        config.app_port = 0;
        assert!(config.validate().is_err());
    }
}
