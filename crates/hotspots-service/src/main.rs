use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use hotspots_service::config::{Config, LogFormat};
use hotspots_service::{AggregatesService, AppState, Cache, Repo};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hotspots-service", about = "HTTP surface for incident aggregates")]
struct Cli {
    /// Override APP_PORT for this run.
    #[arg(long, env = "APP_PORT")]
    port: Option<u16>,

    /// Override LOG_LEVEL for this run.
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(async_main()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.app_port = port;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    init_tracing(&config);

    info!(port = config.app_port, "starting aggregates service");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.aggregates_db_url)
        .await?;
    let repo = Repo::new(pool);

    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let cache = Cache::new(redis_client, config.cache_aggregates_prefix.clone(), config.cache_aggregates_ttl_seconds);

    let service = AggregatesService::new(repo, cache);
    let state = AppState {
        service: Arc::new(service),
    };

    hotspots_service::run(state, config.app_port).await
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}
