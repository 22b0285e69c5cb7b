use std::process::ExitCode;

use clap::Parser;
use hotspots_consumer::config::{Config, ConsumerType, LogFormat};
use hotspots_consumer::kafka_log::KafkaLog;
use hotspots_consumer::{AggregateWriter, AggregatesServiceClient, BufferedConsumer, RawWriter};
use hotspots_core::Bucketer;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hotspots-consumer", about = "Buffered consumer for incident records")]
struct Cli {
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
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }
    init_tracing(&config);

    info!(
        consumer_type = ?config.consumer_type,
        topic = %config.kafka_topic,
        buffer_size = config.buffer_size,
        "starting consumer"
    );

    let log = KafkaLog::new(&config.kafka_url, &config.consumer_group_id, &config.kafka_topic)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listen_for_shutdown(shutdown_tx));

    match config.consumer_type {
        ConsumerType::Raw => {
            let client = clickhouse::Client::default().with_url(
                config
                    .warehouse_url
                    .as_deref()
                    .expect("validated: WAREHOUSE_URL present in raw mode"),
            );
            let writer = RawWriter::new(client, config.bucket_geohash_precision);
            let mut consumer =
                BufferedConsumer::new(log, writer, config.buffer_size, config.flush_interval);
            run(&mut consumer, shutdown_rx).await
        }
        ConsumerType::Aggregates => {
            let http = reqwest::Client::builder()
                .timeout(config.http_request_timeout)
                .build()?;
            let client = AggregatesServiceClient::new(
                http,
                config
                    .app_url
                    .as_deref()
                    .expect("validated: APP_URL present in aggregates mode"),
                config.http_request_retries,
                config.http_request_backoff,
            );
            let bucketer = Bucketer::new(config.bucket_time_precision, config.bucket_geohash_precision);
            let writer = AggregateWriter::new(bucketer, client);
            let mut consumer =
                BufferedConsumer::new(log, writer, config.buffer_size, config.flush_interval);
            run(&mut consumer, shutdown_rx).await
        }
    }
}

async fn run<L, W>(
    consumer: &mut BufferedConsumer<L, W>,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    L: hotspots_consumer::MessageLog,
    W: hotspots_consumer::Writer,
{
    consumer.process(shutdown_rx).await.map_err(|e| {
        error!(error = %e, "consumer loop terminated");
        anyhow::Error::new(e)
    })?;
    info!("consumer shut down cleanly");
    Ok(())
}

async fn listen_for_shutdown(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate.recv() => info!("received SIGTERM, shutting down"),
    }

    let _ = shutdown_tx.send(true);
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
