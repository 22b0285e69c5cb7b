//! The aggregates service: an HTTP surface over a transactional row
//! store, fronted by a result cache, implementing the time/space rollup
//! of bucketed incident counts.

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod repo;
pub mod service;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

pub use cache::{Cache, CacheError};
pub use config::Config;
pub use error::{AppError, ServiceError};
pub use repo::Repo;
pub use service::{AggregatesService, Cacher, Repoer};

/// The concrete service wiring used by the binary: a real row store and
/// a real result cache.
pub type ConcreteService = AggregatesService<Repo, Cache>;

/// State shared by every handler. Generic over the repo/cache
/// implementation so the router can be exercised in tests against
/// in-memory fakes, not just the real Postgres/Redis wiring.
pub struct AppState<R, C> {
    pub service: Arc<AggregatesService<R, C>>,
}

impl<R, C> Clone for AppState<R, C> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

pub fn router<R, C>(state: AppState<R, C>) -> Router
where
    R: Repoer + Send + Sync + 'static,
    C: Cacher + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/aggregates",
            get(handlers::handle_get_aggregates::<R, C>)
                .post(handlers::handle_insert_aggregates::<R, C>)
                .put(handlers::handle_upsert_aggregates::<R, C>),
        )
        .route("/health", get(handlers::handle_health))
        .with_state(state)
}

pub async fn run(state: AppState<Repo, Cache>, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "aggregates service listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
