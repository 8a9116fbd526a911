//! Process-level HTTP surface: binds a listener, assembles middleware around
//! [`llm::router`], and runs until asked to shut down. Grounded on the
//! teacher's `ServeConfig`/`serve()` pair, trimmed of the auth/rate-limit/MCP
//! layers this proxy has no use for (spec §1 Non-goals: inbound client auth
//! and request billing are out of scope).

mod error;
mod health;
mod logger;
mod middleware;
mod reqlog;
mod stats;

pub use error::ServerError;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use config::Config;
use llm::credential::GoogleCloudCredentialProvider;
use llm::dispatch::Dispatcher;
use llm::region::DiscoveryCache;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::middleware::{RequestLifecycle, request_lifecycle};
use crate::reqlog::RequestLog;
use crate::stats::Stats;

/// Configuration for serving the proxy (spec §3 process lifecycle).
pub struct ServeConfig {
    pub listen_address: SocketAddr,
    pub config: Config,
    pub shutdown_signal: CancellationToken,
    pub log_filter: String,
    pub version: String,
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Start and run the proxy until `shutdown_signal` is cancelled (spec §6
/// "graceful shutdown").
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    logger::init(&log_filter);
    log::info!("vertex-proxy {version}");

    config.validate().map_err(ServerError::Config)?;
    config
        .validate_against_catalog(llm::catalog::is_known)
        .map_err(ServerError::Config)?;

    let discovery = match &config.discovery_cache_path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(contents) => DiscoveryCache::from_toml_str(&contents),
            Err(e) => {
                log::warn!("could not read discovery cache {}: {e}", path.display());
                DiscoveryCache::empty()
            }
        },
        None => DiscoveryCache::empty(),
    };

    let credential = GoogleCloudCredentialProvider::new()
        .await
        .map_err(|e| ServerError::Credential(e.to_string()))?;

    let config = Arc::new(config);
    let dispatcher = Arc::new(Dispatcher::new(config.clone(), Arc::new(credential), discovery));

    let request_log = match &config.log_path {
        Some(path) => match RequestLog::open(path) {
            Ok(log) => Some(Arc::new(log)),
            Err(e) => {
                log::warn!("could not open request log {}: {e}", path.display());
                None
            }
        },
        None => None,
    };

    let stats_path = config.stats_path.clone().unwrap_or_else(|| "stats.json".into());
    let stats = Arc::new(Stats::new(stats_path, config.port));

    let lifecycle_state = RequestLifecycle { request_log, stats };

    let app_state = llm::AppState {
        dispatcher,
        config: config.clone(),
    };

    let app = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .merge(llm::router(app_state))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn_with_state(lifecycle_state.clone(), request_lifecycle));

    let listener = TcpListener::bind(listen_address).await.map_err(|source| ServerError::Bind {
        addr: listen_address,
        source,
    })?;

    let bound_addr = listener.local_addr().unwrap_or(listen_address);
    log::info!("listening on http://{bound_addr}");

    if let Some(sender) = bound_addr_sender {
        let _ = sender.send(bound_addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown_signal.cancelled().await })
        .await?;

    log::info!("shutdown complete");
    Ok(())
}
