use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::{self, AppState, AssetService};
use crate::assistant::AssistantProxy;
use crate::config::{CareMapConfig, ServerConfig};
use crate::directory::ClinicDirectory;
use crate::offline::{OfflineCache, StaticOrigin};

/// Build the shared state from configuration. A missing clinic file or an
/// unusable cache directory degrades instead of failing startup.
pub fn build_state(config: &CareMapConfig) -> anyhow::Result<AppState> {
    let directory = ClinicDirectory::load(&config.server.data_path);
    let assistant = AssistantProxy::new(&config.assistant)
        .context("Failed to create assistant proxy")?
        .with_deadline(config.server.assistant_budget());

    // Local files only: remote precache entries are served from the cache.
    let origin = StaticOrigin::new(&config.server.static_dir)
        .context("Failed to create static asset origin")?;
    let cache = match OfflineCache::open(&config.offline.location, &config.offline.cache_name) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Offline cache unavailable, serving assets uncached: {}", e);
            None
        }
    };

    Ok(AppState {
        directory,
        assistant: Arc::new(assistant),
        assets: Arc::new(AssetService::new(cache, Arc::new(origin))),
    })
}

/// Router with the cross-cutting layers applied
pub fn app(state: AppState, server: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api::router(state)
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_seconds.into(),
        )))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: &CareMapConfig) -> anyhow::Result<()> {
    let state = build_state(config)?;
    let app = app(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        "Assistant proxy {}",
        if config.assistant_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!("Server running at http://localhost:{}", config.server.port);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
