//! HTTP trigger endpoint.
//!
//! A single parameterless invocation runs all configured sources and
//! returns a plain-text summary. Per-source failures still complete with
//! 200; only a setup failure surfaces as an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::SourceConfig;
use crate::runner::Harvester;

struct AppState {
    harvester: Harvester,
    sources: BTreeMap<String, SourceConfig>,
}

/// Build the trigger router.
pub fn router(harvester: Harvester, sources: BTreeMap<String, SourceConfig>) -> Router {
    let state = Arc::new(AppState { harvester, sources });
    Router::new()
        .route("/run", post(trigger_run))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve the trigger endpoint until the process is stopped.
pub async fn serve(
    bind: &str,
    harvester: Harvester,
    sources: BTreeMap<String, SourceConfig>,
) -> anyhow::Result<()> {
    let app = router(harvester, sources);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn trigger_run(State(state): State<Arc<AppState>>) -> (StatusCode, String) {
    let summary = state.harvester.run(&state.sources).await;
    (StatusCode::OK, summary.report())
}

async fn healthz() -> &'static str {
    "ok"
}
