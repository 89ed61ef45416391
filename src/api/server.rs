use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::rate_limit::{
    rate_limit_middleware, spawn_purge_task, RateLimitConfig, RateLimiter,
};
use crate::compose::cleanup::CleanupScheduler;
use crate::compose::engine::{SharedComposer, VaporwaverScriptComposer};
use crate::compose::orchestrator::ComposeOrchestrator;
use crate::compose::workspace::WorkspaceFactory;
use crate::settings::BackendSettings;

/// Base64-encoded uploads inflate by ~4/3 over the 5 MiB decoded ceiling,
/// plus multipart framing.
const MULTIPART_BODY_LIMIT: usize = 12 * 1024 * 1024;

const PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct AppState {
    pub service_name: &'static str,
    pub service_version: &'static str,
    pub started_unix_ms: u128,
    pub assets_root: PathBuf,
    pub rate_limiter: Arc<RateLimiter>,
    pub workspaces: WorkspaceFactory,
    pub orchestrator: ComposeOrchestrator,
    pub cleanup: CleanupScheduler,
}

impl AppState {
    pub fn new(settings: &BackendSettings, composer: SharedComposer) -> Self {
        Self {
            service_name: "vaporwaver-backend-core",
            service_version: env!("CARGO_PKG_VERSION"),
            started_unix_ms: now_unix_ms(),
            assets_root: settings.assets_root.clone(),
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            workspaces: WorkspaceFactory::new(settings.temp_root.clone()),
            orchestrator: ComposeOrchestrator::new(composer, settings.stage_timeout),
            cleanup: CleanupScheduler::new(settings.cleanup_delay),
        }
    }
}

pub fn build_router(settings: &BackendSettings) -> Router {
    let composer: SharedComposer = Arc::new(VaporwaverScriptComposer::new(
        settings.python_bin.clone(),
        settings.script_path.clone(),
    ));
    build_router_with_composer(settings, composer)
}

/// Test seam: the compositor is injectable so the whole HTTP surface can
/// run against a fake.
pub fn build_router_with_composer(settings: &BackendSettings, composer: SharedComposer) -> Router {
    build_router_with_state(AppState::new(settings, composer))
}

pub fn build_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate", post(crate::api::generate::generate_handler))
        .route(
            "/api/preview-effects",
            post(crate::api::preview::preview_effects_handler),
        )
        .route("/api/assets", get(crate::api::assets::list_assets_handler))
        .layer(DefaultBodyLimit::max(MULTIPART_BODY_LIMIT))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(settings: BackendSettings) -> io::Result<()> {
    let addr: SocketAddr = settings
        .bind
        .parse()
        .map_err(|error| io::Error::other(format!("invalid bind address: {error}")))?;

    let composer: SharedComposer = Arc::new(VaporwaverScriptComposer::new(
        settings.python_bin.clone(),
        settings.script_path.clone(),
    ));
    let state = AppState::new(&settings, composer);
    spawn_purge_task(state.rate_limiter.clone(), PURGE_INTERVAL);
    let app = build_router_with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(bind = %addr, "starting vaporwaver-backend-core HTTP surface");
    axum::serve(listener, app).await
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "status": "ok",
            "service": state.service_name,
            "version": state.service_version,
            "started_unix_ms": state.started_unix_ms,
        })),
    )
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis())
}
