use std::fs;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use vaporwaver_backend_core::api::server::build_router_with_composer;
use vaporwaver_backend_core::compose::config::ComposeConfig;
use vaporwaver_backend_core::compose::engine::{Composer, ComposerError};
use vaporwaver_backend_core::settings::BackendSettings;

struct NoopComposer;

impl Composer for NoopComposer {
    fn compose(&self, _config: &ComposeConfig) -> Result<(), ComposerError> {
        Ok(())
    }
}

#[tokio::test]
async fn assets_endpoint_lists_backgrounds_and_miscs() {
    let settings = seeded_settings();
    let app = build_router_with_composer(&settings, Arc::new(NoopComposer));

    let (status, body) = get_assets(app).await;
    assert_eq!(status, StatusCode::OK);

    let backgrounds = body["backgrounds"].as_array().expect("backgrounds array");
    assert_eq!(backgrounds.len(), 2);
    assert_eq!(backgrounds[0]["id"], "default");
    assert_eq!(backgrounds[1]["id"], "neon-city");
    assert_eq!(backgrounds[1]["name"], "Neon City");
    assert_eq!(backgrounds[1]["thumbnail"], "/backgrounds/neon-city.png");

    let miscs = body["miscs"].as_array().expect("miscs array");
    assert_eq!(miscs.len(), 1);
    assert_eq!(miscs[0]["id"], "dolphin");
    assert_eq!(miscs[0]["thumbnail"], "/miscs/dolphin.png");
}

#[tokio::test]
async fn missing_asset_root_is_a_500() {
    let root = std::env::temp_dir().join(format!("vaporwaver_assets_test_{}", Uuid::new_v4()));
    let settings = BackendSettings::defaults(root.as_path());
    let app = build_router_with_composer(&settings, Arc::new(NoopComposer));

    let (status, body) = get_assets(app).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to read assets");
}

#[tokio::test]
async fn health_endpoint_reports_service_identity() {
    let settings = seeded_settings();
    let app = build_router_with_composer(&settings, Arc::new(NoopComposer));

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())
        .expect("request should build");
    let response = app
        .oneshot(request)
        .await
        .expect("router should return response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let parsed: Value = serde_json::from_slice(body.as_ref()).expect("health body should be JSON");
    assert_eq!(parsed["ok"], true);
    assert_eq!(parsed["service"], "vaporwaver-backend-core");
}

fn seeded_settings() -> BackendSettings {
    let root = std::env::temp_dir().join(format!("vaporwaver_assets_test_{}", Uuid::new_v4()));
    let settings = BackendSettings::defaults(root.as_path());

    fs::create_dir_all(settings.assets_root.join("backgrounds")).expect("mkdir");
    fs::create_dir_all(settings.assets_root.join("miscs")).expect("mkdir");
    fs::write(settings.assets_root.join("backgrounds/default.png"), b"png").expect("write");
    fs::write(settings.assets_root.join("backgrounds/neon-city.png"), b"png").expect("write");
    fs::write(settings.assets_root.join("miscs/dolphin.png"), b"png").expect("write");

    settings
}

async fn get_assets(app: axum::Router) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/assets")
        .body(Body::empty())
        .expect("request should build");

    let response = app
        .oneshot(request)
        .await
        .expect("router should return response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let parsed = serde_json::from_slice(body.as_ref()).expect("response should be valid JSON");
    (status, parsed)
}
