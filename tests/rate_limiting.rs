use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use tower::ServiceExt;
use uuid::Uuid;

use vaporwaver_backend_core::api::server::build_router_with_composer;
use vaporwaver_backend_core::compose::config::ComposeConfig;
use vaporwaver_backend_core::compose::engine::{Composer, ComposerError};
use vaporwaver_backend_core::settings::BackendSettings;

const BOUNDARY: &str = "vaporwaver-ratelimit-boundary";

struct RefusingComposer;

impl Composer for RefusingComposer {
    fn compose(&self, _config: &ComposeConfig) -> Result<(), ComposerError> {
        Err(ComposerError::ScriptFailed {
            status_code: 1,
            stderr: String::from("should never be reached in these tests"),
        })
    }
}

#[tokio::test]
async fn twenty_first_generate_request_in_the_window_is_limited() {
    let app = test_app();

    // The empty-field requests fail validation with a 400, which still
    // consumes rate budget: admission happens before the handler runs.
    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(empty_generate_request("203.0.113.7"))
            .await
            .expect("router should return response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(empty_generate_request("203.0.113.7"))
        .await
        .expect("router should return response");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let parsed: serde_json::Value =
        serde_json::from_slice(body.as_ref()).expect("429 body should be JSON");
    assert_eq!(parsed["error"], "Rate limit exceeded");
}

#[tokio::test]
async fn budgets_are_tracked_per_client() {
    let app = test_app();

    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(empty_generate_request("198.51.100.1"))
            .await
            .expect("router should return response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // A different forwarded address still has a full budget.
    let response = app
        .oneshot(empty_generate_request("198.51.100.2"))
        .await
        .expect("router should return response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_forwarded_header_shares_the_unknown_bucket() {
    let app = test_app();

    for _ in 0..20 {
        let response = app
            .clone()
            .oneshot(anonymous_generate_request())
            .await
            .expect("router should return response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = app
        .oneshot(anonymous_generate_request())
        .await
        .expect("router should return response");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn asset_listing_has_a_larger_budget_than_generate() {
    let app = test_app();

    // 30 asset requests from one client sail through the 120/60s budget
    // even though the same count would exhaust /api/generate.
    for _ in 0..30 {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/assets")
            .header("x-forwarded-for", "192.0.2.9")
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should return response");
        assert_ne!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

fn test_app() -> axum::Router {
    let root = std::env::temp_dir().join(format!("vaporwaver_ratelimit_test_{}", Uuid::new_v4()));
    let mut settings = BackendSettings::defaults(root.as_path());
    settings.cleanup_delay = Duration::from_millis(25);
    build_router_with_composer(&settings, std::sync::Arc::new(RefusingComposer))
}

fn empty_generate_request(forwarded_for: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/generate")
        .header("x-forwarded-for", forwarded_for)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(format!("--{BOUNDARY}--\r\n")))
        .expect("request should build")
}

fn anonymous_generate_request() -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/generate")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(format!("--{BOUNDARY}--\r\n")))
        .expect("request should build")
}
