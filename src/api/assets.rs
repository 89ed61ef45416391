use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::handler_utils::internal_error;
use crate::api::server::AppState;
use crate::assets::list_catalog;

/// GET /api/assets — backgrounds and overlays available to the UI.
pub async fn list_assets_handler(State(state): State<AppState>) -> Response {
    let assets_root = state.assets_root.clone();
    let result =
        tokio::task::spawn_blocking(move || list_catalog(assets_root.as_path())).await;

    match result {
        Ok(Ok(catalog)) => (StatusCode::OK, Json(catalog)).into_response(),
        Ok(Err(error)) => internal_error("Failed to read assets", error.to_string()),
        Err(join_error) => internal_error(
            "Failed to read assets",
            format!("asset listing task failed: {join_error}"),
        ),
    }
}
