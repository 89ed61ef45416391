use axum::extract::{Multipart, State};
use axum::response::Response;

use crate::api::generate::{composition_failure, validation_failure};
use crate::api::handler_utils::{internal_error, png_response};
use crate::api::server::AppState;
use crate::api::validation::{
    collect_fields, decode_character_image, parse_preview_params, required_field, PreviewParams,
    CHARACTER_FIELD,
};
use crate::compose::config::ComposeConfig;
use crate::compose::workspace::Workspace;

const PREVIEW_FAILED: &str = "Failed to apply effects";

/// POST /api/preview-effects — fast character-only preview of the
/// glitch/gradient effects. Same machinery as the full route, restricted
/// to a single character-only stage, with strict field validation.
pub async fn preview_effects_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let fields = match collect_fields(&mut multipart).await {
        Ok(fields) => fields,
        Err(error) => return validation_failure(&error),
    };

    let encoded = match required_field(&fields, CHARACTER_FIELD) {
        Ok(encoded) => encoded,
        Err(error) => return validation_failure(&error),
    };
    let image = match decode_character_image(encoded) {
        Ok(image) => image,
        Err(error) => return validation_failure(&error),
    };
    let params = match parse_preview_params(&fields) {
        Ok(params) => params,
        Err(error) => return validation_failure(&error),
    };

    let workspace = match state.workspaces.allocate() {
        Ok(workspace) => workspace,
        Err(error) => {
            return internal_error(PREVIEW_FAILED, format!("workspace allocation failed: {error}"))
        }
    };

    let outcome = apply_effects(&state, &params, image, &workspace).await;
    state.cleanup.schedule_release(workspace);

    match outcome {
        Ok(bytes) => png_response(bytes),
        Err(response) => response,
    }
}

async fn apply_effects(
    state: &AppState,
    params: &PreviewParams,
    image: Vec<u8>,
    workspace: &Workspace,
) -> Result<Vec<u8>, Response> {
    tokio::fs::write(workspace.character_path.as_path(), image)
        .await
        .map_err(|error| {
            internal_error(PREVIEW_FAILED, format!("failed to write character file: {error}"))
        })?;

    let config = ComposeConfig::character_only(
        workspace.character_path.clone(),
        workspace.output_path.clone(),
        params.glitch,
        params.glitch_seed,
        params.gradient,
    );
    state
        .orchestrator
        .run(&config, workspace)
        .await
        .map_err(|error| composition_failure(PREVIEW_FAILED, &error))
}
