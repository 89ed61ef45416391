use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use tracing::error;

use crate::api::error::ErrorKind;
use crate::api::handler_utils::{error_response, internal_error, png_response};
use crate::api::server::AppState;
use crate::api::validation::{
    build_generate_config, collect_fields, decode_character_image, required_field,
    ValidationError, CHARACTER_FIELD,
};
use crate::compose::orchestrator::ComposeError;
use crate::compose::workspace::Workspace;

const GENERATE_FAILED: &str = "Failed to generate final preview";

/// POST /api/generate — full composition. Validation happens before any
/// temp file exists; once a workspace is allocated, cleanup is scheduled
/// on every exit path.
pub async fn generate_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let fields = match collect_fields(&mut multipart).await {
        Ok(fields) => fields,
        Err(error) => return validation_failure(&error),
    };

    let encoded = match required_field(&fields, CHARACTER_FIELD) {
        Ok(encoded) => encoded,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorKind::Validation,
                "No character image data provided",
                None,
            )
        }
    };
    let image = match decode_character_image(encoded) {
        Ok(image) => image,
        Err(error) => return validation_failure(&error),
    };

    let workspace = match state.workspaces.allocate() {
        Ok(workspace) => workspace,
        Err(error) => {
            return internal_error(GENERATE_FAILED, format!("workspace allocation failed: {error}"))
        }
    };

    let outcome = compose_in_workspace(&state, &fields, image, &workspace).await;
    state.cleanup.schedule_release(workspace);

    match outcome {
        Ok(bytes) => png_response(bytes),
        Err(response) => response,
    }
}

async fn compose_in_workspace(
    state: &AppState,
    fields: &HashMap<String, String>,
    image: Vec<u8>,
    workspace: &Workspace,
) -> Result<Vec<u8>, Response> {
    tokio::fs::write(workspace.character_path.as_path(), image)
        .await
        .map_err(|error| {
            internal_error(GENERATE_FAILED, format!("failed to write character file: {error}"))
        })?;

    let config = build_generate_config(fields, workspace);
    state
        .orchestrator
        .run(&config, workspace)
        .await
        .map_err(|error| composition_failure(GENERATE_FAILED, &error))
}

pub(super) fn validation_failure(error: &ValidationError) -> Response {
    let status = match error {
        ValidationError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, ErrorKind::Validation, error.to_string(), None)
}

pub(super) fn composition_failure(message: &'static str, error: &ComposeError) -> Response {
    error!(error = %error, "composition pipeline exhausted");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Composition,
        message,
        Some(error.to_string()),
    )
}
