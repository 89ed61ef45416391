use std::collections::HashMap;

use axum::extract::Multipart;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::ImageFormat;
use thiserror::Error;

use crate::compose::config::{
    coerce_flag, coerce_integer, coerce_number, ComposeConfig, Gradient, DEFAULT_BACKGROUND,
    DEFAULT_GLITCH, DEFAULT_GLITCH_SEED, DEFAULT_POSITION, DEFAULT_ROTATION, DEFAULT_SCALE,
    GLITCH_MAX, GLITCH_MIN, GLITCH_SEED_MAX, GLITCH_SEED_MIN, NO_MISC,
};
use crate::compose::workspace::Workspace;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

pub const CHARACTER_FIELD: &str = "characterPathBase64";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("malformed multipart payload: {message}")]
    MalformedPayload { message: String },
    #[error("field '{field}' is required")]
    MissingField { field: &'static str },
    #[error("field '{field}' is not valid base64 image data")]
    InvalidBase64 { field: &'static str },
    #[error("field '{field}' exceeds the {limit} byte payload ceiling")]
    PayloadTooLarge { field: &'static str, limit: usize },
    #[error("field '{field}' is not a PNG, JPEG or WebP image")]
    UnsupportedImageType { field: &'static str },
    #[error("field '{field}' must be a number between {min} and {max}")]
    NumberOutOfRange {
        field: &'static str,
        min: &'static str,
        max: &'static str,
    },
    #[error("field '{field}' must be one of the known gradient names")]
    UnknownGradient { field: &'static str },
}

/// Drains a multipart body into plain text fields. Binary parts are not
/// expected on these routes; the character image travels base64-encoded.
pub async fn collect_fields(
    multipart: &mut Multipart,
) -> Result<HashMap<String, String>, ValidationError> {
    let mut fields = HashMap::new();

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|error| ValidationError::MalformedPayload {
                message: error.to_string(),
            })?;
        let Some(field) = field else {
            break;
        };
        let Some(name) = field.name().map(String::from) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|error| ValidationError::MalformedPayload {
                message: error.to_string(),
            })?;
        fields.insert(name, value);
    }

    Ok(fields)
}

/// Decodes and vets the uploaded character image: base64 well-formedness
/// (tolerating a `data:image/...;base64,` prefix), the payload ceiling,
/// and content sniffing against the PNG/JPEG/WebP allow-list. Runs before
/// any temp file is written.
pub fn decode_character_image(raw: &str) -> Result<Vec<u8>, ValidationError> {
    let payload = raw
        .split_once(',')
        .map(|(_, rest)| rest)
        .unwrap_or(raw)
        .trim();

    let bytes = BASE64
        .decode(payload)
        .map_err(|_| ValidationError::InvalidBase64 {
            field: CHARACTER_FIELD,
        })?;

    if bytes.len() > MAX_FILE_SIZE {
        return Err(ValidationError::PayloadTooLarge {
            field: CHARACTER_FIELD,
            limit: MAX_FILE_SIZE,
        });
    }

    match image::guess_format(bytes.as_slice()) {
        Ok(ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP) => Ok(bytes),
        _ => Err(ValidationError::UnsupportedImageType {
            field: CHARACTER_FIELD,
        }),
    }
}

/// Lenient config assembly for the full-composition route: every numeric
/// field coerces to a finite number or its documented default, ranged
/// fields clamp to their documented range, and boolean-likes normalize.
pub fn build_generate_config(
    fields: &HashMap<String, String>,
    workspace: &Workspace,
) -> ComposeConfig {
    let raw = |name: &str| fields.get(name).map(String::as_str);

    let glitch =
        coerce_number(raw("characterGlitch"), DEFAULT_GLITCH).clamp(GLITCH_MIN, GLITCH_MAX);
    let glitch_seed = coerce_integer(raw("characterGlitchSeed"), DEFAULT_GLITCH_SEED)
        .clamp(GLITCH_SEED_MIN, GLITCH_SEED_MAX);
    let gradient = raw("characterGradient")
        .and_then(|value| value.parse::<Gradient>().ok())
        .unwrap_or_default();

    ComposeConfig {
        character_path: workspace.character_path.clone(),
        output_path: workspace.output_path.clone(),
        background: non_empty(raw("background"), DEFAULT_BACKGROUND),
        misc: non_empty(raw("misc"), NO_MISC),
        misc_pos_x: coerce_number(raw("miscPosX"), DEFAULT_POSITION),
        misc_pos_y: coerce_number(raw("miscPosY"), DEFAULT_POSITION),
        misc_scale: coerce_number(raw("miscScale"), DEFAULT_SCALE),
        misc_rotate: coerce_number(raw("miscRotate"), DEFAULT_ROTATION),
        character_x_pos: coerce_number(raw("characterXPos"), DEFAULT_POSITION),
        character_y_pos: coerce_number(raw("characterYPos"), DEFAULT_POSITION),
        character_scale: coerce_number(raw("characterScale"), DEFAULT_SCALE),
        character_rotate: coerce_number(raw("characterRotate"), DEFAULT_ROTATION),
        character_glitch: glitch,
        character_glitch_seed: glitch_seed,
        character_gradient: gradient,
        crt: coerce_flag(raw("crt")),
        character_only: false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewParams {
    pub glitch: f64,
    pub glitch_seed: i64,
    pub gradient: Gradient,
}

/// Strict parsing for the effects-preview route: range violations are
/// rejected with the offending field named instead of being defaulted.
pub fn parse_preview_params(
    fields: &HashMap<String, String>,
) -> Result<PreviewParams, ValidationError> {
    let glitch = match fields.get("characterGlitch").map(String::as_str) {
        None => DEFAULT_GLITCH,
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && (GLITCH_MIN..=GLITCH_MAX).contains(value))
            .ok_or(ValidationError::NumberOutOfRange {
                field: "characterGlitch",
                min: "0.1",
                max: "10",
            })?,
    };

    let glitch_seed = match fields.get("characterGlitchSeed").map(String::as_str) {
        None => DEFAULT_GLITCH_SEED,
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|value| (GLITCH_SEED_MIN..=GLITCH_SEED_MAX).contains(value))
            .ok_or(ValidationError::NumberOutOfRange {
                field: "characterGlitchSeed",
                min: "0",
                max: "100",
            })?,
    };

    let gradient = match fields.get("characterGradient").map(String::as_str) {
        None => Gradient::default(),
        Some(raw) => raw
            .parse::<Gradient>()
            .map_err(|_| ValidationError::UnknownGradient {
                field: "characterGradient",
            })?,
    };

    Ok(PreviewParams {
        glitch,
        glitch_seed,
        gradient,
    })
}

pub fn required_field<'a>(
    fields: &'a HashMap<String, String>,
    name: &'static str,
) -> Result<&'a str, ValidationError> {
    fields
        .get(name)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ValidationError::MissingField { field: name })
}

fn non_empty(raw: Option<&str>, default: &str) -> String {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .unwrap_or_else(|| String::from(default))
}
