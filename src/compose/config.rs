use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Final canvas contract shared with the front-end preview.
pub const CANVAS_WIDTH: u32 = 460;
pub const CANVAS_HEIGHT: u32 = 595;

pub const DEFAULT_BACKGROUND: &str = "default";
pub const NO_MISC: &str = "none";

pub const DEFAULT_GLITCH: f64 = 0.1;
pub const GLITCH_MIN: f64 = 0.1;
pub const GLITCH_MAX: f64 = 10.0;
pub const DEFAULT_GLITCH_SEED: i64 = 0;
pub const GLITCH_SEED_MIN: i64 = 0;
pub const GLITCH_SEED_MAX: i64 = 100;
pub const DEFAULT_POSITION: f64 = 0.0;
pub const DEFAULT_SCALE: f64 = 100.0;
pub const DEFAULT_ROTATION: f64 = 0.0;

/// Closed set of gradient maps the compositor understands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gradient {
    #[default]
    None,
    Autumn,
    Bone,
    Jet,
    Winter,
    Rainbow,
    Ocean,
    Summer,
    Spring,
    Cool,
    Hsv,
    Pink,
    Hot,
    Parula,
    Magma,
    Inferno,
    Plasma,
    Viridis,
    Cividis,
    Deepgreen,
}

impl Gradient {
    pub const ALL: [Gradient; 20] = [
        Gradient::None,
        Gradient::Autumn,
        Gradient::Bone,
        Gradient::Jet,
        Gradient::Winter,
        Gradient::Rainbow,
        Gradient::Ocean,
        Gradient::Summer,
        Gradient::Spring,
        Gradient::Cool,
        Gradient::Hsv,
        Gradient::Pink,
        Gradient::Hot,
        Gradient::Parula,
        Gradient::Magma,
        Gradient::Inferno,
        Gradient::Plasma,
        Gradient::Viridis,
        Gradient::Cividis,
        Gradient::Deepgreen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Autumn => "autumn",
            Self::Bone => "bone",
            Self::Jet => "jet",
            Self::Winter => "winter",
            Self::Rainbow => "rainbow",
            Self::Ocean => "ocean",
            Self::Summer => "summer",
            Self::Spring => "spring",
            Self::Cool => "cool",
            Self::Hsv => "hsv",
            Self::Pink => "pink",
            Self::Hot => "hot",
            Self::Parula => "parula",
            Self::Magma => "magma",
            Self::Inferno => "inferno",
            Self::Plasma => "plasma",
            Self::Viridis => "viridis",
            Self::Cividis => "cividis",
            Self::Deepgreen => "deepgreen",
        }
    }
}

impl fmt::Display for Gradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGradient(pub String);

impl fmt::Display for UnknownGradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown gradient '{}'", self.0)
    }
}

impl std::error::Error for UnknownGradient {}

impl FromStr for Gradient {
    type Err = UnknownGradient;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|gradient| gradient.as_str() == needle)
            .ok_or_else(|| UnknownGradient(value.to_string()))
    }
}

/// Per-request configuration handed to the external compositor. Built once
/// from validated input and never persisted beyond the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeConfig {
    pub character_path: PathBuf,
    pub output_path: PathBuf,
    pub background: String,
    pub misc: String,
    pub misc_pos_x: f64,
    pub misc_pos_y: f64,
    pub misc_scale: f64,
    pub misc_rotate: f64,
    pub character_x_pos: f64,
    pub character_y_pos: f64,
    pub character_scale: f64,
    pub character_rotate: f64,
    pub character_glitch: f64,
    pub character_glitch_seed: i64,
    pub character_gradient: Gradient,
    pub crt: bool,
    pub character_only: bool,
}

impl ComposeConfig {
    /// Character-only baseline: background/overlay compositing is skipped
    /// and only the character's own effects apply.
    pub fn character_only(
        character_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        glitch: f64,
        glitch_seed: i64,
        gradient: Gradient,
    ) -> Self {
        Self {
            character_path: character_path.into(),
            output_path: output_path.into(),
            background: String::from(DEFAULT_BACKGROUND),
            misc: String::from(NO_MISC),
            misc_pos_x: DEFAULT_POSITION,
            misc_pos_y: DEFAULT_POSITION,
            misc_scale: DEFAULT_SCALE,
            misc_rotate: DEFAULT_ROTATION,
            character_x_pos: DEFAULT_POSITION,
            character_y_pos: DEFAULT_POSITION,
            character_scale: DEFAULT_SCALE,
            character_rotate: DEFAULT_ROTATION,
            character_glitch: glitch,
            character_glitch_seed: glitch_seed,
            character_gradient: gradient,
            crt: false,
            character_only: true,
        }
    }

    /// Same composition with the background forced back to the bundled
    /// default asset. A missing or corrupt named background is the most
    /// common recoverable failure.
    pub fn with_default_background(&self) -> Self {
        let mut config = self.clone();
        config.background = String::from(DEFAULT_BACKGROUND);
        config
    }

    /// Minimal last-resort composition: paths plus character-level effects.
    pub fn character_only_fallback(&self) -> Self {
        Self::character_only(
            self.character_path.clone(),
            self.output_path.clone(),
            self.character_glitch,
            self.character_glitch_seed,
            self.character_gradient,
        )
    }
}

/// Coerce a raw form value to a finite number, falling back to the field's
/// documented default. The compositor's argument types are strict, so NaN
/// and infinities must never travel downstream.
pub fn coerce_number(raw: Option<&str>, default: f64) -> f64 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => default,
    }
}

pub fn coerce_integer(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };
    raw.parse::<i64>().unwrap_or(default)
}

/// Normalize a boolean-like form value: only the literal "true"
/// (case-insensitive) switches the flag on.
pub fn coerce_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
