use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:8990";
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CLEANUP_DELAY_MS: u64 = 500;

/// Runtime settings for the backend. Defaults live in code, an optional
/// `config/backend.settings.toml` overlays them, and environment variables
/// win over both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSettings {
    pub bind: String,
    pub temp_root: PathBuf,
    pub assets_root: PathBuf,
    pub python_bin: String,
    pub script_path: PathBuf,
    pub stage_timeout: Duration,
    pub cleanup_delay: Duration,
}

impl BackendSettings {
    pub fn defaults(app_root: &Path) -> Self {
        Self {
            bind: String::from(DEFAULT_BIND),
            temp_root: app_root.join("tmp"),
            assets_root: app_root.join("public"),
            python_bin: String::from("python"),
            script_path: app_root.join("vaporwaver").join("vaporwaver.py"),
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_SECS),
            cleanup_delay: Duration::from_millis(DEFAULT_CLEANUP_DELAY_MS),
        }
    }

    pub fn load(app_root: &Path) -> Result<Self, SettingsError> {
        let mut settings = Self::defaults(app_root);

        let overlay_path = app_root.join("config/backend.settings.toml");
        if overlay_path.exists() {
            let overlay = load_overlay(overlay_path.as_path())?;
            settings.apply_overlay(app_root, &overlay);
        }

        settings.apply_env();
        Ok(settings)
    }

    fn apply_overlay(&mut self, app_root: &Path, overlay: &SettingsOverlay) {
        if let Some(bind) = trimmed(overlay.bind.as_deref()) {
            self.bind = bind;
        }
        if let Some(temp_root) = trimmed(overlay.temp_root.as_deref()) {
            self.temp_root = absolutize(app_root, temp_root.as_str());
        }
        if let Some(assets_root) = trimmed(overlay.assets_root.as_deref()) {
            self.assets_root = absolutize(app_root, assets_root.as_str());
        }
        if let Some(python_bin) = trimmed(overlay.python_bin.as_deref()) {
            self.python_bin = python_bin;
        }
        if let Some(script_path) = trimmed(overlay.script_path.as_deref()) {
            self.script_path = absolutize(app_root, script_path.as_str());
        }
        if let Some(secs) = overlay.stage_timeout_secs {
            self.stage_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = overlay.cleanup_delay_ms {
            self.cleanup_delay = Duration::from_millis(ms);
        }
    }

    fn apply_env(&mut self) {
        if let Some(bind) = env_string("VAPORWAVER_BACKEND_BIND") {
            self.bind = bind;
        }
        if let Some(temp_root) = env_string("VAPORWAVER_TMP_DIR") {
            self.temp_root = PathBuf::from(temp_root);
        }
        if let Some(assets_root) = env_string("VAPORWAVER_ASSETS_DIR") {
            self.assets_root = PathBuf::from(assets_root);
        }
        if let Some(python_bin) = env_string("VAPORWAVER_PYTHON_BIN") {
            self.python_bin = python_bin;
        }
        if let Some(script_path) = env_string("VAPORWAVER_SCRIPT") {
            self.script_path = PathBuf::from(script_path);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SettingsOverlay {
    bind: Option<String>,
    temp_root: Option<String>,
    assets_root: Option<String>,
    python_bin: Option<String>,
    script_path: Option<String>,
    stage_timeout_secs: Option<u64>,
    cleanup_delay_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read backend settings '{path}': {message}")]
    ReadFile { path: String, message: String },
    #[error("failed to parse backend settings TOML '{path}': {message}")]
    ParseToml { path: String, message: String },
}

fn load_overlay(path: &Path) -> Result<SettingsOverlay, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|error| SettingsError::ReadFile {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    toml::from_str(raw.as_str()).map_err(|error| SettingsError::ParseToml {
        path: path.display().to_string(),
        message: error.to_string(),
    })
}

pub fn default_app_root_from_manifest_dir() -> PathBuf {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.canonicalize().unwrap_or(root)
}

fn absolutize(app_root: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        app_root.join(path)
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_anchor_paths_under_app_root() {
        let settings = BackendSettings::defaults(Path::new("/srv/vaporwaver"));
        assert_eq!(settings.bind, DEFAULT_BIND);
        assert_eq!(settings.temp_root, PathBuf::from("/srv/vaporwaver/tmp"));
        assert_eq!(settings.assets_root, PathBuf::from("/srv/vaporwaver/public"));
        assert_eq!(settings.cleanup_delay, Duration::from_millis(500));
    }

    #[test]
    fn overlay_overrides_selected_fields_only() {
        let mut settings = BackendSettings::defaults(Path::new("/srv/vaporwaver"));
        let overlay = SettingsOverlay {
            bind: Some(String::from("0.0.0.0:9000")),
            temp_root: Some(String::from("scratch")),
            stage_timeout_secs: Some(5),
            ..SettingsOverlay::default()
        };
        settings.apply_overlay(Path::new("/srv/vaporwaver"), &overlay);

        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.temp_root, PathBuf::from("/srv/vaporwaver/scratch"));
        assert_eq!(settings.stage_timeout, Duration::from_secs(5));
        assert_eq!(settings.python_bin, "python");
    }

    #[test]
    fn overlay_ignores_blank_strings() {
        let mut settings = BackendSettings::defaults(Path::new("/srv/vaporwaver"));
        let overlay = SettingsOverlay {
            python_bin: Some(String::from("   ")),
            ..SettingsOverlay::default()
        };
        settings.apply_overlay(Path::new("/srv/vaporwaver"), &overlay);
        assert_eq!(settings.python_bin, "python");
    }

    #[test]
    fn absolute_overlay_paths_are_kept_verbatim() {
        let mut settings = BackendSettings::defaults(Path::new("/srv/vaporwaver"));
        let overlay = SettingsOverlay {
            script_path: Some(String::from("/opt/vaporwaver/vaporwaver.py")),
            ..SettingsOverlay::default()
        };
        settings.apply_overlay(Path::new("/srv/vaporwaver"), &overlay);
        assert_eq!(
            settings.script_path,
            PathBuf::from("/opt/vaporwaver/vaporwaver.py")
        );
    }
}
