use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::compose::config::ComposeConfig;

/// Narrow seam around the external compositor: it either returns having
/// written a PNG somewhere in the working directory, or it fails. It makes
/// no promise that the file lands at `config.output_path`.
pub trait Composer: Send + Sync + 'static {
    fn compose(&self, config: &ComposeConfig) -> Result<(), ComposerError>;
}

pub type SharedComposer = Arc<dyn Composer>;

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("compositor script not found at '{path}'")]
    ScriptMissing { path: String },
    #[error("compositor exited with status {status_code}: {stderr}")]
    ScriptFailed { status_code: i32, stderr: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Production composer: shells out to the vaporwaver Python script. The
/// workspace directory travels via VAPORWAVER_TMP so the script keeps its
/// scratch files inside the request's own directory.
#[derive(Debug, Clone)]
pub struct VaporwaverScriptComposer {
    python_bin: String,
    script_path: PathBuf,
}

impl VaporwaverScriptComposer {
    pub fn new(python_bin: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            python_bin: python_bin.into(),
            script_path: script_path.into(),
        }
    }
}

impl Composer for VaporwaverScriptComposer {
    fn compose(&self, config: &ComposeConfig) -> Result<(), ComposerError> {
        if !self.script_path.exists() {
            return Err(ComposerError::ScriptMissing {
                path: self.script_path.display().to_string(),
            });
        }

        let args = build_script_args(self.script_path.as_path(), config);
        debug!(script = %self.script_path.display(), ?args, "invoking compositor");

        let workspace_dir = config
            .character_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let script_dir = self
            .script_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let output = Command::new(self.python_bin.as_str())
            .args(args.iter().map(String::as_str))
            .env("VAPORWAVER_TMP", workspace_dir.as_os_str())
            .env("PYTHONPATH", script_dir.as_os_str())
            .output()?;

        if !output.status.success() {
            return Err(ComposerError::ScriptFailed {
                status_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(output.stderr.as_slice())
                    .trim()
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Flag layout mirrors the vaporwaver CLI: `--character-only` drops every
/// scene argument, otherwise the full background/overlay transform set is
/// passed through.
pub fn build_script_args(script_path: &Path, config: &ComposeConfig) -> Vec<String> {
    let mut args = vec![script_path.display().to_string()];

    if config.character_only {
        args.push(String::from("--character-only"));
    }

    args.push(format!("-c={}", config.character_path.display()));
    args.push(format!("-o={}", config.output_path.display()));
    args.push(format!("-cg={}", config.character_glitch));
    args.push(format!("-cgs={}", config.character_glitch_seed));
    args.push(format!("-cgd={}", config.character_gradient));

    if !config.character_only {
        args.push(format!("-b={}", config.background));
        args.push(format!("-m={}", config.misc));
        args.push(format!("-cx={}", config.character_x_pos));
        args.push(format!("-cy={}", config.character_y_pos));
        args.push(format!("-cs={}", config.character_scale));
        args.push(format!("-cr={}", config.character_rotate));
        args.push(format!("-mx={}", config.misc_pos_x));
        args.push(format!("-my={}", config.misc_pos_y));
        args.push(format!("-ms={}", config.misc_scale));
        args.push(format!("-mr={}", config.misc_rotate));
        if config.crt {
            args.push(String::from("--crt"));
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::Gradient;

    fn full_config() -> ComposeConfig {
        let mut config =
            ComposeConfig::character_only("/tmp/char.png", "/tmp/out.png", 0.5, 7, Gradient::Jet);
        config.character_only = false;
        config.background = String::from("nebula");
        config.misc = String::from("lain");
        config.crt = true;
        config
    }

    #[test]
    fn character_only_args_skip_scene_flags() {
        let config =
            ComposeConfig::character_only("/tmp/char.png", "/tmp/out.png", 0.1, 0, Gradient::None);
        let args = build_script_args(Path::new("/opt/vaporwaver.py"), &config);

        assert_eq!(args[0], "/opt/vaporwaver.py");
        assert!(args.contains(&String::from("--character-only")));
        assert!(args.contains(&String::from("-cgd=none")));
        assert!(!args.iter().any(|arg| arg.starts_with("-b=")));
        assert!(!args.iter().any(|arg| arg.starts_with("-m=")));
        assert!(!args.contains(&String::from("--crt")));
    }

    #[test]
    fn full_args_carry_scene_and_crt_flags() {
        let args = build_script_args(Path::new("/opt/vaporwaver.py"), &full_config());

        assert!(!args.contains(&String::from("--character-only")));
        assert!(args.contains(&String::from("-b=nebula")));
        assert!(args.contains(&String::from("-m=lain")));
        assert!(args.contains(&String::from("-cs=100")));
        assert!(args.contains(&String::from("--crt")));
    }

    #[test]
    fn missing_script_is_reported_before_spawning() {
        let composer =
            VaporwaverScriptComposer::new("python", "/definitely/not/there/vaporwaver.py");
        let err = composer
            .compose(&full_config())
            .expect_err("missing script should fail");
        assert!(matches!(err, ComposerError::ScriptMissing { .. }));
    }
}
