use std::fs;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::compose::config::ComposeConfig;
use crate::compose::engine::SharedComposer;
use crate::compose::recovery::{locate_output, RecoveryError};
use crate::compose::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStage {
    Full,
    DefaultBackground,
    CharacterOnly,
}

impl ComposeStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DefaultBackground => "default_background",
            Self::CharacterOnly => "character_only",
        }
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("all composition stages exhausted, last failure: {last_error}")]
    StagesExhausted { last_error: String },
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Drives the external compositor through a strictly ordered fallback
/// ladder: full composition, then the same scene over the default
/// background, then a character-only rendering as the last line of defense.
/// Stages never run in parallel; they would race on the workspace files.
#[derive(Clone)]
pub struct ComposeOrchestrator {
    composer: SharedComposer,
    stage_timeout: Duration,
}

impl ComposeOrchestrator {
    pub fn new(composer: SharedComposer, stage_timeout: Duration) -> Self {
        Self {
            composer,
            stage_timeout,
        }
    }

    /// Runs the ladder and returns the composited PNG bytes. Fails only
    /// once every stage is exhausted or no output file can be located.
    pub async fn run(
        &self,
        config: &ComposeConfig,
        workspace: &Workspace,
    ) -> Result<Vec<u8>, ComposeError> {
        backup_input(workspace);

        let mut last_error = String::from("no composition stage was attempted");
        let mut succeeded = false;

        for (stage, stage_config) in ladder(config) {
            match self.attempt(stage, stage_config).await {
                Ok(()) => {
                    succeeded = true;
                    break;
                }
                Err(error) => {
                    warn!(stage = stage.as_str(), error = %error, "composition stage failed");
                    last_error = format!("{}: {error}", stage.as_str());
                    restore_input(workspace);
                }
            }
        }

        if !succeeded {
            return Err(ComposeError::StagesExhausted { last_error });
        }

        let output_path = locate_output(workspace)?;
        Ok(fs::read(output_path.as_path())?)
    }

    async fn attempt(&self, stage: ComposeStage, config: ComposeConfig) -> Result<(), StageError> {
        info!(stage = stage.as_str(), background = %config.background, "running composition stage");

        let composer = self.composer.clone();
        let join = tokio::time::timeout(
            self.stage_timeout,
            tokio::task::spawn_blocking(move || composer.compose(&config)),
        )
        .await;

        match join {
            Err(_) => Err(StageError::TimedOut {
                after: self.stage_timeout,
            }),
            Ok(Err(join_error)) => Err(StageError::Panicked {
                message: join_error.to_string(),
            }),
            Ok(Ok(Err(error))) => Err(StageError::Composer {
                message: error.to_string(),
            }),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }
}

/// A character-only config has nothing to degrade through: background
/// fallbacks would re-run the identical composition.
fn ladder(config: &ComposeConfig) -> Vec<(ComposeStage, ComposeConfig)> {
    if config.character_only {
        return vec![(ComposeStage::CharacterOnly, config.clone())];
    }
    vec![
        (ComposeStage::Full, config.clone()),
        (
            ComposeStage::DefaultBackground,
            config.with_default_background(),
        ),
        (ComposeStage::CharacterOnly, config.character_only_fallback()),
    ]
}

/// The compositor has been observed deleting or truncating its input on a
/// failed attempt; keep a copy so retries can re-read it.
fn backup_input(workspace: &Workspace) {
    if let Err(error) = fs::copy(
        workspace.character_path.as_path(),
        workspace.backup_path.as_path(),
    ) {
        warn!(
            workspace = %workspace.dir.display(),
            error = %error,
            "failed to back up character input"
        );
    }
}

fn restore_input(workspace: &Workspace) {
    let input_intact = fs::metadata(workspace.character_path.as_path())
        .map(|metadata| metadata.len() > 0)
        .unwrap_or(false);
    if input_intact || !workspace.backup_path.exists() {
        return;
    }

    match fs::copy(
        workspace.backup_path.as_path(),
        workspace.character_path.as_path(),
    ) {
        Ok(_) => info!(
            workspace = %workspace.dir.display(),
            "restored character input from backup before retry"
        ),
        Err(error) => warn!(
            workspace = %workspace.dir.display(),
            error = %error,
            "failed to restore character input from backup"
        ),
    }
}

#[derive(Debug, Error)]
enum StageError {
    #[error("timed out after {after:?}")]
    TimedOut { after: Duration },
    #[error("composer task panicked: {message}")]
    Panicked { message: String },
    #[error("{message}")]
    Composer { message: String },
}
