use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;
use tracing::{info, warn};

use crate::compose::workspace::Workspace;

const OUTPUT_MARKER: &str = "output";

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("no valid output produced in '{workspace}'")]
    NoOutputProduced { workspace: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The compositor's success return does not guarantee the PNG landed at the
/// expected path; it has been observed writing to an unpredictable filename
/// inside the working directory. When the expected file is absent, scan the
/// workspace, drop the input and its backup, and rank what remains: names
/// carrying the output marker win, most recent mtime breaks ties. The
/// winner is copied onto the expected path so downstream code only ever
/// reads one location.
///
/// Safe only because each request owns its directory exclusively; under a
/// shared directory the mtime heuristic would race with other writers.
pub fn locate_output(workspace: &Workspace) -> Result<PathBuf, RecoveryError> {
    if workspace.output_path.exists() {
        return Ok(workspace.output_path.clone());
    }

    warn!(
        workspace = %workspace.dir.display(),
        expected = workspace.output_file_name(),
        "expected output missing, scanning workspace for candidates"
    );

    let Some(candidate) = best_candidate(workspace)? else {
        return Err(RecoveryError::NoOutputProduced {
            workspace: workspace.dir.display().to_string(),
        });
    };

    info!(
        workspace = %workspace.dir.display(),
        candidate = %candidate.display(),
        "recovered misplaced compositor output"
    );
    fs::copy(candidate.as_path(), workspace.output_path.as_path())?;
    Ok(workspace.output_path.clone())
}

struct Candidate {
    path: PathBuf,
    has_marker: bool,
    modified: SystemTime,
}

fn best_candidate(workspace: &Workspace) -> Result<Option<PathBuf>, RecoveryError> {
    let mut candidates = Vec::new();

    for entry in fs::read_dir(workspace.dir.as_path())? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if name == workspace.character_file_name() || name == workspace.backup_file_name() {
            continue;
        }
        if !name.to_ascii_lowercase().ends_with(".png") {
            continue;
        }

        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        candidates.push(Candidate {
            path: entry.path(),
            has_marker: name.to_ascii_lowercase().contains(OUTPUT_MARKER),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    candidates.sort_by(|a, b| {
        b.has_marker
            .cmp(&a.has_marker)
            .then_with(|| b.modified.cmp(&a.modified))
    });

    Ok(candidates.into_iter().next().map(|candidate| candidate.path))
}
