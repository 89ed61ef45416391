use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;
use uuid::Uuid;

/// Isolated per-request working directory plus its canonical file paths.
/// Exclusively owned by the single in-flight request; the unique directory
/// is what keeps concurrent requests from racing on temp files even though
/// the compositor writes unpredictable filenames inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub id: String,
    pub dir: PathBuf,
    pub character_path: PathBuf,
    pub backup_path: PathBuf,
    pub output_path: PathBuf,
    pub created_at: SystemTime,
}

impl Workspace {
    pub fn character_file_name(&self) -> &str {
        file_name_str(self.character_path.as_path())
    }

    pub fn backup_file_name(&self) -> &str {
        file_name_str(self.backup_path.as_path())
    }

    pub fn output_file_name(&self) -> &str {
        file_name_str(self.output_path.as_path())
    }

    /// Recursively removes the directory. Best-effort and idempotent:
    /// failures are logged and swallowed, never surfaced to the request.
    pub fn release(&self) {
        match fs::remove_dir_all(self.dir.as_path()) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(
                    workspace = %self.dir.display(),
                    error = %error,
                    "failed to remove compose workspace"
                );
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFactory {
    temp_root: PathBuf,
}

impl WorkspaceFactory {
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
        }
    }

    pub fn temp_root(&self) -> &Path {
        self.temp_root.as_path()
    }

    /// Creates `temp_root/vw-<id>/` with canonical input, backup and output
    /// paths. The id is a fresh uuid-v4 token, so collisions under
    /// concurrency are negligible and directories are never reused.
    pub fn allocate(&self) -> io::Result<Workspace> {
        self.allocate_with_id(Uuid::new_v4().simple().to_string())
    }

    pub fn allocate_with_id(&self, id: impl Into<String>) -> io::Result<Workspace> {
        let id = id.into();
        let dir = self.temp_root.join(format!("vw-{id}"));
        fs::create_dir_all(dir.as_path())?;

        Ok(Workspace {
            character_path: dir.join(format!("char-{id}.png")),
            backup_path: dir.join(format!("char-{id}.backup.png")),
            output_path: dir.join(format!("output-{id}.png")),
            id,
            dir,
            created_at: SystemTime::now(),
        })
    }
}

fn file_name_str(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_factory(label: &str) -> WorkspaceFactory {
        WorkspaceFactory::new(
            std::env::temp_dir().join(format!("vaporwaver-workspace-tests-{label}")),
        )
    }

    #[test]
    fn allocate_creates_isolated_directories() {
        let factory = test_factory("isolation");
        let a = factory.allocate().expect("allocate should succeed");
        let b = factory.allocate().expect("allocate should succeed");

        assert!(a.dir.is_dir());
        assert!(b.dir.is_dir());
        assert_ne!(a.dir, b.dir);
        assert!(!a.dir.starts_with(b.dir.as_path()));
        assert!(!b.dir.starts_with(a.dir.as_path()));

        a.release();
        b.release();
        assert!(!a.dir.exists());
        assert!(!b.dir.exists());
    }

    #[test]
    fn canonical_paths_live_inside_the_workspace() {
        let factory = test_factory("paths");
        let workspace = factory
            .allocate_with_id("deadbeef")
            .expect("allocate should succeed");

        assert_eq!(workspace.character_file_name(), "char-deadbeef.png");
        assert_eq!(workspace.backup_file_name(), "char-deadbeef.backup.png");
        assert_eq!(workspace.output_file_name(), "output-deadbeef.png");
        assert!(workspace.character_path.starts_with(workspace.dir.as_path()));
        assert!(workspace.output_path.starts_with(workspace.dir.as_path()));

        workspace.release();
    }

    #[test]
    fn release_is_idempotent() {
        let factory = test_factory("release");
        let workspace = factory.allocate().expect("allocate should succeed");

        workspace.release();
        assert!(!workspace.dir.exists());
        // Second release must not panic or error.
        workspace.release();
    }
}
