use std::time::Duration;

use tracing::debug;

use crate::compose::workspace::Workspace;

/// Deferred workspace teardown. The compositor may still be flushing files
/// when the handler finishes, so deletion happens on a detached task after
/// a short delay instead of synchronously in the hot path.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    delay: Duration,
}

impl CleanupScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Fire-and-forget: returns immediately, never blocks the response and
    /// never reports failure to the caller. Runs on every exit path of a
    /// compose request, success or not.
    pub fn schedule_release(&self, workspace: Workspace) {
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(workspace = %workspace.dir.display(), "releasing compose workspace");
            workspace.release();
        });
    }
}
