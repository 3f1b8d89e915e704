//! Step snapshots kept for diagnosing failed runs
//!
//! Snapshots are write-once evidence. Nothing in the harness reads them
//! back, and a failed capture never changes a scenario's outcome.

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Anything that can render its current view to an image file.
#[async_trait]
pub trait SnapshotSource: Sync {
    async fn save_snapshot(&self, path: &Path) -> E2eResult<()>;
}

/// Writes `{timestamp}_{label}.png` files into a run-scoped directory.
pub struct ArtifactRecorder {
    dir: PathBuf,
}

impl ArtifactRecorder {
    /// Purge and recreate `dir` for a new run.
    ///
    /// Problems are logged; the recorder is returned either way and later
    /// captures will simply fail (and be logged) if the directory is unusable.
    pub fn prepare(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!("Could not purge artifact directory {}: {}", dir.display(), e);
            }
        }
        match std::fs::create_dir_all(&dir) {
            Ok(()) => info!("Artifact directory '{}' prepared", dir.display()),
            Err(e) => warn!("Could not create artifact directory {}: {}", dir.display(), e),
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a capture taken at `at` under `label` is written to.
    pub fn path_for(&self, at: DateTime<Local>, label: &str) -> PathBuf {
        self.dir.join(artifact_file_name(at, label))
    }

    /// Capture the source's current view. Never fails the caller.
    pub async fn capture<S: SnapshotSource + ?Sized>(&self, source: &S, label: &str) -> Option<PathBuf> {
        let path = self.path_for(Local::now(), label);
        match self.try_capture(source, &path).await {
            Ok(()) => {
                info!("Snapshot saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Snapshot '{}' not saved: {}", label, e);
                None
            }
        }
    }

    async fn try_capture<S: SnapshotSource + ?Sized>(&self, source: &S, path: &Path) -> E2eResult<()> {
        source
            .save_snapshot(path)
            .await
            .map_err(|e| E2eError::Artifact(format!("{}: {}", path.display(), e)))
    }
}

/// `{YYYYmmdd-HHMMSS}_{label}.png`, with path-hostile label characters replaced.
pub fn artifact_file_name(at: DateTime<Local>, label: &str) -> String {
    let label: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.png", at.format("%Y%m%d-%H%M%S"), label)
}
