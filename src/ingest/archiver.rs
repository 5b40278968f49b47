//! Verified copy-then-delete of parser output into a run folder.

use super::readiness::wait_for_file;
use super::WaitPolicy;
use crate::error::PipelineError;
use crate::model::WatchConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archived {
    pub primary: PathBuf,
    pub secondary: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Archiver {
    attempts: u32,
    backoff: Duration,
    wait: WaitPolicy,
}

impl Archiver {
    pub fn new(attempts: u32, backoff: Duration, wait: WaitPolicy) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
            wait,
        }
    }

    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self::new(
            cfg.move_attempts,
            cfg.move_backoff,
            WaitPolicy {
                interval: cfg.poll_interval,
                timeout: cfg.artifact_timeout,
            },
        )
    }

    /// Move `primary` and, best effort, its `.html` sibling into `dest_dir`.
    pub async fn archive(&self, primary: &Path, dest_dir: &Path) -> Result<Archived, PipelineError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| PipelineError::DestinationUnwritable {
                path: dest_dir.to_path_buf(),
                source,
            })?;

        let primary_dest = dest_for(primary, dest_dir)?;
        self.move_verified(primary, &primary_dest).await?;
        tracing::info!(dest = %primary_dest.display(), "archived report");

        let html = primary.with_extension("html");
        let secondary = match self.archive_secondary(&html, dest_dir).await {
            Ok(dest) => Some(dest),
            Err(e) => {
                tracing::warn!(path = %html.display(), error = %e, "html report not archived");
                None
            }
        };

        Ok(Archived {
            primary: primary_dest,
            secondary,
        })
    }

    async fn archive_secondary(&self, html: &Path, dest_dir: &Path) -> Result<PathBuf, PipelineError> {
        wait_for_file(html, self.wait).await?;
        let dest = dest_for(html, dest_dir)?;
        self.move_verified(html, &dest).await?;
        Ok(dest)
    }

    /// Copy, compare sizes, then delete the source. Retries with a fixed
    /// backoff; on exhaustion the source is left as it was.
    pub async fn move_verified(&self, src: &Path, dest: &Path) -> Result<(), PipelineError> {
        let mut reason = String::new();
        for attempt in 1..=self.attempts {
            match try_move(src, dest).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        src = %src.display(),
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "move attempt failed"
                    );
                    reason = e;
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff).await;
            }
        }
        Err(PipelineError::MoveFailed {
            path: src.to_path_buf(),
            attempts: self.attempts,
            reason,
        })
    }
}

fn dest_for(src: &Path, dest_dir: &Path) -> Result<PathBuf, PipelineError> {
    match src.file_name() {
        Some(name) => Ok(dest_dir.join(name)),
        None => Err(PipelineError::MoveFailed {
            path: src.to_path_buf(),
            attempts: 0,
            reason: "path has no file name".into(),
        }),
    }
}

async fn try_move(src: &Path, dest: &Path) -> Result<(), String> {
    let copied = tokio::fs::copy(src, dest)
        .await
        .map_err(|e| format!("copy: {e}"))?;
    let expected = tokio::fs::metadata(src)
        .await
        .map_err(|e| format!("stat source: {e}"))?
        .len();
    let written = tokio::fs::metadata(dest)
        .await
        .map(|m| m.len())
        .unwrap_or(copied);

    if written != expected {
        let _ = tokio::fs::remove_file(dest).await;
        return Err(format!("size mismatch: {written} of {expected} bytes"));
    }

    if let Err(e) = tokio::fs::remove_file(src).await {
        let _ = tokio::fs::remove_file(dest).await;
        return Err(format!("remove source: {e}"));
    }
    Ok(())
}
