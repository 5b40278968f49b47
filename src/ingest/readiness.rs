//! Polling helpers for files that another process is still writing.
//!
//! There is no portable "writer closed" notification, so readiness is
//! approximated by retrying an open until it succeeds.

use super::WaitPolicy;
use crate::error::{PipelineError, WaitPhase};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Retry opening `path` for reading until it succeeds, then return its
/// absolute path. Never gives up; the caller decides whether to cancel.
pub async fn poll_until_readable(path: &Path, every: std::time::Duration) -> PathBuf {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match File::open(path).await {
            Ok(file) => {
                drop(file);
                break;
            }
            Err(e) => tracing::trace!(path = %path.display(), error = %e, "not readable yet"),
        }
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Wait for `path` to appear, then for it to be openable for writing.
///
/// Each phase has its own budget of `policy.timeout`.
pub async fn wait_for_file(path: &Path, policy: WaitPolicy) -> Result<PathBuf, PipelineError> {
    wait_phase(path, policy, WaitPhase::Exist).await?;
    wait_phase(path, policy, WaitPhase::Unlock).await?;
    Ok(path.to_path_buf())
}

async fn wait_phase(path: &Path, policy: WaitPolicy, phase: WaitPhase) -> Result<(), PipelineError> {
    let probe = async {
        let mut ticker = interval(policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let ready = match phase {
                WaitPhase::Exist => tokio::fs::try_exists(path).await.unwrap_or(false),
                WaitPhase::Unlock => OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .await
                    .is_ok(),
            };
            if ready {
                return;
            }
        }
    };

    timeout(policy.timeout, probe)
        .await
        .map_err(|_| PipelineError::ArtifactTimeout {
            path: path.to_path_buf(),
            phase,
        })
}
