//! Failure taxonomy shared by the ingest pipeline and the orchestrator.
//!
//! Every variant is eventually turned into an `AppEvent::Failure` and shown in
//! the status bar; none of them stops the session machine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Which half of the wait-for-file protocol gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    Exist,
    Unlock,
}

impl std::fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitPhase::Exist => f.write_str("exist"),
            WaitPhase::Unlock => f.write_str("unlock"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The initial walk of the watch folder failed; the watcher cannot run.
    #[error("could not enumerate {}: {source}", path.display())]
    StartupFatal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("watcher error: {0}")]
    SoftWatch(String),

    #[error("Elite Insights could not start: {detail}")]
    ExternalToolMissing { detail: String },

    #[error("Elite Insights failed ({status}): {output}")]
    ExternalToolFailed { status: String, output: String },

    #[error("timed out waiting for {} to {phase}", path.display())]
    ArtifactTimeout { path: PathBuf, phase: WaitPhase },

    #[error("could not create run directory {}: {source}", path.display())]
    DestinationUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {} after {attempts} attempts: {reason}", path.display())]
    MoveFailed {
        path: PathBuf,
        attempts: u32,
        reason: String,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    ParseFailure { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<notify::Error> for PipelineError {
    fn from(e: notify::Error) -> Self {
        PipelineError::SoftWatch(e.to_string())
    }
}
