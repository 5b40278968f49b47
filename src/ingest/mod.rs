//! Filesystem side of the pipeline: detect new combat logs, run the parser,
//! and move its reports into the archive.

mod archiver;
mod converter;
mod readiness;
mod watcher;

use std::time::Duration;

pub use archiver::Archiver;
pub use converter::Converter;
pub use watcher::{SubtreeWatcher, WatchEvent};

/// How often to probe a file and how long to keep trying per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            timeout: Duration::from_secs(60),
        }
    }
}
