use crate::error::PipelineError;
use crate::report::ParsedReport;
use crate::session::RunName;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Name of the archive folder inside the data directory.
pub const ARCHIVE_DIR: &str = "Log_Archive";
/// Scratch folder the parser writes into before archiving.
pub const TEMP_DIR: &str = "FightLogTemp";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub watch_root: PathBuf,
    pub data_dir: PathBuf,
    /// Extension of combat logs to pick up, without the dot.
    pub extension: String,
    pub parser_path: PathBuf,
    #[serde(default)]
    pub parser_launcher: Option<PathBuf>,
    pub parser_config: PathBuf,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub artifact_timeout: Duration,
    pub move_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub move_backoff: Duration,
    pub max_logs_per_run: usize,
    pub check_updates: bool,
}

impl WatchConfig {
    pub fn archive_root(&self) -> PathBuf {
        self.data_dir.join(ARCHIVE_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join(TEMP_DIR)
    }
}

/// Keyboard intents after key mapping; the session machine never sees raw keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    Up,
    Down,
    FocusList,
    FocusCards,
    Select,
    Delete,
    Confirm(bool),
}

/// Everything the session machine consumes, in arrival order.
#[derive(Debug)]
pub enum AppEvent {
    RunsEnumerated(Vec<RunName>),
    /// One report of an archived run finished loading.
    LogParsed {
        path: PathBuf,
        report: Arc<ParsedReport>,
    },
    /// Every report of `run_dir` has been offered through `LogParsed`.
    RunLoaded {
        run_dir: PathBuf,
    },
    /// A freshly converted report is waiting in the temp folder.
    FileReady {
        temp_path: PathBuf,
        report: Arc<ParsedReport>,
    },
    ArtifactArchived {
        source: PathBuf,
        archived: PathBuf,
        report: Arc<ParsedReport>,
    },
    ArchiveFailed {
        source: PathBuf,
        error: PipelineError,
    },
    UpdateAvailable {
        url: String,
    },
    Status(String),
    Failure(PipelineError),
    Input(UserInput),
}

/// Follow-up work requested by the session machine, executed off-thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    EnumerateRuns,
    CreateRunDir(PathBuf),
    LoadRun(PathBuf),
    Archive {
        source: PathBuf,
        run_dir: PathBuf,
        report: Arc<ParsedReport>,
    },
    DeleteRun(PathBuf),
    /// Remove a report and its HTML sibling.
    DeleteLog(PathBuf),
    /// Hand a file or URL to the platform opener.
    Open(String),
    Quit,
}
