use super::RunName;
use crate::report::ParsedReport;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Number of detail cards; the card cursor moves in `[0, CARD_COUNT - 1]`.
pub const CARD_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    BrowsingRuns,
    InspectingRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    List,
    Cards,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PendingAction {
    DeleteRun(RunName),
    /// Archived report of a log, with its display name for the prompt.
    DeleteLog { display_name: String, path: PathBuf },
    OpenUpdatePage(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub action: PendingAction,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub display_name: String,
    pub path: PathBuf,
    pub report: Arc<ParsedReport>,
}

impl LogEntry {
    pub fn html_path(&self) -> PathBuf {
        self.path.with_extension("html")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSession {
    pub name: RunName,
    pub dir: PathBuf,
    /// Keyed by display name, so iteration order is the list order.
    pub logs: BTreeMap<String, LogEntry>,
    /// Temp reports routed here whose archive result has not arrived yet.
    pub in_flight: BTreeSet<PathBuf>,
}

impl RunSession {
    pub fn new(name: RunName, archive_root: &Path) -> Self {
        let dir = archive_root.join(name.to_string());
        Self {
            name,
            dir,
            logs: BTreeMap::new(),
            in_flight: BTreeSet::new(),
        }
    }

    /// Logs counted against the per-run cap: archived plus still in flight.
    pub fn routed_count(&self) -> usize {
        self.logs.len() + self.in_flight.len()
    }

    pub fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
    }

    /// Insert or replace an entry and return its position in the list.
    pub fn insert(&mut self, entry: LogEntry) -> usize {
        let name = entry.display_name.clone();
        self.logs.insert(name.clone(), entry);
        self.index_of(&name).unwrap_or(0)
    }

    pub fn index_of(&self, display_name: &str) -> Option<usize> {
        self.logs.keys().position(|k| k == display_name)
    }

    pub fn entry_at(&self, index: usize) -> Option<&LogEntry> {
        self.logs.values().nth(index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub mode: ViewMode,
    pub run: Option<RunSession>,
    /// Archived runs, newest first.
    pub runs: Vec<RunName>,
    /// 0 is the sentinel row ("New Run" or "../").
    pub selected: usize,
    pub panel: Panel,
    pub card: usize,
    pub confirmation: Option<Confirmation>,
    pub status: String,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: ViewMode::BrowsingRuns,
            run: None,
            runs: Vec::new(),
            selected: 0,
            panel: Panel::List,
            card: 0,
            confirmation: None,
            status: "Select a run or wait for a new one.".into(),
            last_error: None,
        }
    }
}

impl SessionState {
    /// Number of rows below the sentinel in the current list.
    pub fn list_len(&self) -> usize {
        match self.mode {
            ViewMode::BrowsingRuns => self.runs.len(),
            ViewMode::InspectingRun => self.run.as_ref().map_or(0, |r| r.logs.len()),
        }
    }

    pub fn selected_run(&self) -> Option<&RunName> {
        match self.mode {
            ViewMode::BrowsingRuns if self.selected > 0 => self.runs.get(self.selected - 1),
            _ => None,
        }
    }

    pub fn selected_log(&self) -> Option<&LogEntry> {
        match (self.mode, self.run.as_ref()) {
            (ViewMode::InspectingRun, Some(run)) if self.selected > 0 => {
                run.entry_at(self.selected - 1)
            }
            _ => None,
        }
    }

    pub(crate) fn clamp_selection(&mut self) {
        let len = self.list_len();
        if self.selected > len {
            self.selected = len;
        }
    }
}
