//! The single writer of [`SessionState`].
//!
//! Every producer (watcher pipeline, command executor, update check, keyboard)
//! talks to the session through [`AppEvent`]s; [`SessionMachine::handle`]
//! applies one event synchronously and returns the follow-up [`Command`]s.
//! Nothing in here touches the filesystem or blocks.

use super::run_name::local_now;
use super::state::{
    Confirmation, LogEntry, Panel, PendingAction, RunSession, SessionState, ViewMode, CARD_COUNT,
};
use super::RunName;
use crate::error::PipelineError;
use crate::model::{AppEvent, Command, UserInput};
use crate::report::{display_name, ParsedReport, UNKNOWN_COMMANDER};
use std::path::PathBuf;
use std::sync::Arc;
use time::PrimitiveDateTime;

/// Once the open run holds this many logs, the next arrival starts a new run.
pub const MAX_LOGS_PER_RUN: usize = 30;

type Clock = Box<dyn FnMut() -> PrimitiveDateTime + Send>;

pub struct SessionMachine {
    state: SessionState,
    archive_root: PathBuf,
    max_logs_per_run: usize,
    clock: Clock,
}

impl SessionMachine {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            state: SessionState::default(),
            archive_root: archive_root.into(),
            max_logs_per_run: MAX_LOGS_PER_RUN,
            clock: Box::new(local_now),
        }
    }

    pub fn with_max_logs_per_run(mut self, max: usize) -> Self {
        self.max_logs_per_run = max.max(1);
        self
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: impl FnMut() -> PrimitiveDateTime + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handle(&mut self, event: AppEvent) -> Vec<Command> {
        match event {
            AppEvent::Input(input) => self.on_input(input),
            AppEvent::RunsEnumerated(runs) => {
                self.set_runs(runs);
                Vec::new()
            }
            AppEvent::LogParsed { path, report } => {
                self.on_log_parsed(path, report);
                Vec::new()
            }
            AppEvent::RunLoaded { run_dir } => {
                self.on_run_loaded(run_dir);
                Vec::new()
            }
            AppEvent::FileReady { temp_path, report } => self.route_file(temp_path, report),
            AppEvent::ArtifactArchived {
                source,
                archived,
                report,
            } => {
                self.on_archived(source, archived, report);
                Vec::new()
            }
            AppEvent::ArchiveFailed { source, error } => {
                if let Some(run) = self.state.run.as_mut() {
                    run.in_flight.remove(&source);
                }
                self.set_error(error);
                Vec::new()
            }
            AppEvent::UpdateAvailable { url } => {
                self.on_update_available(url);
                Vec::new()
            }
            AppEvent::Status(message) => {
                self.set_status(message);
                Vec::new()
            }
            AppEvent::Failure(error) => {
                self.set_error(error);
                Vec::new()
            }
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.state.status = message.into();
        self.state.last_error = None;
    }

    fn set_error(&mut self, error: PipelineError) {
        tracing::warn!(error = %error, "pipeline failure");
        self.state.last_error = Some(error.to_string());
    }

    fn set_runs(&mut self, mut runs: Vec<RunName>) {
        runs.sort_by(|a, b| {
            b.started()
                .cmp(&a.started())
                .then_with(|| b.commander().cmp(a.commander()))
        });
        runs.dedup();
        let count = runs.len();
        self.state.runs = runs;
        if self.state.mode == ViewMode::BrowsingRuns {
            self.state.clamp_selection();
        }
        self.set_status(format!("Found {count} archived runs."));
    }

    fn on_input(&mut self, input: UserInput) -> Vec<Command> {
        if self.state.confirmation.is_some() {
            return match input {
                UserInput::Confirm(yes) => self.resolve_confirmation(yes),
                _ => Vec::new(),
            };
        }

        match input {
            UserInput::Up => {
                match self.state.panel {
                    Panel::List => self.state.selected = self.state.selected.saturating_sub(1),
                    Panel::Cards => self.state.card = self.state.card.saturating_sub(1),
                }
                Vec::new()
            }
            UserInput::Down => {
                match self.state.panel {
                    Panel::List => {
                        if self.state.selected < self.state.list_len() {
                            self.state.selected += 1;
                        }
                    }
                    Panel::Cards => {
                        if self.state.card < CARD_COUNT - 1 {
                            self.state.card += 1;
                        }
                    }
                }
                Vec::new()
            }
            UserInput::FocusList => {
                self.state.panel = Panel::List;
                Vec::new()
            }
            UserInput::FocusCards => {
                self.state.panel = Panel::Cards;
                Vec::new()
            }
            UserInput::Select => match self.state.panel {
                Panel::List => self.select_entry(),
                Panel::Cards => match self.state.selected_log() {
                    Some(entry) => {
                        let html = entry.html_path();
                        self.set_status(format!("Opening report: {}", html.display()));
                        vec![Command::Open(html.to_string_lossy().into_owned())]
                    }
                    None => Vec::new(),
                },
            },
            UserInput::Delete => {
                self.request_delete();
                Vec::new()
            }
            UserInput::Confirm(_) => Vec::new(),
        }
    }

    fn select_entry(&mut self) -> Vec<Command> {
        match self.state.mode {
            ViewMode::BrowsingRuns => {
                if self.state.selected == 0 {
                    let name = RunName::new(UNKNOWN_COMMANDER, (self.clock)());
                    let dir = self.start_run(name);
                    self.set_status("New run created. Waiting for logs.");
                    vec![Command::CreateRunDir(dir)]
                } else {
                    let Some(name) = self.state.runs.get(self.state.selected - 1).cloned() else {
                        return Vec::new();
                    };
                    let label = name.to_string();
                    let dir = self.start_run(name);
                    self.set_status(format!("Loading logs for run: {label}"));
                    vec![Command::LoadRun(dir)]
                }
            }
            ViewMode::InspectingRun => {
                if self.state.selected == 0 {
                    self.state.mode = ViewMode::BrowsingRuns;
                    self.state.run = None;
                    self.state.selected = 0;
                    self.state.card = 0;
                    vec![Command::EnumerateRuns]
                } else {
                    self.state.card = 0;
                    Vec::new()
                }
            }
        }
    }

    /// Replace the open run and switch to inspecting it. Returns its folder.
    fn start_run(&mut self, name: RunName) -> PathBuf {
        let run = RunSession::new(name, &self.archive_root);
        let dir = run.dir.clone();
        self.state.run = Some(run);
        self.state.mode = ViewMode::InspectingRun;
        self.state.selected = 0;
        self.state.card = 0;
        dir
    }

    fn route_file(&mut self, temp_path: PathBuf, report: Arc<ParsedReport>) -> Vec<Command> {
        let needs_new_run = match (self.state.mode, self.state.run.as_ref()) {
            (ViewMode::InspectingRun, Some(run)) => run.routed_count() >= self.max_logs_per_run,
            _ => true,
        };

        if needs_new_run {
            let commander = report.commander_account().unwrap_or(UNKNOWN_COMMANDER);
            let name = RunName::new(commander, (self.clock)());
            tracing::info!(run = %name, "starting new run");
            self.start_run(name);
            self.set_status("New run started.");
        }

        let Some(run) = self.state.run.as_mut() else {
            return Vec::new();
        };
        run.in_flight.insert(temp_path.clone());
        vec![Command::Archive {
            source: temp_path,
            run_dir: run.dir.clone(),
            report,
        }]
    }

    fn on_archived(&mut self, source: PathBuf, archived: PathBuf, report: Arc<ParsedReport>) {
        let Some(run) = self.state.run.as_mut() else {
            return;
        };
        run.in_flight.remove(&source);
        if !run.owns(&archived) {
            tracing::debug!(path = %archived.display(), "archived into a run that is no longer open");
            return;
        }

        let name = display_name(&archived);
        let index = run.insert(LogEntry {
            display_name: name.clone(),
            path: archived,
            report,
        });
        self.state.selected = index + 1;
        self.state.card = 0;
        self.set_status(format!("New log processed: {name}"));
    }

    fn on_log_parsed(&mut self, path: PathBuf, report: Arc<ParsedReport>) {
        let Some(run) = self.state.run.as_mut() else {
            return;
        };
        if !run.owns(&path) {
            return;
        }
        run.insert(LogEntry {
            display_name: display_name(&path),
            path,
            report,
        });
        let count = run.logs.len();
        self.set_status(format!("Loading... {count} logs parsed."));
    }

    fn on_run_loaded(&mut self, run_dir: PathBuf) {
        let Some(run) = self.state.run.as_ref() else {
            return;
        };
        if run.dir != run_dir {
            return;
        }
        let count = run.logs.len();
        self.state.selected = usize::from(count > 0);
        self.set_status(format!("Loaded {count} logs from run."));
    }

    fn on_update_available(&mut self, url: String) {
        if self.state.confirmation.is_some() {
            self.set_status(format!("A new version is available: {url}"));
            return;
        }
        let prompt = "A new version is available! Open download page? (y/N)".to_string();
        self.state.confirmation = Some(Confirmation {
            action: PendingAction::OpenUpdatePage(url),
            prompt: prompt.clone(),
        });
        self.set_status(prompt);
    }

    fn request_delete(&mut self) {
        if self.state.panel != Panel::List || self.state.selected == 0 {
            return;
        }
        let pending = match self.state.mode {
            ViewMode::BrowsingRuns => self.state.selected_run().cloned().map(|name| {
                let prompt = format!("Delete run '{name}'? (y/N)");
                (PendingAction::DeleteRun(name), prompt)
            }),
            ViewMode::InspectingRun => self.state.selected_log().map(|entry| {
                let prompt = format!("Delete log '{}'? (y/N)", entry.display_name);
                let action = PendingAction::DeleteLog {
                    display_name: entry.display_name.clone(),
                    path: entry.path.clone(),
                };
                (action, prompt)
            }),
        };
        if let Some((action, prompt)) = pending {
            self.state.confirmation = Some(Confirmation {
                action,
                prompt: prompt.clone(),
            });
            self.set_status(prompt);
        }
    }

    fn resolve_confirmation(&mut self, yes: bool) -> Vec<Command> {
        let Some(confirmation) = self.state.confirmation.take() else {
            return Vec::new();
        };
        if !yes {
            self.set_status("Action cancelled.");
            return Vec::new();
        }

        match confirmation.action {
            PendingAction::DeleteRun(name) => {
                let dir = self.archive_root.join(name.to_string());
                self.set_status(format!("Deleting run: {name}"));
                vec![Command::DeleteRun(dir)]
            }
            PendingAction::DeleteLog { display_name, path } => {
                // The log may belong to a run that was replaced while the
                // prompt was open; it is still deleted from disk.
                if let Some(run) = self.state.run.as_mut() {
                    if run.logs.get(&display_name).is_some_and(|e| e.path == path) {
                        run.logs.remove(&display_name);
                    }
                }
                self.state.clamp_selection();
                self.set_status(format!("Deleted log: {display_name}"));
                vec![Command::DeleteLog(path)]
            }
            PendingAction::OpenUpdatePage(url) => {
                self.set_status("Opening browser to download update...");
                vec![Command::Open(url)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Player;
    use std::path::Path;
    use time::macros::datetime;
    use time::Duration;

    fn ticking_clock() -> impl FnMut() -> PrimitiveDateTime + Send + 'static {
        let mut now = datetime!(2024-05-01 20:00:00);
        move || {
            now += Duration::minutes(1);
            now
        }
    }

    fn machine() -> SessionMachine {
        SessionMachine::new("/archive").with_clock(ticking_clock())
    }

    fn report(commander: Option<&str>) -> Arc<ParsedReport> {
        let mut players = vec![Player {
            name: "Grunt".into(),
            account: "Grunt.1000".into(),
            ..Default::default()
        }];
        if let Some(account) = commander {
            players.push(Player {
                name: "Tag".into(),
                account: account.into(),
                has_commander_tag: true,
                ..Default::default()
            });
        }
        Arc::new(ParsedReport {
            players,
            ..Default::default()
        })
    }

    fn temp(n: usize) -> PathBuf {
        PathBuf::from(format!("/tmp/FightLogTemp/fight{n:02}_detailed_wvw_kill.json"))
    }

    /// Feed a ready file and complete its archive the way the executor would.
    fn ingest(m: &mut SessionMachine, n: usize) -> PathBuf {
        let cmds = m.handle(AppEvent::FileReady {
            temp_path: temp(n),
            report: report(Some("Boss.4321")),
        });
        let [Command::Archive {
            source,
            run_dir,
            report,
        }] = cmds.as_slice()
        else {
            panic!("expected a single archive command, got {cmds:?}");
        };
        let archived = run_dir.join(source.file_name().unwrap());
        m.handle(AppEvent::ArtifactArchived {
            source: source.clone(),
            archived: archived.clone(),
            report: report.clone(),
        });
        run_dir.clone()
    }

    fn run_name(n: u8) -> RunName {
        RunName::new(
            "Boss.4321",
            datetime!(2024-04-01 20:00:00) + Duration::hours(n.into()),
        )
    }

    #[test]
    fn first_file_while_browsing_starts_run_named_after_commander() {
        let mut m = machine();
        let dir = ingest(&mut m, 1);

        let state = m.state();
        assert_eq!(state.mode, ViewMode::InspectingRun);
        let run = state.run.as_ref().unwrap();
        assert_eq!(run.name.commander(), "Boss.4321");
        assert_eq!(run.dir, dir);
        assert_eq!(run.logs.len(), 1);
        assert_eq!(state.selected, 1);
        assert!(dir.starts_with("/archive"));
    }

    #[test]
    fn run_without_commander_tag_uses_sentinel_name() {
        let mut m = machine();
        m.handle(AppEvent::FileReady {
            temp_path: temp(1),
            report: report(None),
        });
        assert_eq!(
            m.state().run.as_ref().unwrap().name.commander(),
            UNKNOWN_COMMANDER
        );
    }

    #[test]
    fn thirty_first_arrival_starts_a_new_run() {
        let mut m = machine();
        let first = ingest(&mut m, 1);
        let second = ingest(&mut m, 2);
        assert_eq!(first, second);
        assert_eq!(m.state().run.as_ref().unwrap().logs.len(), 2);

        for n in 3..=30 {
            assert_eq!(ingest(&mut m, n), first);
        }
        assert_eq!(m.state().run.as_ref().unwrap().logs.len(), 30);

        let next = ingest(&mut m, 31);
        assert_ne!(next, first);
        let run = m.state().run.as_ref().unwrap();
        assert_eq!(run.dir, next);
        assert_eq!(run.logs.len(), 1);
    }

    #[test]
    fn in_flight_files_count_toward_the_cap() {
        let mut m = machine().with_max_logs_per_run(3);
        let mut dirs = Vec::new();
        // Archive results lag behind arrivals: nothing is archived yet.
        for n in 0..7 {
            let cmds = m.handle(AppEvent::FileReady {
                temp_path: temp(n),
                report: report(Some("Boss.4321")),
            });
            match cmds.as_slice() {
                [Command::Archive { run_dir, .. }] => dirs.push(run_dir.clone()),
                other => panic!("unexpected commands {other:?}"),
            }
        }
        assert_eq!(dirs[0], dirs[2]);
        assert_ne!(dirs[2], dirs[3]);
        assert_eq!(dirs[3], dirs[5]);
        assert_ne!(dirs[5], dirs[6]);
    }

    #[test]
    fn interleaved_arrivals_never_exceed_the_cap() {
        let cap = 4;
        let mut m = machine().with_max_logs_per_run(cap);
        let mut pending: Vec<(PathBuf, PathBuf, Arc<ParsedReport>)> = Vec::new();
        let mut per_run: std::collections::HashMap<PathBuf, usize> = Default::default();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;

        for n in 0..60 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            if seed % 3 == 0 && !pending.is_empty() {
                let (source, run_dir, report) = pending.remove((seed as usize) % pending.len());
                let archived = run_dir.join(source.file_name().unwrap());
                m.handle(AppEvent::ArtifactArchived {
                    source,
                    archived,
                    report,
                });
            }
            let cmds = m.handle(AppEvent::FileReady {
                temp_path: temp(n),
                report: report(Some("Boss.4321")),
            });
            let [Command::Archive {
                source,
                run_dir,
                report,
            }] = cmds.as_slice()
            else {
                panic!("every file must be routed exactly once");
            };
            *per_run.entry(run_dir.clone()).or_default() += 1;
            pending.push((source.clone(), run_dir.clone(), report.clone()));
        }

        assert_eq!(per_run.values().sum::<usize>(), 60);
        assert!(per_run.values().all(|&count| count <= cap));
    }

    #[test]
    fn stale_archive_result_is_dropped_from_view() {
        let mut m = machine();
        let cmds = m.handle(AppEvent::FileReady {
            temp_path: temp(1),
            report: report(Some("Boss.4321")),
        });
        let [Command::Archive { run_dir, .. }] = cmds.as_slice() else {
            panic!("expected archive");
        };
        let old_dir = run_dir.clone();

        // User navigates back before the archive completes.
        m.handle(AppEvent::Input(UserInput::Select));
        assert_eq!(m.state().mode, ViewMode::BrowsingRuns);

        m.handle(AppEvent::ArtifactArchived {
            source: temp(1),
            archived: old_dir.join("fight01_detailed_wvw_kill.json"),
            report: report(None),
        });
        assert!(m.state().run.is_none());
        assert_eq!(m.state().mode, ViewMode::BrowsingRuns);
    }

    #[test]
    fn runs_are_listed_newest_first() {
        let mut m = machine();
        m.handle(AppEvent::RunsEnumerated(vec![
            run_name(1),
            run_name(3),
            run_name(2),
        ]));
        assert_eq!(m.state().runs, vec![run_name(3), run_name(2), run_name(1)]);
        assert_eq!(m.state().status, "Found 3 archived runs.");
    }

    #[test]
    fn selecting_sentinel_mints_empty_run() {
        let mut m = machine();
        let cmds = m.handle(AppEvent::Input(UserInput::Select));
        let state = m.state();
        let run = state.run.as_ref().unwrap();
        assert_eq!(state.mode, ViewMode::InspectingRun);
        assert_eq!(run.name.commander(), UNKNOWN_COMMANDER);
        assert_eq!(cmds, vec![Command::CreateRunDir(run.dir.clone())]);
    }

    #[test]
    fn selecting_archived_run_loads_it_sorted() {
        let mut m = machine();
        m.handle(AppEvent::RunsEnumerated(vec![run_name(1), run_name(2)]));
        m.handle(AppEvent::Input(UserInput::Down));
        m.handle(AppEvent::Input(UserInput::Down));
        let cmds = m.handle(AppEvent::Input(UserInput::Select));

        let dir = Path::new("/archive").join(run_name(1).to_string());
        assert_eq!(cmds, vec![Command::LoadRun(dir.clone())]);

        // Enumeration order is arbitrary.
        for stem in ["c", "a", "b"] {
            m.handle(AppEvent::LogParsed {
                path: dir.join(format!("{stem}_detailed_wvw_kill.json")),
                report: report(None),
            });
        }
        m.handle(AppEvent::RunLoaded {
            run_dir: dir.clone(),
        });

        let run = m.state().run.as_ref().unwrap();
        let names: Vec<_> = run.logs.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(m.state().selected, 1);
        assert_eq!(m.state().status, "Loaded 3 logs from run.");
    }

    #[test]
    fn going_back_clears_run_and_reenumerates() {
        let mut m = machine();
        ingest(&mut m, 1);
        m.handle(AppEvent::Input(UserInput::Up));
        let cmds = m.handle(AppEvent::Input(UserInput::Select));
        assert_eq!(cmds, vec![Command::EnumerateRuns]);
        assert!(m.state().run.is_none());
        assert_eq!(m.state().mode, ViewMode::BrowsingRuns);
    }

    #[test]
    fn pending_confirmation_blocks_navigation() {
        let mut m = machine();
        m.handle(AppEvent::RunsEnumerated(vec![run_name(1), run_name(2)]));
        m.handle(AppEvent::Input(UserInput::Down));
        m.handle(AppEvent::Input(UserInput::Delete));
        assert!(m.state().confirmation.is_some());

        let before = m.state().clone();
        for input in [
            UserInput::Up,
            UserInput::Down,
            UserInput::FocusCards,
            UserInput::Select,
            UserInput::Delete,
        ] {
            assert!(m.handle(AppEvent::Input(input)).is_empty());
            assert_eq!(m.state(), &before);
        }
    }

    #[test]
    fn confirmed_run_delete_issues_command() {
        let mut m = machine();
        m.handle(AppEvent::RunsEnumerated(vec![run_name(1)]));
        m.handle(AppEvent::Input(UserInput::Down));
        m.handle(AppEvent::Input(UserInput::Delete));
        let cmds = m.handle(AppEvent::Input(UserInput::Confirm(true)));
        assert_eq!(
            cmds,
            vec![Command::DeleteRun(
                Path::new("/archive").join(run_name(1).to_string())
            )]
        );
        assert!(m.state().confirmation.is_none());
    }

    #[test]
    fn declined_delete_has_no_effect() {
        let mut m = machine();
        ingest(&mut m, 1);
        m.handle(AppEvent::Input(UserInput::Delete));
        let cmds = m.handle(AppEvent::Input(UserInput::Confirm(false)));
        assert!(cmds.is_empty());
        assert_eq!(m.state().run.as_ref().unwrap().logs.len(), 1);
        assert_eq!(m.state().status, "Action cancelled.");
    }

    #[test]
    fn confirmed_log_delete_removes_exactly_one_entry() {
        let mut m = machine();
        ingest(&mut m, 1);
        ingest(&mut m, 2);
        ingest(&mut m, 3);
        assert_eq!(m.state().selected, 3);

        m.handle(AppEvent::Input(UserInput::Delete));
        let cmds = m.handle(AppEvent::Input(UserInput::Confirm(true)));

        let run = m.state().run.as_ref().unwrap();
        assert_eq!(run.logs.len(), 2);
        assert!(!run.logs.contains_key("fight03"));
        assert_eq!(
            cmds,
            vec![Command::DeleteLog(
                run.dir.join("fight03_detailed_wvw_kill.json")
            )]
        );
        assert_eq!(m.state().selected, 2);
    }

    #[test]
    fn log_delete_confirmed_after_run_rollover_still_deletes_it() {
        let mut m = machine().with_max_logs_per_run(1);
        let old_dir = ingest(&mut m, 1);
        m.handle(AppEvent::Input(UserInput::Delete));
        assert!(m.state().confirmation.is_some());

        // A new log arrives and starts the next run before the answer.
        let new_dir = ingest(&mut m, 2);
        assert_ne!(old_dir, new_dir);

        let cmds = m.handle(AppEvent::Input(UserInput::Confirm(true)));
        assert_eq!(
            cmds,
            vec![Command::DeleteLog(
                old_dir.join("fight01_detailed_wvw_kill.json")
            )]
        );
        assert_eq!(m.state().run.as_ref().unwrap().logs.len(), 1);
        assert_eq!(m.state().status, "Deleted log: fight01");
    }

    #[test]
    fn cursors_stay_in_bounds() {
        let mut m = machine();
        ingest(&mut m, 1);
        for _ in 0..5 {
            m.handle(AppEvent::Input(UserInput::Down));
        }
        assert_eq!(m.state().selected, 1);
        for _ in 0..5 {
            m.handle(AppEvent::Input(UserInput::Up));
        }
        assert_eq!(m.state().selected, 0);

        m.handle(AppEvent::Input(UserInput::FocusCards));
        for _ in 0..20 {
            m.handle(AppEvent::Input(UserInput::Down));
        }
        assert_eq!(m.state().card, CARD_COUNT - 1);
        assert_eq!(m.state().selected, 0);
    }

    #[test]
    fn select_on_cards_opens_html_report() {
        let mut m = machine();
        let dir = ingest(&mut m, 4);
        m.handle(AppEvent::Input(UserInput::FocusCards));
        let cmds = m.handle(AppEvent::Input(UserInput::Select));
        let expected = dir.join("fight04_detailed_wvw_kill.html");
        assert_eq!(
            cmds,
            vec![Command::Open(expected.to_string_lossy().into_owned())]
        );
    }

    #[test]
    fn failures_are_stored_and_do_not_halt() {
        let mut m = machine();
        m.handle(AppEvent::Failure(PipelineError::SoftWatch("boom".into())));
        assert_eq!(m.state().last_error.as_deref(), Some("watcher error: boom"));

        ingest(&mut m, 1);
        assert_eq!(m.state().run.as_ref().unwrap().logs.len(), 1);
        assert!(m.state().last_error.is_none());
    }

    #[test]
    fn archive_failure_releases_in_flight_slot() {
        let mut m = machine().with_max_logs_per_run(1);
        m.handle(AppEvent::FileReady {
            temp_path: temp(1),
            report: report(None),
        });
        let dir = m.state().run.as_ref().unwrap().dir.clone();
        m.handle(AppEvent::ArchiveFailed {
            source: temp(1),
            error: PipelineError::MoveFailed {
                path: temp(1),
                attempts: 3,
                reason: "locked".into(),
            },
        });
        assert!(m.state().last_error.is_some());

        let cmds = m.handle(AppEvent::FileReady {
            temp_path: temp(2),
            report: report(None),
        });
        assert!(matches!(
            cmds.as_slice(),
            [Command::Archive { run_dir, .. }] if *run_dir == dir
        ));
    }

    #[test]
    fn update_prompt_opens_url_when_confirmed() {
        let mut m = machine();
        m.handle(AppEvent::UpdateAvailable {
            url: "https://example.invalid/release".into(),
        });
        assert!(m.state().confirmation.is_some());
        let cmds = m.handle(AppEvent::Input(UserInput::Confirm(true)));
        assert_eq!(
            cmds,
            vec![Command::Open("https://example.invalid/release".into())]
        );
    }
}
