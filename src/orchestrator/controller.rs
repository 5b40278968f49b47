//! Command executor.
//!
//! Receives [`Command`]s from the session machine, runs each on its own task
//! and reports the outcome back as [`AppEvent`]s.

use crate::error::PipelineError;
use crate::ingest::Archiver;
use crate::model::{AppEvent, Command, WatchConfig};
use crate::report::parse_report;
use crate::storage::ArchiveLayout;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Everything a command needs; cheap to clone into each task.
#[derive(Debug, Clone)]
pub(crate) struct Executor {
    layout: ArchiveLayout,
    archiver: Archiver,
}

impl Executor {
    pub(crate) fn new(cfg: &WatchConfig) -> Self {
        Self {
            layout: ArchiveLayout::from_config(cfg),
            archiver: Archiver::from_config(cfg),
        }
    }

    async fn execute(self, cmd: Command, event_tx: UnboundedSender<AppEvent>) {
        let send = |ev: AppEvent| {
            let _ = event_tx.send(ev);
        };

        match cmd {
            Command::EnumerateRuns => match self.layout.list_runs().await {
                Ok(runs) => send(AppEvent::RunsEnumerated(runs)),
                Err(e) => send(AppEvent::Failure(e)),
            },
            Command::CreateRunDir(dir) => {
                if let Err(e) = self.layout.create_run_dir(&dir).await {
                    send(AppEvent::Failure(e));
                }
            }
            Command::LoadRun(dir) => self.load_run(dir, &event_tx).await,
            Command::Archive {
                source,
                run_dir,
                report,
            } => match self.archiver.archive(&source, &run_dir).await {
                Ok(archived) => {
                    if archived.secondary.is_none() {
                        tracing::debug!(report = %archived.primary.display(), "archived without html");
                    }
                    send(AppEvent::ArtifactArchived {
                        source,
                        archived: archived.primary,
                        report,
                    })
                }
                Err(error) => send(AppEvent::ArchiveFailed { source, error }),
            },
            Command::DeleteRun(dir) => {
                // Re-enumerating after a failure would overwrite the error.
                if let Err(e) = self.layout.delete_run(&dir).await {
                    send(AppEvent::Failure(e));
                    return;
                }
                match self.layout.list_runs().await {
                    Ok(runs) => send(AppEvent::RunsEnumerated(runs)),
                    Err(e) => send(AppEvent::Failure(e)),
                }
            }
            Command::DeleteLog(path) => {
                if let Err(e) = self.layout.delete_log(&path).await {
                    send(AppEvent::Failure(e));
                }
            }
            Command::Open(target) => match open_target(&target) {
                Ok(()) => tracing::debug!(what = %target, "opened"),
                Err(e) => send(AppEvent::Failure(PipelineError::io(
                    format!("could not open {target}"),
                    e,
                ))),
            },
            Command::Quit => {}
        }
    }

    async fn load_run(&self, dir: PathBuf, event_tx: &UnboundedSender<AppEvent>) {
        let reports = match self.layout.list_reports(&dir).await {
            Ok(reports) => reports,
            Err(e) => {
                let _ = event_tx.send(AppEvent::Failure(e));
                Vec::new()
            }
        };

        for path in reports {
            let parse_path = path.clone();
            let parsed = tokio::task::spawn_blocking(move || parse_report(&parse_path)).await;
            let event = match parsed {
                Ok(Ok(report)) => AppEvent::LogParsed {
                    path,
                    report: Arc::new(report),
                },
                Ok(Err(e)) => AppEvent::Failure(e),
                Err(e) => AppEvent::Failure(PipelineError::ParseFailure {
                    path,
                    reason: e.to_string(),
                }),
            };
            if event_tx.send(event).is_err() {
                return;
            }
        }
        let _ = event_tx.send(AppEvent::RunLoaded { run_dir: dir });
    }
}

/// Hand a file or URL to the platform's default opener.
fn open_target(target: &str) -> std::io::Result<()> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else {
        std::process::Command::new("xdg-open")
    };
    cmd.arg(target)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Execute commands until `Quit` arrives or every sender is gone.
pub(crate) async fn run_controller(
    executor: Executor,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<Command>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        if cmd == Command::Quit {
            tracing::debug!("controller quitting");
            break;
        }
        tokio::spawn(executor.clone().execute(cmd, event_tx.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::WaitPolicy;
    use crate::model::UserInput;
    use crate::report::ParsedReport;
    use crate::session::{RunName, SessionMachine};
    use std::time::Duration;
    use tempfile::TempDir;
    use time::macros::datetime;
    use tokio::sync::mpsc;

    fn executor(dir: &TempDir) -> Executor {
        Executor {
            layout: ArchiveLayout::new(dir.path().join("Log_Archive"), dir.path().join("tmp")),
            archiver: Archiver::new(
                2,
                Duration::from_millis(5),
                WaitPolicy {
                    interval: Duration::from_millis(5),
                    timeout: Duration::from_millis(50),
                },
            ),
        }
    }

    async fn run_one(exec: Executor, cmd: Command) -> Vec<AppEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        exec.execute(cmd, tx).await;
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn load_run_parses_every_report_then_finishes() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let run = dir.path().join("Log_Archive/A.1_2024-05-01_20-00-00");
        std::fs::create_dir_all(&run).unwrap();
        std::fs::write(run.join("b_detailed_wvw_kill.json"), r#"{"players": []}"#).unwrap();
        std::fs::write(run.join("a_detailed_wvw_kill.json"), r#"{"players": []}"#).unwrap();
        std::fs::write(run.join("bad_detailed_wvw_kill.json"), "nope").unwrap();

        let events = run_one(exec, Command::LoadRun(run.clone())).await;
        let parsed = events
            .iter()
            .filter(|e| matches!(e, AppEvent::LogParsed { .. }))
            .count();
        assert_eq!(parsed, 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Failure(PipelineError::ParseFailure { .. }))));
        assert!(matches!(events.last(), Some(AppEvent::RunLoaded { run_dir }) if *run_dir == run));
    }

    #[tokio::test]
    async fn archive_reports_source_and_destination() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let source = dir.path().join("x_detailed_wvw_kill.json");
        std::fs::write(&source, b"{}").unwrap();
        let run_dir = dir.path().join("Log_Archive/run");

        let events = run_one(
            exec,
            Command::Archive {
                source: source.clone(),
                run_dir: run_dir.clone(),
                report: Arc::new(ParsedReport::default()),
            },
        )
        .await;
        match events.as_slice() {
            [AppEvent::ArtifactArchived {
                source: s,
                archived,
                ..
            }] => {
                assert_eq!(s, &source);
                assert_eq!(archived, &run_dir.join("x_detailed_wvw_kill.json"));
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_run_reenumerates() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let a = RunName::new("A.1", datetime!(2024-05-01 20:00:00));
        let b = RunName::new("B.2", datetime!(2024-05-01 21:00:00));
        for run in [&a, &b] {
            std::fs::create_dir_all(dir.path().join("Log_Archive").join(run.to_string())).unwrap();
        }

        let events = run_one(
            exec,
            Command::DeleteRun(dir.path().join("Log_Archive").join(a.to_string())),
        )
        .await;
        match events.as_slice() {
            [AppEvent::RunsEnumerated(runs)] => assert_eq!(runs, &vec![b]),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_run_delete_stays_visible() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let outside = dir.path().join("elsewhere");
        std::fs::create_dir_all(&outside).unwrap();

        let events = run_one(exec, Command::DeleteRun(outside.clone())).await;
        assert!(matches!(events.as_slice(), [AppEvent::Failure(_)]));
        assert!(outside.is_dir());

        let mut machine = SessionMachine::new(dir.path().join("Log_Archive"));
        for ev in events {
            machine.handle(ev);
        }
        assert!(machine.state().last_error.is_some());
    }

    /// Feed every event to the machine and return the commands it issued.
    fn apply(machine: &mut SessionMachine, events: Vec<AppEvent>) -> Vec<Command> {
        events.into_iter().flat_map(|ev| machine.handle(ev)).collect()
    }

    #[tokio::test]
    async fn archived_log_reloads_identically() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir);
        let archive_root = dir.path().join("Log_Archive");
        let temp = dir.path().join("tmp");
        std::fs::create_dir_all(&temp).unwrap();
        let source = temp.join("20240501-201403_detailed_wvw_kill.json");
        std::fs::write(
            &source,
            r#"{
                "fightName": "Detailed WvW - Eternal Battlegrounds",
                "duration": "02m 10s 500ms",
                "players": [
                    {"name": "Tag", "account": "Boss.4321", "hasCommanderTag": true,
                     "statsAll": [{"totaldmg": 1500, "distToCom": "N/A"}]},
                    {"name": "Grunt", "account": "Grunt.1000",
                     "statsAll": [{"totaldmg": 900, "distToCom": 240.5}]}
                ]
            }"#,
        )
        .unwrap();
        std::fs::write(source.with_extension("html"), "<html></html>").unwrap();

        // Live path: the pipeline parses the temp report and the session routes it.
        let report = Arc::new(parse_report(&source).unwrap());
        let mut live = SessionMachine::new(archive_root.clone());
        let cmds = live.handle(AppEvent::FileReady {
            temp_path: source.clone(),
            report,
        });
        let [archive @ Command::Archive { .. }] = cmds.as_slice() else {
            panic!("expected one archive command, got {cmds:?}");
        };
        apply(&mut live, run_one(exec.clone(), archive.clone()).await);
        let live_entry = live.state().selected_log().cloned().unwrap();
        assert!(!source.exists());

        // Reload path: enumerate the archive, open the run, parse from disk.
        let mut loaded = SessionMachine::new(archive_root.clone());
        apply(&mut loaded, run_one(exec.clone(), Command::EnumerateRuns).await);
        loaded.handle(AppEvent::Input(UserInput::Down));
        let cmds = loaded.handle(AppEvent::Input(UserInput::Select));
        let [load @ Command::LoadRun(_)] = cmds.as_slice() else {
            panic!("expected one load command, got {cmds:?}");
        };
        apply(&mut loaded, run_one(exec, load.clone()).await);
        let loaded_entry = loaded.state().selected_log().cloned().unwrap();

        assert_eq!(loaded_entry.display_name, "20240501-201403");
        assert_eq!(loaded_entry.display_name, live_entry.display_name);
        assert_eq!(loaded_entry.path, live_entry.path);
        assert_eq!(*loaded_entry.report, *live_entry.report);
    }

    #[tokio::test]
    async fn controller_stops_on_quit() {
        let dir = TempDir::new().unwrap();
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        cmd_tx.send(Command::Quit).unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            run_controller(executor(&dir), event_tx, cmd_rx),
        )
        .await
        .unwrap();
    }
}
