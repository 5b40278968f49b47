use crate::config;
use crate::model::{AppEvent, Command, WatchConfig};
use crate::orchestrator::{self, Background};
use crate::report::display_name;
use crate::session::SessionMachine;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "commanders-watch",
    version,
    about = "Watch ArcDPS combat logs, convert them with Elite Insights and browse the results"
)]
pub struct Cli {
    /// ArcDPS log folder to watch (remembered in config.json)
    #[arg(long)]
    pub watch_folder: Option<PathBuf>,

    /// Folder holding the archive, temp files, settings and logs
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Extension of combat logs to pick up
    #[arg(long, default_value = "zevtc")]
    pub extension: String,

    /// Elite Insights CLI executable [default: <data-dir>/GW2EICLI/GuildWars2EliteInsights-CLI.exe]
    #[arg(long)]
    pub parser: Option<PathBuf>,

    /// Program used to launch the parser (e.g. dotnet, wine)
    #[arg(long)]
    pub parser_launcher: Option<PathBuf>,

    /// Elite Insights settings file [default: <data-dir>/ELI3.conf]
    #[arg(long)]
    pub parser_config: Option<PathBuf>,

    /// How often to probe files that are still being written
    #[arg(long, default_value = "250ms")]
    pub poll_interval: humantime::Duration,

    /// How long to wait for each parser output to appear, and then to unlock
    #[arg(long, default_value = "60s")]
    pub artifact_timeout: humantime::Duration,

    /// Attempts for each verified move into the archive
    #[arg(long, default_value_t = 3)]
    pub move_attempts: u32,

    /// Pause between move attempts
    #[arg(long, default_value = "250ms")]
    pub move_backoff: humantime::Duration,

    /// Logs per run before the next log starts a new run
    #[arg(long, default_value_t = crate::session::MAX_LOGS_PER_RUN)]
    pub max_logs_per_run: usize,

    /// Use --check-updates true or --check-updates false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub check_updates: bool,

    /// Print status and fight summaries instead of running the TUI
    #[arg(long)]
    pub text: bool,
}

fn use_tui(args: &Cli) -> bool {
    cfg!(feature = "tui") && !args.text
}

pub async fn run(args: Cli) -> Result<()> {
    let data_dir = args.data_dir.clone().unwrap_or_else(config::default_data_dir);
    let log_file = use_tui(&args).then(|| data_dir.join("debug.log"));
    crate::logging::init_logging(log_file.as_deref())?;

    let cfg = build_config(&args, &data_dir)?;
    tracing::info!(
        watch = %cfg.watch_root.display(),
        data = %cfg.data_dir.display(),
        "starting"
    );
    orchestrator::prepare_workspace(&cfg).await?;

    if use_tui(&args) {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg).await;
        }
    }
    run_text(cfg).await
}

/// Build a `WatchConfig` from CLI arguments and the saved settings.
pub fn build_config(args: &Cli, data_dir: &Path) -> Result<WatchConfig> {
    let config_path = config::config_path(data_dir);
    let mut saved = config::load(&config_path)?;
    let watch_root = config::resolve_watch_folder(
        args.watch_folder.as_deref(),
        &saved,
        config::default_watch_folder(),
    )?;
    let watch_root = std::path::absolute(&watch_root)
        .with_context(|| format!("resolve {}", watch_root.display()))?;

    if saved.watch_folder.as_deref() != Some(watch_root.as_path()) {
        saved.watch_folder = Some(watch_root.clone());
        config::save(&config_path, &saved)?;
    }

    Ok(WatchConfig {
        watch_root,
        data_dir: data_dir.to_path_buf(),
        extension: args.extension.trim_start_matches('.').to_string(),
        parser_path: args.parser.clone().unwrap_or_else(|| {
            data_dir
                .join("GW2EICLI")
                .join("GuildWars2EliteInsights-CLI.exe")
        }),
        parser_launcher: args.parser_launcher.clone(),
        parser_config: args
            .parser_config
            .clone()
            .unwrap_or_else(|| data_dir.join("ELI3.conf")),
        poll_interval: Duration::from(args.poll_interval),
        artifact_timeout: Duration::from(args.artifact_timeout),
        move_attempts: args.move_attempts.max(1),
        move_backoff: Duration::from(args.move_backoff),
        max_logs_per_run: args.max_logs_per_run.max(1),
        check_updates: args.check_updates,
    })
}

/// Headless session: status and errors to stderr, fight summaries to stdout.
async fn run_text(cfg: WatchConfig) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let mut machine =
        SessionMachine::new(cfg.archive_root()).with_max_logs_per_run(cfg.max_logs_per_run);
    let Background {
        mut event_rx,
        cmd_tx,
        controller,
    } = orchestrator::start_background(&cfg);

    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Watching {} (Ctrl-C to stop)",
        cfg.watch_root.display()
    )));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let event = tokio::select! {
            ev = event_rx.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
            _ = &mut ctrl_c => break,
        };

        // Nobody can answer a prompt here.
        if let AppEvent::UpdateAvailable { url } = &event {
            let _ = out_tx.send(OutputLine::Stderr(format!("Update available: {url}")));
            continue;
        }

        let archived = match &event {
            AppEvent::ArtifactArchived { archived, .. } => Some(archived.clone()),
            _ => None,
        };
        let before = (machine.state().status.clone(), machine.state().last_error.clone());

        for cmd in machine.handle(event) {
            let _ = cmd_tx.send(cmd);
        }

        let state = machine.state();
        if let Some(err) = state.last_error.as_ref().filter(|e| Some(*e) != before.1.as_ref()) {
            let _ = out_tx.send(OutputLine::Stderr(format!("Error: {err}")));
        }
        if state.status != before.0 {
            let _ = out_tx.send(OutputLine::Stderr(state.status.clone()));
        }

        if let (Some(path), Some(run)) = (archived, state.run.as_ref()) {
            if let Some(entry) = run.logs.get(&display_name(&path)) {
                let summary = crate::text_summary::build_text_summary(
                    &run.name.to_string(),
                    &entry.display_name,
                    &entry.report,
                );
                for line in summary.lines {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
        }
    }

    let _ = cmd_tx.send(Command::Quit);
    let _ = controller.await;
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
