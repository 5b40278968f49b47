//! One-time preparation before the session starts.

use super::{run_controller, run_pipeline, Executor};
use crate::model::{AppEvent, Command, WatchConfig};
use crate::storage::ArchiveLayout;
use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Channels connecting the session owner to the background producers.
pub(crate) struct Background {
    pub event_rx: UnboundedReceiver<AppEvent>,
    pub cmd_tx: UnboundedSender<Command>,
    pub controller: JoinHandle<()>,
}

/// Spawn the command executor, the ingest pipeline and (optionally) the
/// update check, and queue the initial run enumeration.
pub(crate) fn start_background(cfg: &WatchConfig) -> Background {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();

    let controller = tokio::spawn(run_controller(
        Executor::new(cfg),
        event_tx.clone(),
        cmd_rx,
    ));
    if cfg.check_updates {
        spawn_update_check(event_tx.clone());
    }
    tokio::spawn(run_pipeline(cfg.clone(), event_tx));
    let _ = cmd_tx.send(Command::EnumerateRuns);

    Background {
        event_rx,
        cmd_tx,
        controller,
    }
}

/// Clear the parser scratch folder and make sure the parser settings exist.
pub(crate) async fn prepare_workspace(cfg: &WatchConfig) -> Result<()> {
    let layout = ArchiveLayout::from_config(cfg);
    if let Err(e) = layout.reset_temp_dir().await {
        tracing::warn!(error = %e, "could not reset temp folder");
    }
    layout
        .ensure_parser_config(&cfg.parser_config)
        .await
        .context("prepare Elite Insights settings")?;
    tokio::fs::create_dir_all(layout.temp_dir())
        .await
        .with_context(|| format!("create {}", layout.temp_dir().display()))?;
    Ok(())
}

/// Check for a newer release in the background. Failures are only logged.
fn spawn_update_check(event_tx: UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        match crate::updater::check_for_update(env!("CARGO_PKG_VERSION")).await {
            Ok(Some(url)) => {
                tracing::info!(url = %url, "update available");
                let _ = event_tx.send(AppEvent::UpdateAvailable { url });
            }
            Ok(None) => tracing::debug!("no update available"),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "update check failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn prepares_temp_and_parser_config() {
        let dir = TempDir::new().unwrap();
        let cfg = WatchConfig {
            watch_root: dir.path().to_path_buf(),
            data_dir: dir.path().join("data"),
            extension: "zevtc".into(),
            parser_path: PathBuf::from("GW2EICLI/GuildWars2EliteInsights-CLI.exe"),
            parser_launcher: None,
            parser_config: dir.path().join("data/ELI3.conf"),
            poll_interval: Duration::from_millis(250),
            artifact_timeout: Duration::from_secs(60),
            move_attempts: 3,
            move_backoff: Duration::from_millis(250),
            max_logs_per_run: 30,
            check_updates: false,
        };
        std::fs::create_dir_all(cfg.temp_dir()).unwrap();
        std::fs::write(cfg.temp_dir().join("left.json"), b"{}").unwrap();

        prepare_workspace(&cfg).await.unwrap();
        assert!(cfg.temp_dir().is_dir());
        assert!(!cfg.temp_dir().join("left.json").exists());
        assert!(cfg.parser_config.is_file());
    }
}
