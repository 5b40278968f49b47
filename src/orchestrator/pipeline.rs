//! Ingest pipeline: watch for combat logs, convert them one at a time and
//! hand the parsed reports to the session machine.

use crate::error::PipelineError;
use crate::ingest::{Converter, SubtreeWatcher, WatchEvent};
use crate::model::{AppEvent, WatchConfig};
use crate::report::parse_report;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

const PARSER_POLL: Duration = Duration::from_secs(1);

/// Block until the parser executable exists. Returns false if the
/// consumer went away while waiting.
async fn wait_for_parser(converter: &Converter, event_tx: &UnboundedSender<AppEvent>) -> bool {
    if converter.tool_exists() {
        return true;
    }
    let _ = event_tx.send(AppEvent::Status(format!(
        "Elite Insights not found at {}. Waiting for it to be installed...",
        converter.tool().display()
    )));
    loop {
        tokio::time::sleep(PARSER_POLL).await;
        if event_tx.is_closed() {
            return false;
        }
        if converter.tool_exists() {
            let _ = event_tx.send(AppEvent::Status("Elite Insights found.".into()));
            return true;
        }
    }
}

async fn convert_and_parse(converter: &Converter, input: &Path) -> Result<AppEvent, PipelineError> {
    let temp_path = converter.convert(input).await?;
    let parse_path = temp_path.clone();
    let report = tokio::task::spawn_blocking(move || parse_report(&parse_path))
        .await
        .map_err(|e| PipelineError::ParseFailure {
            path: temp_path.clone(),
            reason: e.to_string(),
        })??;
    Ok(AppEvent::FileReady {
        temp_path,
        report: Arc::new(report),
    })
}

/// Run until the event consumer is gone.
pub(crate) async fn run_pipeline(cfg: WatchConfig, event_tx: UnboundedSender<AppEvent>) {
    let converter = Converter::from_config(&cfg);
    if !wait_for_parser(&converter, &event_tx).await {
        return;
    }

    let watcher = match SubtreeWatcher::start(&cfg.watch_root, &cfg.extension, cfg.poll_interval) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "watcher could not start");
            let _ = event_tx.send(AppEvent::Failure(e));
            return;
        }
    };
    let _ = event_tx.send(AppEvent::Status(format!(
        "Watching {} for new logs.",
        watcher.root().display()
    )));

    let (watch_tx, mut watch_rx) = mpsc::unbounded_channel();
    tokio::spawn(watcher.run(watch_tx));

    while let Some(event) = watch_rx.recv().await {
        let outgoing = match event {
            WatchEvent::Ready(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let _ = event_tx.send(AppEvent::Status(format!("Processing: {name}")));
                match convert_and_parse(&converter, &path).await {
                    Ok(ev) => ev,
                    Err(e) => {
                        tracing::warn!(input = %path.display(), error = %e, "conversion failed");
                        AppEvent::Failure(e)
                    }
                }
            }
            WatchEvent::Error(e) => AppEvent::Failure(e),
        };
        if event_tx.send(outgoing).is_err() {
            break;
        }
    }
    tracing::debug!("ingest pipeline stopped");
}
