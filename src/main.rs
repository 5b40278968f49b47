mod cards;
mod cli;
mod config;
mod error;
mod ingest;
mod logging;
mod model;
mod orchestrator;
mod report;
mod session;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
mod updater;

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;

fn main() -> Result<()> {
    // Must happen while the process is still single-threaded.
    session::init_local_offset();
    let args = cli::Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let res = runtime.block_on(cli::run(args));
    // Readiness pollers never finish on their own; don't wait for them.
    runtime.shutdown_timeout(Duration::from_millis(500));
    res
}
