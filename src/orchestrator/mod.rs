//! Application-level orchestration.
//!
//! This module owns the background producers (ingest pipeline, update check)
//! and the executor for commands issued by the session machine. UI/CLI layers
//! own the machine itself and only exchange events and commands with this
//! module.

mod controller;
mod pipeline;
mod startup;

use controller::{run_controller, Executor};
use pipeline::run_pipeline;

pub(crate) use startup::{prepare_workspace, start_background, Background};
