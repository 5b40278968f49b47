//! Run/log session state and the machine that owns it.

mod machine;
mod run_name;
mod state;

pub use machine::{SessionMachine, MAX_LOGS_PER_RUN};
pub use run_name::{init_local_offset, RunName};
pub use state::{Panel, SessionState, ViewMode, CARD_COUNT};
