//! Durable run log.
//!
//! A snapshot of the transcript is appended after every successful turn.
//! Persistence is best-effort from the run's point of view: the in-memory
//! transcript stays authoritative and a failed write never stops a run.

mod json;
mod record;
mod traits;

pub use json::{DEFAULT_STORE_FILE, JsonRunStore};
pub use record::{RunRecord, RunSummary, generate_run_id, summarize_runs};
pub use traits::RunStore;
