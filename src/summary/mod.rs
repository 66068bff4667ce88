//! Run summary and exit-code taxonomy

mod run_summary;
mod status;

pub use run_summary::{preview, RunSummary, RUN_SUMMARY_SCHEMA_ID, RUN_SUMMARY_SCHEMA_VERSION};
pub use status::{ExitCode, FailureKind, Status};
