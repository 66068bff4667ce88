//! qxgen - personalized QuantumultX configuration generator
//!
//! Fetches a shared base configuration, merges personal overrides from
//! `QX_*` environment variables (and an optional TOML file) into it with
//! the `qxgen-merge` engine, validates the certificate section and writes
//! the result with backups. Built to run as a scheduled batch job.

pub mod backup;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod summary;

pub use config::{Settings, SettingsError};
pub use fetch::{DocumentSource, FetchError, FileSource, HttpSource};
pub use loader::{load_overrides, LoaderError};
pub use pipeline::{generate, Generated, Pipeline, PipelineError, RunOptions};
pub use summary::{ExitCode, RunSummary, Status};
