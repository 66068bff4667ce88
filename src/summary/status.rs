//! Run status and stable exit codes

use serde::{Deserialize, Serialize};

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// New configuration written
    Generated,
    /// Fingerprint matched the last run; nothing written
    Unchanged,
    /// Generated and validated but not written
    DryRun,
    /// Run aborted
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Generated => "generated",
            Status::Unchanged => "unchanged",
            Status::DryRun => "dry_run",
            Status::Failed => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Status::Failed)
    }
}

/// Failure kind - categorizes the cause of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Settings could not be built
    Settings,
    /// Personal overrides could not be loaded
    Loader,
    /// Base document could not be fetched or was empty
    Fetch,
    /// Generated document failed validation
    Validation,
    /// Output or cache could not be written
    Store,
}

impl FailureKind {
    /// Get the stable exit code for this failure kind
    pub fn exit_code(&self) -> ExitCode {
        match self {
            FailureKind::Settings | FailureKind::Loader => ExitCode::Settings,
            FailureKind::Fetch => ExitCode::Fetch,
            FailureKind::Validation => ExitCode::Validation,
            FailureKind::Store => ExitCode::Store,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            FailureKind::Settings => "Invalid settings",
            FailureKind::Loader => "Overrides could not be loaded",
            FailureKind::Fetch => "Base document unavailable",
            FailureKind::Validation => "Certificate validation failed",
            FailureKind::Store => "Write failed",
        }
    }
}

/// Stable process exit codes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExitCode {
    /// Generated, unchanged, or dry run
    #[default]
    Success = 0,
    /// Settings or overrides invalid
    Settings = 2,
    /// Fetch failed or document empty
    Fetch = 3,
    /// Output failed validation
    Validation = 4,
    /// Output or cache I/O failed
    Store = 5,
}

impl ExitCode {
    /// Get the integer value of the exit code
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Create from integer value
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ExitCode::Success),
            2 => Some(ExitCode::Settings),
            3 => Some(ExitCode::Fetch),
            4 => Some(ExitCode::Validation),
            5 => Some(ExitCode::Store),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }
}
