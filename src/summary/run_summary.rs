//! Run summary (human text and JSON)

use chrono::{DateTime, Utc};
use qxgen_merge::{CertificateLines, MergeReport};
use serde::{Deserialize, Serialize};

use super::status::{ExitCode, FailureKind, Status};

/// Schema version for the run summary
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for the run summary
pub const RUN_SUMMARY_SCHEMA_ID: &str = "qxgen/run_summary@1";

/// Characters of each certificate line shown in the summary
const CERTIFICATE_PREVIEW_CHARS: usize = 100;

/// First `max` characters of `line`, with `...` when cut.
pub fn preview(line: &str, max: usize) -> String {
    let mut chars = line.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the summary was created
    pub created_at: DateTime<Utc>,

    pub status: Status,

    /// Process exit code for this outcome
    pub exit_code: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Where the base document came from
    pub source: String,

    /// Output path
    pub output: String,

    /// Base document size in bytes
    pub original_bytes: usize,

    /// Generated document size in bytes
    pub final_bytes: usize,

    /// `final_bytes - original_bytes`
    pub delta_bytes: i64,

    /// What the merge did
    pub report: MergeReport,

    /// Certificate lines of the output, truncated
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_preview: Vec<String>,

    /// Backup files written by this run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backups: Vec<String>,

    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Summary of a run that produced a document.
    pub fn completed(
        status: Status,
        source: String,
        output: String,
        original: &str,
        generated: &str,
        report: MergeReport,
        certificate: Option<&CertificateLines>,
    ) -> Self {
        let certificate_preview = certificate
            .map(|c| {
                vec![
                    preview(&c.passphrase, CERTIFICATE_PREVIEW_CHARS),
                    preview(&c.p12, CERTIFICATE_PREVIEW_CHARS),
                ]
            })
            .unwrap_or_default();

        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            status,
            exit_code: ExitCode::Success.as_i32(),
            failure_kind: None,
            error: None,
            source,
            output,
            original_bytes: original.len(),
            final_bytes: generated.len(),
            delta_bytes: generated.len() as i64 - original.len() as i64,
            report,
            certificate_preview,
            backups: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Summary of a run skipped because nothing changed.
    pub fn unchanged(source: String, output: String, original: &str) -> Self {
        let mut summary = Self::completed(
            Status::Unchanged,
            source,
            output,
            original,
            "",
            MergeReport::default(),
            None,
        );
        summary.final_bytes = 0;
        summary.delta_bytes = 0;
        summary
    }

    /// Summary of an aborted run.
    pub fn failed(kind: FailureKind, error: String, source: String, output: String) -> Self {
        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            status: Status::Failed,
            exit_code: kind.exit_code().as_i32(),
            failure_kind: Some(kind),
            error: Some(error),
            source,
            output,
            original_bytes: 0,
            final_bytes: 0,
            delta_bytes: 0,
            report: MergeReport::default(),
            certificate_preview: Vec::new(),
            backups: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_backups(mut self, backups: Vec<String>) -> Self {
        self.backups = backups;
        self
    }

    /// Get the exit code as ExitCode enum
    pub fn exit_code_enum(&self) -> Option<ExitCode> {
        ExitCode::from_i32(self.exit_code)
    }

    /// Multi-line human-readable summary
    pub fn to_human(&self) -> String {
        let mut out = Vec::new();

        match self.status {
            Status::Generated => out.push(format!("Configuration generated: {}", self.output)),
            Status::DryRun => out.push(format!("Dry run, not written: {}", self.output)),
            Status::Unchanged => {
                out.push(format!("Configuration unchanged: {}", self.output));
                out.push(format!("  source: {}", self.source));
                return out.join("\n");
            }
            Status::Failed => {
                let kind = self
                    .failure_kind
                    .map(|k| k.description())
                    .unwrap_or("Run failed");
                out.push(format!("{} (exit {})", kind, self.exit_code));
                if let Some(error) = &self.error {
                    out.push(format!("  error: {}", error));
                }
                return out.join("\n");
            }
        }

        out.push(format!("  source: {}", self.source));
        out.push(format!("  original size: {} bytes", self.original_bytes));
        out.push(format!("  final size: {} bytes", self.final_bytes));
        out.push(format!("  delta: {:+} bytes", self.delta_bytes));

        let report = &self.report;
        let added: Vec<String> = report
            .lines_added
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(section, n)| format!("{} {}", n, section))
            .collect();
        if !added.is_empty() {
            out.push(format!("  added: {}", added.join(", ")));
        }
        if !report.policies_added.is_empty() {
            out.push(format!("  policies: {}", report.policies_added.join(", ")));
        }
        if !report.sections_injected.is_empty() {
            out.push(format!("  custom sections: {}", report.sections_injected.join(", ")));
        }
        for r in &report.replacements {
            out.push(format!("  replaced '{}' -> '{}' ({})", r.search, r.replace, r.count));
        }
        if !report.skipped.is_empty() {
            let codes: Vec<String> = report.skipped.iter().map(|s| s.to_code()).collect();
            out.push(format!("  skipped: {}", codes.join(", ")));
        }
        for line in &self.certificate_preview {
            out.push(format!("  certificate: {}", line));
        }
        for backup in &self.backups {
            out.push(format!("  backup: {}", backup));
        }

        out.join("\n")
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
