//! Merge report types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Why an override item was not merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "detail")]
pub enum SkipReason {
    /// List item or policy is not a string.
    #[serde(rename = "NOT_A_STRING")]
    NotAString { section: String },

    /// Line already present in the section.
    #[serde(rename = "DUPLICATE_LINE")]
    DuplicateLine { section: String, line: String },

    /// Item spans more than one line.
    #[serde(rename = "MULTI_LINE")]
    MultiLine { section: String },

    /// Policy group with this name already exists.
    #[serde(rename = "DUPLICATE_POLICY")]
    DuplicatePolicy(String),

    /// Policy declaration does not have the `static=<name>,` shape.
    #[serde(rename = "MALFORMED_POLICY")]
    MalformedPolicy(String),

    /// Only one of the two certificate fields was supplied.
    #[serde(rename = "INCOMPLETE_CERTIFICATE")]
    IncompleteCertificate,

    /// Custom section name is already taken in the output.
    #[serde(rename = "SECTION_EXISTS")]
    SectionExists(String),

    /// Custom section name cannot be written as a `[name]` header.
    #[serde(rename = "INVALID_SECTION_NAME")]
    InvalidSectionName(String),

    /// Custom section body is neither a string nor a list of strings, or
    /// carries a section header of its own.
    #[serde(rename = "UNSUPPORTED_SECTION_BODY")]
    UnsupportedSectionBody(String),

    /// Replacement pair is missing its search or replace field.
    #[serde(rename = "INCOMPLETE_REPLACEMENT")]
    IncompleteReplacement { index: usize },

    /// Replacement pair has an empty search string.
    #[serde(rename = "EMPTY_SEARCH")]
    EmptySearch { index: usize },
}

impl SkipReason {
    /// Get a machine-readable string representation.
    pub fn to_code(&self) -> String {
        match self {
            SkipReason::NotAString { section } => format!("NOT_A_STRING:{}", section),
            SkipReason::DuplicateLine { section, .. } => format!("DUPLICATE_LINE:{}", section),
            SkipReason::MultiLine { section } => format!("MULTI_LINE:{}", section),
            SkipReason::DuplicatePolicy(name) => format!("DUPLICATE_POLICY:{}", name),
            SkipReason::MalformedPolicy(_) => "MALFORMED_POLICY".to_string(),
            SkipReason::IncompleteCertificate => "INCOMPLETE_CERTIFICATE".to_string(),
            SkipReason::SectionExists(name) => format!("SECTION_EXISTS:{}", name),
            SkipReason::InvalidSectionName(_) => "INVALID_SECTION_NAME".to_string(),
            SkipReason::UnsupportedSectionBody(name) => format!("UNSUPPORTED_SECTION_BODY:{}", name),
            SkipReason::IncompleteReplacement { index } => format!("INCOMPLETE_REPLACEMENT:{}", index),
            SkipReason::EmptySearch { index } => format!("EMPTY_SEARCH:{}", index),
        }
    }
}

/// What the certificate patch did.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CertificateOutcome {
    /// No complete certificate was supplied; body left as is.
    #[default]
    Unchanged,

    /// Key lines were rewritten and/or inserted.
    Patched { replaced: usize, inserted: usize },
}

/// Count of one applied global replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplacementCount {
    pub search: String,
    pub replace: String,
    pub count: usize,
}

/// Record of everything a merge changed or skipped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    /// Lines appended per list-style section.
    pub lines_added: BTreeMap<String, usize>,

    /// Names of inserted policy groups, in insertion order.
    pub policies_added: Vec<String>,

    /// Certificate patch result.
    pub certificate: CertificateOutcome,

    /// Names of injected custom sections.
    pub sections_injected: Vec<String>,

    /// Applied global replacements with their match counts.
    pub replacements: Vec<ReplacementCount>,

    /// Items that were not merged.
    pub skipped: Vec<SkipReason>,
}

impl MergeReport {
    pub fn skip(&mut self, reason: SkipReason) {
        self.skipped.push(reason);
    }

    /// Total number of list lines appended across sections.
    pub fn total_lines_added(&self) -> usize {
        self.lines_added.values().sum()
    }

    /// Whether the merge changed anything beyond reordering sections.
    pub fn has_changes(&self) -> bool {
        self.total_lines_added() > 0
            || !self.policies_added.is_empty()
            || self.certificate != CertificateOutcome::Unchanged
            || !self.sections_injected.is_empty()
            || self.replacements.iter().any(|r| r.count > 0)
    }
}
