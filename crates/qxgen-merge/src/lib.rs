//! Section-aware merge engine for QuantumultX configuration documents.
//!
//! The engine parses a base document into named sections, merges a
//! personal override object into them with one strategy per section kind,
//! renders the sections back in canonical order and checks that the
//! certificate section is usable. It performs no I/O.

pub mod document;
pub mod merge;
pub mod overrides;
pub mod render;
pub mod report;
pub mod validate;

pub use document::{is_multi_line, is_valid_section_name, section_header, Document, Section};
pub use merge::{merge_document, merge_section, MergeOptions, MergeOutcome, CANONICAL_SECTIONS};
pub use overrides::{flatten_scalar, Certificate, CustomSection, ListKind, Overrides, Replacement};
pub use report::{CertificateOutcome, MergeReport, ReplacementCount, SkipReason};
pub use validate::{validate_mitm, CertificateLines, ValidationError};
