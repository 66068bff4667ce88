//! Per-section merge strategies and the document-level merge.

pub mod certificate;
pub mod lines;
pub mod policy;

use crate::document::{is_valid_section_name, section_header, Document, Section};
use crate::overrides::{ListKind, Overrides};
use crate::render::{apply_replacements, custom_body, render_sections};
use crate::report::{MergeReport, SkipReason};

/// Known sections, in the order they are always emitted.
pub const CANONICAL_SECTIONS: [&str; 12] = [
    "general",
    "task_local",
    "rewrite_local",
    "rewrite_remote",
    "server_local",
    "server_remote",
    "dns",
    "policy",
    "filter_remote",
    "filter_local",
    "http_backend",
    "mitm",
];

/// Whether `name` is one of the canonical sections.
pub fn is_canonical(name: &str) -> bool {
    CANONICAL_SECTIONS.contains(&name)
}

/// Options for rendering the merged document.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Comment block written before the first section.
    pub preamble: Option<String>,
}

/// Merged document text plus what changed.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub text: String,
    pub report: MergeReport,
}

/// Apply the strategy for one canonical section.
pub fn merge_section(name: &str, body: &str, overrides: &Overrides, report: &mut MergeReport) -> String {
    if let Some(kind) = ListKind::from_section(name) {
        return lines::append_unique(body, overrides.list(kind), name, report);
    }
    match name {
        "policy" => policy::insert_policies(body, &overrides.policies, report),
        "mitm" => certificate::patch_certificate(body, &overrides.certificate, report),
        _ => body.to_string(),
    }
}

/// Merge overrides into a parsed document and render the result.
///
/// Output order: canonical sections (always present), other input
/// sections sorted by name, then injected custom sections. Global
/// replacements run over the fully rendered text.
pub fn merge_document(doc: &Document, overrides: &Overrides, options: &MergeOptions) -> MergeOutcome {
    let mut report = MergeReport::default();
    let mut sections: Vec<Section> = Vec::with_capacity(doc.len() + CANONICAL_SECTIONS.len());

    for name in CANONICAL_SECTIONS {
        let body = doc.get(name).unwrap_or("");
        tracing::debug!(section = name, "merging section");
        sections.push(Section {
            name: name.to_string(),
            body: merge_section(name, body, overrides, &mut report),
        });
    }

    let mut extra: Vec<&Section> = doc
        .sections()
        .iter()
        .filter(|s| !is_canonical(&s.name))
        .collect();
    extra.sort_by(|a, b| a.name.cmp(&b.name));
    sections.extend(extra.into_iter().cloned());

    for custom in &overrides.custom_sections {
        if !is_valid_section_name(&custom.name) {
            tracing::warn!(section = ?custom.name, "invalid custom section name, skipping");
            report.skip(SkipReason::InvalidSectionName(custom.name.clone()));
            continue;
        }
        if sections.iter().any(|s| s.name == custom.name) {
            tracing::warn!(section = %custom.name, "custom section name already in use, skipping");
            report.skip(SkipReason::SectionExists(custom.name.clone()));
            continue;
        }
        let Some(body) = custom_body(&custom.body)
            .filter(|b| b.split('\n').all(|l| section_header(l).is_none()))
        else {
            tracing::warn!(section = %custom.name, "unsupported custom section body");
            report.skip(SkipReason::UnsupportedSectionBody(custom.name.clone()));
            continue;
        };
        tracing::info!(section = %custom.name, "injecting custom section");
        report.sections_injected.push(custom.name.clone());
        sections.push(Section {
            name: custom.name.clone(),
            body,
        });
    }

    let rendered = render_sections(options.preamble.as_deref(), &sections);
    let text = apply_replacements(rendered, &overrides.replacements, &mut report);

    tracing::info!(bytes = text.len(), sections = sections.len(), "merged document rendered");
    MergeOutcome { text, report }
}
