//! Policy-group insertion for the `[policy]` section.
//!
//! New `static=` groups are placed in front of the existing run of static
//! groups. The run spans from the first to the last `static=` line; any
//! other content in between (comments, benchmark groups) is carried along
//! in its original position.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde_json::Value;

use crate::document::is_multi_line;
use crate::report::{MergeReport, SkipReason};

/// Line prefix of a static policy group.
pub const STATIC_MARKER: &str = "static=";

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^static=([^,]+),").expect("policy name pattern"))
}

/// Name of a `static=<name>,...` declaration.
pub fn policy_name(declaration: &str) -> Option<&str> {
    name_re()
        .captures(declaration.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|name| !name.is_empty())
}

fn is_static(line: &str) -> bool {
    line.trim_start().starts_with(STATIC_MARKER)
}

/// Insert new policy groups into a `[policy]` body.
///
/// Candidates must be single-line strings of the form `static=<name>,...`;
/// malformed ones and names already present are skipped. Returns the body unchanged
/// when nothing is accepted.
pub fn insert_policies(body: &str, candidates: &[Value], report: &mut MergeReport) -> String {
    if candidates.is_empty() {
        tracing::info!("no personal policy groups to add");
        return body.to_string();
    }

    let lines: Vec<&str> = if body.is_empty() {
        Vec::new()
    } else {
        body.split('\n').collect()
    };

    let first = lines.iter().position(|l| is_static(l));
    let last = lines.iter().rposition(|l| is_static(l));

    let mut names: HashSet<String> = lines
        .iter()
        .filter(|l| is_static(l))
        .filter_map(|l| policy_name(l))
        .map(str::to_string)
        .collect();

    tracing::debug!(existing = names.len(), candidates = candidates.len(), "merging policy groups");

    let mut accepted: Vec<&str> = Vec::new();
    for candidate in candidates {
        let Some(text) = candidate.as_str() else {
            tracing::warn!(value = %candidate, "skipping non-string policy group");
            report.skip(SkipReason::NotAString {
                section: "policy".to_string(),
            });
            continue;
        };
        let declaration = text.trim();

        if is_multi_line(declaration) {
            tracing::warn!("skipping policy group that spans several lines");
            report.skip(SkipReason::MultiLine {
                section: "policy".to_string(),
            });
            continue;
        }

        let Some(name) = policy_name(declaration) else {
            tracing::warn!(declaration, "malformed policy group");
            report.skip(SkipReason::MalformedPolicy(declaration.to_string()));
            continue;
        };

        if !names.insert(name.to_string()) {
            tracing::info!(name, "policy group already exists, skipping");
            report.skip(SkipReason::DuplicatePolicy(name.to_string()));
            continue;
        }

        tracing::info!(name, "adding policy group");
        report.policies_added.push(name.to_string());
        accepted.push(declaration);
    }

    if accepted.is_empty() {
        tracing::info!("no new policy groups to add");
        return body.to_string();
    }

    let (before, run, after): (&[&str], &[&str], &[&str]) = match (first, last) {
        (Some(f), Some(l)) => (&lines[..f], &lines[f..=l], &lines[l + 1..]),
        _ => (&[], &[], &lines[..]),
    };

    let rest_start = after
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(after.len());
    let rest = &after[rest_start..];

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + accepted.len() + 1);
    out.extend_from_slice(before);
    out.extend(accepted);
    out.extend_from_slice(run);
    if !rest.is_empty() {
        out.push("");
        out.extend_from_slice(rest);
    }

    out.join("\n")
}
