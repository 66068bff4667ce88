//! Append-with-dedup strategy for list-style sections.

use std::collections::HashSet;

use serde_json::Value;

use crate::document::is_multi_line;
use crate::report::{MergeReport, SkipReason};

/// Append candidate lines that are not already present in `body`.
///
/// Existing lines are compared by exact trimmed text; comments and blank
/// lines do not count. Candidates are appended in order and collapse
/// against each other as well. Non-string and multi-line candidates are
/// skipped.
pub fn append_unique(
    body: &str,
    candidates: &[Value],
    section: &str,
    report: &mut MergeReport,
) -> String {
    if candidates.is_empty() {
        return body.to_string();
    }

    let mut existing: HashSet<String> = body
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();

    let mut appended: Vec<String> = Vec::new();
    for candidate in candidates {
        let Some(text) = candidate.as_str() else {
            tracing::warn!(section, value = %candidate, "skipping non-string item");
            report.skip(SkipReason::NotAString {
                section: section.to_string(),
            });
            continue;
        };

        let line = text.trim();
        if line.is_empty() {
            continue;
        }
        if is_multi_line(line) {
            tracing::warn!(section, "skipping item that spans several lines");
            report.skip(SkipReason::MultiLine {
                section: section.to_string(),
            });
            continue;
        }
        if !existing.insert(line.to_string()) {
            tracing::debug!(section, line, "item already present");
            report.skip(SkipReason::DuplicateLine {
                section: section.to_string(),
                line: line.to_string(),
            });
            continue;
        }

        tracing::info!(section, item = %preview(line), "appending item");
        appended.push(line.to_string());
    }

    if appended.is_empty() {
        tracing::info!(section, "all items already present");
        return body.to_string();
    }

    *report.lines_added.entry(section.to_string()).or_default() += appended.len();

    if body.trim().is_empty() {
        appended.join("\n")
    } else {
        format!("{}\n{}", body.trim_end(), appended.join("\n"))
    }
}

/// First 100 characters of a line, for logging.
fn preview(line: &str) -> &str {
    match line.char_indices().nth(100) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(body: &str, candidates: Value) -> (String, MergeReport) {
        let mut report = MergeReport::default();
        let items = candidates.as_array().cloned().unwrap_or_default();
        let out = append_unique(body, &items, "rewrite_remote", &mut report);
        (out, report)
    }

    #[test]
    fn test_appends_new_items_in_order() {
        let (out, report) = run("a, tag=A", json!(["b, tag=B", "c, tag=C"]));
        assert_eq!(out, "a, tag=A\nb, tag=B\nc, tag=C");
        assert_eq!(report.lines_added["rewrite_remote"], 2);
    }

    #[test]
    fn test_existing_line_not_duplicated() {
        let (out, report) = run("a, tag=A\nb, tag=B", json!(["  b, tag=B  "]));
        assert_eq!(out, "a, tag=A\nb, tag=B");
        assert_eq!(report.total_lines_added(), 0);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_same_candidate_twice_appended_once() {
        let (out, _) = run("", json!(["x", "x"]));
        assert_eq!(out, "x");
    }

    #[test]
    fn test_commented_line_does_not_block_append() {
        let (out, _) = run("#x", json!(["x"]));
        assert_eq!(out, "#x\nx");
    }

    #[test]
    fn test_non_string_candidates_skipped() {
        let (out, report) = run("a", json!([1, {"k": "v"}, "b"]));
        assert_eq!(out, "a\nb");
        let non_strings = report
            .skipped
            .iter()
            .filter(|s| matches!(s, SkipReason::NotAString { .. }))
            .count();
        assert_eq!(non_strings, 2);
    }

    #[test]
    fn test_no_candidates_returns_body() {
        let (out, report) = run("a\n\n#c", json!([]));
        assert_eq!(out, "a\n\n#c");
        assert!(report.lines_added.is_empty());
    }

    #[test]
    fn test_empty_body_has_no_leading_blank() {
        let (out, _) = run("", json!(["first"]));
        assert_eq!(out, "first");
    }

    #[test]
    fn test_multi_line_candidates_skipped() {
        let (out, report) = run("x\ny", json!(["x\ny", "z\r\n[mitm]", "w"]));
        assert_eq!(out, "x\ny\nw");
        assert_eq!(report.lines_added["rewrite_remote"], 1);
        assert_eq!(
            report.skipped,
            vec![
                SkipReason::MultiLine {
                    section: "rewrite_remote".into()
                };
                2
            ]
        );
    }

    #[test]
    fn test_semantic_duplicates_still_appended() {
        // Comparison is textual, not by parsed rule
        let (out, _) = run("host, example.com, proxy", json!(["host,example.com,proxy"]));
        assert_eq!(out, "host, example.com, proxy\nhost,example.com,proxy");
    }
}
