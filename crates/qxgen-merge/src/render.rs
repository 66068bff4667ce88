//! Document serializer and global text replacement.

use serde_json::Value;

use crate::document::Section;
use crate::overrides::Replacement;
use crate::report::{MergeReport, ReplacementCount, SkipReason};

/// Render sections as `[name]`, body, blank separator.
///
/// An optional preamble (comment lines) is written before the first
/// section and followed by one blank line. Blank bodies produce a bare
/// header.
pub fn render_sections(preamble: Option<&str>, sections: &[Section]) -> String {
    let mut parts: Vec<&str> = Vec::new();

    if let Some(text) = preamble.map(str::trim_end).filter(|t| !t.is_empty()) {
        parts.push(text);
        parts.push("");
    }

    let headers: Vec<String> = sections.iter().map(|s| format!("[{}]", s.name)).collect();
    for (header, section) in headers.iter().zip(sections) {
        parts.push(header);
        if !section.body.trim().is_empty() {
            parts.push(&section.body);
        }
        parts.push("");
    }

    parts.join("\n")
}

/// Body text for an injected custom section.
///
/// Strings are used as is; lists of strings are joined by newlines with
/// non-string items dropped. Other shapes yield `None`.
pub fn custom_body(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Apply global search/replace pairs in order.
///
/// Each pair replaces every non-overlapping occurrence and records how
/// many it found. Pairs with a missing field or an empty search string are
/// skipped.
pub fn apply_replacements(
    text: String,
    replacements: &[Replacement],
    report: &mut MergeReport,
) -> String {
    let mut result = text;

    for (index, replacement) in replacements.iter().enumerate() {
        let (Some(search), Some(replace)) = (&replacement.search, &replacement.replace) else {
            tracing::warn!(index, "replacement missing search or replace, skipping");
            report.skip(SkipReason::IncompleteReplacement { index });
            continue;
        };
        if search.is_empty() {
            tracing::warn!(index, "replacement has empty search string, skipping");
            report.skip(SkipReason::EmptySearch { index });
            continue;
        }

        let count = result.matches(search.as_str()).count();
        if count > 0 {
            result = result.replace(search.as_str(), replace);
            tracing::info!(search = %search, replace = %replace, count, "applied global replacement");
        }
        report.replacements.push(ReplacementCount {
            search: search.clone(),
            replace: replace.clone(),
            count,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn section(name: &str, body: &str) -> Section {
        Section {
            name: name.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_render_layout() {
        let out = render_sections(
            None,
            &[section("general", "a=1"), section("dns", ""), section("mitm", "hostname = x")],
        );
        assert_eq!(out, "[general]\na=1\n\n[dns]\n\n[mitm]\nhostname = x\n");
    }

    #[test]
    fn test_render_whitespace_body_is_blank() {
        let out = render_sections(None, &[section("dns", "  \n ")]);
        assert_eq!(out, "[dns]\n");
    }

    #[test]
    fn test_render_preamble() {
        let out = render_sections(Some("# generated\n"), &[section("general", "a=1")]);
        assert_eq!(out, "# generated\n\n[general]\na=1\n");
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_sections(None, &[]), "");
    }

    #[test]
    fn test_custom_body_shapes() {
        assert_eq!(custom_body(&json!("x=1\ny=2")).as_deref(), Some("x=1\ny=2"));
        assert_eq!(custom_body(&json!(["x=1", 3, "y=2"])).as_deref(), Some("x=1\ny=2"));
        assert_eq!(custom_body(&json!({"x": 1})), None);
        assert_eq!(custom_body(&json!(42)), None);
    }

    #[test]
    fn test_replacement_counts_occurrences() {
        let mut report = MergeReport::default();
        let out = apply_replacements(
            "a OLDOLD b\nc OLDOLD d".to_string(),
            &[Replacement::new("OLD", "NEW")],
            &mut report,
        );
        assert_eq!(out, "a NEWNEW b\nc NEWNEW d");
        assert_eq!(report.replacements[0].count, 4);
    }

    #[test]
    fn test_replacements_apply_in_order() {
        let mut report = MergeReport::default();
        let out = apply_replacements(
            "alpha".to_string(),
            &[Replacement::new("alpha", "beta"), Replacement::new("beta", "gamma")],
            &mut report,
        );
        assert_eq!(out, "gamma");
        assert_eq!(report.replacements.len(), 2);
        assert_eq!(report.replacements[1].count, 1);
    }

    #[test]
    fn test_incomplete_and_empty_replacements_skipped() {
        let mut report = MergeReport::default();
        let pairs = [
            Replacement {
                search: Some("a".into()),
                replace: None,
            },
            Replacement::new("", "x"),
            Replacement::new("a", "b"),
        ];
        let out = apply_replacements("aaa".to_string(), &pairs, &mut report);
        assert_eq!(out, "bbb");
        assert_eq!(
            report.skipped,
            vec![
                SkipReason::IncompleteReplacement { index: 0 },
                SkipReason::EmptySearch { index: 1 },
            ]
        );
    }

    #[test]
    fn test_replacement_without_match_recorded_with_zero() {
        let mut report = MergeReport::default();
        let out = apply_replacements("abc".to_string(), &[Replacement::new("zzz", "y")], &mut report);
        assert_eq!(out, "abc");
        assert_eq!(report.replacements[0].count, 0);
    }
}
