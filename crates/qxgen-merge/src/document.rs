//! Section parser.
//!
//! Splits a flat QuantumultX document into an ordered list of named
//! sections. The parser never fails: lines it cannot classify stay inside
//! the body of the section that owns them, and anything before the first
//! header is dropped.

use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[([^\]]+)\]$").expect("section header pattern"))
}

/// Return the section name if `line` is a bare `[name]` header.
///
/// Surrounding whitespace is ignored. Anything else on the line (a second
/// bracket pair, trailing text, an unterminated bracket) makes it ordinary
/// content.
pub fn section_header(line: &str) -> Option<&str> {
    header_re()
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Whether `name` renders as a header that parses back to the same name.
pub fn is_valid_section_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['[', ']', '\n', '\r'])
}

/// Whether `text` would be written out as more than one line.
pub fn is_multi_line(text: &str) -> bool {
    text.contains(['\n', '\r'])
}

/// A named block of a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Name between the brackets of the header line.
    pub name: String,

    /// Raw body text, without the header and without trailing blank lines.
    pub body: String,
}

/// Ordered sequence of sections with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    sections: Vec<Section>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document.
    ///
    /// A repeated header replaces the earlier body but keeps the position
    /// of the first occurrence.
    pub fn parse(text: &str) -> Self {
        let mut doc = Document::new();
        let mut current: Option<String> = None;
        let mut lines: Vec<&str> = Vec::new();

        for raw in text.split('\n') {
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if let Some(name) = section_header(line) {
                if let Some(prev) = current.take() {
                    doc.insert(prev, join_trimmed(&lines));
                }
                current = Some(name.to_string());
                lines.clear();
                continue;
            }

            // Free text before the first header is discarded
            if current.is_some() {
                lines.push(line);
            }
        }

        if let Some(last) = current {
            doc.insert(last, join_trimmed(&lines));
        }

        tracing::debug!(sections = ?doc.names().collect::<Vec<_>>(), "parsed document");
        doc
    }

    /// Insert or replace a section body.
    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        let name = name.into();
        let body = body.into();
        match self.sections.iter_mut().find(|s| s.name == name) {
            Some(existing) => {
                tracing::warn!(section = %name, "duplicate section header, keeping last body");
                existing.body = body;
            }
            None => self.sections.push(Section { name, body }),
        }
    }

    /// Body of the named section.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.body.as_str())
    }

    /// Whether a section with this name was parsed.
    pub fn contains(&self, name: &str) -> bool {
        self.sections.iter().any(|s| s.name == name)
    }

    /// Section names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// All sections in document order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Join body lines, dropping trailing blank lines.
fn join_trimmed(lines: &[&str]) -> String {
    let end = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}
