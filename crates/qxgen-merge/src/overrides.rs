//! Personal override types.
//!
//! The override object is built once per run by the loader and only read
//! by the merge engine. List items and certificate fields keep their raw
//! JSON shape because upstream sources sometimes deliver a one-element
//! list where a string was meant; the engine normalizes or skips them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MITM certificate fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    /// Certificate pass-phrase.
    pub passphrase: Value,

    /// Base64-encoded PKCS#12 blob.
    pub p12: Value,
}

impl Certificate {
    /// Normalized pass-phrase.
    pub fn passphrase(&self) -> String {
        flatten_scalar(&self.passphrase)
    }

    /// Normalized certificate blob.
    pub fn p12(&self) -> String {
        flatten_scalar(&self.p12)
    }

    /// Both fields present after normalization.
    pub fn is_complete(&self) -> bool {
        !self.passphrase().is_empty() && !self.p12().is_empty()
    }
}

/// Sections that take the append-with-dedup strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    RewriteRemote,
    RewriteLocal,
    ServerRemote,
    Dns,
    FilterRemote,
    FilterLocal,
}

impl ListKind {
    /// All list kinds, in canonical section order.
    pub const ALL: [ListKind; 6] = [
        ListKind::RewriteLocal,
        ListKind::RewriteRemote,
        ListKind::ServerRemote,
        ListKind::Dns,
        ListKind::FilterRemote,
        ListKind::FilterLocal,
    ];

    /// Section name this list merges into.
    pub fn section(&self) -> &'static str {
        match self {
            ListKind::RewriteRemote => "rewrite_remote",
            ListKind::RewriteLocal => "rewrite_local",
            ListKind::ServerRemote => "server_remote",
            ListKind::Dns => "dns",
            ListKind::FilterRemote => "filter_remote",
            ListKind::FilterLocal => "filter_local",
        }
    }

    /// Look up the list kind for a section or override key.
    pub fn from_section(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.section() == name)
    }
}

/// A custom top-level section to inject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSection {
    /// Section name, without brackets.
    pub name: String,

    /// Either a string body or a list of lines.
    pub body: Value,
}

/// One global search/replace pair.
///
/// A pair with either side missing is skipped at render time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,
}

impl Replacement {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            replace: Some(replace.into()),
        }
    }

    /// Read a `{"search": .., "replace": ..}` record; other shapes yield an
    /// empty pair.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            search: field("search"),
            replace: field("replace"),
        }
    }
}

/// Typed personal override record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub certificate: Certificate,
    pub rewrite_remote: Vec<Value>,
    pub rewrite_local: Vec<Value>,
    pub server_remote: Vec<Value>,
    pub dns: Vec<Value>,
    pub filter_remote: Vec<Value>,
    pub filter_local: Vec<Value>,

    /// Policy-group declarations, each a single `static=` line.
    pub policies: Vec<Value>,

    /// Custom sections in injection order.
    pub custom_sections: Vec<CustomSection>,

    /// Global replacements in application order.
    pub replacements: Vec<Replacement>,
}

impl Overrides {
    /// Candidate lines for a list-style section.
    pub fn list(&self, kind: ListKind) -> &[Value] {
        match kind {
            ListKind::RewriteRemote => &self.rewrite_remote,
            ListKind::RewriteLocal => &self.rewrite_local,
            ListKind::ServerRemote => &self.server_remote,
            ListKind::Dns => &self.dns,
            ListKind::FilterRemote => &self.filter_remote,
            ListKind::FilterLocal => &self.filter_local,
        }
    }

    pub fn list_mut(&mut self, kind: ListKind) -> &mut Vec<Value> {
        match kind {
            ListKind::RewriteRemote => &mut self.rewrite_remote,
            ListKind::RewriteLocal => &mut self.rewrite_local,
            ListKind::ServerRemote => &mut self.server_remote,
            ListKind::Dns => &mut self.dns,
            ListKind::FilterRemote => &mut self.filter_remote,
            ListKind::FilterLocal => &mut self.filter_local,
        }
    }

    /// Set a custom section, replacing an earlier entry with the same name
    /// in place.
    pub fn set_custom_section(&mut self, name: impl Into<String>, body: Value) {
        let name = name.into();
        match self.custom_sections.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.body = body,
            None => self.custom_sections.push(CustomSection { name, body }),
        }
    }

    /// Whether nothing at all was supplied.
    pub fn is_empty(&self) -> bool {
        *self == Overrides::default()
    }
}

/// Coerce an override value to a flat, trimmed string.
///
/// Lists keep only their first element (recursively). A string that is
/// itself a bracketed JSON list is decoded first; if it cannot be decoded
/// its brackets and quotes are stripped, so the result never starts with
/// `[`.
pub fn flatten_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => flatten_text(s),
        Value::Array(items) => items.first().map(flatten_scalar).unwrap_or_default(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(_) => String::new(),
    }
}

fn flatten_text(s: &str) -> String {
    let trimmed = s.trim();
    if !trimmed.starts_with('[') {
        return trimmed.to_string();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items.first().map(flatten_scalar).unwrap_or_default(),
        _ => trimmed
            .trim_start_matches(|c: char| c == '[' || c == '"' || c == '\'' || c.is_whitespace())
            .trim_end_matches(|c: char| c == ']' || c == '"' || c == '\'' || c.is_whitespace())
            .to_string(),
    }
}
