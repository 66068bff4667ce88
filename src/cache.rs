//! Document cache and change detection (qx_config_cache.json)
//!
//! The cache holds the last fetched base document with its fetch time and
//! SHA-256, plus the fingerprint of the last run that was written to disk.
//! A run whose fingerprint matches the stored one has nothing new to say.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use qxgen_merge::Overrides;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Schema version for the cache file
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "qxgen/cache@1";

/// Errors for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("cannot canonicalize overrides: {0}")]
    Canonical(String),
}

/// Hex SHA-256 of a string.
pub fn sha256_hex(content: &str) -> String {
    sha256_bytes(content.as_bytes())
}

fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Identity of one generation: base document plus overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// SHA-256 of the base document
    pub document: String,

    /// SHA-256 of the canonical JSON form of the overrides
    pub overrides: String,
}

impl Fingerprint {
    pub fn compute(document: &str, overrides: &Overrides) -> Result<Self, CacheError> {
        let jcs_bytes = serde_json_canonicalizer::to_vec(overrides)
            .map_err(|e| CacheError::Canonical(e.to_string()))?;
        Ok(Self {
            document: sha256_hex(document),
            overrides: sha256_bytes(&jcs_bytes),
        })
    }
}

/// On-disk cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// When the document was fetched
    pub timestamp: DateTime<Utc>,

    /// Fetched document text
    pub content: String,

    /// SHA-256 of `content`
    pub hash: String,

    /// Fingerprint of the last written output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<Fingerprint>,
}

impl CacheEntry {
    pub fn new(content: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            timestamp: Utc::now(),
            hash: sha256_hex(&content),
            content,
            processed: None,
        }
    }

    /// Whether the entry is younger than `max_age` at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        match age.to_std() {
            Ok(age) => age < max_age,
            // Timestamp in the future: clock moved, treat as stale
            Err(_) => false,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Cache file handle.
#[derive(Debug, Clone)]
pub struct DocumentCache {
    path: PathBuf,
    max_age: Duration,
}

impl DocumentCache {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache entry.
    ///
    /// A missing file is `Ok(None)`. A corrupt file is logged and treated
    /// as missing.
    pub fn load(&self) -> Result<Option<CacheEntry>, CacheError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match CacheEntry::from_json(&json) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file unreadable, ignoring");
                Ok(None)
            }
        }
    }

    /// Cached document when it is still fresh.
    pub fn fresh_content(&self) -> Result<Option<String>, CacheError> {
        let Some(entry) = self.load()? else {
            return Ok(None);
        };
        if entry.is_fresh_at(Utc::now(), self.max_age) && !entry.content.trim().is_empty() {
            info!(
                cached_at = %entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                "using cached base document"
            );
            return Ok(Some(entry.content));
        }
        debug!("cached base document is stale");
        Ok(None)
    }

    /// Store a freshly fetched document, keeping the processed fingerprint.
    pub fn store_document(&self, content: &str) -> Result<(), CacheError> {
        let processed = self.load()?.and_then(|e| e.processed);
        let mut entry = CacheEntry::new(content.to_string());
        entry.processed = processed;
        self.write(&entry)?;
        debug!(path = %self.path.display(), "base document cached");
        Ok(())
    }

    /// Record the fingerprint of a run whose output was written.
    pub fn mark_processed(&self, document: &str, fingerprint: Fingerprint) -> Result<(), CacheError> {
        let mut entry = match self.load()? {
            Some(entry) if entry.hash == sha256_hex(document) => entry,
            _ => CacheEntry::new(document.to_string()),
        };
        entry.processed = Some(fingerprint);
        self.write(&entry)
    }

    /// Whether a run with `fingerprint` must regenerate `output`.
    pub fn should_regenerate(&self, fingerprint: &Fingerprint, output: &Path) -> Result<bool, CacheError> {
        if !output.exists() {
            return Ok(true);
        }
        let previous = self.load()?.and_then(|e| e.processed);
        Ok(previous.as_ref() != Some(fingerprint))
    }

    /// Write atomically (write-then-rename)
    fn write(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let json = entry.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4()));
        let result = fs::write(&temp_path, &json).and_then(|()| fs::rename(&temp_path, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result.map_err(CacheError::from)
    }
}
