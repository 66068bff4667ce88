//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all run settings, matching the paths of a
//! Qinglong panel installation.

use serde::{Deserialize, Serialize};

/// Default shared profile to personalize.
pub const DEFAULT_REMOTE_URL: &str = "https://ddgksf2013.top/Profile/QuantumultX.conf";

/// Browser user agent sent with the fetch (some hosts reject unknown agents).
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Built-in default setting values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Generated configuration path
    pub output_path: String,

    /// Backup directory
    pub backup_dir: String,

    /// Cache file holding the last fetched document
    pub cache_file: String,

    /// Log file (in addition to stderr)
    pub log_file: String,

    /// Base document URL
    pub remote_url: String,

    /// Fetch timeout in seconds (default: 30)
    pub timeout_seconds: u64,

    /// Cached document lifetime in seconds (default: 86400 = 24 hours)
    pub cache_max_age_seconds: u64,

    /// User-Agent header for the fetch
    pub user_agent: String,

    /// Number of backups to keep (default: 0 = unlimited)
    pub backup_keep: usize,

    /// Write a generated-by comment header (default: true)
    pub header: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            output_path: "/ql/data/config/QuantumultX.conf".to_string(),
            backup_dir: "/ql/data/config/backup".to_string(),
            cache_file: "/ql/data/config/qx_config_cache.json".to_string(),
            log_file: "/ql/data/log/quantumultx_generator.log".to_string(),
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            timeout_seconds: 30,
            cache_max_age_seconds: 86_400,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            backup_keep: 0,
            header: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "remote_url": self.remote_url,
            "header": self.header,
            "paths": {
                "output": self.output_path,
                "backup_dir": self.backup_dir,
                "cache_file": self.cache_file,
                "log_file": self.log_file
            },
            "fetch": {
                "timeout_seconds": self.timeout_seconds,
                "cache_max_age_seconds": self.cache_max_age_seconds,
                "user_agent": self.user_agent
            },
            "backup": {
                "keep": self.backup_keep
            },
            "notify": {
                "url": null
            }
        })
    }
}
