//! Run settings with provenance
//!
//! Settings are the single explicit configuration object of a run. They
//! are built once at startup from four layers and passed by reference to
//! every component:
//! 1. Built-in defaults
//! 2. Settings file (TOML, `--config`)
//! 3. `QX_*` environment variables
//! 4. CLI flags

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Environment variables read as settings, with their key path.
///
/// These names are reserved: the override loader ignores them.
pub const SETTINGS_ENV_KEYS: &[(&str, &str)] = &[
    ("QX_CONFIG_PATH", "paths.output"),
    ("QX_BACKUP_DIR", "paths.backup_dir"),
    ("QX_LOG_FILE", "paths.log_file"),
    ("QX_CACHE_FILE", "paths.cache_file"),
    ("QX_REMOTE_URL", "remote_url"),
    ("QX_TIMEOUT", "fetch.timeout_seconds"),
    ("QX_CACHE_MAX_AGE", "fetch.cache_max_age_seconds"),
    ("QX_BACKUP_KEEP", "backup.keep"),
    ("QX_NOTIFY_URL", "notify.url"),
    ("QX_HEADER", "header"),
];

/// Whether an environment variable name is a settings key.
pub fn is_settings_env_key(name: &str) -> bool {
    SETTINGS_ENV_KEYS.iter().any(|(k, _)| *k == name)
}

/// Origin of a settings layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    File,
    Env,
    Cli,
}

/// A contributing settings layer with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    /// Origin of this layer
    pub origin: SettingsOrigin,

    /// File path (settings file only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (settings file only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathSettings {
    /// Where the generated configuration is written
    pub output: PathBuf,

    /// Directory for timestamped backups
    pub backup_dir: PathBuf,

    /// Cached copy of the last fetched document
    pub cache_file: PathBuf,

    /// Log file; `None` or empty logs to stderr only
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// Fetch behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchSettings {
    pub timeout_seconds: u64,
    pub cache_max_age_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupSettings {
    /// Backups to keep, newest first (0 = unlimited)
    pub keep: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotifySettings {
    /// Webhook receiving a JSON run notification
    #[serde(default)]
    pub url: Option<String>,
}

/// Effective run settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Base document URL
    pub remote_url: String,

    /// Write a generated-by comment header
    pub header: bool,

    pub paths: PathSettings,
    pub fetch: FetchSettings,
    pub backup: BackupSettings,

    #[serde(default)]
    pub notify: NotifySettings,
}

/// Settings plus the layers they came from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub sources: Vec<SettingsSource>,
}

impl Settings {
    /// Build settings from all layers.
    ///
    /// `env` is the process environment as name/value pairs; only the
    /// names in [`SETTINGS_ENV_KEYS`] are read.
    pub fn build(
        file: Option<&Path>,
        env: &[(String, String)],
        cli_overrides: Option<Value>,
    ) -> Result<LoadedSettings, SettingsError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(SettingsSource {
                origin: SettingsOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        let env_layer = env_layer(env)?;
        if env_layer.as_object().is_some_and(|m| !m.is_empty()) {
            layers.push(env_layer);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Env,
                path: None,
                digest: None,
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let mut settings: Settings = serde_json::from_value(merged)
            .map_err(|e| SettingsError::Parse(format!("invalid settings: {}", e)))?;
        settings.normalize();
        settings.validate()?;

        Ok(LoadedSettings { settings, sources })
    }

    /// Treat empty optional strings as unset.
    fn normalize(&mut self) {
        if self
            .paths
            .log_file
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            self.paths.log_file = None;
        }
        if self.notify.url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            self.notify.url = None;
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if !(self.remote_url.starts_with("http://") || self.remote_url.starts_with("https://")) {
            return Err(SettingsError::Validation(format!(
                "remote_url must be an http(s) URL, got '{}'",
                self.remote_url
            )));
        }

        if self.fetch.timeout_seconds == 0 || self.fetch.timeout_seconds > 600 {
            return Err(SettingsError::Validation(
                "fetch.timeout_seconds must be in (0, 600]".to_string(),
            ));
        }

        if self.paths.output.as_os_str().is_empty() {
            return Err(SettingsError::Validation("paths.output must not be empty".to_string()));
        }

        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_seconds)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.fetch.cache_max_age_seconds)
    }

    /// JSON view with the webhook URL hidden, for logging.
    pub fn to_redacted_json(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(url) = value.pointer_mut("/notify/url") {
            if !url.is_null() {
                *url = Value::String("[REDACTED]".to_string());
            }
        }
        serde_json::to_string_pretty(&value)
    }
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), SettingsError> {
    let bytes = fs::read(path).map_err(|e| SettingsError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    let contents = String::from_utf8(bytes)
        .map_err(|e| SettingsError::Parse(format!("Invalid UTF-8: {}", e)))?;

    let value: Value = toml::from_str(&contents)
        .map_err(|e| SettingsError::Parse(format!("TOML parse error: {}", e)))?;

    Ok((value, digest))
}

/// Build the environment layer from `QX_*` settings variables.
fn env_layer(env: &[(String, String)]) -> Result<Value, SettingsError> {
    let mut layer = Value::Object(serde_json::Map::new());

    for (name, raw) in env {
        let Some((_, path)) = SETTINGS_ENV_KEYS.iter().find(|(k, _)| k == name) else {
            continue;
        };
        let raw = raw.trim();
        let value = match *path {
            "fetch.timeout_seconds" | "fetch.cache_max_age_seconds" | "backup.keep" => {
                let n: u64 = raw.parse().map_err(|_| SettingsError::Env {
                    name: name.clone(),
                    reason: format!("expected a non-negative integer, got '{}'", raw),
                })?;
                Value::from(n)
            }
            "header" => Value::Bool(parse_bool(raw).ok_or_else(|| SettingsError::Env {
                name: name.clone(),
                reason: format!("expected true/false, got '{}'", raw),
            })?),
            _ => Value::String(raw.to_string()),
        };
        set_path(&mut layer, path, value);
    }

    Ok(layer)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Set a dot-separated key path inside a JSON object, creating tables.
pub(crate) fn set_path(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("environment variable {name}: {reason}")]
    Env { name: String, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),
}
