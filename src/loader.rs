//! Personal override loader
//!
//! Builds the [`Overrides`] record for one run from an optional TOML file
//! and the `QX_*` environment variables. The file is read first; the
//! environment is layered on top:
//! - certificate fields: overridden
//! - list keys: appended
//! - custom sections: overridden by name
//! - replacements: appended

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use qxgen_merge::{is_valid_section_name, ListKind, Overrides, Replacement};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::is_settings_env_key;

/// Prefix of every override variable.
pub const ENV_PREFIX: &str = "QX_";

const PASSPHRASE_KEY: &str = "mitm_passphrase";
const P12_KEY: &str = "mitm_p12";
const POLICIES_KEY: &str = "policies";
const SECTION_PREFIX: &str = "section_";
const REPLACE_PREFIX: &str = "replace_";

/// Errors for override loading
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("cannot read overrides file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("overrides file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Parse one environment value.
///
/// The value is trimmed; empty values yield `None`. A value wrapped in
/// `[]` or `{}` is decoded as JSON, keeping the raw string when it is not
/// valid JSON.
pub fn parse_env_value(raw: &str) -> Option<Value> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let bracketed = (value.starts_with('[') && value.ends_with(']'))
        || (value.starts_with('{') && value.ends_with('}'));
    if bracketed {
        match serde_json::from_str(value) {
            Ok(parsed) => return Some(parsed),
            Err(e) => debug!(error = %e, "value looks like JSON but does not parse, keeping raw"),
        }
    }

    Some(Value::String(value.to_string()))
}

/// Load overrides from an optional file plus environment variables.
pub fn load_overrides<I>(file: Option<&Path>, vars: I) -> Result<Overrides, LoaderError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides = match file {
        Some(path) => overrides_from_file(path)?,
        None => Overrides::default(),
    };

    apply_env(&mut overrides, vars);
    check_certificate(&overrides);

    info!(
        policies = overrides.policies.len(),
        custom_sections = overrides.custom_sections.len(),
        replacements = overrides.replacements.len(),
        "personal overrides loaded"
    );

    Ok(overrides)
}

/// Read a TOML overrides file using the [`Overrides`] field names.
pub fn overrides_from_file(path: &Path) -> Result<Overrides, LoaderError> {
    let contents = fs::read_to_string(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let value: Value = toml::from_str(&contents).map_err(|e| LoaderError::Parse {
        path: path.to_path_buf(),
        reason: format!("TOML parse error: {}", e),
    })?;

    let overrides: Overrides = serde_json::from_value(value).map_err(|e| LoaderError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!(path = %path.display(), "overrides file read");
    Ok(overrides)
}

/// Layer `QX_*` variables onto `overrides`.
///
/// Variables are applied in name order so custom sections keep a stable
/// order across runs. Settings variables and unknown keys are ignored.
pub fn apply_env<I>(overrides: &mut Overrides, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut vars: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX) && !is_settings_env_key(name))
        .collect();
    vars.sort();

    for (name, raw) in vars {
        let key = name[ENV_PREFIX.len()..].to_lowercase();
        let Some(value) = parse_env_value(&raw) else {
            continue;
        };
        apply_key(overrides, &key, value);
    }
}

fn apply_key(overrides: &mut Overrides, key: &str, value: Value) {
    if key == PASSPHRASE_KEY {
        info!(len = flat_len(&value), "certificate passphrase loaded");
        overrides.certificate.passphrase = value;
    } else if key == P12_KEY {
        info!(len = flat_len(&value), "certificate blob loaded");
        overrides.certificate.p12 = value;
    } else if key == POLICIES_KEY {
        extend(&mut overrides.policies, value);
    } else if let Some(kind) = ListKind::from_section(key) {
        extend(overrides.list_mut(kind), value);
    } else if let Some(name) = key.strip_prefix(SECTION_PREFIX) {
        if !is_valid_section_name(name) {
            warn!(key, "custom section variable has no usable name, ignored");
            return;
        }
        info!(section = name, "custom section loaded");
        overrides.set_custom_section(name, value);
    } else if key.starts_with(REPLACE_PREFIX) {
        match value {
            Value::Array(items) => overrides
                .replacements
                .extend(items.iter().map(Replacement::from_value)),
            other => overrides.replacements.push(Replacement::from_value(&other)),
        }
    } else {
        debug!(key, "unrecognized override variable ignored");
    }
}

fn extend(list: &mut Vec<Value>, value: Value) {
    match value {
        Value::Array(items) => list.extend(items),
        other => list.push(other),
    }
}

fn flat_len(value: &Value) -> usize {
    qxgen_merge::flatten_scalar(value).len()
}

/// Warn when the certificate blob is not standard base64. Never fatal.
fn check_certificate(overrides: &Overrides) {
    let p12 = overrides.certificate.p12();
    if p12.is_empty() {
        return;
    }
    if let Err(e) = base64::engine::general_purpose::STANDARD.decode(p12.as_bytes()) {
        warn!(error = %e, "certificate blob is not valid base64");
    }
}
