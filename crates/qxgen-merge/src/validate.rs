//! Output validation.
//!
//! The generated document must carry a usable MITM certificate before it
//! is persisted. A value starting with `[` means an override leaked
//! through as a list representation instead of a flat string.

use thiserror::Error;

use crate::document::section_header;
use crate::merge::certificate::{key_value, P12_KEY, PASSPHRASE_KEY};

/// Name of the section holding the certificate.
pub const MITM_SECTION: &str = "mitm";

/// Certificate validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("output has no [mitm] section")]
    MissingSection,

    #[error("output has more than one [mitm] section")]
    DuplicateSection,

    #[error("[mitm] section has no `{0}` line")]
    MissingKey(&'static str),

    #[error("`{key}` value starts with '[': {preview}")]
    BracketedValue { key: &'static str, preview: String },
}

/// Certificate lines found in a valid `[mitm]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateLines {
    pub passphrase: String,
    pub p12: String,
}

/// Check the `[mitm]` section of a rendered document.
///
/// Exactly one `[mitm]` header must exist. The section runs from its
/// header to the next header or end of text. Both certificate keys must
/// be present and neither value may start with `[`.
pub fn validate_mitm(text: &str) -> Result<CertificateLines, ValidationError> {
    let split = || text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    match split().filter(|l| section_header(l) == Some(MITM_SECTION)).count() {
        0 => return Err(ValidationError::MissingSection),
        1 => {}
        _ => return Err(ValidationError::DuplicateSection),
    }

    let mut lines = split().skip_while(|l| section_header(l) != Some(MITM_SECTION));
    lines.next();

    let mut passphrase: Option<&str> = None;
    let mut p12: Option<&str> = None;

    for line in lines {
        if section_header(line).is_some() {
            break;
        }
        let line = line.trim();
        if passphrase.is_none() && key_value(line, PASSPHRASE_KEY).is_some() {
            passphrase = Some(line);
        } else if p12.is_none() && key_value(line, P12_KEY).is_some() {
            p12 = Some(line);
        }
    }

    let passphrase = passphrase.ok_or(ValidationError::MissingKey(PASSPHRASE_KEY))?;
    let p12 = p12.ok_or(ValidationError::MissingKey(P12_KEY))?;

    for (key, line) in [(PASSPHRASE_KEY, passphrase), (P12_KEY, p12)] {
        if key_value(line, key).is_some_and(|v| v.starts_with('[')) {
            return Err(ValidationError::BracketedValue {
                key,
                preview: line.chars().take(50).collect(),
            });
        }
    }

    tracing::info!("MITM certificate format valid");
    Ok(CertificateLines {
        passphrase: passphrase.to_string(),
        p12: p12.to_string(),
    })
}
