//! Certificate patch for the `[mitm]` section.

use crate::document::is_multi_line;
use crate::overrides::Certificate;
use crate::report::{CertificateOutcome, MergeReport, SkipReason};

/// Key holding the certificate pass-phrase.
pub const PASSPHRASE_KEY: &str = "passphrase";

/// Key holding the base64 PKCS#12 blob.
pub const P12_KEY: &str = "p12";

/// Key after which missing certificate lines are inserted.
pub const HOSTNAME_KEY: &str = "hostname";

/// Value of a `key = value` line, if the line starts with `key`.
///
/// Matches `^key\s*=` after leading whitespace; the returned value is
/// trimmed.
pub fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.trim_start()
        .strip_prefix(key)?
        .trim_start()
        .strip_prefix('=')
        .map(str::trim)
}

fn is_key_line(line: &str, key: &str) -> bool {
    key_value(line, key).is_some()
}

/// Write the override certificate into a `[mitm]` body.
///
/// Existing pass-phrase and blob lines are rewritten in place. Missing
/// ones go right after the first `hostname` line, pass-phrase first, or at
/// the end when there is no hostname line. If either field is empty or
/// spans several lines the body is returned unchanged.
pub fn patch_certificate(body: &str, cert: &Certificate, report: &mut MergeReport) -> String {
    let passphrase = cert.passphrase();
    let p12 = cert.p12();

    if passphrase.is_empty() || p12.is_empty() {
        if passphrase.is_empty() != p12.is_empty() {
            tracing::warn!("certificate override incomplete, leaving [mitm] untouched");
            report.skip(SkipReason::IncompleteCertificate);
        }
        return body.to_string();
    }
    if is_multi_line(&passphrase) || is_multi_line(&p12) {
        tracing::warn!("certificate override spans several lines, leaving [mitm] untouched");
        report.skip(SkipReason::MultiLine {
            section: "mitm".to_string(),
        });
        return body.to_string();
    }

    tracing::info!(
        passphrase_len = passphrase.len(),
        p12_len = p12.len(),
        "patching MITM certificate"
    );

    let passphrase_line = format!("{} = {}", PASSPHRASE_KEY, passphrase);
    let p12_line = format!("{} = {}", P12_KEY, p12);

    let mut lines: Vec<String> = if body.is_empty() {
        Vec::new()
    } else {
        body.split('\n').map(str::to_string).collect()
    };

    let mut has_passphrase = false;
    let mut has_p12 = false;
    let mut replaced = 0;

    for line in lines.iter_mut() {
        if is_key_line(line, PASSPHRASE_KEY) {
            *line = passphrase_line.clone();
            has_passphrase = true;
            replaced += 1;
        } else if is_key_line(line, P12_KEY) {
            *line = p12_line.clone();
            has_p12 = true;
            replaced += 1;
        }
    }

    let mut missing = Vec::new();
    if !has_passphrase {
        missing.push(passphrase_line);
    }
    if !has_p12 {
        missing.push(p12_line);
    }
    let inserted = missing.len();

    if !missing.is_empty() {
        match lines.iter().position(|l| is_key_line(l, HOSTNAME_KEY)) {
            Some(idx) => {
                lines.splice(idx + 1..idx + 1, missing);
            }
            None => lines.extend(missing),
        }
    }

    report.certificate = CertificateOutcome::Patched { replaced, inserted };
    lines.join("\n")
}
