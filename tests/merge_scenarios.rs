//! Merge scenario tests
//!
//! End-to-end merges of a realistic shared profile (tests/fixtures/base.conf)
//! with personal overrides, checked against the rendered text.

use serde_json::json;

use qxgen::loader::apply_env;
use qxgen_merge::{
    merge_document, validate_mitm, CertificateOutcome, Document, MergeOptions, Overrides,
    Replacement, SkipReason, ValidationError, CANONICAL_SECTIONS,
};

const BASE: &str = include_str!("fixtures/base.conf");

fn merge(base: &str, overrides: &Overrides) -> qxgen_merge::MergeOutcome {
    merge_document(&Document::parse(base), overrides, &MergeOptions::default())
}

fn overrides(value: serde_json::Value) -> Overrides {
    serde_json::from_value(value).unwrap()
}

fn section_body(text: &str, name: &str) -> String {
    Document::parse(text).get(name).unwrap_or("").to_string()
}

fn headers(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(qxgen_merge::section_header)
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Parser round trip
// =============================================================================

#[test]
fn test_reserialize_without_overrides_keeps_section_contents() {
    let original = Document::parse(BASE);
    let out = merge(BASE, &Overrides::default());
    let reparsed = Document::parse(&out.text);

    for section in original.sections() {
        assert_eq!(
            reparsed.get(&section.name).map(str::trim),
            Some(section.body.trim()),
            "section [{}] changed",
            section.name
        );
    }
    assert!(!out.report.has_changes());
}

#[test]
fn test_fixture_header_is_dropped() {
    let out = merge(BASE, &Overrides::default());
    assert!(out.text.starts_with("[general]\n"));
    assert!(!out.text.contains("Shared profile header"));
}

// =============================================================================
// Section ordering
// =============================================================================

#[test]
fn test_canonical_then_original_then_custom_order() {
    let base = format!("{}\n[zz_custom]\nz=1\n[aa_custom]\na=1\n", BASE);
    let mut o = Overrides::default();
    o.set_custom_section("injected", json!(["k=v"]));

    let out = merge(&base, &o);
    let names = headers(&out.text);

    let canonical: Vec<String> = CANONICAL_SECTIONS.iter().map(|s| s.to_string()).collect();
    assert_eq!(&names[..12], canonical.as_slice());
    assert_eq!(&names[12..], &["aa_custom", "zz_custom", "injected"]);
    assert_eq!(out.report.sections_injected, vec!["injected"]);
}

#[test]
fn test_custom_section_collisions_are_reported() {
    let mut o = Overrides::default();
    o.set_custom_section("mitm", json!("hostname = x"));
    o.set_custom_section("weird", json!({"not": "supported"}));

    let out = merge(BASE, &o);

    assert_eq!(headers(&out.text).iter().filter(|n| *n == "mitm").count(), 1);
    assert!(out.report.skipped.contains(&SkipReason::SectionExists("mitm".to_string())));
    assert!(out
        .report
        .skipped
        .contains(&SkipReason::UnsupportedSectionBody("weird".to_string())));
}

// =============================================================================
// List sections
// =============================================================================

#[test]
fn test_list_append_is_deduplicated() {
    let o = overrides(json!({
        "dns": ["server=8.8.8.8", "server=8.8.8.8", "  server=223.5.5.5  "],
        "rewrite_remote": ["https://example.com/rewrite/Mine.conf, tag=Mine, enabled=true"]
    }));

    let out = merge(BASE, &o);
    let dns = section_body(&out.text, "dns");

    assert_eq!(dns.matches("server=8.8.8.8").count(), 1);
    assert_eq!(dns.matches("server=223.5.5.5").count(), 1);
    assert!(dns.ends_with("server=8.8.8.8"));
    assert_eq!(out.report.lines_added.get("dns"), Some(&1));
    assert_eq!(out.report.lines_added.get("rewrite_remote"), Some(&1));
}

#[test]
fn test_list_append_into_empty_section_has_no_leading_blank() {
    let o = overrides(json!({"rewrite_local": ["^https://ads.example.com url reject"]}));
    let out = merge(BASE, &o);
    assert!(out
        .text
        .contains("[rewrite_local]\n^https://ads.example.com url reject\n"));
}

#[test]
fn test_non_string_list_items_are_skipped() {
    let o = overrides(json!({"filter_local": [42, "host, example.org, direct"]}));
    let out = merge(BASE, &o);
    assert!(section_body(&out.text, "filter_local").ends_with("host, example.org, direct"));
    assert!(out.report.skipped.contains(&SkipReason::NotAString {
        section: "filter_local".to_string()
    }));
}

#[test]
fn test_list_item_cannot_smuggle_a_section() {
    let base = "[dns]\nserver=1.1.1.1\n[mitm]\nhostname = *.example.com";
    let o = overrides(json!({"dns": ["server=8.8.8.8\n[mitm]\npassphrase = A\np12 = B"]}));

    let out = merge(base, &o);

    assert_eq!(headers(&out.text).iter().filter(|n| *n == "mitm").count(), 1);
    assert_eq!(section_body(&out.text, "dns"), "server=1.1.1.1");
    assert_eq!(section_body(&out.text, "mitm"), "hostname = *.example.com");
    assert!(out.report.skipped.contains(&SkipReason::MultiLine {
        section: "dns".to_string()
    }));
    assert_eq!(
        validate_mitm(&out.text),
        Err(ValidationError::MissingKey("passphrase"))
    );
}

// =============================================================================
// Policy groups
// =============================================================================

#[test]
fn test_policy_scenario() {
    let base = "[policy]\nstatic=A,direct\n#comment\nurl-latency-benchmark=B,direct";
    let o = overrides(json!({"policies": ["static=C,direct"]}));

    let out = merge(base, &o);

    assert_eq!(
        section_body(&out.text, "policy"),
        "static=C,direct\nstatic=A,direct\n\n#comment\nurl-latency-benchmark=B,direct"
    );
    assert_eq!(out.report.policies_added, vec!["C"]);
}

#[test]
fn test_policy_duplicates_never_inserted() {
    let o = overrides(json!({"policies": [
        "static=AiInOne, proxy, direct",
        "static=Steam, proxy, direct",
        "static=Steam, direct",
        "not a policy"
    ]}));

    let out = merge(BASE, &o);
    let policy = section_body(&out.text, "policy");

    assert_eq!(policy.matches("static=AiInOne").count(), 1);
    assert_eq!(policy.matches("static=Steam").count(), 1);
    assert!(policy.starts_with("static=Steam, proxy, direct\nstatic=AiInOne"));
    assert_eq!(out.report.policies_added, vec!["Steam"]);
    assert_eq!(out.report.skipped.len(), 3);
}

// =============================================================================
// Certificate
// =============================================================================

#[test]
fn test_certificate_scenario() {
    let base = "[mitm]\nhostname = *.example.com";
    let o = overrides(json!({"certificate": {"passphrase": "ABCD", "p12": "BASE64BLOB"}}));

    let out = merge(base, &o);

    assert_eq!(
        section_body(&out.text, "mitm"),
        "hostname = *.example.com\npassphrase = ABCD\np12 = BASE64BLOB"
    );
    assert_eq!(
        out.report.certificate,
        CertificateOutcome::Patched {
            replaced: 0,
            inserted: 2
        }
    );
}

#[test]
fn test_certificate_identity_when_incomplete() {
    for cert in [
        json!({"passphrase": "ABCD"}),
        json!({"p12": "BLOB"}),
        json!({"passphrase": "", "p12": []}),
        json!({}),
    ] {
        let o = overrides(json!({ "certificate": cert }));
        let out = merge(BASE, &o);
        assert_eq!(
            section_body(&out.text, "mitm"),
            Document::parse(BASE).get("mitm").unwrap_or("")
        );
        assert_eq!(out.report.certificate, CertificateOutcome::Unchanged);
    }
}

#[test]
fn test_certificate_values_never_bracketed() {
    let shapes = [
        json!("ABCD"),
        json!(["ABCD"]),
        json!([["ABCD"]]),
        json!("[\"ABCD\"]"),
        json!("['ABCD']"),
        json!("[ABCD"),
        json!(["[\"ABCD\"]", "other"]),
    ];

    for passphrase in &shapes {
        for p12 in &shapes {
            let o = overrides(json!({"certificate": {"passphrase": passphrase, "p12": p12}}));
            let out = merge(BASE, &o);
            let lines = validate_mitm(&out.text).unwrap();
            assert_eq!(lines.passphrase, "passphrase = ABCD");
            assert_eq!(lines.p12, "p12 = ABCD");
        }
    }
}

#[test]
fn test_existing_certificate_lines_replaced_in_place() {
    let base = "[mitm]\npassphrase = OLD\nhostname = *.a.com\np12 = OLDBLOB\nskip_validating_cert = true";
    let o = overrides(json!({"certificate": {"passphrase": "NEW", "p12": "NEWBLOB"}}));

    let out = merge(base, &o);

    assert_eq!(
        section_body(&out.text, "mitm"),
        "passphrase = NEW\nhostname = *.a.com\np12 = NEWBLOB\nskip_validating_cert = true"
    );
}

// =============================================================================
// Global replacements
// =============================================================================

#[test]
fn test_replacement_counts_occurrences() {
    let base = "[general]\nkey=OLDOLD\n";
    let mut o = Overrides::default();
    o.replacements.push(Replacement::new("OLD", "NEW"));

    let out = merge(base, &o);

    assert!(out.text.contains("key=NEWNEW"));
    assert!(!out.text.contains("OLD"));
    assert_eq!(out.report.replacements[0].count, 2);
}

#[test]
fn test_replacements_apply_in_order_and_skip_incomplete() {
    let mut o = Overrides::default();
    o.replacements.push(Replacement::new("proxy", "PROXY"));
    o.replacements.push(Replacement {
        search: Some("direct".to_string()),
        replace: None,
    });
    o.replacements.push(Replacement::new("", "x"));
    o.replacements.push(Replacement::new("PROXY", "Proxy"));

    let out = merge(BASE, &o);

    assert!(!out.text.contains("proxy"));
    assert!(out.text.contains("static=AiInOne, Proxy, direct"));
    assert_eq!(out.report.replacements.len(), 2);
    assert_eq!(out.report.replacements[0].count, out.report.replacements[1].count);
    assert!(out.report.skipped.contains(&SkipReason::IncompleteReplacement { index: 1 }));
    assert!(out.report.skipped.contains(&SkipReason::EmptySearch { index: 2 }));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_validation_failures() {
    assert_eq!(
        validate_mitm("[general]\na=1\n"),
        Err(ValidationError::MissingSection)
    );

    let out = merge(BASE, &Overrides::default());
    assert!(matches!(
        validate_mitm(&out.text),
        Err(ValidationError::MissingKey(_))
    ));

    let bad = "[mitm]\npassphrase = [\"ABCD\"]\np12 = BLOB\n";
    assert!(matches!(
        validate_mitm(bad),
        Err(ValidationError::BracketedValue { key: "passphrase", .. })
    ));
}

// =============================================================================
// Environment to rendered output
// =============================================================================

#[test]
fn test_environment_overrides_end_to_end() {
    let vars = vec![
        ("QX_MITM_PASSPHRASE".to_string(), "A24AB7DF".to_string()),
        ("QX_MITM_P12".to_string(), "[\"TUlJTHV3SUJBekND\"]".to_string()),
        ("QX_POLICIES".to_string(), "[\"static=Steam, proxy, direct\"]".to_string()),
        ("QX_DNS".to_string(), "server=1.1.1.1".to_string()),
        ("QX_SECTION_EXTRA".to_string(), "[\"a=1\",\"b=2\"]".to_string()),
        (
            "QX_REPLACE_ICONS".to_string(),
            "{\"search\":\"example.com/icons\",\"replace\":\"cdn.example.net/icons\"}".to_string(),
        ),
    ];
    let mut o = Overrides::default();
    apply_env(&mut o, vars);

    let out = merge(BASE, &o);
    let lines = validate_mitm(&out.text).unwrap();

    assert_eq!(lines.passphrase, "passphrase = A24AB7DF");
    assert_eq!(lines.p12, "p12 = TUlJTHV3SUJBekND");
    assert!(section_body(&out.text, "policy").starts_with("static=Steam, proxy, direct"));
    assert!(section_body(&out.text, "dns").ends_with("server=1.1.1.1"));
    assert_eq!(section_body(&out.text, "extra"), "a=1\nb=2");
    assert!(out.text.contains("img-url=https://cdn.example.net/icons/global.png"));
    assert_eq!(out.report.replacements[0].count, 1);
}
