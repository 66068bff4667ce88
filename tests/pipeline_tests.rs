//! Pipeline tests
//!
//! Full runs against a temporary Qinglong-like layout with an in-memory
//! document source and a recording notifier.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde_json::json;
use tempfile::TempDir;

use qxgen::cache::DocumentCache;
use qxgen::config::Settings;
use qxgen::fetch::{DocumentSource, FetchError};
use qxgen::notify::{NotifyError, Notifier};
use qxgen::{ExitCode, Pipeline, RunOptions, RunSummary, Status};
use qxgen_merge::Overrides;

const BASE: &str = include_str!("fixtures/base.conf");

/// Serves a fixed document and counts fetches.
struct StaticSource {
    text: RefCell<String>,
    fetches: Rc<Cell<usize>>,
}

impl DocumentSource for StaticSource {
    fn describe(&self) -> String {
        "https://profiles.example.com/QuantumultX.conf".to_string()
    }

    fn fetch(&self) -> Result<String, FetchError> {
        self.fetches.set(self.fetches.get() + 1);
        let text = self.text.borrow().clone();
        if text.trim().is_empty() {
            return Err(FetchError::Empty(self.describe()));
        }
        Ok(text)
    }
}

/// Records every notified status.
struct Recorder(Rc<RefCell<Vec<Status>>>);

impl Notifier for Recorder {
    fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        self.0.borrow_mut().push(summary.status);
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    settings: Settings,
    fetches: Rc<Cell<usize>>,
    notified: Rc<RefCell<Vec<Status>>>,
}

impl Harness {
    fn new(extra: serde_json::Value) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let layer = json!({
            "header": true,
            "paths": {
                "output": root.join("config/QuantumultX.conf"),
                "backup_dir": root.join("config/backup"),
                "cache_file": root.join("config/qx_config_cache.json"),
                "log_file": ""
            }
        });
        let layer = qxgen::config::deep_merge(layer, extra);
        let settings = Settings::build(None, &[], Some(layer)).unwrap().settings;

        Self {
            dir,
            settings,
            fetches: Rc::new(Cell::new(0)),
            notified: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn run_with(&self, text: &str, overrides: &Overrides, options: RunOptions) -> RunSummary {
        let source = StaticSource {
            text: RefCell::new(text.to_string()),
            fetches: Rc::clone(&self.fetches),
        };
        let pipeline = Pipeline::new(
            &self.settings,
            Box::new(source),
            Box::new(Recorder(Rc::clone(&self.notified))),
        );
        pipeline.run(overrides, options)
    }

    fn output(&self) -> &Path {
        &self.settings.paths.output
    }

    fn backups(&self) -> Vec<String> {
        let dir = &self.settings.paths.backup_dir;
        if !dir.exists() {
            return Vec::new();
        }
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn personal() -> Overrides {
    serde_json::from_value(json!({
        "certificate": {"passphrase": "A24AB7DF", "p12": "TUlJTHV3SUJBekND"},
        "policies": ["static=Steam, proxy, direct"],
        "dns": ["server=1.1.1.1"]
    }))
    .unwrap()
}

// =============================================================================
// Successful runs
// =============================================================================

#[test]
fn test_first_run_generates_and_backs_up() {
    let h = Harness::new(json!({}));

    let summary = h.run_with(BASE, &personal(), RunOptions::default());

    assert_eq!(summary.status, Status::Generated);
    assert_eq!(summary.exit_code_enum(), Some(ExitCode::Success));
    assert_eq!(h.fetches.get(), 1);

    let written = fs::read_to_string(h.output()).unwrap();
    assert!(written.starts_with("# QuantumultX configuration generated by qxgen\n"));
    assert!(written.contains("# Source: https://profiles.example.com/QuantumultX.conf"));
    assert!(written.contains("passphrase = A24AB7DF\np12 = TUlJTHV3SUJBekND"));
    assert_eq!(summary.final_bytes, written.len());
    assert_eq!(summary.original_bytes, BASE.len());
    assert_eq!(summary.report.policies_added, vec!["Steam"]);

    let backups = h.backups();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].ends_with("_new.conf"));
    assert_eq!(*h.notified.borrow(), vec![Status::Generated]);
}

#[test]
fn test_second_run_is_unchanged_and_uses_cache() {
    let h = Harness::new(json!({}));
    h.run_with(BASE, &personal(), RunOptions::default());
    let first = fs::read_to_string(h.output()).unwrap();

    let summary = h.run_with(BASE, &personal(), RunOptions::default());

    assert_eq!(summary.status, Status::Unchanged);
    assert_eq!(summary.exit_code, 0);
    // Fresh cache: no second fetch
    assert_eq!(h.fetches.get(), 1);
    assert_eq!(fs::read_to_string(h.output()).unwrap(), first);
    assert_eq!(h.backups().len(), 1);
}

#[test]
fn test_changed_overrides_regenerate() {
    let h = Harness::new(json!({}));
    h.run_with(BASE, &personal(), RunOptions::default());

    let mut changed = personal();
    changed.dns.push(json!("server=9.9.9.9"));
    let summary = h.run_with(BASE, &changed, RunOptions::default());

    assert_eq!(summary.status, Status::Generated);
    assert!(fs::read_to_string(h.output()).unwrap().contains("server=9.9.9.9"));
    // _new, then _old + _new
    assert_eq!(h.backups().len(), 3);
    assert!(h.backups().iter().any(|n| n.ends_with("_old.conf")));
}

#[test]
fn test_force_and_refresh() {
    let h = Harness::new(json!({}));
    h.run_with(BASE, &personal(), RunOptions::default());

    let summary = h.run_with(
        BASE,
        &personal(),
        RunOptions {
            refresh: true,
            force: true,
            dry_run: false,
        },
    );

    assert_eq!(summary.status, Status::Generated);
    assert_eq!(h.fetches.get(), 2);
}

#[test]
fn test_dry_run_writes_nothing() {
    let h = Harness::new(json!({}));

    let summary = h.run_with(
        BASE,
        &personal(),
        RunOptions {
            dry_run: true,
            ..RunOptions::default()
        },
    );

    assert_eq!(summary.status, Status::DryRun);
    assert!(!h.output().exists());
    assert!(h.backups().is_empty());
    assert_eq!(summary.certificate_preview[0], "passphrase = A24AB7DF");
}

#[test]
fn test_header_disabled() {
    let h = Harness::new(json!({"header": false}));
    h.run_with(BASE, &personal(), RunOptions::default());
    assert!(fs::read_to_string(h.output()).unwrap().starts_with("[general]\n"));
}

#[test]
fn test_backup_retention() {
    let h = Harness::new(json!({"backup": {"keep": 2}}));
    for i in 0..3 {
        let mut o = personal();
        o.dns.push(json!(format!("server=10.0.0.{}", i)));
        h.run_with(BASE, &o, RunOptions::default());
    }
    assert_eq!(h.backups().len(), 2);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_validation_failure_keeps_previous_output() {
    let h = Harness::new(json!({}));
    h.run_with(BASE, &personal(), RunOptions::default());
    let before = fs::read_to_string(h.output()).unwrap();

    // No certificate: the [mitm] section cannot validate
    let mut no_cert = personal();
    no_cert.certificate = Default::default();
    let summary = h.run_with(
        BASE,
        &no_cert,
        RunOptions {
            force: true,
            ..RunOptions::default()
        },
    );

    assert_eq!(summary.status, Status::Failed);
    assert_eq!(summary.exit_code, 4);
    assert_eq!(fs::read_to_string(h.output()).unwrap(), before);
    assert_eq!(h.backups().len(), 1);
    assert_eq!(*h.notified.borrow(), vec![Status::Generated, Status::Failed]);
}

#[test]
fn test_empty_document_fails_with_fetch_code() {
    let h = Harness::new(json!({}));

    let summary = h.run_with("   \n", &personal(), RunOptions::default());

    assert_eq!(summary.status, Status::Failed);
    assert_eq!(summary.exit_code, 3);
    assert!(summary.error.unwrap().contains("empty"));
    assert!(!h.output().exists());
}

#[test]
fn test_stale_cache_is_refetched() {
    let h = Harness::new(json!({"fetch": {"cache_max_age_seconds": 0}}));
    h.run_with(BASE, &personal(), RunOptions::default());
    h.run_with(BASE, &personal(), RunOptions::default());
    assert_eq!(h.fetches.get(), 2);

    let cache = DocumentCache::new(&h.settings.paths.cache_file, h.settings.cache_max_age());
    let entry = cache.load().unwrap().unwrap();
    assert_eq!(entry.content, BASE);
    assert!(entry.processed.is_some());
    assert!(h.dir.path().join("config").exists());
}
