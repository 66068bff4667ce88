//! Single-shot generation pipeline
//!
//! One run:
//! - Get the base document (fresh cache or fetch)
//! - Skip when the document and overrides match the last written run
//! - Merge overrides and render
//! - Validate the certificate section
//! - Persist with backups, record the fingerprint
//! - Summarize and notify
//!
//! The previous output is never touched unless the new document passed
//! validation.

use std::time::Instant;

use chrono::{DateTime, Local};
use qxgen_merge::{
    merge_document, validate_mitm, CertificateLines, Document, MergeOptions, MergeReport, Overrides,
    ValidationError,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backup::BackupStore;
use crate::cache::{CacheError, DocumentCache, Fingerprint};
use crate::config::{Settings, SettingsError};
use crate::fetch::{DocumentSource, FetchError, HttpSource};
use crate::loader::LoaderError;
use crate::notify::{NoopNotifier, Notifier, WebhookNotifier};
use crate::store::{ConfigStore, StoreError};
use crate::summary::{FailureKind, RunSummary, Status};

/// Name written into the generated header.
pub const GENERATOR_NAME: &str = "qxgen";

/// Errors that abort a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("overrides error: {0}")]
    Loader(#[from] LoaderError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl PipelineError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PipelineError::Settings(_) => FailureKind::Settings,
            PipelineError::Loader(_) => FailureKind::Loader,
            PipelineError::Fetch(_) => FailureKind::Fetch,
            PipelineError::Validation(_) => FailureKind::Validation,
            PipelineError::Store(_) | PipelineError::Cache(_) => FailureKind::Store,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind().exit_code().as_i32()
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Per-run switches
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Ignore a fresh cached document and fetch
    pub refresh: bool,
    /// Regenerate even when nothing changed
    pub force: bool,
    /// Merge and validate without writing
    pub dry_run: bool,
}

/// A validated generated document.
#[derive(Debug, Clone)]
pub struct Generated {
    pub text: String,
    pub report: MergeReport,
    pub certificate: CertificateLines,
}

/// Comment block placed before the first section.
pub fn build_preamble(source: &str, at: DateTime<Local>) -> String {
    format!(
        "# QuantumultX configuration generated by {}\n# Generated: {}\n# Source: {}",
        GENERATOR_NAME,
        at.format("%Y-%m-%d %H:%M:%S"),
        source
    )
}

/// Merge, render and validate. No I/O.
pub fn generate(base: &str, overrides: &Overrides, preamble: Option<String>) -> PipelineResult<Generated> {
    let doc = Document::parse(base);
    info!(sections = doc.len(), "base document parsed");

    let outcome = merge_document(&doc, overrides, &MergeOptions { preamble });
    for skipped in &outcome.report.skipped {
        debug!(reason = %skipped.to_code(), "override item skipped");
    }

    let certificate = validate_mitm(&outcome.text)?;
    info!("certificate section valid");

    Ok(Generated {
        text: outcome.text,
        report: outcome.report,
        certificate,
    })
}

/// Pipeline wired to its collaborators
pub struct Pipeline<'a> {
    settings: &'a Settings,
    source: Box<dyn DocumentSource + 'a>,
    cache: DocumentCache,
    store: ConfigStore,
    notifier: Box<dyn Notifier + 'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        source: Box<dyn DocumentSource + 'a>,
        notifier: Box<dyn Notifier + 'a>,
    ) -> Self {
        let cache = DocumentCache::new(&settings.paths.cache_file, settings.cache_max_age());
        let backups = BackupStore::new(&settings.paths.backup_dir, settings.backup.keep);
        let store = ConfigStore::new(&settings.paths.output, backups);
        Self {
            settings,
            source,
            cache,
            store,
            notifier,
        }
    }

    /// Pipeline with the HTTP source and the configured notifier.
    pub fn from_settings(settings: &'a Settings) -> Self {
        let source = HttpSource::new(
            &settings.remote_url,
            &settings.fetch.user_agent,
            settings.fetch_timeout(),
        );
        let notifier: Box<dyn Notifier> = match &settings.notify.url {
            Some(url) => Box::new(WebhookNotifier::new(url, settings.fetch_timeout())),
            None => Box::new(NoopNotifier),
        };
        Self::new(settings, Box::new(source), notifier)
    }

    /// Run once. Failures are folded into the summary.
    pub fn run(&self, overrides: &Overrides, options: RunOptions) -> RunSummary {
        let started = Instant::now();
        let summary = match self.execute(overrides, options) {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "run failed");
                RunSummary::failed(e.failure_kind(), e.to_string(), self.source.describe(), self.output())
            }
        };
        let summary = summary.with_duration_ms(started.elapsed().as_millis() as u64);

        if let Err(e) = self.notifier.notify(&summary) {
            warn!(error = %e, "notification failed");
        }
        summary
    }

    fn output(&self) -> String {
        self.store.output().display().to_string()
    }

    fn execute(&self, overrides: &Overrides, options: RunOptions) -> PipelineResult<RunSummary> {
        info!(
            source = %self.source.describe(),
            output = %self.output(),
            dry_run = options.dry_run,
            "run started"
        );

        let base = self.base_document(options.refresh)?;
        let fingerprint = Fingerprint::compute(&base, overrides)?;

        if !options.force && !options.dry_run {
            let regenerate = self
                .cache
                .should_regenerate(&fingerprint, self.store.output())
                .unwrap_or_else(|e| {
                    warn!(error = %e, "change detection unavailable, regenerating");
                    true
                });
            if !regenerate {
                info!("base document and overrides unchanged since last run, skipping");
                return Ok(RunSummary::unchanged(self.source.describe(), self.output(), &base));
            }
        }

        let preamble = self
            .settings
            .header
            .then(|| build_preamble(&self.source.describe(), Local::now()));
        let generated = generate(&base, overrides, preamble)?;

        if options.dry_run {
            info!(bytes = generated.text.len(), "dry run, output not written");
            return Ok(self.completed(Status::DryRun, &base, generated));
        }

        let saved = self.store.save(&generated.text)?;
        if let Err(e) = self.cache.mark_processed(&base, fingerprint) {
            warn!(error = %e, "failed to record processed fingerprint");
        }

        let backups = saved
            .old_backup
            .iter()
            .chain(saved.new_backup.iter())
            .map(|p| p.display().to_string())
            .collect();

        let summary = self.completed(Status::Generated, &base, generated).with_backups(backups);
        info!(
            original_bytes = summary.original_bytes,
            final_bytes = summary.final_bytes,
            delta_bytes = summary.delta_bytes,
            "configuration generated"
        );
        Ok(summary)
    }

    fn completed(&self, status: Status, base: &str, generated: Generated) -> RunSummary {
        RunSummary::completed(
            status,
            self.source.describe(),
            self.output(),
            base,
            &generated.text,
            generated.report,
            Some(&generated.certificate),
        )
    }

    /// Fresh cached document, or fetch and cache.
    fn base_document(&self, refresh: bool) -> PipelineResult<String> {
        if !refresh {
            match self.cache.fresh_content() {
                Ok(Some(content)) => return Ok(content),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "cache unreadable, fetching"),
            }
        }

        let content = self.source.fetch()?;
        if let Err(e) = self.cache.store_document(&content) {
            warn!(error = %e, "failed to cache base document");
        }
        Ok(content)
    }
}
