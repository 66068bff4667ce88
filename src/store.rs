//! Persistence of the generated configuration
//!
//! Save order: back up the current file (`_old`), replace it atomically,
//! back up the new file (`_new`), prune. A failed backup is logged and
//! never blocks the save.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::backup::{BackupKind, BackupStore};

/// Errors for configuration persistence
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output path {0} has no parent directory")]
    NoParent(PathBuf),
}

/// Outcome of one save.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Backup of the replaced file, if there was one
    pub old_backup: Option<PathBuf>,
    /// Backup of the written file
    pub new_backup: Option<PathBuf>,
    /// Backups removed by retention
    pub pruned: usize,
}

/// Writes the output file with backups.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    output: PathBuf,
    backups: BackupStore,
}

impl ConfigStore {
    pub fn new(output: impl Into<PathBuf>, backups: BackupStore) -> Self {
        Self {
            output: output.into(),
            backups,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Current output content, if the file exists.
    pub fn current(&self) -> Option<String> {
        fs::read_to_string(&self.output).ok()
    }

    /// Persist `content` to the output path.
    pub fn save(&self, content: &str) -> Result<SaveReport, StoreError> {
        let mut report = SaveReport::default();

        if let Some(previous) = self.current() {
            match self.backups.write(&previous, BackupKind::Old) {
                Ok(path) => report.old_backup = Some(path),
                Err(e) => warn!(error = %e, "failed to back up current configuration"),
            }
        }

        write_atomic(&self.output, content)?;
        info!(path = %self.output.display(), bytes = content.len(), "configuration written");

        match self.backups.write(content, BackupKind::New) {
            Ok(path) => report.new_backup = Some(path),
            Err(e) => warn!(error = %e, "failed to back up new configuration"),
        }

        match self.backups.prune() {
            Ok(result) => report.pruned = result.deleted,
            Err(e) => warn!(error = %e, "backup retention failed"),
        }

        Ok(report)
    }
}

/// Write to file atomically (temp file in the same directory, then rename)
pub fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(StoreError::NoParent(path.to_path_buf())),
    };
    fs::create_dir_all(parent).map_err(write_err)?;

    let temp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
    if let Err(e) = fs::write(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    Ok(())
}
