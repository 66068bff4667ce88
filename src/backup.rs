//! Timestamped configuration backups and retention
//!
//! Backups are named `QuantumultX_<YYYYmmdd_HHMMSS><suffix>.conf`, where the
//! suffix is `_old` (the file about to be replaced) or `_new` (the file
//! just written). Retention is count-based and removes the oldest files
//! first.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

/// File name prefix of every backup
pub const BACKUP_PREFIX: &str = "QuantumultX_";

/// File name extension of every backup
pub const BACKUP_EXTENSION: &str = ".conf";

/// Which side of a save a backup captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    /// The file about to be replaced
    Old,
    /// The file just written
    New,
}

impl BackupKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            BackupKind::Old => "_old",
            BackupKind::New => "_new",
        }
    }
}

/// Backup file name for a point in time.
pub fn backup_file_name(at: DateTime<Local>, kind: BackupKind) -> String {
    format!(
        "{}{}{}{}",
        BACKUP_PREFIX,
        at.format("%Y%m%d_%H%M%S"),
        kind.suffix(),
        BACKUP_EXTENSION
    )
}

/// Whether a file name looks like one of our backups.
pub fn is_backup_file_name(name: &str) -> bool {
    name.starts_with(BACKUP_PREFIX)
        && name.ends_with(BACKUP_EXTENSION)
        && (name.contains(BackupKind::Old.suffix()) || name.contains(BackupKind::New.suffix()))
}

/// Result of a prune pass.
#[derive(Debug, Clone, Default)]
pub struct PruneResult {
    /// Backups found
    pub scanned: usize,
    /// Backups deleted
    pub deleted: usize,
    /// Bytes reclaimed
    pub bytes_reclaimed: u64,
    /// Errors encountered (non-fatal)
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
struct BackupInfo {
    path: PathBuf,
    name: String,
    modified: Option<SystemTime>,
    size_bytes: u64,
}

/// Backup directory with a retention limit.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    /// Backups to keep (0 = unlimited)
    keep: usize,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            dir: dir.into(),
            keep,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `content` into a new backup file and return its path.
    pub fn write(&self, content: &str, kind: BackupKind) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let mut path = self.dir.join(backup_file_name(Local::now(), kind));
        // Two saves within one second: keep both
        let mut n = 1;
        while path.exists() {
            let name = backup_file_name(Local::now(), kind);
            let stem = name.trim_end_matches(BACKUP_EXTENSION);
            path = self.dir.join(format!("{}.{}{}", stem, n, BACKUP_EXTENSION));
            n += 1;
        }

        fs::write(&path, content)?;
        info!(path = %path.display(), "backup written");
        Ok(path)
    }

    /// Delete the oldest backups beyond the retention limit.
    pub fn prune(&self) -> io::Result<PruneResult> {
        let mut result = PruneResult::default();

        if self.keep == 0 || !self.dir.exists() {
            return Ok(result);
        }

        let mut backups = self.collect_backups()?;
        result.scanned = backups.len();

        // Newest first; names carry the timestamp so they break ties
        backups.sort_by(|a, b| {
            let time_a = a.modified.unwrap_or(SystemTime::UNIX_EPOCH);
            let time_b = b.modified.unwrap_or(SystemTime::UNIX_EPOCH);
            time_b.cmp(&time_a).then_with(|| b.name.cmp(&a.name))
        });

        for backup in backups.iter().skip(self.keep) {
            match fs::remove_file(&backup.path) {
                Ok(_) => {
                    debug!(name = %backup.name, bytes = backup.size_bytes, "backup pruned");
                    result.deleted += 1;
                    result.bytes_reclaimed += backup.size_bytes;
                }
                Err(e) => {
                    warn!(name = %backup.name, error = %e, "failed to prune backup");
                    result.errors.push(format!("Failed to delete {}: {}", backup.name, e));
                }
            }
        }

        if result.deleted > 0 {
            info!(deleted = result.deleted, kept = self.keep, "old backups pruned");
        }

        Ok(result)
    }

    fn collect_backups(&self) -> io::Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            if !is_backup_file_name(&name) {
                continue;
            }

            let metadata = entry.metadata()?;
            backups.push(BackupInfo {
                path,
                name,
                modified: metadata.modified().ok(),
                size_bytes: metadata.len(),
            });
        }

        Ok(backups)
    }
}
