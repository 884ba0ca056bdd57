//! Timestamped copies of a tool's config file.

use super::ToolError;
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Second resolution; lexical order of the formatted value is chronological.
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const BACKUP_SUFFIX: &str = ".bak";

/// Source of backup timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub source_path: PathBuf,
    pub backup_path: PathBuf,
    pub timestamp: NaiveDateTime,
}

impl BackupRecord {
    #[must_use]
    pub fn file_name(&self) -> String {
        self.backup_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Copies `source` into `dir` as `<file name>.<timestamp>.bak` before every
/// overwrite. Backups are never pruned here.
#[derive(Clone)]
pub struct BackupManager {
    source: PathBuf,
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("source", &self.source)
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl BackupManager {
    pub fn new(source: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(source, dir, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source: source.into(),
            dir: dir.into(),
            clock,
        }
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn source_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string())
    }

    /// Snapshot the source file if it exists.
    ///
    /// A second backup within the same second overwrites the first.
    pub fn create_backup_if_exists(&self) -> Result<Option<BackupRecord>, ToolError> {
        if !self.source.is_file() {
            return Ok(None);
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| ToolError::io(&self.dir, e))?;

        let timestamp = self.clock.now();
        let backup_path = self.dir.join(format!(
            "{}.{}{BACKUP_SUFFIX}",
            self.source_name(),
            timestamp.format(TIMESTAMP_FORMAT)
        ));
        std::fs::copy(&self.source, &backup_path).map_err(|e| ToolError::io(&backup_path, e))?;
        tracing::debug!(backup = %backup_path.display(), "config backed up");

        Ok(Some(BackupRecord {
            source_path: self.source.clone(),
            backup_path,
            timestamp,
        }))
    }

    /// Backups of the source file, newest first.
    pub fn list(&self) -> Result<Vec<BackupRecord>, ToolError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ToolError::io(&self.dir, e)),
        };

        let prefix = format!("{}.", self.source_name());
        let mut records: Vec<BackupRecord> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let stamp = name.strip_prefix(&prefix)?.strip_suffix(BACKUP_SUFFIX)?;
                let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
                Some(BackupRecord {
                    source_path: self.source.clone(),
                    backup_path: entry.path(),
                    timestamp,
                })
            })
            .collect();

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Copy `backup` over the source file. Does not snapshot the file it replaces.
    pub fn restore(&self, backup: &Path) -> Result<PathBuf, ToolError> {
        let bytes = match std::fs::read(backup) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::BackupMissing(backup.to_path_buf()));
            }
            Err(e) => return Err(ToolError::io(backup, e)),
        };
        crate::atomic::write(&self.source, &bytes).map_err(|e| ToolError::io(&self.source, e))?;
        tracing::debug!(
            backup = %backup.display(),
            target = %self.source.display(),
            "config restored"
        );
        Ok(self.source.clone())
    }
}
