//! Local developer tools that can be pointed at r9s by rewriting their
//! config files.

mod backup;
mod claude_code;
mod document;
mod registry;

pub use backup::{BackupManager, BackupRecord, Clock, SystemClock};
pub use claude_code::ClaudeCode;
pub use document::JsonConfigStore;
pub use registry::ToolRegistry;

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Backup file does not exist: {}", .0.display())]
    BackupMissing(PathBuf),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ToolError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Static description of one integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolProfile {
    pub primary_name: String,
    /// Every name that resolves to this tool, including the primary one.
    pub aliases: Vec<String>,
    pub config_path: PathBuf,
    pub backup_dir: PathBuf,
}

/// Values written into a tool's config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfigSetResult {
    pub target_path: PathBuf,
    pub backup_path: Option<PathBuf>,
}

pub trait ToolIntegration: Send + Sync {
    fn profile(&self) -> &ToolProfile;

    fn backups(&self) -> &BackupManager;

    /// Back up the current config, then merge `settings` into it.
    fn set_config(&self, settings: &ToolSettings) -> Result<ToolConfigSetResult, ToolError>;

    /// Newest first.
    fn list_backups(&self) -> Result<Vec<BackupRecord>, ToolError> {
        self.backups().list()
    }

    /// Restore `backup` over the live config and return the config path.
    fn reset_config(&self, backup: &Path) -> Result<PathBuf, ToolError> {
        self.backups().restore(backup)
    }
}
