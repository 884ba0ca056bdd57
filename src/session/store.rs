//! Session files under `~/.r9s/chat/`.

use super::{ChatSession, SessionMeta, now};
use crate::provider::{Message, Role};
use chrono::{DateTime, Local, Utc};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("History file is not valid JSON: {} ({message})", .path.display())]
    InvalidJson { path: PathBuf, message: String },

    #[error("History file must be a JSON array or session object: {}", .0.display())]
    InvalidShape(PathBuf),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Summary of a session for the resume menu.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub path: PathBuf,
    pub session_id: String,
    pub updated_at: DateTime<Utc>,
    pub model: String,
    pub base_url: String,
    pub preview: Option<String>,
}

impl SessionSummary {
    /// One menu line: file, update time, model, base URL and preview.
    #[must_use]
    pub fn display(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let or_unknown = |s: &str| if s.is_empty() { "?".to_string() } else { s.to_string() };
        let mut line = format!(
            "{name}  [{}]  {}  {}",
            self.updated_at.to_rfc3339(),
            or_unknown(&self.model),
            or_unknown(&self.base_url)
        );
        if let Some(preview) = &self.preview {
            line.push_str("  - ");
            line.push_str(preview);
        }
        line
    }
}

fn preview(text: &str) -> Option<String> {
    let flat = text.replace('\n', " ");
    if flat.trim().is_empty() {
        return None;
    }
    if flat.chars().count() > PREVIEW_CHARS {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        Some(format!("{cut}…"))
    } else {
        Some(flat)
    }
}

/// Directory of session files.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fresh `<YYYYMMDD_HHMMSS>_<8 hex>.json` path. The file is not created.
    #[must_use]
    pub fn default_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.dir.join(format!("{stamp}_{}.json", &suffix[..8]))
    }

    /// Saved sessions, most recently modified first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut files: Vec<(PathBuf, std::time::SystemTime)> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| {
                let modified = std::fs::metadata(&p).and_then(|m| m.modified()).ok()?;
                Some((p, modified))
            })
            .collect();
        files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        let summaries = files
            .into_iter()
            .filter_map(|(path, _)| match ChatSession::load(&path) {
                Ok(session) => Some(SessionSummary {
                    session_id: session.meta.session_id.clone(),
                    updated_at: session.meta.updated_at,
                    model: session.meta.model.clone(),
                    base_url: session.meta.base_url.clone(),
                    preview: session.last_user_message().and_then(preview),
                    path,
                }),
                Err(e) => {
                    tracing::warn!("Skipping unreadable session {}: {e}", path.display());
                    None
                }
            })
            .collect();
        Ok(summaries)
    }
}

impl ChatSession {
    /// Load a session file, accepting the legacy bare-array format.
    ///
    /// Messages with an unknown role or non-string content are dropped.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(path.display().to_string()));
            }
            Err(source) => {
                return Err(SessionError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let value: Value =
            serde_json::from_str(&content).map_err(|e| SessionError::InvalidJson {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match value {
            Value::Array(items) => {
                let created = now();
                Ok(Self {
                    meta: SessionMeta {
                        session_id: stem,
                        created_at: created,
                        updated_at: created,
                        base_url: String::new(),
                        model: String::new(),
                        system_prompt: None,
                    },
                    messages: coerce_messages(&items),
                })
            }
            Value::Object(obj) => {
                let messages = match obj.get("messages") {
                    None => Vec::new(),
                    Some(Value::Array(items)) => coerce_messages(items),
                    Some(_) => return Err(SessionError::InvalidShape(path.to_path_buf())),
                };
                let empty = serde_json::Map::new();
                let meta = obj.get("meta").and_then(Value::as_object).unwrap_or(&empty);
                Ok(Self {
                    meta: parse_meta(meta, stem),
                    messages,
                })
            }
            _ => Err(SessionError::InvalidShape(path.to_path_buf())),
        }
    }

    /// Write the session as pretty JSON, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        crate::atomic::write(path, &bytes).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn coerce_messages(items: &[Value]) -> Vec<Message> {
    items
        .iter()
        .filter_map(|item| {
            let role = Role::parse(item.get("role")?.as_str()?)?;
            let content = item.get("content")?.as_str()?;
            let timestamp = item
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_time);
            Some(Message {
                role,
                content: content.to_string(),
                timestamp,
            })
        })
        .collect()
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_meta(meta: &serde_json::Map<String, Value>, stem: String) -> SessionMeta {
    let text = |key: &str| {
        meta.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    let fallback = now();
    let created_at = text("created_at")
        .and_then(|s| parse_time(&s))
        .unwrap_or(fallback);
    SessionMeta {
        session_id: text("session_id").unwrap_or(stem),
        created_at,
        updated_at: text("updated_at")
            .and_then(|s| parse_time(&s))
            .unwrap_or(created_at),
        base_url: text("base_url").unwrap_or_default(),
        model: text("model").unwrap_or_default(),
        system_prompt: text("system_prompt"),
    }
}
