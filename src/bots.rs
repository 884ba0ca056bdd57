//! Saved chat presets (`~/.r9s/bots/<name>.json`).

use crate::config::BotLayer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("Bot name cannot be empty")]
    EmptyName,

    #[error("Invalid bot name '{0}': use letters, digits, '-', '_' or '.'")]
    InvalidName(String),

    #[error("Bot not found: {0}")]
    NotFound(String),

    #[error("Invalid bot config {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize bot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub name: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

impl Bot {
    pub fn layer(&self) -> BotLayer<'_> {
        BotLayer {
            base_url: self.base_url.as_deref(),
            model: Some(&self.model),
            system_prompt: self.system_prompt.as_deref(),
            system_prompt_file: self.system_prompt_file.as_deref(),
            lang: self.lang.as_deref(),
            extensions: &self.extensions,
        }
    }

    /// Build from a loosely-typed document. Fields of the wrong type are
    /// ignored; a missing model is an error.
    fn from_value(value: &Value, fallback_name: &str, path: &Path) -> Result<Self, BotError> {
        let Some(obj) = value.as_object() else {
            return Err(BotError::Invalid {
                path: path.to_path_buf(),
                reason: "expected a JSON object".into(),
            });
        };
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(String::from)
        };
        let trimmed = |key: &str| text(key).map(|s| s.trim().to_string());

        let model = trimmed("model").ok_or_else(|| BotError::Invalid {
            path: path.to_path_buf(),
            reason: "missing 'model'".into(),
        })?;
        let extensions = obj
            .get("extensions")
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .map(|v| v.as_str().map(String::from))
                    .collect::<Option<Vec<_>>>()
            })
            .unwrap_or_default();

        Ok(Self {
            name: trimmed("name").unwrap_or_else(|| fallback_name.to_string()),
            model,
            base_url: trimmed("base_url"),
            system_prompt: text("system_prompt"),
            system_prompt_file: trimmed("system_prompt_file"),
            lang: trimmed("lang"),
            extensions,
        })
    }
}

/// Directory of bot definitions.
#[derive(Debug, Clone)]
pub struct BotStore {
    dir: PathBuf,
}

impl BotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, BotError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BotError::EmptyName);
        }
        let valid = name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(BotError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    pub fn save(&self, bot: &Bot) -> Result<PathBuf, BotError> {
        let path = self.path_for(&bot.name)?;
        let mut bytes = serde_json::to_vec_pretty(bot)?;
        bytes.push(b'\n');
        crate::atomic::write(&path, &bytes).map_err(|source| BotError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<Bot, BotError> {
        let path = self.path_for(name)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BotError::NotFound(name.trim().to_string()));
            }
            Err(source) => return Err(BotError::Io { path, source }),
        };
        let value: Value = serde_json::from_str(&content).map_err(|e| BotError::Invalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Bot::from_value(&value, name.trim(), &path)
    }

    /// Bot names, sorted.
    pub fn list(&self) -> Result<Vec<String>, BotError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(BotError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<PathBuf, BotError> {
        let path = self.path_for(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BotError::NotFound(name.trim().to_string()))
            }
            Err(source) => Err(BotError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bot(name: &str) -> Bot {
        Bot {
            name: name.into(),
            model: "gpt-4o-mini".into(),
            base_url: None,
            system_prompt: Some("You are terse.".into()),
            system_prompt_file: None,
            lang: Some("zh-CN".into()),
            extensions: vec!["trim".into()],
        }
    }

    #[test]
    fn test_save_load_list_delete() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::new(dir.path().join("bots"));
        assert!(store.list().unwrap().is_empty());

        store.save(&bot("writer")).unwrap();
        let path = store.save(&bot("coder")).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("}\n"));

        assert_eq!(store.list().unwrap(), vec!["coder", "writer"]);
        assert_eq!(store.load("writer").unwrap(), bot("writer"));

        store.delete("writer").unwrap();
        assert!(matches!(store.load("writer"), Err(BotError::NotFound(_))));
        assert!(matches!(store.delete("writer"), Err(BotError::NotFound(_))));
    }

    #[test]
    fn test_names_validated() {
        let store = BotStore::new("/tmp/bots");
        assert!(matches!(store.path_for("  "), Err(BotError::EmptyName)));
        assert!(matches!(
            store.path_for("../etc/passwd"),
            Err(BotError::InvalidName(_))
        ));
        assert!(matches!(store.path_for(".hidden"), Err(BotError::InvalidName(_))));
        assert_eq!(
            store.path_for(" my_bot-2 ").unwrap(),
            PathBuf::from("/tmp/bots/my_bot-2.json")
        );
    }

    #[test]
    fn test_lenient_load() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::new(dir.path());
        std::fs::write(
            dir.path().join("loose.json"),
            r#"{"model": " m1 ", "base_url": 42, "lang": "", "extensions": ["a", 1], "system_prompt": null}"#,
        )
        .unwrap();
        let loaded = store.load("loose").unwrap();
        assert_eq!(loaded.name, "loose");
        assert_eq!(loaded.model, "m1");
        assert_eq!(loaded.base_url, None);
        assert_eq!(loaded.lang, None);
        assert!(loaded.extensions.is_empty());
    }

    #[test]
    fn test_missing_model_is_invalid() {
        let dir = TempDir::new().unwrap();
        let store = BotStore::new(dir.path());
        std::fs::write(dir.path().join("nomodel.json"), r#"{"name": "nomodel"}"#).unwrap();
        assert!(matches!(
            store.load("nomodel"),
            Err(BotError::Invalid { .. })
        ));
        std::fs::write(dir.path().join("array.json"), "[]").unwrap();
        assert!(matches!(store.load("array"), Err(BotError::Invalid { .. })));
    }

    #[test]
    fn test_layer_exposes_fields() {
        let b = bot("x");
        let layer = b.layer();
        assert_eq!(layer.model, Some("gpt-4o-mini"));
        assert_eq!(layer.lang, Some("zh-CN"));
        assert_eq!(layer.extensions, &["trim".to_string()]);
    }
}
