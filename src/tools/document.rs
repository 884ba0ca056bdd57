//! JSON config documents edited in place.

use super::ToolError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A JSON object on disk. Key order is kept as found.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. Missing, unreadable, malformed, or non-object
    /// files all load as an empty object.
    #[must_use]
    pub fn load(&self) -> Map<String, Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read {}: {e}", self.path.display());
                }
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::warn!(
                    "{} is not a JSON object, starting from empty",
                    self.path.display()
                );
                Map::new()
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse {}: {e}, starting from empty",
                    self.path.display()
                );
                Map::new()
            }
        }
    }

    /// Overwrite `entries` inside the object at `section`, keeping every
    /// other key in the section and the document.
    pub fn merge_section(
        &self,
        section: &str,
        entries: Map<String, Value>,
    ) -> Result<(), ToolError> {
        let mut doc = self.load();
        match doc.get_mut(section) {
            Some(Value::Object(existing)) => existing.extend(entries),
            Some(other) => *other = Value::Object(entries),
            None => {
                doc.insert(section.to_string(), Value::Object(entries));
            }
        }
        self.save(&doc)
    }

    /// Write as two-space pretty JSON with a trailing newline.
    pub fn save(&self, doc: &Map<String, Value>) -> Result<(), ToolError> {
        let mut bytes = serde_json::to_vec_pretty(doc)?;
        bytes.push(b'\n');
        crate::atomic::write(&self.path, &bytes).map_err(|e| ToolError::io(&self.path, e))
    }
}
