use super::{ClaudeCode, ToolIntegration};
use crate::config::Paths;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name and alias lookup for tool integrations.
///
/// Resolution tries the exact name first, then a case-insensitive match that
/// treats `_` and `-` as the same character.
#[derive(Default)]
pub struct ToolRegistry {
    by_name: BTreeMap<String, Arc<dyn ToolIntegration>>,
    primary: Vec<String>,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in integration.
    pub fn builtin(paths: &Paths) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ClaudeCode::new(paths)));
        registry
    }

    /// Register `tool` under its primary name and all its aliases.
    pub fn register(&mut self, tool: Arc<dyn ToolIntegration>) {
        let profile = tool.profile();
        let primary = profile.primary_name.clone();
        for alias in profile.aliases.iter().chain(std::iter::once(&primary)) {
            self.register_alias(alias, Arc::clone(&tool));
        }
        if !self.primary.contains(&primary) {
            self.primary.push(primary);
        }
    }

    /// Map one extra name onto `tool`. A later registration wins.
    pub fn register_alias(&mut self, alias: &str, tool: Arc<dyn ToolIntegration>) {
        self.by_name.insert(alias.to_string(), tool);
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolIntegration>> {
        if let Some(tool) = self.by_name.get(name) {
            return Some(Arc::clone(tool));
        }
        let wanted = normalize(name);
        self.by_name
            .iter()
            .find(|(alias, _)| normalize(alias) == wanted)
            .map(|(_, tool)| Arc::clone(tool))
    }

    /// Primary names only, sorted.
    pub fn primary_names(&self) -> Vec<String> {
        let mut names = self.primary.clone();
        names.sort();
        names
    }
}
