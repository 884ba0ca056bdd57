use super::{
    BackupManager, Clock, JsonConfigStore, SystemClock, ToolConfigSetResult, ToolError,
    ToolIntegration, ToolProfile, ToolSettings,
};
use crate::config::Paths;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const PRIMARY_NAME: &str = "claude-code";
const ALIASES: [&str; 3] = ["claude-code", "claude", "claude_code"];
const ENV_SECTION: &str = "env";
const API_TIMEOUT_MS: &str = "3000000";

/// Claude Code reads its gateway settings from the `env` object of
/// `~/.claude/settings.json`.
#[derive(Debug)]
pub struct ClaudeCode {
    profile: ToolProfile,
    store: JsonConfigStore,
    backups: BackupManager,
}

impl ClaudeCode {
    pub fn new(paths: &Paths) -> Self {
        Self::with_clock(paths, Arc::new(SystemClock))
    }

    pub fn with_clock(paths: &Paths, clock: Arc<dyn Clock>) -> Self {
        let config_path = paths.home().join(".claude").join("settings.json");
        let backup_dir = paths.backup_dir(PRIMARY_NAME);
        Self {
            store: JsonConfigStore::new(config_path.clone()),
            backups: BackupManager::with_clock(config_path.clone(), backup_dir.clone(), clock),
            profile: ToolProfile {
                primary_name: PRIMARY_NAME.to_string(),
                aliases: ALIASES.iter().map(|a| (*a).to_string()).collect(),
                config_path,
                backup_dir,
            },
        }
    }

    fn env_entries(settings: &ToolSettings) -> Map<String, Value> {
        let mut env = Map::new();
        env.insert("ANTHROPIC_BASE_URL".into(), json!(settings.base_url));
        env.insert("ANTHROPIC_AUTH_TOKEN".into(), json!(settings.api_key));
        env.insert("API_TIMEOUT_MS".into(), json!(API_TIMEOUT_MS));
        env.insert("CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC".into(), json!(1));
        env.insert("ANTHROPIC_MODEL".into(), json!(settings.model));
        env.insert("ANTHROPIC_SMALL_FAST_MODEL".into(), json!(settings.model));
        env
    }
}

impl ToolIntegration for ClaudeCode {
    fn profile(&self) -> &ToolProfile {
        &self.profile
    }

    fn backups(&self) -> &BackupManager {
        &self.backups
    }

    fn set_config(&self, settings: &ToolSettings) -> Result<ToolConfigSetResult, ToolError> {
        let backup = self.backups.create_backup_if_exists()?;
        self.store
            .merge_section(ENV_SECTION, Self::env_entries(settings))?;
        Ok(ToolConfigSetResult {
            target_path: self.profile.config_path.clone(),
            backup_path: backup.map(|b| b.backup_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::backup::tests::StepClock;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ClaudeCode) {
        let dir = TempDir::new().unwrap();
        let paths = Paths::from_home(dir.path());
        let tool = ClaudeCode::with_clock(&paths, Arc::new(StepClock::new()));
        (dir, tool)
    }

    fn settings(model: &str) -> ToolSettings {
        ToolSettings {
            base_url: "https://api.r9s.ai".into(),
            api_key: "sk-test".into(),
            model: model.into(),
        }
    }

    #[test]
    fn test_profile_paths() {
        let (dir, tool) = setup();
        let profile = tool.profile();
        assert_eq!(profile.primary_name, "claude-code");
        assert_eq!(
            profile.config_path,
            dir.path().join(".claude").join("settings.json")
        );
        assert_eq!(
            profile.backup_dir,
            dir.path().join(".r9s").join("backup").join("claude-code")
        );
    }

    #[test]
    fn test_fresh_install_writes_only_integration_keys() {
        let (_dir, tool) = setup();
        let result = tool.set_config(&settings("claude-sonnet")).unwrap();
        assert!(result.backup_path.is_none());

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&result.target_path).unwrap()).unwrap();
        assert_eq!(
            doc,
            json!({"env": {
                "ANTHROPIC_BASE_URL": "https://api.r9s.ai",
                "ANTHROPIC_AUTH_TOKEN": "sk-test",
                "API_TIMEOUT_MS": "3000000",
                "CLAUDE_CODE_DISABLE_NONESSENTIAL_TRAFFIC": 1,
                "ANTHROPIC_MODEL": "claude-sonnet",
                "ANTHROPIC_SMALL_FAST_MODEL": "claude-sonnet"
            }})
        );
    }

    #[test]
    fn test_set_then_reset_restores_bytes() {
        let (_dir, tool) = setup();
        let original = "{\n    \"theme\": \"dark\",\n    \"env\": {\"FOO\": \"bar\"}\n}";
        let path = tool.profile().config_path.clone();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, original).unwrap();

        let result = tool.set_config(&settings("m1")).unwrap();
        assert_ne!(std::fs::read_to_string(&path).unwrap(), original);

        let latest = tool.list_backups().unwrap().remove(0);
        assert_eq!(Some(latest.backup_path.clone()), result.backup_path);
        tool.reset_config(&latest.backup_path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_unrelated_keys_survive() {
        let (_dir, tool) = setup();
        let path = tool.profile().config_path.clone();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"permissions": {"allow": ["Bash"]}, "env": {"FOO": "bar", "ANTHROPIC_MODEL": "old"}}"#,
        )
        .unwrap();

        tool.set_config(&settings("new")).unwrap();
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["permissions"], json!({"allow": ["Bash"]}));
        assert_eq!(doc["env"]["FOO"], json!("bar"));
        assert_eq!(doc["env"]["ANTHROPIC_MODEL"], json!("new"));
    }

    #[test]
    fn test_repeated_sets_keep_every_backup() {
        let (_dir, tool) = setup();
        let path = tool.profile().config_path.clone();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{}").unwrap();

        for i in 0..4 {
            tool.set_config(&settings(&format!("m{i}"))).unwrap();
        }
        let backups = tool.list_backups().unwrap();
        assert_eq!(backups.len(), 4);
        assert!(
            backups
                .windows(2)
                .all(|pair| pair[0].timestamp > pair[1].timestamp)
        );
        // The newest backup holds the config written by the third call.
        let newest = std::fs::read_to_string(&backups[0].backup_path).unwrap();
        assert!(newest.contains("\"m2\""));
    }

    #[test]
    fn test_corrupted_config_still_configures() {
        let (_dir, tool) = setup();
        let path = tool.profile().config_path.clone();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"env\": {broken").unwrap();

        let result = tool.set_config(&settings("m")).unwrap();
        let backup = result.backup_path.unwrap();
        assert_eq!(
            std::fs::read_to_string(backup).unwrap(),
            "{\"env\": {broken"
        );

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let obj = doc.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["env"].as_object().unwrap().len(), 6);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_settings_stay_linked() {
        let (dir, tool) = setup();
        let real = dir.path().join("dotfiles").join("claude-settings.json");
        std::fs::create_dir_all(real.parent().unwrap()).unwrap();
        std::fs::write(&real, r#"{"theme":"dark"}"#).unwrap();
        let path = tool.profile().config_path.clone();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&real, &path).unwrap();

        tool.set_config(&settings("m1")).unwrap();
        assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&real).unwrap()).unwrap();
        assert_eq!(doc["theme"], json!("dark"));
        assert_eq!(doc["env"]["ANTHROPIC_MODEL"], json!("m1"));

        let latest = tool.list_backups().unwrap().remove(0);
        tool.reset_config(&latest.backup_path).unwrap();
        assert!(std::fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(&real).unwrap(), r#"{"theme":"dark"}"#);
    }
}
