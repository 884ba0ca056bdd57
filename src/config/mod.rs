//! Configuration: per-user paths, the optional settings file, and the
//! flag/bot/environment/session precedence used by every command.

use crate::provider::Timeouts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.r9s.ai";

pub const API_KEY_VAR: &str = "R9S_API_KEY";
pub const BASE_URL_VAR: &str = "R9S_BASE_URL";
pub const MODEL_VAR: &str = "R9S_MODEL";
pub const SYSTEM_PROMPT_VAR: &str = "R9S_SYSTEM_PROMPT";
pub const EXTENSIONS_VAR: &str = "R9S_CHAT_EXTENSIONS";
pub const LANG_VAR: &str = "R9S_LANG";
pub const HOME_VAR: &str = "R9S_HOME";
pub const LOG_VAR: &str = "R9S_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine home directory (set R9S_HOME)")]
    NoHome,

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read access to environment variables.
pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new<K: Into<String>, V: Into<String>>(vars: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Per-user locations. `root` is `~/.r9s`; `home` is the user's home, used
/// for locating other tools' config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    home: PathBuf,
    root: PathBuf,
}

impl Paths {
    /// Resolve from `R9S_HOME` (which replaces both roots) or the OS home dir.
    pub fn discover(env: &dyn Env) -> Result<Self, ConfigError> {
        if let Some(dir) = env.var(HOME_VAR).filter(|v| !v.trim().is_empty()) {
            let dir = PathBuf::from(dir);
            return Ok(Self {
                root: dir.join(".r9s"),
                home: dir,
            });
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        Ok(Self::from_home(home))
    }

    pub fn from_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            root: home.join(".r9s"),
            home,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chat_dir(&self) -> PathBuf {
        self.root.join("chat")
    }

    pub fn bots_dir(&self) -> PathBuf {
        self.root.join("bots")
    }

    pub fn backup_dir(&self, tool: &str) -> PathBuf {
        self.root.join("backup").join(tool)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }
}

/// Optional `~/.r9s/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chat completion timeout. Bounds the whole request, or the pause
    /// between chunks when streaming.
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Timeout for the model listing used by `set`.
    pub models_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            models_timeout_secs: 5,
        }
    }
}

impl Settings {
    /// Load the settings file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Zero values are raised to one second.
    pub fn chat_timeouts(&self, override_secs: Option<u64>) -> Timeouts {
        Timeouts {
            request: secs(override_secs.unwrap_or(self.request_timeout_secs)),
            connect: secs(self.connect_timeout_secs),
        }
    }

    pub fn models_timeouts(&self) -> Timeouts {
        Timeouts {
            request: secs(self.models_timeout_secs),
            connect: secs(self.connect_timeout_secs.min(self.models_timeout_secs)),
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Flag,
    Bot,
    Env,
    Session,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub source: Source,
}

/// Values a saved bot contributes. All optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct BotLayer<'a> {
    pub base_url: Option<&'a str>,
    pub model: Option<&'a str>,
    pub system_prompt: Option<&'a str>,
    pub system_prompt_file: Option<&'a str>,
    pub lang: Option<&'a str>,
    pub extensions: &'a [String],
}

/// Values recovered from a resumed session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionLayer<'a> {
    pub base_url: Option<&'a str>,
    pub model: Option<&'a str>,
    pub system_prompt: Option<&'a str>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn first<'a>(candidates: [(Option<&'a str>, Source); 4]) -> Option<Resolved<String>> {
    candidates.into_iter().find_map(|(value, source)| {
        non_blank(value).map(|v| Resolved {
            value: v.to_string(),
            source,
        })
    })
}

/// API key: flag, then `R9S_API_KEY`.
pub fn resolve_api_key(flag: Option<&str>, env: &dyn Env) -> Option<String> {
    let from_env = env.var(API_KEY_VAR);
    non_blank(flag)
        .or(non_blank(from_env.as_deref()))
        .map(String::from)
}

/// Base URL: flag, bot, `R9S_BASE_URL`, resumed session, then the hosted default.
pub fn resolve_base_url(
    flag: Option<&str>,
    bot: &BotLayer<'_>,
    env: &dyn Env,
    session: &SessionLayer<'_>,
) -> Resolved<String> {
    let from_env = env.var(BASE_URL_VAR);
    first([
        (flag, Source::Flag),
        (bot.base_url, Source::Bot),
        (from_env.as_deref(), Source::Env),
        (session.base_url, Source::Session),
    ])
    .unwrap_or_else(|| Resolved {
        value: DEFAULT_BASE_URL.to_string(),
        source: Source::Default,
    })
}

/// Model: flag, bot, `R9S_MODEL`, resumed session. No default.
pub fn resolve_model(
    flag: Option<&str>,
    bot: &BotLayer<'_>,
    env: &dyn Env,
    session: &SessionLayer<'_>,
) -> Option<Resolved<String>> {
    let from_env = env.var(MODEL_VAR);
    first([
        (flag, Source::Flag),
        (bot.model, Source::Bot),
        (from_env.as_deref(), Source::Env),
        (session.model, Source::Session),
    ])
}

/// System prompt: `--system-prompt`, `--system-prompt-file`, bot file, bot
/// text, `R9S_SYSTEM_PROMPT`, resumed session. Files are read here; an empty
/// file counts as unset.
pub fn resolve_system_prompt(
    flag_text: Option<&str>,
    flag_file: Option<&Path>,
    bot: &BotLayer<'_>,
    env: &dyn Env,
    session: &SessionLayer<'_>,
) -> Result<Option<String>, ConfigError> {
    if let Some(text) = flag_text.filter(|t| !t.trim().is_empty()) {
        return Ok(Some(text.to_string()));
    }
    if let Some(path) = flag_file {
        return read_prompt_file(path);
    }
    if let Some(path) = non_blank(bot.system_prompt_file) {
        return read_prompt_file(Path::new(path));
    }
    if let Some(text) = bot.system_prompt.filter(|t| !t.trim().is_empty()) {
        return Ok(Some(text.to_string()));
    }
    if let Some(text) = non_blank(env.var(SYSTEM_PROMPT_VAR).as_deref()) {
        return Ok(Some(text.to_string()));
    }
    Ok(session
        .system_prompt
        .filter(|t| !t.trim().is_empty())
        .map(String::from))
}

fn read_prompt_file(path: &Path) -> Result<Option<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = content.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Raw UI language preference: flag, bot, `R9S_LANG`.
pub fn resolve_lang_pref(flag: Option<&str>, bot: &BotLayer<'_>, env: &dyn Env) -> Option<String> {
    let from_env = env.var(LANG_VAR);
    non_blank(flag)
        .or(non_blank(bot.lang))
        .or(non_blank(from_env.as_deref()))
        .map(String::from)
}

/// Extension specs in load order: `R9S_CHAT_EXTENSIONS` (comma separated),
/// bot defaults, then `--ext` flags.
pub fn extension_specs(env: &dyn Env, bot: &BotLayer<'_>, cli: &[String]) -> Vec<String> {
    let from_env = env.var(EXTENSIONS_VAR).unwrap_or_default();
    from_env
        .split(',')
        .chain(bot.extensions.iter().map(String::as_str))
        .chain(cli.iter().map(String::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
