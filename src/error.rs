use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::provider::Error),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("Session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("Extension error: {0}")]
    Extension(#[from] crate::extension::ExtensionError),

    #[error("Bot error: {0}")]
    Bot(#[from] crate::bots::BotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing model: set R9S_MODEL or pass --model")]
    MissingModel,

    #[error("Resume requires an interactive TTY (no stdin piping).")]
    ResumeRequiresTty,

    #[error("No saved sessions found in: {}", .0.display())]
    NoSessions(PathBuf),
}

impl Error {
    /// Errors that should end an interactive chat instead of skipping a turn.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_fatal(),
            Self::Extension(_) => false,
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_fatality_propagates() {
        let auth = Error::from(crate::provider::Error::Authentication {
            status: 401,
            message: "bad key".into(),
        });
        assert!(auth.is_fatal());
        let api = Error::from(crate::provider::Error::Api("overloaded".into()));
        assert!(!api.is_fatal());
    }
}
