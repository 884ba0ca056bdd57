//! Chat transcripts persisted as one JSON file per session.

mod store;

pub use store::{SessionError, SessionStore, SessionSummary};

use crate::provider::{Message, Role};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// One conversation. Messages only grow during a run, except for `/clear`
/// and turn rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub meta: SessionMeta,
    pub messages: Vec<Message>,
}

impl ChatSession {
    pub fn new(
        session_id: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Self {
        let created = now();
        Self {
            meta: SessionMeta {
                session_id: session_id.into(),
                created_at: created,
                updated_at: created,
                base_url: base_url.into(),
                model: model.into(),
                system_prompt,
            },
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.meta.session_id
    }

    /// Completed user turns so far.
    #[must_use]
    pub fn turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Most recent user message, for listings.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Record the settings the following turns run with.
    pub fn update_meta(&mut self, base_url: &str, model: &str, system_prompt: Option<&str>) {
        self.meta.base_url = base_url.to_string();
        self.meta.model = model.to_string();
        self.meta.system_prompt = system_prompt.map(String::from);
    }

    pub fn touch(&mut self) {
        self.meta.updated_at = now();
    }
}
