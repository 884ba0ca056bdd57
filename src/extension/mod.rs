//! Chat extensions: optional transforms at fixed points of a chat turn.
//!
//! Extensions run in load order. Each hook receives the previous extension's
//! output for the same hook. A failing hook is recorded and skipped, so the
//! value passes through unchanged and the session keeps going.

mod builtin;
mod command;
mod loader;

pub use builtin::{Timestamp, Trim, Window};
pub use command::{CommandExtension, CommandManifest};
pub use loader::{load, load_all};

use crate::provider::Message;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Points in a chat turn where extensions run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    /// Raw user input, before it is stored.
    OnUserInput,
    /// Full message list, just before it is sent.
    BeforeRequest,
    /// Each streamed text chunk, before it is printed.
    OnStreamDelta,
    /// Final assistant text, before it is stored.
    AfterResponse,
}

impl HookPoint {
    pub const ALL: [Self; 4] = [
        Self::OnUserInput,
        Self::BeforeRequest,
        Self::OnStreamDelta,
        Self::AfterResponse,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnUserInput => "on_user_input",
            Self::BeforeRequest => "before_request",
            Self::OnStreamDelta => "on_stream_delta",
            Self::AfterResponse => "after_response",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Failed to load extension '{spec}': {reason}")]
    Load { spec: String, reason: String },

    #[error("Invalid extension: {0}")]
    Contract(String),

    #[error("Extension '{extension}' failed in {hook}: {reason}")]
    Hook {
        extension: String,
        hook: HookPoint,
        reason: String,
    },
}

impl ExtensionError {
    pub fn hook(extension: &str, hook: HookPoint, reason: impl Into<String>) -> Self {
        Self::Hook {
            extension: extension.to_string(),
            hook,
            reason: reason.into(),
        }
    }
}

/// Session state visible to hooks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatContext {
    pub base_url: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub history_file: Option<PathBuf>,
    /// Stored conversation at the time the hook runs.
    pub history: Vec<Message>,
}

/// A loaded extension. Every hook is optional; `Ok(None)` leaves the value as is.
#[async_trait]
pub trait ChatExtension: Send + Sync {
    fn name(&self) -> &str;

    async fn on_user_input(
        &self,
        _text: &str,
        _ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        Ok(None)
    }

    async fn before_request(
        &self,
        _messages: &[Message],
        _ctx: &ChatContext,
    ) -> Result<Option<Vec<Message>>, ExtensionError> {
        Ok(None)
    }

    /// Returning an empty string suppresses the chunk.
    async fn on_stream_delta(
        &self,
        _delta: &str,
        _ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        Ok(None)
    }

    async fn after_response(
        &self,
        _text: &str,
        _ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        Ok(None)
    }
}

/// Ordered chain of extensions.
#[derive(Default)]
pub struct ExtensionPipeline {
    extensions: Vec<Arc<dyn ChatExtension>>,
    failures: Vec<ExtensionError>,
}

impl ExtensionPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: Arc<dyn ChatExtension>) {
        self.extensions.push(extension);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.extensions.iter().map(|e| e.name().to_string()).collect()
    }

    /// Hook failures since the last call, oldest first.
    pub fn take_failures(&mut self) -> Vec<ExtensionError> {
        std::mem::take(&mut self.failures)
    }

    fn record(&mut self, name: &str, hook: HookPoint, err: ExtensionError) {
        let err = match err {
            hook_err @ ExtensionError::Hook { .. } => hook_err,
            other => ExtensionError::hook(name, hook, other.to_string()),
        };
        tracing::warn!("{err}");
        self.failures.push(err);
    }

    pub async fn on_user_input(&mut self, text: String, ctx: &ChatContext) -> String {
        let mut out = text;
        for ext in self.extensions.clone() {
            match ext.on_user_input(&out, ctx).await {
                Ok(Some(next)) => out = next,
                Ok(None) => {}
                Err(e) => self.record(ext.name(), HookPoint::OnUserInput, e),
            }
        }
        out
    }

    pub async fn before_request(&mut self, messages: Vec<Message>, ctx: &ChatContext) -> Vec<Message> {
        let mut out = messages;
        for ext in self.extensions.clone() {
            match ext.before_request(&out, ctx).await {
                Ok(Some(next)) => out = next,
                Ok(None) => {}
                Err(e) => self.record(ext.name(), HookPoint::BeforeRequest, e),
            }
        }
        out
    }

    pub async fn on_stream_delta(&mut self, delta: String, ctx: &ChatContext) -> String {
        let mut out = delta;
        for ext in self.extensions.clone() {
            match ext.on_stream_delta(&out, ctx).await {
                Ok(Some(next)) => out = next,
                Ok(None) => {}
                Err(e) => self.record(ext.name(), HookPoint::OnStreamDelta, e),
            }
        }
        out
    }

    pub async fn after_response(&mut self, text: String, ctx: &ChatContext) -> String {
        let mut out = text;
        for ext in self.extensions.clone() {
            match ext.after_response(&out, ctx).await {
                Ok(Some(next)) => out = next,
                Ok(None) => {}
                Err(e) => self.record(ext.name(), HookPoint::AfterResponse, e),
            }
        }
        out
    }
}
