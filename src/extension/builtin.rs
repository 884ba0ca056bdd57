//! Extensions that ship with the binary.

use super::{ChatContext, ChatExtension, ExtensionError};
use crate::provider::{Message, Role};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

/// Strips surrounding whitespace from user input.
#[derive(Debug, Default)]
pub struct Trim;

#[async_trait]
impl ChatExtension for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    async fn on_user_input(
        &self,
        text: &str,
        _ctx: &ChatContext,
    ) -> Result<Option<String>, ExtensionError> {
        let trimmed = text.trim();
        Ok((trimmed.len() != text.len()).then(|| trimmed.to_string()))
    }
}

/// Sends only the last `max` conversation messages. Leading system
/// messages are always kept. The stored history is not touched.
#[derive(Debug)]
pub struct Window {
    max: usize,
    name: String,
}

impl Window {
    pub fn new(max: usize) -> Result<Self, ExtensionError> {
        if max == 0 {
            return Err(ExtensionError::Contract(
                "window size must be at least 1".into(),
            ));
        }
        Ok(Self {
            max,
            name: format!("window:{max}"),
        })
    }
}

fn system_prefix_len(messages: &[Message]) -> usize {
    messages
        .iter()
        .take_while(|m| m.role == Role::System)
        .count()
}

#[async_trait]
impl ChatExtension for Window {
    fn name(&self) -> &str {
        &self.name
    }

    async fn before_request(
        &self,
        messages: &[Message],
        _ctx: &ChatContext,
    ) -> Result<Option<Vec<Message>>, ExtensionError> {
        let head = system_prefix_len(messages);
        let body = &messages[head..];
        if body.len() <= self.max {
            return Ok(None);
        }
        let mut out = messages[..head].to_vec();
        out.extend_from_slice(&body[body.len() - self.max..]);
        Ok(Some(out))
    }
}

/// Tells the model the current UTC time with an extra system message.
#[derive(Debug, Default)]
pub struct Timestamp;

#[async_trait]
impl ChatExtension for Timestamp {
    fn name(&self) -> &str {
        "timestamp"
    }

    async fn before_request(
        &self,
        messages: &[Message],
        _ctx: &ChatContext,
    ) -> Result<Option<Vec<Message>>, ExtensionError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let head = system_prefix_len(messages);
        let mut out = Vec::with_capacity(messages.len() + 1);
        out.extend_from_slice(&messages[..head]);
        out.push(Message::system(format!("Current time: {now}")));
        out.extend_from_slice(&messages[head..]);
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(turns: usize) -> Vec<Message> {
        let mut messages = vec![Message::system("sys")];
        for i in 0..turns {
            messages.push(Message::user(format!("q{i}")));
            messages.push(Message::assistant(format!("a{i}")));
        }
        messages
    }

    #[tokio::test]
    async fn test_trim() {
        let ctx = ChatContext::default();
        assert_eq!(
            Trim.on_user_input("  hi \n", &ctx).await.unwrap().as_deref(),
            Some("hi")
        );
        assert_eq!(Trim.on_user_input("hi", &ctx).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_window_keeps_system_and_tail() {
        let ctx = ChatContext::default();
        let window = Window::new(3).unwrap();
        let out = window
            .before_request(&conversation(3), &ctx)
            .await
            .unwrap()
            .unwrap();
        let contents: Vec<&str> = out.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "a1", "q2", "a2"]);
        assert_eq!(window.name(), "window:3");
    }

    #[tokio::test]
    async fn test_window_short_history_unchanged() {
        let ctx = ChatContext::default();
        let window = Window::new(10).unwrap();
        assert!(
            window
                .before_request(&conversation(2), &ctx)
                .await
                .unwrap()
                .is_none()
        );
        assert!(Window::new(0).is_err());
    }

    #[tokio::test]
    async fn test_timestamp_inserted_after_system() {
        let ctx = ChatContext::default();
        let out = Timestamp
            .before_request(&conversation(1), &ctx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].content, "sys");
        assert_eq!(out[1].role, Role::System);
        assert!(out[1].content.starts_with("Current time: "));
        assert_eq!(out[2].content, "q0");
    }
}
