//! Wire format of the OpenAI-compatible r9s chat endpoints.

use super::types::{ChatRequest, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream,
        }
    }
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
        }
    }
}

/// Streaming chunk (`chat.completion.chunk`). Only the fields the CLI reads.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Text carried by the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseChoice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Value,
}

impl CompletionResponse {
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| content_to_text(&m.content))
            .unwrap_or_default()
    }
}

/// Flatten a message `content` value into plain text.
///
/// Strings pass through; arrays of `{"type": "text", "text": ...}` parts are
/// concatenated; anything else is rendered as JSON.
pub fn content_to_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            if text.is_empty() {
                content.to_string()
            } else {
                text.concat()
            }
        }
        other => other.to_string(),
    }
}

/// Extract model ids from a `/v1/models` payload.
///
/// Accepts a bare array of strings or `{"data": [...]}` whose items are
/// strings or objects with an `id`. Returns `None` for any other shape.
pub fn parse_model_list(payload: &Value) -> Option<Vec<String>> {
    match payload {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect(),
        Value::Object(obj) => {
            let data = obj.get("data")?.as_array()?;
            Some(
                data.iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(m) => m.get("id").map(|id| match id {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        }),
                        _ => None,
                    })
                    .collect(),
            )
        }
        _ => None,
    }
}
