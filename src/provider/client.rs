//! r9s API client.

use super::error::Error;
use super::http::{BearerToken, HttpClient, SseParser, Timeouts};
use super::types::{ChatRequest, ModelInfo, StreamEvent};
use super::wire::{CompletionRequest, CompletionResponse, StreamChunk, parse_model_list};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const MODELS_PATH: &str = "/v1/models";

/// Chat completion surface used by the chat loop.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Stream a completion, sending text deltas and a final `Done` over `tx`.
    async fn stream(&self, request: ChatRequest, tx: mpsc::Sender<StreamEvent>)
    -> Result<(), Error>;

    /// Request a completion in one response.
    async fn complete(&self, request: ChatRequest) -> Result<String, Error>;
}

#[derive(Debug)]
pub struct R9sClient {
    http: HttpClient,
}

impl R9sClient {
    /// Create a client for `base_url` authenticated with `api_key`.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeouts: Timeouts,
    ) -> Result<Self, Error> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }
        validate_base_url(base_url)?;
        let http = HttpClient::new(base_url, BearerToken::new(api_key), timeouts)?;
        Ok(Self { http })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// List model ids.
    pub async fn list_models(&self) -> Result<Vec<String>, Error> {
        let payload: serde_json::Value = self.http.get_json(MODELS_PATH).await?;
        parse_model_list(&payload)
            .ok_or_else(|| Error::Api("Could not parse model list from response".into()))
    }

    /// Fetch details for one model.
    pub async fn get_model(&self, id: &str) -> Result<ModelInfo, Error> {
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(Error::Api(format!("Invalid model id: {id:?}")));
        }
        let url = self.http.endpoint(&["v1", "models", id])?;
        self.http.get_json_at(url).await
    }
}

#[async_trait]
impl ChatApi for R9sClient {
    async fn stream(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), Error> {
        let body = CompletionRequest::new(&request, true);
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            "chat completion stream request"
        );

        let stream = self.http.post_stream(COMPLETIONS_PATH, &body).await?;
        futures::pin_mut!(stream);

        let mut parser = SseParser::new();
        let mut pending = Vec::new();
        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Stream(e.to_string()))?;
            pending.extend_from_slice(&chunk);

            // Only hand complete UTF-8 sequences to the parser.
            let valid = match std::str::from_utf8(&pending) {
                Ok(s) => s.len(),
                Err(e) if e.error_len().is_none() => e.valid_up_to(),
                Err(_) => pending.len(),
            };
            let text = String::from_utf8_lossy(&pending[..valid]).into_owned();
            pending.drain(..valid);

            for event in parser.feed(&text) {
                if event.is_done() {
                    break 'read;
                }
                forward_event(&event.data, &tx).await?;
            }
        }

        if let Some(event) = parser.finish()
            && !event.is_done()
        {
            forward_event(&event.data, &tx).await?;
        }

        let _ = tx.send(StreamEvent::Done).await;
        Ok(())
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, Error> {
        let body = CompletionRequest::new(&request, false);
        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            "chat completion request"
        );
        let response: CompletionResponse = self.http.post_json(COMPLETIONS_PATH, &body).await?;
        Ok(response.text())
    }
}

async fn forward_event(data: &str, tx: &mpsc::Sender<StreamEvent>) -> Result<(), Error> {
    if data.trim().is_empty() {
        return Ok(());
    }
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Failed to parse stream chunk: {e}\nData: {data}");
            return Ok(());
        }
    };
    if let Some(err) = value.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .map_or_else(|| err.to_string(), String::from);
        return Err(Error::Api(msg));
    }

    let chunk: StreamChunk = match serde_json::from_value(value) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!("Unexpected stream chunk shape: {e}\nData: {data}");
            return Ok(());
        }
    };
    if let Some(text) = chunk.text() {
        // A closed receiver means the caller stopped listening.
        if tx.send(StreamEvent::TextDelta(text.to_string())).await.is_err() {
            return Err(Error::Cancelled);
        }
    }
    Ok(())
}

fn validate_base_url(base_url: &str) -> Result<(), Error> {
    let parsed = url::Url::parse(base_url).map_err(|e| Error::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(())
}
