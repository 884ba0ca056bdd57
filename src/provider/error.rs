//! Provider error types.

use thiserror::Error;

/// Format an API error body for display.
///
/// The r9s API answers failures with `{"error": {"message": "...", "type": "..."}}`;
/// when the body has that shape only the message (and type, if any) is shown.
/// Anything else is returned unchanged.
#[must_use]
pub fn format_api_error(body: &str) -> String {
    let Some(start) = body.find('{') else {
        return body.to_string();
    };

    let Ok(json) = serde_json::from_str::<serde_json::Value>(&body[start..]) else {
        return body.to_string();
    };

    let message = match json.get("error") {
        Some(serde_json::Value::String(msg)) => Some(msg.clone()),
        Some(err) => err.get("message").and_then(|m| m.as_str()).map(|msg| {
            match err.get("type").and_then(|t| t.as_str()) {
                Some(kind) => format!("{msg} ({kind})"),
                None => msg.to_string(),
            }
        }),
        None => json
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
    };

    match message {
        Some(msg) => {
            let prefix = body[..start].trim();
            if prefix.is_empty() {
                msg
            } else {
                format!("{prefix} {msg}")
            }
        }
        None => body.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing API key: set R9S_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited, retry after {retry_after:?}s")]
    RateLimited { retry_after: Option<u64> },

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the session can keep going after this error.
    ///
    /// Authentication problems will fail again on the next turn, so they end
    /// the session; everything else only aborts the current turn.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingApiKey | Self::Authentication { .. } | Self::InvalidBaseUrl { .. }
        )
    }
}
