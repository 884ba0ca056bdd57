//! HTTP client wrapper for r9s API requests.

use crate::provider::error::{Error, format_api_error};
use bytes::Bytes;
use futures::Stream;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Request and connect timeouts. For streamed responses `request` bounds
/// the silence between reads, not the whole body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(120),
            connect: Duration::from_secs(10),
        }
    }
}

/// Bearer token that never shows up in debug output.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    base_url: String,
    token: BearerToken,
}

impl HttpClient {
    /// Create a new HTTP client. Trailing slashes on `base_url` are dropped.
    pub fn new(
        base_url: impl Into<String>,
        token: BearerToken,
        timeouts: Timeouts,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()?;
        let stream_client = reqwest::Client::builder()
            .read_timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()?;

        Ok(Self {
            client,
            stream_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Append path segments to the base URL, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<url::Url, Error> {
        let invalid = |reason: String| Error::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = url::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot have path segments".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", self.token.0))
            .map_err(|_| Error::Api("API key contains invalid header characters".into()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// POST a JSON body and deserialize the JSON response.
    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R, Error> {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.build_headers()?)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        parse_body(&response.text().await?)
    }

    /// GET a path and deserialize the JSON response.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
        self.get_json_at(self.url(path)).await
    }

    /// GET an absolute URL (see [`HttpClient::endpoint`]).
    pub async fn get_json_at<R: DeserializeOwned>(
        &self,
        url: impl reqwest::IntoUrl,
    ) -> Result<R, Error> {
        let response = self
            .client
            .get(url)
            .headers(self.build_headers()?)
            .send()
            .await?;
        let response = check_status(response).await?;
        parse_body(&response.text().await?)
    }

    /// POST a JSON body and return the raw SSE byte stream.
    pub async fn post_stream<T: Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, Error> {
        let mut headers = self.build_headers()?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let response = self
            .stream_client
            .post(self.url(path))
            .headers(headers)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes_stream())
    }
}

fn parse_body<R: DeserializeOwned>(text: &str) -> Result<R, Error> {
    serde_json::from_str(text)
        .map_err(|e| Error::Api(format!("Failed to parse response: {e}\nBody: {text}")))
}

/// Turn non-success statuses into typed errors.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        return Err(Error::RateLimited { retry_after });
    }

    let text = response.text().await.unwrap_or_default();
    Err(status_error(status, &text))
}

fn status_error(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::Authentication {
            status: status.as_u16(),
            message: format_api_error(body),
        }
    } else {
        Error::Api(format_api_error(&format!("HTTP {status}: {body}")))
    }
}

/// Parse a `Retry-After` value given in (possibly fractional) seconds.
fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs.max(1));
    }
    let secs = value.parse::<f64>().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| (secs.ceil() as u64).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::new(base, BearerToken::new("sk-test"), Timeouts::default()).unwrap()
    }

    #[test]
    fn test_bearer_header() {
        let headers = client("https://api.r9s.ai").build_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer sk-test");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_invalid_token_rejected() {
        let http = HttpClient::new(
            "https://api.r9s.ai",
            BearerToken::new("bad\nkey"),
            Timeouts::default(),
        )
        .unwrap();
        assert!(matches!(http.build_headers(), Err(Error::Api(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let http = client("https://api.r9s.ai///");
        assert_eq!(http.base_url(), "https://api.r9s.ai");
        assert_eq!(http.url("/v1/models"), "https://api.r9s.ai/v1/models");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let http = client("https://api.r9s.ai/proxy/");
        let url = http.endpoint(&["v1", "models", "org/model?x#y"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.r9s.ai/proxy/v1/models/org%2Fmodel%3Fx%23y"
        );
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let debug = format!("{:?}", client("https://api.r9s.ai"));
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_status_error_auth() {
        let err = status_error(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"invalid api key"}}"#,
        );
        match err {
            Error::Authentication { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_status_error_server() {
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(err, Error::Api(msg) if msg.contains("502") && msg.contains("upstream down")));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("30"), Some(30));
        assert_eq!(parse_retry_after(" 0 "), Some(1));
        assert_eq!(parse_retry_after("2.5"), Some(3));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("NaN"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }
}
