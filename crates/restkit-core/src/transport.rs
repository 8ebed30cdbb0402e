//! HTTP transport for one logical REST request.
//!
//! [`Transport`] turns a method, path, optional JSON body and query string
//! into a typed response or a typed [`ApiError`]. Every logical request runs
//! inside the transport's own [`RetryCoordinator`], exactly once; callers must
//! not wrap transport calls in another retry loop.
//!
//! # Example
//!
//! ```no_run
//! use restkit_core::{ApiError, Transport};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Issue {
//!     id: u64,
//!     title: String,
//! }
//!
//! # async fn example() -> Result<(), ApiError> {
//! let transport = Transport::builder("https://api.example.com")
//!     .bearer_token("secret")
//!     .build()?;
//!
//! let issue: Issue = transport.get("/issues/42", &[]).await?;
//! println!("{} {}", issue.id, issue.title);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::Bytes;
use reqwest::{
    Method, StatusCode,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use crate::{
    config::HttpConfig,
    error::ApiError,
    retry::{RetryCoordinator, RetryStrategy},
};

/// Longest error body excerpt kept in an [`ApiError`] message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Builder for [`Transport`].
#[derive(Debug)]
pub struct TransportBuilder {
    base_url: String,
    bearer_token: Option<String>,
    user_agent: String,
    timeout: Option<Duration>,
    headers: HeaderMap,
    retry: RetryStrategy,
}

impl TransportBuilder {
    /// Sends `Authorization: Bearer <token>` on every request.
    #[must_use]
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Per-attempt timeout. Expired attempts surface as retryable
    /// [`ApiError::Network`] errors.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent on every request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn retry(mut self, strategy: RetryStrategy) -> Self {
        self.retry = strategy;
        self
    }

    /// Applies the `[http]` config section (timeout and user agent).
    #[must_use]
    pub fn http_config(self, config: &HttpConfig) -> Self {
        self.timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
    }

    /// Builds the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Validation`] if the base URL is empty or the HTTP
    /// client cannot be constructed from the given settings.
    pub fn build(self) -> Result<Transport, ApiError> {
        let base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::validation("base URL must not be empty"));
        }

        let mut client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .default_headers(self.headers);
        if let Some(timeout) = self.timeout {
            client = client.timeout(timeout);
        }
        let http = client
            .build()
            .map_err(|e| ApiError::validation(format!("invalid HTTP client settings: {e}")))?;

        Ok(Transport {
            http,
            base_url,
            bearer_token: self.bearer_token,
            retry: RetryCoordinator::new(self.retry),
        })
    }
}

/// JSON-over-HTTP client bound to one API base URL.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
    retry: RetryCoordinator,
}

impl Transport {
    /// Starts building a transport for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> TransportBuilder {
        TransportBuilder {
            base_url: base_url.into(),
            bearer_token: None,
            user_agent: crate::config::default_user_agent(),
            timeout: None,
            headers: HeaderMap::new(),
            retry: RetryStrategy::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_strategy(&self) -> &RetryStrategy {
        self.retry.strategy()
    }

    /// Issues one logical request, retrying transient failures.
    ///
    /// `path` is appended to the base URL. Empty success bodies decode as
    /// JSON `null`, so `()` and `Option<_>` targets accept `204 No Content`.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the final attempt: a status-class error for
    /// non-2xx responses, [`ApiError::Network`] when no response arrived,
    /// [`ApiError::Decode`] when the body does not match `T`, or
    /// [`ApiError::Validation`] when `body` cannot be serialized.
    #[instrument(skip(self, body, query), fields(base_url = %self.base_url))]
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::validation(format!("failed to encode request body: {e}")))?
            .map(Bytes::from);
        let target = format!("{method} {path}");

        self.retry
            .execute_with_retry(&target, || {
                self.send_once::<T>(method.clone(), &url, body.clone(), query)
            })
            .await
    }

    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.request(Method::GET, path, None::<&()>, query).await
    }

    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body), &[]).await
    }

    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(body), &[]).await
    }

    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, path, Some(body), &[]).await
    }

    /// # Errors
    ///
    /// See [`Transport::request`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, path, None::<&()>, &[]).await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let mut request = self.http.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return decode_body(&bytes);
        }

        let header_hint = header_retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        let retry_after = header_hint.or_else(|| body_retry_after(&text));
        debug!(%status, "remote returned an error status");

        Err(ApiError::from_status(
            status,
            retry_after,
            error_message(status, &text),
        ))
    }
}

fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}

/// Reads a delta-seconds `Retry-After` header. HTTP-date values are ignored.
fn header_retry_after(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().and_then(seconds_from_f64))
}

/// Reads a `retry_after` field from a JSON error body, as sent by Discord.
fn body_retry_after(body: &str) -> Option<u64> {
    let json: JsonValue = serde_json::from_str(body).ok()?;
    json.get("retry_after")
        .and_then(JsonValue::as_f64)
        .and_then(seconds_from_f64)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is verified to be finite and non-negative before casting"
)]
fn seconds_from_f64(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.ceil() as u64)
}

/// Picks a human-readable message out of an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<JsonValue>(body) {
        let found = ["message", "error_description", "error"]
            .iter()
            .find_map(|field| json.get(field).and_then(JsonValue::as_str))
            .or_else(|| json.pointer("/error/message").and_then(JsonValue::as_str));
        if let Some(message) = found {
            return message.to_string();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        return status.canonical_reason().unwrap_or("unknown error").to_string();
    }
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
