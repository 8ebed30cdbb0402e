//! Error taxonomy shared by every layer of the core.
//!
//! [`ApiError`] is discriminated by status class. The retry layer decides
//! whether to try again purely from the variant, so callers can always
//! pattern-match on the error they get back: it is never wrapped.
//!
//! | Variant      | Source                         | Retryable            |
//! |--------------|--------------------------------|----------------------|
//! | `Network`    | no response (connect, timeout) | yes                  |
//! | `Client`     | 4xx except 429                 | no                   |
//! | `RateLimit`  | 429                            | yes, honours hint    |
//! | `Server`     | 5xx                            | only 502, 503, 504   |
//! | `Validation` | pre-flight contract violation  | no                   |
//! | `Decode`     | 2xx with an undecodable body   | no                   |

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Seconds to wait when a 429 response carries no usable `Retry-After` hint.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Errors produced when talking to a remote REST API.
///
/// Only [`ApiError::RateLimit`] carries a retry hint, and it always carries
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The request never produced a response.
    #[error("network error: {message}")]
    Network { message: String },

    /// The remote rejected the request as malformed or unauthorized.
    #[error("client error ({status}): {message}")]
    Client { status: u16, message: String },

    /// The remote asked us to slow down.
    #[error("rate limited, retry after {retry_after_seconds}s: {message}")]
    RateLimit {
        retry_after_seconds: u64,
        message: String,
    },

    /// The remote failed to serve the request.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// A local contract was violated before any I/O happened.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A successful response body did not match the expected shape.
    #[error("failed to decode response: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Builds a [`ApiError::Network`] from any displayable cause.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Builds a [`ApiError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a [`ApiError::RateLimit`] with an explicit hint.
    pub fn rate_limited(retry_after_seconds: u64, message: impl Into<String>) -> Self {
        Self::RateLimit {
            retry_after_seconds,
            message: message.into(),
        }
    }

    /// Classifies a non-success status code.
    ///
    /// `retry_after` is only consulted for `429`; a missing hint falls back to
    /// [`DEFAULT_RETRY_AFTER_SECS`]. Statuses below 400 that reach this point
    /// (unfollowed redirects, informational codes) are reported as client
    /// errors since retrying them cannot change the outcome.
    pub fn from_status(
        status: StatusCode,
        retry_after: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let code = status.as_u16();
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimit {
                retry_after_seconds: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
                message,
            }
        } else if status.is_server_error() {
            Self::Server {
                status: code,
                message,
            }
        } else {
            Self::Client {
                status: code,
                message,
            }
        }
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::RateLimit { .. } => Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
            Self::Network { .. } | Self::Validation { .. } | Self::Decode { .. } => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode {
                message: err.to_string(),
            };
        }
        match err.status() {
            Some(status) => Self::from_status(status, None, err.to_string()),
            None => Self::network(err.to_string()),
        }
    }
}

/// Classification hook used by [`crate::RetryCoordinator`].
///
/// Implemented for [`ApiError`]; other error types can opt in to the same
/// retry loop by implementing it.
pub trait Retryable {
    /// Whether a failed attempt may succeed if repeated.
    fn is_retryable(&self) -> bool;

    /// Minimum wait requested by the remote before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimit { .. } => true,
            Self::Server { status, .. } => matches!(status, 502..=504),
            Self::Client { .. } | Self::Validation { .. } | Self::Decode { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit {
                retry_after_seconds,
                ..
            } => Some(Duration::from_secs(*retry_after_seconds)),
            _ => None,
        }
    }
}
