//! Errors surfaced to the caller of a chat turn, and by the relay to its
//! HTTP clients.

use std::time::Duration;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::types::ErrorBody;

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please try again in a moment.";
pub const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable. Please try again later.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to get response";
pub const NO_BODY_MESSAGE: &str = "No response body";

/// Stable classification of a [`ChatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimited,
    Unavailable,
    RequestFailed,
    Transport,
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    /// Quota or billing exhaustion upstream (HTTP 402).
    #[error("Service temporarily unavailable. Please try again later.")]
    Unavailable,

    #[error("{0}")]
    RequestFailed(String),

    #[error("Failed to get response")]
    Transport { detail: String },

    #[error("Timed out waiting for a response")]
    Timeout(Duration),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::RateLimited => ErrorKind::RateLimited,
            ChatError::Unavailable => ErrorKind::Unavailable,
            ChatError::RequestFailed(_) => ErrorKind::RequestFailed,
            ChatError::Transport { .. } => ErrorKind::Transport,
            ChatError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    pub fn transport(err: impl std::fmt::Display) -> Self {
        ChatError::Transport {
            detail: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::transport(format!("request timed out: {err}"))
        } else {
            ChatError::transport(err)
        }
    }
}

/// Failures of a relayed chat request. Rendered as `{ "error": "..." }`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    RateLimited(&'static str),

    #[error("{0}")]
    QuotaExhausted(&'static str),

    #[error("{0}")]
    Unavailable(&'static str),

    #[error("gateway API key is not configured")]
    MissingApiKey,

    #[error("{0}")]
    Gateway(#[from] reqwest::Error),

    #[error("{0}")]
    InvalidRequest(#[from] JsonRejection),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            RelayError::QuotaExhausted(_) => StatusCode::PAYMENT_REQUIRED,
            RelayError::Unavailable(_)
            | RelayError::MissingApiKey
            | RelayError::Gateway(_)
            | RelayError::InvalidRequest(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
