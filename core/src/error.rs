//! Error types for connector clients.
//!
//! # Design
//! Every failure in the pipeline is classified into exactly one `ApiError`
//! variant before it reaches the caller. Lower layers never swallow errors;
//! they map them onto this taxonomy and return. The retry decision is a
//! property of the variant (see [`ApiError::is_retryable`]), so callers can
//! apply a backoff policy without inspecting messages.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors returned by settings resolution, request building, transport and
/// response mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required setting is missing, empty, or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request never produced a response (DNS, connect, reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// No complete response arrived within the per-call timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend rejected the credentials (HTTP 401 or 403).
    #[error("authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// The backend returned any other non-2xx status.
    #[error("backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },

    /// A payload did not match the expected schema. `path` names the
    /// offending field, `$` denotes the document root.
    #[error("validation failed at `{path}`: {reason}")]
    Validation { path: String, reason: String },
}

/// Coarse classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Network,
    Timeout,
    Authentication,
    Backend,
    Validation,
}

/// Flat, serializable description of a failure for logs and host callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ApiError {
    pub(crate) fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ApiError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Configuration(_) => ErrorKind::Configuration,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::Backend { .. } => ErrorKind::Backend,
            ApiError::Validation { .. } => ErrorKind::Validation,
        }
    }

    /// HTTP status reported by the backend, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { status, .. } | ApiError::Backend { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Transient transport failures and server-side errors (5xx, 429) are
    /// retryable. Contract mismatches, rejected credentials, bad settings and
    /// other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Backend { status, .. } => *status >= 500 || *status == 429,
            ApiError::Configuration(_)
            | ApiError::Authentication { .. }
            | ApiError::Validation { .. } => false,
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
            status: self.status(),
        }
    }
}
