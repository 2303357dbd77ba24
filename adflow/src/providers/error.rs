//! Structured provider error with retryability classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The kind of failure a collaborator reported.
///
/// Adapters map heterogeneous upstream failures into one of these kinds;
/// the retry engine only ever consults the kind, never the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Upstream rate limiting (HTTP 429 class).
    RateLimited,
    /// Provider reported overload (HTTP 529 class).
    Overloaded,
    /// Upstream 5xx-class failure.
    ServerError,
    /// A stage attempt exceeded its contract timeout.
    Timeout,
    /// The request itself was invalid; retrying cannot help.
    InvalidInput,
    /// The provider returned output the adapter could not interpret.
    MalformedResponse,
    /// Failure the adapter could not map to a known kind.
    Unclassified,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Overloaded => write!(f, "overloaded"),
            Self::ServerError => write!(f, "server_error"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::Unclassified => write!(f, "unclassified"),
        }
    }
}

impl ProviderErrorKind {
    /// Returns true if a failure of this kind is worth retrying.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Overloaded | Self::ServerError | Self::Timeout
        )
    }
}

/// A failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// The classified failure kind.
    pub kind: ProviderErrorKind,
    /// Short human-readable description; never a backtrace.
    pub message: String,
}

impl ProviderError {
    /// Creates an error with an explicit kind.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a rate-limited error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    /// Creates an overloaded error.
    #[must_use]
    pub fn overloaded(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Overloaded, message)
    }

    /// Creates a 5xx-class server error.
    #[must_use]
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ServerError, message)
    }

    /// Creates a stage-attempt timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Creates a validation error; never retried.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidInput, message)
    }

    /// Creates a malformed-response error; never retried.
    #[must_use]
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }

    /// Classifies a raw upstream failure at the adapter boundary.
    ///
    /// Status codes win over message sniffing; the substring checks are
    /// deliberately loose to tolerate heterogeneous upstream error shapes.
    /// Anything unrecognised lands on the non-retryable `Unclassified`.
    #[must_use]
    pub fn from_upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = match status {
            Some(429) => ProviderErrorKind::RateLimited,
            Some(529) => ProviderErrorKind::Overloaded,
            Some(500 | 502 | 503 | 504) => ProviderErrorKind::ServerError,
            _ => {
                let lowered = message.to_lowercase();
                if lowered.contains("overloaded") {
                    ProviderErrorKind::Overloaded
                } else if lowered.contains("rate limit") {
                    ProviderErrorKind::RateLimited
                } else {
                    ProviderErrorKind::Unclassified
                }
            }
        };
        Self { kind, message }
    }

    /// Returns true if the error is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
