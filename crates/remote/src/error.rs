//! Error types for remote API calls.
//!
//! Errors carry the remote system's own message verbatim. Nothing in this
//! crate retries; the category only tells the caller what kind of failure it
//! was and what to suggest to the user.

use std::fmt;

/// Result type alias for remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of remote errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Could not reach the API or the transport failed.
    Network,
    /// Credentials were missing or rejected.
    Auth,
    /// The remote system rejected the request.
    Rejected,
    /// The addressed entity does not exist.
    NotFound,
    /// The response could not be understood.
    Format,
    /// The caller cancelled the call or its deadline passed.
    Cancelled,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::Rejected => "Request rejected by the API",
            Self::NotFound => "Entity not found",
            Self::Format => "Invalid API response",
            Self::Cancelled => "Operation cancelled",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your internet connection and the configured API URL",
            Self::Auth => "Check SCRIBAE_API_TOKEN or api_token in config.toml",
            Self::Rejected => "Review the message returned by the API and adjust the manifest",
            Self::NotFound => "Verify the uuid or alt_id and parent references",
            Self::Format => "The API may have changed; check the configured API URL",
            Self::Cancelled => "Increase --timeout or run the command again",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the remote API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The API answered with an error message.
    #[error("{0}")]
    Remote(String),

    /// The addressed entity does not exist.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Entity kind, e.g. "script group".
        kind: &'static str,
        /// Key used for the lookup.
        key: String,
    },

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The call was cancelled before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation does not exist for this entity kind.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http {
                status: Some(401 | 403),
                ..
            } => ErrorCategory::Auth,
            Error::Http {
                status: Some(404), ..
            } => ErrorCategory::NotFound,
            Error::Http {
                status: Some(400..=499),
                ..
            } => ErrorCategory::Rejected,
            Error::Http { .. } => ErrorCategory::Network,
            Error::Remote(_) => ErrorCategory::Rejected,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::InvalidResponse(_) => ErrorCategory::Format,
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Unsupported(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether the call was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
