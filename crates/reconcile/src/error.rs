//! Error types for reconciliation.
//!
//! Validation, constraint and identity errors are always raised before any
//! remote call. Adapter errors carry the remote failure unchanged.

use crate::identity::EntityKind;
use rules::Violation;
use std::fmt;
use uuid::Uuid;

/// Result type alias for reconciliation.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of reconciliation errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A field failed its rule.
    Validation,
    /// A cross-field constraint was broken.
    Constraint,
    /// The entity could not be addressed.
    Identity,
    /// The remote call failed.
    Adapter,
    /// The remote call was cancelled.
    Cancelled,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid field value",
            Self::Constraint => "Conflicting fields",
            Self::Identity => "Entity cannot be addressed",
            Self::Adapter => "Remote call failed",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Whether the error was detected before contacting the remote API.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation | Self::Constraint | Self::Identity)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

fn list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while reconciling one entity.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// One or more fields failed their rules.
    #[error("invalid configuration: {}", list(.0))]
    Validation(Vec<Violation>),

    /// A cross-field constraint was broken.
    #[error("conflicting fields: {}", list(.0))]
    Constraint(Vec<Violation>),

    /// Malformed id or alt id, or an unresolvable parent reference.
    #[error("cannot address {kind}: {message}")]
    Identity {
        /// Entity kind.
        kind: EntityKind,
        /// What is wrong with the address.
        message: String,
    },

    /// The remote call failed.
    #[error(transparent)]
    Adapter(#[from] remote::Error),

    /// The server acted on a different entity than the one addressed.
    #[error("{kind} update acted on {actual}, expected {expected}")]
    IdMismatch {
        /// Entity kind.
        kind: EntityKind,
        /// Id that was addressed.
        expected: Uuid,
        /// Id the server reported.
        actual: Uuid,
    },
}

impl Error {
    /// Create an identity error.
    pub fn identity(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Identity {
            kind,
            message: message.into(),
        }
    }

    /// Create a validation error for a single field.
    pub fn invalid(field: &str, detail: impl Into<String>) -> Self {
        Self::Validation(vec![Violation::new(
            field,
            format!("invalid {field}"),
            detail,
        )])
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::Constraint(_) => ErrorCategory::Constraint,
            Error::Identity { .. } => ErrorCategory::Identity,
            Error::Adapter(e) if e.is_cancelled() => ErrorCategory::Cancelled,
            Error::Adapter(_) | Error::IdMismatch { .. } => ErrorCategory::Adapter,
        }
    }

    /// Field violations carried by validation and constraint errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Error::Validation(v) | Error::Constraint(v) => v,
            _ => &[],
        }
    }
}
