//! Error types for reconciliation.
//!
//! Errors are categorized so callers can tell operator mistakes apart from
//! upstream failures. Every upstream error carries the resource kind, the
//! resource identifier and the operation that failed.

use crate::types::OperationKind;
use std::time::Duration;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The operator document or a catalog rule is wrong
    Input,
    /// The remote resource does not exist
    NotFound,
    /// The cloud API rejected or failed an operation
    Upstream,
    /// A long-running operation or delete wait ran out of budget
    Timeout,
    /// The invocation was aborted between two calls
    Cancelled,
}

impl ErrorCategory {
    /// Whether the error is recovered locally instead of failing the invocation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Input => "Invalid input",
            Self::NotFound => "Resource not found",
            Self::Upstream => "Cloud API error",
            Self::Timeout => "Operation timed out",
            Self::Cancelled => "Operation cancelled",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Input => "Fix the resource document and run again",
            Self::NotFound => "No action needed - the resource is treated as absent",
            Self::Upstream => "Check the upstream message and the resource in the portal",
            Self::Timeout => "Increase the timeout or check the resource's provisioning state",
            Self::Cancelled => "Run again to converge the resource",
        }
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum Error {
    /// The operator document is structurally invalid or a typed rule saw the wrong type
    #[error("bad input: {message}")]
    BadInput {
        /// What was wrong with the input
        message: String,
    },

    /// A normalization rule is malformed
    #[error("bad rule `{path}`: {message}")]
    BadRule {
        /// Path of the offending rule
        path: String,
        /// What is wrong with the rule
        message: String,
    },

    /// The remote resource does not exist
    #[error("{kind} {id} not found")]
    NotFound {
        /// Resource kind (e.g. "Event Hub")
        kind: String,
        /// Resource identifier
        id: String,
    },

    /// The cloud API failed an operation
    #[error("{operation} {kind} {id} failed: {message}")]
    Upstream {
        /// Operation that failed
        operation: OperationKind,
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
        /// Upstream detail
        message: String,
    },

    /// A long-running operation or the post-delete wait exceeded its budget
    #[error("{operation} {kind} {id} did not finish within {}s", .waited.as_secs())]
    OperationTimeout {
        /// Operation that was waited on
        operation: OperationKind,
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
        /// Time spent waiting
        waited: Duration,
    },

    /// The desired document changes a property the cloud API cannot update in place
    #[error("cannot update {path} of {kind} {id} in place ({reason})")]
    NotUpdatable {
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
        /// Path of the property
        path: String,
        /// How the values differ (`desired != observed`)
        reason: String,
    },

    /// The invocation was cancelled before the named operation
    #[error("{operation} {kind} {id} was cancelled")]
    Cancelled {
        /// Operation that was about to run
        operation: OperationKind,
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
    },
}

impl Error {
    /// Create a bad-input error.
    pub fn bad_input(message: impl Into<String>) -> Self {
        Self::BadInput {
            message: message.into(),
        }
    }

    /// Create a bad-rule error.
    pub fn bad_rule(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRule {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::BadInput { .. } | Error::BadRule { .. } | Error::NotUpdatable { .. } => {
                ErrorCategory::Input
            }
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Upstream { .. } => ErrorCategory::Upstream,
            Error::OperationTimeout { .. } => ErrorCategory::Timeout,
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }
}

/// A failed invocation.
///
/// `changed` is true when the upstream already acknowledged a mutation
/// before the failure, e.g. a create whose long-running operation failed.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Failure {
    /// Whether the remote resource was already modified
    pub changed: bool,
    /// What went wrong
    pub error: Error,
}

impl Failure {
    /// A failure that happened before any mutation was acknowledged.
    pub fn unchanged(error: Error) -> Self {
        Self {
            changed: false,
            error,
        }
    }

    /// A failure that happened after the upstream acknowledged a mutation.
    pub fn after_change(error: Error) -> Self {
        Self {
            changed: true,
            error,
        }
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self::unchanged(error)
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
