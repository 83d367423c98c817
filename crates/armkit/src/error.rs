//! Error types for ARM collaborators.

use thiserror::Error;

/// Errors raised outside the reconciliation driver.
#[derive(Debug, Error)]
pub enum Error {
    /// A string is not a well-formed ARM resource identifier
    #[error("invalid resource id '{id}': {reason}")]
    InvalidResourceId {
        /// The offending identifier
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// No catalog module has this name
    #[error("unknown module '{name}'")]
    UnknownModule {
        /// Requested module name
        name: String,
    },

    /// A catalog entry failed validation
    #[error("module '{module}' is malformed: {source}")]
    Catalog {
        /// Module name
        module: String,
        /// Underlying rule or argument error
        #[source]
        source: declarative::Error,
    },
}

/// Result type for armkit operations.
pub type Result<T> = std::result::Result<T, Error>;
