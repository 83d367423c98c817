//! Cloud SDK abstraction
//!
//! The [`ResourceClient`] trait is the only way the driver talks to the
//! cloud API, allowing for different implementations (REST, in-memory mock
//! for testing). Mutations may complete immediately or hand back a
//! [`Poller`] for a long-running operation.

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`ResourceClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The resource does not exist (HTTP 404)
    #[error("resource not found")]
    NotFound,

    /// The API answered with an error status
    #[error("{} ({status}): {message}", .code.as_deref().unwrap_or("Error"))]
    Api {
        /// HTTP status
        status: u16,
        /// ARM error code, when the body carried one
        code: Option<String>,
        /// Error message
        message: String,
    },

    /// The request never got an answer
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: None,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether the call may succeed when repeated as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound => false,
            Self::Api { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            Self::Transport(_) => true,
        }
    }
}

/// Result type for client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// The resource a call is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Resource kind, for messages (e.g. "Event Hub")
    pub kind: String,
    /// Full resource identifier
    pub id: String,
    /// API version of the resource type
    pub api_version: String,
}

impl Target {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            api_version: api_version.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// State of a long-running operation after one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    /// Still running
    InProgress,
    /// Finished; carries the final representation when the API returned one
    Succeeded(Option<Value>),
    /// Finished with an error
    Failed(String),
}

/// Handle on a long-running operation.
pub trait Poller: Send {
    /// Query the operation once.
    fn poll(&mut self) -> ClientResult<PollStatus>;

    /// How long to wait before the next poll.
    fn interval(&self) -> Duration;
}

/// Result of a mutating call
pub enum Operation {
    /// The call finished synchronously
    Completed(Option<Value>),
    /// The call started a long-running operation
    Pending(Box<dyn Poller>),
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(value) => f.debug_tuple("Completed").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Conditional write options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Send `If-Match` with this ETag
    pub if_match: Option<String>,
}

/// Client for one family of cloud resources.
///
/// Implementations map "does not exist" to [`ClientError::NotFound`] on
/// `get`; every other failure is reported as-is.
pub trait ResourceClient: Send + Sync {
    /// Read the current representation.
    fn get(&self, target: &Target) -> ClientResult<Value>;

    /// Create or fully replace the resource.
    fn create_or_update(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation>;

    /// Merge `body` into the existing resource.
    fn patch(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation>;

    /// Delete the resource.
    fn delete(&self, target: &Target, options: &WriteOptions) -> ClientResult<Operation>;

    /// Create the resource. Falls back to [`ResourceClient::create_or_update`].
    fn create(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        self.create_or_update(target, body, options)
    }

    /// Replace the resource. Falls back to [`ResourceClient::create_or_update`].
    fn update(&self, target: &Target, body: &Value, options: &WriteOptions) -> ClientResult<Operation> {
        self.create_or_update(target, body, options)
    }
}
