//! Core types for declarative resource reconciliation

use crate::diff::Difference;
use crate::error::Error;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default budget for long-running operations and the post-delete wait
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Interval between GETs while waiting for a deleted resource to disappear
pub const DEFAULT_DELETE_POLL_INTERVAL: Duration = Duration::from_secs(20);

/// Desired state flag of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// The resource should exist and match the desired document
    #[default]
    Present,
    /// The resource should not exist
    Absent,
}

impl DesiredState {
    /// Check if the resource should exist
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

impl FromStr for DesiredState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "absent" => Ok(Self::Absent),
            other => Err(Error::bad_input(format!(
                "state must be one of present, absent (got '{other}')"
            ))),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// Observed state of the remote resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState {
    /// Resource exists; holds its wire representation
    Present(Value),
    /// Resource does not exist
    Absent,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The observed document, if the resource exists
    pub fn document(&self) -> Option<&Value> {
        match self {
            Self::Present(doc) => Some(doc),
            Self::Absent => None,
        }
    }
}

/// Action selected by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// No mutation needed
    Noop,
    /// Resource must be created
    Create,
    /// Resource exists but differs from desired
    Update,
    /// Resource must be removed
    Delete,
}

impl Action {
    /// Check if the action mutates the remote resource
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Noop)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Noop => "noop",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{name}")
    }
}

/// SDK operation kinds, used for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{name}")
    }
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Whether the remote resource was (or in check mode, would be) modified
    pub changed: bool,
    /// Action that was selected
    pub action: Action,
    /// Whether the invocation ran in check mode
    pub check_mode: bool,
    /// Full resource identifier
    pub id: Option<String>,
    /// Status fields selected by the module
    pub outputs: Map<String, Value>,
    /// First difference that triggered an update
    pub diff: Option<Difference>,
}

impl Outcome {
    /// Render the operator-facing result: `{changed, id?, <outputs>...}`
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("changed".to_string(), Value::Bool(self.changed));
        if let Some(id) = &self.id {
            out.insert("id".to_string(), Value::String(id.clone()));
        }
        for (key, value) in &self.outputs {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }
}

/// Summary of a batch of invocations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub no_change: usize,
    pub failed: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.no_change + self.failed
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match (outcome.action, outcome.changed) {
            (Action::Create, true) => self.created += 1,
            (Action::Update, true) => self.updated += 1,
            (Action::Delete, true) => self.deleted += 1,
            _ => self.no_change += 1,
        }
    }

    /// Record a failed invocation
    pub fn add_failure(&mut self) {
        self.failed += 1;
    }
}

/// Options for one invocation
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Decide the action but do not mutate anything
    pub check_mode: bool,
    /// Overall budget for resolving a long-running operation
    pub operation_timeout: Duration,
    /// Interval between GETs after a delete
    pub delete_poll_interval: Duration,
    /// Overall budget for the post-delete wait
    pub delete_timeout: Duration,
    /// Retry policy for transient upstream failures
    pub retry: RetryConfig,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            check_mode: false,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            delete_poll_interval: DEFAULT_DELETE_POLL_INTERVAL,
            delete_timeout: DEFAULT_OPERATION_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

impl ExecuteOptions {
    /// Options for a dry run
    pub fn check() -> Self {
        Self {
            check_mode: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_desired_state_parse() {
        assert_eq!("present".parse::<DesiredState>().unwrap(), DesiredState::Present);
        assert_eq!("absent".parse::<DesiredState>().unwrap(), DesiredState::Absent);
        assert!("Present".parse::<DesiredState>().is_err());
        assert_eq!(DesiredState::default(), DesiredState::Present);
    }

    #[test]
    fn test_outcome_to_json() {
        let mut outputs = Map::new();
        outputs.insert("status".to_string(), json!("Active"));
        let outcome = Outcome {
            changed: true,
            action: Action::Create,
            check_mode: false,
            id: Some("/x/eh1".to_string()),
            outputs,
            diff: None,
        };
        assert_eq!(
            outcome.to_json(),
            json!({"changed": true, "id": "/x/eh1", "status": "Active"})
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        let outcome = Outcome {
            changed: true,
            action: Action::Delete,
            check_mode: false,
            id: None,
            outputs: Map::new(),
            diff: None,
        };
        summary.add_outcome(&outcome);
        summary.add_outcome(&Outcome {
            changed: false,
            action: Action::Noop,
            ..outcome.clone()
        });
        summary.add_failure();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.total_changes(), 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_default_options() {
        let opts = ExecuteOptions::default();
        assert!(!opts.check_mode);
        assert_eq!(opts.operation_timeout, Duration::from_secs(1200));
        assert_eq!(opts.delete_poll_interval, Duration::from_secs(20));
        assert!(ExecuteOptions::check().check_mode);
    }
}
