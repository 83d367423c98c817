//! # Declarative
//!
//! A framework for declarative reconciliation of cloud resources.
//!
//! An operator document states what a resource should look like. This crate
//! turns that document into the wire vocabulary of the cloud API, reads the
//! current resource, decides between no-op, create, update and delete, and
//! drives the API until the resource converges.
//!
//! ## Core Concepts
//!
//! - **Rules** ([`RuleSet`]): path + operation pairs that normalize the
//!   operator document (snake_case to camelCase, enum remaps, envelopes,
//!   identifier assembly)
//! - **Comparator** ([`Comparator`]): asymmetric structural comparison where
//!   unset desired fields never cause updates
//! - **Module** ([`ModuleDefinition`]): catalog data for one resource type
//! - **Client** ([`ResourceClient`]): the cloud SDK seam, with long-running
//!   operations behind [`Poller`]
//! - **Driver** ([`reconcile`]): GET, decide, mutate, wait
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     ApplyContext, ExecuteOptions, ModuleDefinition, NoProgress, SystemClock, reconcile,
//! };
//!
//! let module: ModuleDefinition = catalog.get("eventhub")?;
//! let request = module.parse_request(&input, &defaults)?;
//!
//! let clock = SystemClock::new();
//! let mut progress = NoProgress;
//! let mut ctx = ApplyContext::new(&clock, &mut progress);
//! let outcome = reconcile(&module, &request, &client, &ExecuteOptions::default(), &mut ctx)?;
//! println!("{}", outcome.to_json());
//! ```
//!
//! ## Provider Traits
//!
//! - [`ResourceClient`]: performs the cloud calls
//! - [`Clock`]: time source for polling and backoff
//! - [`ProgressCallback`]: receives progress updates
//!
//! This allows the crate to be used without hard dependencies on an HTTP
//! stack, a terminal, or real time.

pub mod client;
pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lro;
pub mod normalize;
pub mod planner;
pub mod resource;
pub mod retry;
pub mod transform;
pub mod types;

// Re-export main types at crate root
pub use client::{
    ClientError, ClientResult, Operation, PollStatus, Poller, ResourceClient, Target, WriteOptions,
};
pub use context::{
    ApplyContext, CancelFlag, Clock, ManualClock, NoProgress, ProgressCallback, SystemClock,
};
pub use diff::{Comparator, Comparison, Difference, Modifier, Modifiers, ResourceDiff, Verdict, compare};
pub use error::{Error, ErrorCategory, Failure, Result};
pub use executor::{plan, reconcile};
pub use normalize::{Rule, RuleOp, RulePath, RuleSet, normalize};
pub use planner::{Decision, decide};
pub use resource::{ArgKind, ArgSpec, ModuleDefinition, OutputField, Request, UpdateStyle};
pub use retry::RetryConfig;
pub use transform::{Fragments, ResourceIdTemplate};
pub use types::{
    Action, DesiredState, ExecuteOptions, ExecuteSummary, OperationKind, Outcome, ResourceState,
};
