//! # armkit
//!
//! Azure Resource Manager collaborators for the [`declarative`] engine.
//!
//! - [`RestClient`]: a blocking ARM REST client implementing
//!   [`declarative::ResourceClient`], with long-running operation pollers
//! - [`MockBackend`]: an in-memory ARM used by tests and dry runs
//! - [`Catalog`]: the built-in resource modules
//! - [`ResourceId`]: resource identifier parsing
//! - [`model`]: conversion between the wire shape (with its `properties`
//!   envelope) and the flattened SDK model view modules are written against

pub mod catalog;
pub mod error;
pub mod mock;
pub mod model;
pub mod resource_id;
pub mod rest;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use mock::{CallKind, CallRecord, MockBackend};
pub use resource_id::ResourceId;
pub use rest::RestClient;
