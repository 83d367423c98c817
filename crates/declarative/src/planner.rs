//! Action selection
//!
//! ```text
//!             observed?
//! desired     |  absent    present
//! ------------+---------------------------
//!   absent    |  NOOP      DELETE
//!   present   |  CREATE    compare(D, O): EQUAL -> NOOP, CHANGED -> UPDATE
//! ```

use crate::diff::{Comparator, Difference, Modifiers};
use crate::types::{Action, DesiredState, ResourceState};
use serde_json::Value;

/// The selected action and the differences behind it
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// Every difference between desired and observed (UPDATE only)
    pub differences: Vec<Difference>,
}

impl Decision {
    fn new(action: Action) -> Self {
        Self {
            action,
            differences: Vec::new(),
        }
    }

    /// The difference that triggered an update
    pub fn first_difference(&self) -> Option<&Difference> {
        self.differences.first()
    }

    /// A difference the API cannot apply in place, if any
    pub fn blocking_difference(&self) -> Option<&Difference> {
        self.differences.iter().find(|d| !d.updatable)
    }
}

/// Decide what to do with one resource.
pub fn decide(
    state: DesiredState,
    observed: &ResourceState,
    desired: &Value,
    modifiers: &Modifiers,
) -> Decision {
    match (state, observed) {
        (DesiredState::Absent, ResourceState::Absent) => Decision::new(Action::Noop),
        (DesiredState::Absent, ResourceState::Present(_)) => Decision::new(Action::Delete),
        (DesiredState::Present, ResourceState::Absent) => Decision::new(Action::Create),
        (DesiredState::Present, ResourceState::Present(current)) => {
            let differences = Comparator::new(modifiers).compare_all(desired, current);
            let action = if differences.is_empty() {
                Action::Noop
            } else {
                Action::Update
            };
            log::debug!("compared desired with observed: {} difference(s)", differences.len());
            Decision {
                action,
                differences,
            }
        }
    }
}
