//! Resolution of long-running operations
//!
//! A mutating call either finishes synchronously or hands back a poller.
//! [`resolve`] turns both into the final representation, polling at the
//! interval the API suggests until the operation ends or the budget runs out.

use crate::client::{ClientError, Operation, PollStatus};
use crate::context::{CancelFlag, Clock};
use crate::retry::{RetryConfig, with_retry};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Lower bound between two polls
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Why an operation did not resolve
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LroError {
    /// The budget ran out while the operation was still running
    #[error("still running after {}s", .0.as_secs())]
    Timeout(Duration),
    /// The operation finished with an error
    #[error("{0}")]
    Failed(String),
    /// Polling itself failed
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Cancellation was requested between two polls
    #[error("cancelled while waiting")]
    Cancelled,
}

/// Wait for `operation` to finish and return its final representation.
///
/// `on_wait` is called with the time waited so far after every poll that
/// found the operation still running. `cancel` is checked before each poll.
pub fn resolve(
    operation: Operation,
    budget: Duration,
    clock: &dyn Clock,
    retry: &RetryConfig,
    cancel: &CancelFlag,
    mut on_wait: impl FnMut(Duration),
) -> Result<Option<Value>, LroError> {
    let mut poller = match operation {
        Operation::Completed(value) => return Ok(value),
        Operation::Pending(poller) => poller,
    };

    let start = clock.elapsed();
    loop {
        if cancel.is_cancelled() {
            return Err(LroError::Cancelled);
        }
        match with_retry(retry, clock, None, || poller.poll())? {
            PollStatus::Succeeded(value) => return Ok(value),
            PollStatus::Failed(message) => return Err(LroError::Failed(message)),
            PollStatus::InProgress => {}
        }

        let waited = clock.elapsed().saturating_sub(start);
        if waited >= budget {
            return Err(LroError::Timeout(waited));
        }
        let delay = poller.interval().max(MIN_POLL_INTERVAL).min(budget - waited);
        log::debug!("operation still running after {}s, next poll in {}s", waited.as_secs(), delay.as_secs());
        on_wait(waited);
        clock.sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientResult, Poller};
    use crate::context::ManualClock;
    use serde_json::json;
    use std::collections::VecDeque;

    struct Scripted {
        steps: VecDeque<ClientResult<PollStatus>>,
        interval: Duration,
    }

    impl Scripted {
        fn boxed(steps: Vec<ClientResult<PollStatus>>) -> Box<dyn Poller> {
            Box::new(Self {
                steps: steps.into(),
                interval: Duration::from_secs(5),
            })
        }
    }

    impl Poller for Scripted {
        fn poll(&mut self) -> ClientResult<PollStatus> {
            self.steps.pop_front().unwrap_or(Ok(PollStatus::InProgress))
        }

        fn interval(&self) -> Duration {
            self.interval
        }
    }

    fn run(operation: Operation, budget: Duration, clock: &ManualClock) -> Result<Option<Value>, LroError> {
        resolve(operation, budget, clock, &RetryConfig::default(), &CancelFlag::new(), |_| {})
    }

    #[test]
    fn test_completed_returns_immediately() {
        let clock = ManualClock::new();
        let result = run(Operation::Completed(Some(json!({"a": 1}))), Duration::from_secs(60), &clock);
        assert_eq!(result.unwrap(), Some(json!({"a": 1})));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_polls_until_done() {
        let clock = ManualClock::new();
        let poller = Scripted::boxed(vec![
            Ok(PollStatus::InProgress),
            Ok(PollStatus::InProgress),
            Ok(PollStatus::Succeeded(Some(json!({"status": "Active"})))),
        ]);
        let result = run(Operation::Pending(poller), Duration::from_secs(60), &clock);
        assert_eq!(result.unwrap(), Some(json!({"status": "Active"})));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 2]);
    }

    #[test]
    fn test_failure_is_reported() {
        let clock = ManualClock::new();
        let poller = Scripted::boxed(vec![Ok(PollStatus::Failed("quota exceeded".into()))]);
        let result = run(Operation::Pending(poller), Duration::from_secs(60), &clock);
        assert_eq!(result, Err(LroError::Failed("quota exceeded".into())));
    }

    #[test]
    fn test_budget_bounds_the_wait() {
        let clock = ManualClock::new();
        let poller = Scripted::boxed(vec![]);
        let result = run(Operation::Pending(poller), Duration::from_secs(12), &clock);
        assert!(matches!(result, Err(LroError::Timeout(waited)) if waited == Duration::from_secs(12)));
        // 5 + 5 + 2: the last sleep is clipped to the remaining budget
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(5), Duration::from_secs(5), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_transient_poll_errors_are_retried() {
        let clock = ManualClock::new();
        let poller = Scripted::boxed(vec![
            Err(ClientError::api(503, "busy")),
            Ok(PollStatus::Succeeded(None)),
        ]);
        let result = run(Operation::Pending(poller), Duration::from_secs(60), &clock);
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_cancel_stops_polling() {
        let clock = ManualClock::new();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let poller = Scripted::boxed(vec![Ok(PollStatus::Succeeded(None))]);
        let result = resolve(
            Operation::Pending(poller),
            Duration::from_secs(60),
            &clock,
            &RetryConfig::default(),
            &cancel,
            |_| {},
        );
        assert_eq!(result, Err(LroError::Cancelled));
    }

    #[test]
    fn test_on_wait_reports_progress() {
        let clock = ManualClock::new();
        let poller = Scripted::boxed(vec![Ok(PollStatus::InProgress), Ok(PollStatus::Succeeded(None))]);
        let mut waits = Vec::new();
        resolve(
            Operation::Pending(poller),
            Duration::from_secs(60),
            &clock,
            &RetryConfig::default(),
            &CancelFlag::new(),
            |w| waits.push(w),
        )
        .unwrap();
        assert_eq!(waits, vec![Duration::ZERO]);
    }
}
