//! Apply context and provider traits
//!
//! These traits allow the declarative crate to be used without depending on
//! a real clock, terminal, or signal handling.

use crate::types::{Action, OperationKind, Outcome};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Source of time for polling and backoff
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;

    /// Block for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall clock
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that advances only when slept on. Records every sleep.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration slept so far
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().map(|s| s.sleeps.clone()).unwrap_or_default()
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut state) = self.inner.lock() {
            state.now += duration;
        }
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        self.inner.lock().map(|s| s.now).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.inner.lock() {
            state.now += duration;
            state.sleeps.push(duration);
        }
    }
}

/// Cooperative cancellation flag, checked between calls
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The shared flag, for signal handlers
    pub fn as_atomic(&self) -> &Arc<AtomicBool> {
        &self.0
    }
}

/// Progress callback for reconciliation
///
/// Implement this trait to receive progress updates during an invocation.
pub trait ProgressCallback: Send {
    /// Called once the action has been decided
    fn on_action(&mut self, id: &str, action: Action);

    /// Called while waiting on a long-running operation or a delete
    fn on_wait(&mut self, id: &str, operation: OperationKind, waited: Duration);

    /// Called when the invocation finished successfully
    fn on_complete(&mut self, id: &str, outcome: &Outcome);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_action(&mut self, _id: &str, _action: Action) {}
    fn on_wait(&mut self, _id: &str, _operation: OperationKind, _waited: Duration) {}
    fn on_complete(&mut self, _id: &str, _outcome: &Outcome) {}
}

/// Context passed to the reconciliation driver
pub struct ApplyContext<'a> {
    /// Time source for polling and backoff
    pub clock: &'a dyn Clock,
    /// Checked before every upstream call
    pub cancel: CancelFlag,
    /// Receives progress updates
    pub progress: &'a mut dyn ProgressCallback,
}

impl<'a> ApplyContext<'a> {
    pub fn new(clock: &'a dyn Clock, progress: &'a mut dyn ProgressCallback) -> Self {
        Self {
            clock,
            cancel: CancelFlag::new(),
            progress,
        }
    }

    /// Use an externally owned cancellation flag
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }
}
