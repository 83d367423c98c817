//! Ctrl-C handling
//!
//! The first SIGINT sets the run's cancellation flag; the driver stops at
//! its next check between Azure calls. In-flight calls are not interrupted.
//! The handler then restores the default action, so a second SIGINT
//! terminates the process even while a call is blocked.

use declarative::CancelFlag;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static CANCELLED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    if let Some(flag) = CANCELLED.get() {
        flag.store(true, Ordering::SeqCst);
    }
    // SAFETY: signal(2) is async-signal-safe; resetting to SIG_DFL makes
    // the next SIGINT fatal.
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

/// Route the first SIGINT to `cancel`. Only the first call has any effect.
#[cfg(unix)]
pub fn install(cancel: &CancelFlag) {
    if CANCELLED.set(Arc::clone(cancel.as_atomic())).is_err() {
        return;
    }

    // SAFETY: the handler only performs an atomic store and a signal(2)
    // call, both async-signal-safe. The flag is set before installation.
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install(cancel: &CancelFlag) {
    let _ = CANCELLED.set(Arc::clone(cancel.as_atomic()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_shares_the_flag() {
        let cancel = CancelFlag::new();
        install(&cancel);
        if let Some(flag) = CANCELLED.get()
            && Arc::ptr_eq(flag, cancel.as_atomic())
        {
            flag.store(true, Ordering::SeqCst);
            assert!(cancel.is_cancelled());
        }
    }

    #[cfg(unix)]
    fn current_sigint_handler() -> libc::sighandler_t {
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        // SAFETY: a null new action only queries the current disposition.
        let rc = unsafe { libc::sigaction(libc::SIGINT, std::ptr::null(), &mut action) };
        assert_eq!(rc, 0);
        action.sa_sigaction
    }

    #[cfg(unix)]
    #[test]
    fn test_first_sigint_cancels_and_restores_default() {
        let cancel = CancelFlag::new();
        install(&cancel);
        let Some(flag) = CANCELLED.get() else {
            panic!("flag not installed");
        };
        assert_eq!(current_sigint_handler(), on_sigint as libc::sighandler_t);

        on_sigint(libc::SIGINT);
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(current_sigint_handler(), libc::SIG_DFL);
    }
}
