//! Cancellation tokens for in-flight chunk pipelines
//!
//! A token is the one termination signal a chunk pipeline ever receives:
//! disposal cancels it, and every asynchronous stage re-checks it on
//! resume before mutating shared state. Resources acquired before the
//! cancellation (an allocated buffer region, a registered collision
//! object) are released through the token's callback chain, so teardown is
//! symmetric no matter which stage was in flight.

use std::sync::{Arc, Mutex};

type ReleaseFn = Box<dyn FnOnce() + Send>;

enum TokenState {
    Active(Vec<ReleaseFn>),
    Cancelled,
}

/// Shared one-way abort signal with ordered release callbacks
///
/// Clones observe the same signal. Cancellation is cooperative: a stage
/// already suspended runs to completion, but its continuation must poll
/// [`is_cancelled`](Self::is_cancelled) before touching shared state.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Mutex<TokenState>>,
}

impl CancellationToken {
    /// Create an active token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(TokenState::Active(Vec::new()))),
        }
    }

    /// Non-blocking poll of the cancellation state
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.inner.lock().unwrap(), TokenState::Cancelled)
    }

    /// Register a release callback
    ///
    /// Callbacks run exactly once, in registration order, when the token is
    /// cancelled. Registering on an already-cancelled token runs the
    /// callback immediately.
    pub fn on_cancel(&self, callback: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.lock().unwrap();
        match &mut *state {
            TokenState::Active(callbacks) => callbacks.push(Box::new(callback)),
            TokenState::Cancelled => {
                drop(state);
                callback();
            }
        }
    }

    /// Transition to `Cancelled` and run every registered callback
    ///
    /// Cancelling twice is a no-op. Callbacks run synchronously on the
    /// calling thread, outside the token's lock.
    pub fn cancel(&self, reason: &str) {
        let callbacks = {
            let mut state = self.inner.lock().unwrap();
            match std::mem::replace(&mut *state, TokenState::Cancelled) {
                TokenState::Active(callbacks) => callbacks,
                TokenState::Cancelled => {
                    log::trace!("token already cancelled ({})", reason);
                    return;
                }
            }
        };
        log::debug!("cancelled ({}), running {} release callbacks", reason, callbacks.len());
        for callback in callbacks {
            callback();
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callbacks_run_once_in_order() {
        let token = CancellationToken::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            token.on_cancel(move || order.lock().unwrap().push(i));
        }

        assert!(!token.is_cancelled());
        token.cancel("test");
        assert!(token.is_cancelled());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);

        // second cancel must not re-run anything
        token.cancel("test again");
        assert_eq!(order.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_late_registration_fires_immediately() {
        let token = CancellationToken::new();
        token.cancel("test");

        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = Arc::clone(&fired);
        token.on_cancel(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let observer = token.clone();

        token.cancel("test");
        assert!(observer.is_cancelled());
    }
}
