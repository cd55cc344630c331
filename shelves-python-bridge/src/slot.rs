//! Pending input slot
//!
//! The hand-off between the UI thread and the bridge worker when the module
//! asks the user a question. The worker marks the slot as waiting and blocks;
//! the UI fills it on send and wakes the worker.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::debug;

#[derive(Debug, Default)]
struct SlotState {
    pending: String,
    waiting: bool,
    closed: bool,
}

/// Single-value mailbox guarded by a condition variable.
///
/// `waiting` is true exactly while a `request` call is blocked.
#[derive(Debug, Default)]
pub struct InputSlot {
    state: Mutex<SlotState>,
    delivered: Condvar,
}

impl InputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Every write leaves the state consistent, so poisoning is ignored
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the UI delivers a value.
    ///
    /// `announce` runs after the slot is marked as waiting, so a send that
    /// races the announcement is never lost. Returns `None` if the slot is
    /// closed before or while waiting.
    pub fn request(&self, announce: impl FnOnce()) -> Option<String> {
        {
            let mut state = self.lock();
            if state.closed {
                return None;
            }
            state.waiting = true;
        }

        announce();

        let mut state = self.lock();
        while state.waiting && !state.closed {
            state = self
                .delivered
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        if state.waiting {
            state.waiting = false;
            return None;
        }
        Some(state.pending.clone())
    }

    /// Deliver `value` to the blocked request, if there is one.
    ///
    /// Returns `false` and leaves the slot untouched when nothing is waiting.
    pub fn submit(&self, value: &str) -> bool {
        let mut state = self.lock();
        if !state.waiting {
            debug!("Send ignored: no input request is pending");
            return false;
        }
        state.pending = value.to_string();
        state.waiting = false;
        self.delivered.notify_all();
        true
    }

    /// Abandon the current request and refuse all later ones.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.delivered.notify_all();
    }

    pub fn is_waiting(&self) -> bool {
        self.lock().waiting
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// The last delivered value.
    #[cfg(test)]
    fn pending(&self) -> String {
        self.lock().pending.clone()
    }
}
