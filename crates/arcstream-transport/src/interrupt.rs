//! Cross-thread cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mio::Waker;

/// Cancels blocked transport calls from another thread.
///
/// The flag is checked before and after every wait. When a channel is open,
/// the waker registered in that channel's poll is woken as well, so a call that
/// is already blocked returns promptly instead of sitting out its deadline.
///
/// Share it through an `Arc`; [`interrupt`](Self::interrupt) may be called any
/// number of times from any thread, including after the owner has finished.
#[derive(Debug, Default)]
pub struct Interrupter {
    interrupted: AtomicBool,
    waker: Mutex<Option<Arc<Waker>>>,
}

impl Interrupter {
    /// Creates an interrupter that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags cancellation and wakes the blocked wait, if any.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);

        if let Ok(slot) = self.waker.lock()
            && let Some(waker) = slot.as_ref()
            && let Err(e) = waker.wake()
        {
            tracing::debug!("Failed to wake transport poll: {e}");
        }
    }

    /// Returns true once [`interrupt`](Self::interrupt) has been called and the
    /// owner has not reset the transport since.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub(crate) fn arm(&self, waker: Arc<Waker>) {
        if let Ok(mut slot) = self.waker.lock() {
            *slot = Some(waker);
        }
    }

    pub(crate) fn disarm(&self) {
        if let Ok(mut slot) = self.waker.lock() {
            slot.take();
        }
    }

    pub(crate) fn reset(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }
}
