//! Single-slot notification between an engine and the code it serves.
//!
//! An engine [`raise`](Signal::raise)s a signal when it has something for the
//! application (a received frame, a finished send) and then waits, one poll at
//! a time, until the application [`acknowledge`](Signal::acknowledge)s it.
//! At most one notification is outstanding per signal.
//!
//! Signals only use atomic loads and stores, so they can live in a `static`
//! shared with interrupt handlers on targets without compare-and-swap.

use core::sync::atomic::{AtomicBool, Ordering};

/// A flag raised by a producer and cleared by its consumer.
#[derive(Debug, Default)]
pub struct Signal {
    raised: AtomicBool,
}

impl Signal {
    /// Creates a cleared signal.
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    /// Marks the notification as pending.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Whether a notification is pending.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Clears the notification, telling the engine it has been processed.
    pub fn acknowledge(&self) {
        self.raised.store(false, Ordering::Release);
    }

    /// Returns whether a notification was pending, acknowledging it.
    ///
    /// Only the consumer side may call this.
    pub fn take(&self) -> bool {
        let raised = self.is_raised();
        if raised {
            self.acknowledge();
        }
        raised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_raise_and_acknowledge() {
        let signal = Signal::new();
        assert!(!signal.is_raised());
        signal.raise();
        assert!(signal.is_raised());
        signal.acknowledge();
        assert!(!signal.is_raised());
    }

    #[test]
    fn test_take_consumes_pending_notification() {
        static SIGNAL: Signal = Signal::new();
        assert!(!SIGNAL.take());
        SIGNAL.raise();
        assert!(SIGNAL.take());
        assert!(!SIGNAL.is_raised());
    }
}
