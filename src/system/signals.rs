//! Edge-triggered control signals.
//!
//! `capture`, `clear` and `quit` come from outside the tick loop (the
//! stdin command thread, or a test). Capture and clear are single-slot:
//! the loop consumes them at most once per tick, so several triggers
//! within one tick collapse to one. Quit is level-triggered and only
//! polled by the main loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared signal slots between the command thread and the tick loop.
#[derive(Debug, Default)]
pub struct CaptureSignals {
    capture: AtomicBool,
    clear: AtomicBool,
    quit: AtomicBool,
}

impl CaptureSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Request that the next tick seeds or fuses the current frame.
    pub fn request_capture(&self) {
        self.capture.store(true, Ordering::SeqCst);
    }

    /// Request that the next tick resets the model and pose.
    pub fn request_clear(&self) {
        self.clear.store(true, Ordering::SeqCst);
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    /// Consume the capture slot. True at most once per trigger.
    pub fn take_capture(&self) -> bool {
        self.capture.swap(false, Ordering::SeqCst)
    }

    /// Consume the clear slot. True at most once per trigger.
    pub fn take_clear(&self) -> bool {
        self.clear.swap(false, Ordering::SeqCst)
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_is_consumed_once() {
        let signals = CaptureSignals::new();
        signals.request_capture();
        assert!(signals.take_capture());
        assert!(!signals.take_capture());
    }

    #[test]
    fn test_multiple_triggers_collapse() {
        let signals = CaptureSignals::new();
        signals.request_clear();
        signals.request_clear();
        assert!(signals.take_clear());
        assert!(!signals.take_clear());
    }

    #[test]
    fn test_quit_is_level_triggered() {
        let signals = CaptureSignals::new();
        assert!(!signals.quit_requested());
        signals.request_quit();
        assert!(signals.quit_requested());
        assert!(signals.quit_requested());
    }
}
