use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Number of superseded errors kept for inspection
pub const RECENT_ERRORS: usize = 16;

#[derive(Debug, Default)]
struct LatchState {
    pending: Option<String>,
    recent: VecDeque<String>,
}

/// Single-slot holder for the most recent fatal error.
///
/// `save` overwrites whatever is pending; `take` hands it out once. Clones
/// share the same slot. The last [`RECENT_ERRORS`] saved messages are kept
/// so a caller can still see an error that was overwritten before it was read.
#[derive(Debug, Clone, Default)]
pub struct ErrorLatch {
    state: Arc<Mutex<LatchState>>,
}

impl ErrorLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(error = %message, "error latched");

        let mut state = self.state.lock();
        if state.recent.len() == RECENT_ERRORS {
            state.recent.pop_front();
        }
        state.recent.push_back(message.clone());
        state.pending = Some(message);
    }

    /// Return the pending error and clear the slot
    pub fn take(&self) -> Option<String> {
        self.state.lock().pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Saved errors, oldest first, whether or not they were taken
    pub fn recent(&self) -> Vec<String> {
        self.state.lock().recent.iter().cloned().collect()
    }

    /// Clear the pending slot and the recent log
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        state.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_slot() {
        let latch = ErrorLatch::new();
        assert!(latch.take().is_none());

        latch.save("Failed to read from port: gone");
        assert!(latch.is_pending());
        assert_eq!(latch.take().as_deref(), Some("Failed to read from port: gone"));
        assert!(latch.take().is_none());
    }

    #[test]
    fn test_save_overwrites_unread_error() {
        let latch = ErrorLatch::new();
        latch.save("first");
        latch.save("second");

        assert_eq!(latch.take().as_deref(), Some("second"));
        assert_eq!(latch.recent(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_clones_share_slot() {
        let latch = ErrorLatch::new();
        let worker_side = latch.clone();
        worker_side.save("boom");

        assert_eq!(latch.take().as_deref(), Some("boom"));
        assert!(!worker_side.is_pending());
    }

    #[test]
    fn test_recent_is_bounded() {
        let latch = ErrorLatch::new();
        for i in 0..RECENT_ERRORS + 4 {
            latch.save(format!("error {}", i));
        }

        let recent = latch.recent();
        assert_eq!(recent.len(), RECENT_ERRORS);
        assert_eq!(recent[0], "error 4");

        latch.reset();
        assert!(latch.recent().is_empty());
        assert!(latch.take().is_none());
    }
}
