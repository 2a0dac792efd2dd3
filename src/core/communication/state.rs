use super::latch::ErrorLatch;
use super::queue::MessageQueue;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// The two worker loops of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSide {
    Receive,
    Transmit,
}

impl LoopSide {
    pub fn peer(&self) -> LoopSide {
        match self {
            LoopSide::Receive => LoopSide::Transmit,
            LoopSide::Transmit => LoopSide::Receive,
        }
    }
}

impl std::fmt::Display for LoopSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopSide::Receive => write!(f, "rx"),
            LoopSide::Transmit => write!(f, "tx"),
        }
    }
}

/// State shared by the receive loop, the transmit loop and the session owner.
///
/// Each loop only ever clears its own liveness flag, and only once; the peer
/// reads that transition as a shutdown request.
#[derive(Debug)]
pub struct SessionState {
    pub(crate) session_id: String,
    pub(crate) queue: MessageQueue,
    pub(crate) latch: ErrorLatch,
    pub(crate) show_timestamp: bool,
    rx_alive: AtomicBool,
    tx_alive: AtomicBool,
    exited: Mutex<u8>,
    all_exited: Condvar,
}

impl SessionState {
    pub fn new(
        session_id: String,
        queue_capacity: usize,
        latch: ErrorLatch,
        show_timestamp: bool,
    ) -> Self {
        Self {
            session_id,
            queue: MessageQueue::new(queue_capacity),
            latch,
            show_timestamp,
            rx_alive: AtomicBool::new(true),
            tx_alive: AtomicBool::new(true),
            exited: Mutex::new(0),
            all_exited: Condvar::new(),
        }
    }

    fn flag(&self, side: LoopSide) -> &AtomicBool {
        match side {
            LoopSide::Receive => &self.rx_alive,
            LoopSide::Transmit => &self.tx_alive,
        }
    }

    pub fn is_alive(&self, side: LoopSide) -> bool {
        self.flag(side).load(Ordering::Acquire)
    }

    /// Clear a loop's liveness flag. Clearing an already cleared flag is a no-op.
    pub fn mark_exited(&self, side: LoopSide) {
        if self.flag(side).swap(false, Ordering::AcqRel) {
            let mut exited = self.exited.lock();
            *exited += 1;
            self.all_exited.notify_all();
        }
    }

    pub fn both_exited(&self) -> bool {
        !self.is_alive(LoopSide::Receive) && !self.is_alive(LoopSide::Transmit)
    }

    /// Block until both loops have exited or the deadline passes
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut exited = self.exited.lock();
        while *exited < 2 {
            if self.all_exited.wait_until(&mut exited, deadline).timed_out() {
                return *exited >= 2;
            }
        }
        true
    }
}

/// Clears a loop's liveness flag when dropped, so the flag goes down on
/// every exit path of the loop, panics included.
pub struct ExitGuard<'a> {
    state: &'a SessionState,
    side: LoopSide,
}

impl<'a> ExitGuard<'a> {
    pub fn new(state: &'a SessionState, side: LoopSide) -> Self {
        Self { state, side }
    }
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.state.mark_exited(self.side);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> SessionState {
        SessionState::new("test".to_string(), 4, ErrorLatch::new(), false)
    }

    #[test]
    fn test_flags_start_alive() {
        let state = state();
        assert!(state.is_alive(LoopSide::Receive));
        assert!(state.is_alive(LoopSide::Transmit));
        assert!(!state.both_exited());
    }

    #[test]
    fn test_mark_exited_is_one_way() {
        let state = state();
        state.mark_exited(LoopSide::Receive);
        state.mark_exited(LoopSide::Receive);

        assert!(!state.is_alive(LoopSide::Receive));
        assert!(!state.both_exited());
        assert!(!state.wait_until(Instant::now() + Duration::from_millis(10)));
    }

    #[test]
    fn test_guard_clears_flag_on_drop() {
        let state = state();
        {
            let _guard = ExitGuard::new(&state, LoopSide::Transmit);
            assert!(state.is_alive(LoopSide::Transmit));
        }
        assert!(!state.is_alive(LoopSide::Transmit));
        assert_eq!(LoopSide::Transmit.peer(), LoopSide::Receive);
    }

    #[test]
    fn test_wait_wakes_on_second_exit() {
        let state = Arc::new(state());
        state.mark_exited(LoopSide::Transmit);

        let worker = {
            let state = Arc::clone(&state);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                state.mark_exited(LoopSide::Receive);
            })
        };

        assert!(state.wait_until(Instant::now() + Duration::from_secs(2)));
        assert!(state.both_exited());
        worker.join().unwrap();
    }
}
