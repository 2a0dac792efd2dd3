use super::latch::ErrorLatch;
use super::message::Message;
use super::queue::DEFAULT_QUEUE_CAPACITY;
use super::receiver::run_receive_loop;
use super::state::{LoopSide, SessionState};
use super::transmitter::{run_transmit_loop, TxSource};
use crate::domain::config::PortSettings;
use crate::domain::error::{ComTermError, ComTermResult};
use crate::infrastructure::serial::{SerialDevice, SystemSerialDevice};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Per-session settings
pub struct SessionSettings {
    /// Prefix messages with `[HH:MM:SS.mmm]`
    pub show_timestamp: bool,
    /// Where the transmit loop gets its outbound buffers
    pub source: Box<dyn TxSource>,
}

impl SessionSettings {
    pub fn new(source: impl TxSource + 'static) -> Self {
        Self {
            show_timestamp: false,
            source: Box::new(source),
        }
    }

    pub fn with_timestamps(mut self, show_timestamp: bool) -> Self {
        self.show_timestamp = show_timestamp;
        self
    }
}

/// Result of a non-blocking liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// At least one loop is still running
    Running,
    /// Both loops have exited
    AllExited,
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Both loops running
    Running,
    /// One loop has exited; the other has not noticed yet
    WindingDown,
    /// Both loops exited; the session may be closed
    Exited,
    /// Resources released
    Closed,
}

/// Starts sessions over opened devices and records open failures.
///
/// Holds no global state: every [`Session`] it starts is an independent
/// object with its own queue and error latch, so several sessions can run
/// side by side. The engine's own latch only sees failures that happen
/// before a session exists.
#[derive(Debug, Clone)]
pub struct CommunicationEngine {
    latch: ErrorLatch,
    queue_capacity: usize,
}

impl CommunicationEngine {
    /// Create a new communication engine
    pub fn new() -> Self {
        Self {
            latch: ErrorLatch::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Open and configure a serial device. Failures are latched as well as returned.
    pub fn open_device(
        &self,
        name: &str,
        settings: &PortSettings,
    ) -> ComTermResult<Box<dyn SerialDevice>> {
        match SystemSerialDevice::open(name, settings) {
            Ok(device) => Ok(Box::new(device)),
            Err(e) => {
                warn!("Failed to open {}: {}", name, e);
                self.latch.save(e.to_string());
                Err(e)
            }
        }
    }

    /// Start the receive and transmit loops over `device`.
    ///
    /// The session starts with an empty error latch of its own. The device
    /// is consumed; its handles are released when the loops exit and the
    /// session is closed.
    pub fn start(
        &self,
        device: Box<dyn SerialDevice>,
        settings: SessionSettings,
    ) -> ComTermResult<Session> {
        let writer = device.split_writer().map_err(|e| self.latched(e))?;

        let session_id = uuid::Uuid::new_v4().simple().to_string();
        let short_id = session_id[..8].to_string();
        let device_name = device.name().to_string();
        let state = Arc::new(SessionState::new(
            session_id.clone(),
            self.queue_capacity,
            ErrorLatch::new(),
            settings.show_timestamp,
        ));

        let tx_handle = {
            let state = Arc::clone(&state);
            let mut writer = writer;
            let mut source = settings.source;
            spawn_loop(format!("comterm-tx-{}", short_id), move || {
                run_transmit_loop(writer.as_mut(), source.as_mut(), &state);
            })
        };
        let tx_handle = match tx_handle {
            Ok(handle) => handle,
            Err(e) => {
                // Neither loop runs; mark both down so the state reads as exited.
                state.mark_exited(LoopSide::Transmit);
                state.mark_exited(LoopSide::Receive);
                return Err(self.latched(e));
            }
        };

        let rx_handle = {
            let state = Arc::clone(&state);
            let mut device = device;
            spawn_loop(format!("comterm-rx-{}", short_id), move || {
                run_receive_loop(device.as_mut(), &state);
            })
        };
        let rx_handle = match rx_handle {
            Ok(handle) => handle,
            Err(e) => {
                // The transmit loop sees the receive flag drop and winds down.
                state.mark_exited(LoopSide::Receive);
                let _ = tx_handle.join();
                return Err(self.latched(e));
            }
        };

        info!(session = %session_id, device = %device_name, "Session started");

        Ok(Session {
            id: session_id,
            device_name,
            state,
            rx_handle: Some(rx_handle),
            tx_handle: Some(tx_handle),
            closed: false,
        })
    }

    /// Take the most recent open or start failure
    pub fn take_last_error(&self) -> Option<String> {
        self.latch.take()
    }

    pub fn error_latch(&self) -> &ErrorLatch {
        &self.latch
    }

    fn latched(&self, error: ComTermError) -> ComTermError {
        self.latch.save(error.to_string());
        error
    }
}

impl Default for CommunicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_loop<F>(name: String, body: F) -> ComTermResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| ComTermError::ThreadSpawn { name, source })
}

/// One open device with its receive and transmit loops.
pub struct Session {
    id: String,
    device_name: String,
    state: Arc<SessionState>,
    rx_handle: Option<JoinHandle<()>>,
    tx_handle: Option<JoinHandle<()>>,
    closed: bool,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Non-blocking check of both loops
    pub fn poll_liveness(&self) -> Liveness {
        if self.state.both_exited() {
            Liveness::AllExited
        } else {
            Liveness::Running
        }
    }

    /// Block until both loops exit or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> Liveness {
        if self.state.wait_until(Instant::now() + timeout) {
            Liveness::AllExited
        } else {
            Liveness::Running
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.closed {
            return SessionPhase::Closed;
        }
        match (
            self.state.is_alive(LoopSide::Receive),
            self.state.is_alive(LoopSide::Transmit),
        ) {
            (true, true) => SessionPhase::Running,
            (false, false) => SessionPhase::Exited,
            _ => SessionPhase::WindingDown,
        }
    }

    /// Take the oldest queued message
    pub fn pop_message(&self) -> Option<Message> {
        self.state.queue.pop()
    }

    /// Messages currently queued
    pub fn pending_messages(&self) -> usize {
        self.state.queue.len()
    }

    /// Take the most recent fatal error of this session
    pub fn take_last_error(&self) -> Option<String> {
        self.state.latch.take()
    }

    /// Errors saved since the session started, oldest first
    pub fn recent_errors(&self) -> Vec<String> {
        self.state.latch.recent()
    }

    /// Release the worker threads once both loops have exited.
    ///
    /// Fails with [`ComTermError::SessionRunning`] while a loop is still
    /// running and with [`ComTermError::SessionClosed`] on a second call.
    pub fn close(&mut self) -> ComTermResult<()> {
        if self.closed {
            return Err(ComTermError::SessionClosed);
        }
        if self.poll_liveness() == Liveness::Running {
            return Err(ComTermError::SessionRunning);
        }

        for (side, handle) in [
            (LoopSide::Receive, self.rx_handle.take()),
            (LoopSide::Transmit, self.tx_handle.take()),
        ] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!(session = %self.id, "{} loop panicked", side);
                }
            }
        }

        self.closed = true;
        info!(session = %self.id, device = %self.device_name, "Session closed");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed && !self.state.both_exited() {
            warn!(session = %self.id, "Session dropped while its loops are still running");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("device", &self.device_name)
            .field("phase", &self.phase())
            .finish()
    }
}
