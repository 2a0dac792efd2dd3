use super::message::{Message, DATA_CAPACITY};
use super::state::{ExitGuard, LoopSide, SessionState};
use crate::domain::error::{ComTermError, ComTermResult};
use crate::infrastructure::serial::SerialDevice;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::{debug, error, info};

/// Outcome of one poll of a transmit-buffer source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPoll {
    /// Write these bytes to the device
    Transmit(Vec<u8>),
    /// Nothing to send yet; poll again
    NoMessage,
    /// Stop the transmit loop, and with it the session
    Terminate,
}

/// Supplies outbound buffers to the transmit loop.
///
/// Polled synchronously from the transmit thread. A source that blocks
/// delays shutdown by as long as it blocks, so implementations should
/// return on their own timeout.
pub trait TxSource: Send {
    fn poll(&mut self) -> TxPoll;
}

impl<F> TxSource for F
where
    F: FnMut() -> TxPoll + Send,
{
    fn poll(&mut self) -> TxPoll {
        self()
    }
}

#[derive(Debug)]
enum TxCommand {
    Data(Vec<u8>),
    Terminate,
}

/// Caller side of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct TxHandle {
    sender: Sender<TxCommand>,
}

impl TxHandle {
    /// Queue a buffer for transmission
    pub fn send(&self, data: impl Into<Vec<u8>>) -> ComTermResult<()> {
        self.sender
            .send(TxCommand::Data(data.into()))
            .map_err(|_| ComTermError::SessionClosed)
    }

    /// Ask the transmit loop to stop. Ignored once the loop is gone.
    pub fn terminate(&self) {
        let _ = self.sender.send(TxCommand::Terminate);
    }
}

/// Channel-backed source: the transmit thread sleeps in a bounded receive
/// instead of spinning. Dropping every [`TxHandle`] terminates the loop.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: Receiver<TxCommand>,
    poll_timeout: Duration,
}

impl ChannelSource {
    pub fn new(poll_timeout: Duration) -> (TxHandle, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            TxHandle { sender },
            Self {
                receiver,
                poll_timeout,
            },
        )
    }
}

impl TxSource for ChannelSource {
    fn poll(&mut self) -> TxPoll {
        match self.receiver.recv_timeout(self.poll_timeout) {
            Ok(TxCommand::Data(data)) => TxPoll::Transmit(data),
            Ok(TxCommand::Terminate) => TxPoll::Terminate,
            Err(RecvTimeoutError::Timeout) => TxPoll::NoMessage,
            Err(RecvTimeoutError::Disconnected) => TxPoll::Terminate,
        }
    }
}

/// Why the transmit loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitExit {
    /// The receive loop went down first
    PeerStopped,
    /// The source asked to terminate
    Terminated,
    /// A write failed or came up short; the error is in the latch
    WriteFailed,
}

/// Poll the source, write each buffer to the device and queue a copy as a
/// `[TX]` message once the write fully succeeded.
pub fn run_transmit_loop(
    device: &mut dyn SerialDevice,
    source: &mut dyn TxSource,
    state: &SessionState,
) -> TransmitExit {
    let _guard = ExitGuard::new(state, LoopSide::Transmit);

    debug!(session = %state.session_id, device = device.name(), "transmit loop started");

    let exit = loop {
        let mut payload = match next_buffer(source, state) {
            Ok(payload) => payload,
            Err(exit) => break exit,
        };

        if payload.is_empty() {
            continue;
        }
        payload.truncate(DATA_CAPACITY);

        if let Err(e) = write_all(device, &payload) {
            error!(session = %state.session_id, "{}", e);
            state.latch.save(e.to_string());
            break TransmitExit::WriteFailed;
        }

        debug!(session = %state.session_id, "Sent {} bytes", payload.len());
        state
            .queue
            .push_blocking(Message::sent(&payload, state.show_timestamp));
    };

    info!(session = %state.session_id, ?exit, "transmit loop stopped");
    exit
}

/// Poll until the source yields data, checking the receive loop before each
/// poll and again before handing the data out.
fn next_buffer(source: &mut dyn TxSource, state: &SessionState) -> Result<Vec<u8>, TransmitExit> {
    loop {
        if !state.is_alive(LoopSide::Receive) {
            return Err(TransmitExit::PeerStopped);
        }

        match source.poll() {
            TxPoll::Transmit(data) => {
                if !state.is_alive(LoopSide::Receive) {
                    return Err(TransmitExit::PeerStopped);
                }
                return Ok(data);
            }
            TxPoll::Terminate => return Err(TransmitExit::Terminated),
            TxPoll::NoMessage => std::thread::yield_now(),
        }
    }
}

/// Keep writing until the device has taken the whole payload. A call that
/// accepts nothing means the write timeout ran out.
fn write_all(device: &mut dyn SerialDevice, payload: &[u8]) -> ComTermResult<()> {
    let mut written = 0;
    while written < payload.len() {
        match device.write_bytes(&payload[written..])? {
            0 => {
                return Err(ComTermError::PartialWrite {
                    written,
                    expected: payload.len(),
                })
            }
            n => written += n,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::communication::latch::ErrorLatch;
    use crate::infrastructure::serial::{ScriptedDevice, WriteMode};

    fn state() -> SessionState {
        SessionState::new("tx-test".to_string(), 8, ErrorLatch::new(), false)
    }

    fn scripted_source(polls: Vec<TxPoll>) -> impl FnMut() -> TxPoll + Send {
        let mut polls = polls.into_iter();
        move || polls.next().unwrap_or(TxPoll::Terminate)
    }

    #[test]
    fn test_transmit_then_terminate() {
        let state = state();
        let mut device = ScriptedDevice::new("script0");
        let mut source = scripted_source(vec![
            TxPoll::NoMessage,
            TxPoll::Transmit(b"ping\n".to_vec()),
            TxPoll::NoMessage,
            TxPoll::Terminate,
        ]);

        let exit = run_transmit_loop(&mut device, &mut source, &state);

        assert_eq!(exit, TransmitExit::Terminated);
        assert!(!state.is_alive(LoopSide::Transmit));
        assert_eq!(device.write_log(), vec![b"ping\n".to_vec()]);
        assert_eq!(state.queue.pop().unwrap().as_bytes(), b"[TX] ping\n");
        assert!(state.queue.pop().is_none());
    }

    #[test]
    fn test_terminate_enqueues_nothing() {
        let state = state();
        let mut device = ScriptedDevice::new("script0");
        let mut source = scripted_source(vec![TxPoll::Terminate]);

        assert_eq!(
            run_transmit_loop(&mut device, &mut source, &state),
            TransmitExit::Terminated
        );
        assert!(state.queue.is_empty());
        assert!(device.write_log().is_empty());
    }

    #[test]
    fn test_partial_write_is_fatal() {
        let state = state();
        let mut device = ScriptedDevice::new("script0").with_write_mode(WriteMode::Short);
        let mut source = scripted_source(vec![TxPoll::Transmit(b"abc".to_vec())]);

        assert_eq!(
            run_transmit_loop(&mut device, &mut source, &state),
            TransmitExit::WriteFailed
        );
        assert!(state.queue.is_empty());
        assert_eq!(
            state.latch.take().as_deref(),
            Some("Failed to write all bytes to port: wrote 2 of 3")
        );
    }

    #[test]
    fn test_short_writes_are_continued() {
        let state = state();
        let mut device = ScriptedDevice::new("script0").with_write_mode(WriteMode::Chunked(3));
        let mut source = scripted_source(vec![TxPoll::Transmit(b"abcdefg".to_vec())]);

        assert_eq!(
            run_transmit_loop(&mut device, &mut source, &state),
            TransmitExit::Terminated
        );
        assert_eq!(
            device.write_log(),
            vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]
        );
        assert_eq!(state.queue.pop().unwrap().as_bytes(), b"[TX] abcdefg");
        assert!(state.latch.take().is_none());
    }

    #[test]
    fn test_dead_receiver_drops_pending_buffer() {
        let state = state();
        state.mark_exited(LoopSide::Receive);
        let mut device = ScriptedDevice::new("script0");
        let mut source = scripted_source(vec![TxPoll::Transmit(b"late".to_vec())]);

        assert_eq!(
            run_transmit_loop(&mut device, &mut source, &state),
            TransmitExit::PeerStopped
        );
        assert!(device.write_log().is_empty());
        assert!(state.both_exited());
    }

    #[test]
    fn test_oversized_buffer_is_truncated() {
        let state = state();
        let mut device = ScriptedDevice::new("script0");
        let mut source = scripted_source(vec![TxPoll::Transmit(vec![b'z'; DATA_CAPACITY + 1])]);

        run_transmit_loop(&mut device, &mut source, &state);

        assert_eq!(device.write_log()[0].len(), DATA_CAPACITY);
        assert_eq!(state.queue.pop().unwrap().payload().len(), DATA_CAPACITY);
    }

    #[test]
    fn test_channel_source() {
        let (handle, mut source) = ChannelSource::new(Duration::from_millis(5));
        assert_eq!(source.poll(), TxPoll::NoMessage);

        handle.send(b"hi".to_vec()).unwrap();
        assert_eq!(source.poll(), TxPoll::Transmit(b"hi".to_vec()));

        handle.terminate();
        assert_eq!(source.poll(), TxPoll::Terminate);

        drop(handle);
        assert_eq!(source.poll(), TxPoll::Terminate);
    }
}
