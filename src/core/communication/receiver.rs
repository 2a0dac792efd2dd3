use super::framing::Framer;
use super::message::Message;
use super::state::{ExitGuard, LoopSide, SessionState};
use crate::infrastructure::serial::SerialDevice;
use tracing::{debug, error, info};

/// Why the receive loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveExit {
    /// The transmit loop went down first
    PeerStopped,
    /// A read failed; the error is in the latch
    ReadFailed,
}

/// Read the device one byte at a time, frame on read timeouts and queue
/// each completed frame as an `[RX]` message.
///
/// The transmit loop's liveness flag is checked after every read, whatever
/// the read returned, so shutdown is observed within one read timeout. A
/// read failure ends the loop and discards any partly accumulated frame.
pub fn run_receive_loop(device: &mut dyn SerialDevice, state: &SessionState) -> ReceiveExit {
    let _guard = ExitGuard::new(state, LoopSide::Receive);
    let mut framer = Framer::default();

    debug!(session = %state.session_id, device = device.name(), "receive loop started");

    let exit = loop {
        let read = device.read_byte();

        if !state.is_alive(LoopSide::Transmit) {
            break ReceiveExit::PeerStopped;
        }

        let frame = match read {
            Ok(Some(byte)) => framer.push(byte),
            Ok(None) => framer.timeout(),
            Err(e) => {
                error!(session = %state.session_id, "{}", e);
                state.latch.save(e.to_string());
                break ReceiveExit::ReadFailed;
            }
        };

        if let Some(frame) = frame {
            debug!(session = %state.session_id, "Received {} bytes", frame.len());
            state
                .queue
                .push_blocking(Message::received(&frame, state.show_timestamp));
        }
    };

    info!(session = %state.session_id, ?exit, "receive loop stopped");
    exit
}
