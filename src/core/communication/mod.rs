// Communication module - Session engine over a serial device
pub mod engine;
pub mod framing;
pub mod latch;
pub mod message;
pub mod queue;
pub mod receiver;
pub mod state;
pub mod transmitter;

pub use engine::{CommunicationEngine, Liveness, Session, SessionPhase, SessionSettings};
pub use latch::ErrorLatch;
pub use message::{Direction, Message, DATA_CAPACITY, METADATA_CAPACITY};
pub use queue::MessageQueue;
pub use transmitter::{ChannelSource, TxHandle, TxPoll, TxSource};
