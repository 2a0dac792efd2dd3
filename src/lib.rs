//! ComTerm Library
//!
//! Bidirectional serial terminal: a receive loop frames incoming bytes on
//! read timeouts, a transmit loop writes caller-supplied buffers, and both
//! hand timestamped messages to the caller through a bounded queue.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use core::communication::{CommunicationEngine, Message, Session, SessionSettings, TxPoll};
pub use domain::config::ComTermConfig;
pub use domain::error::{ComTermError, ComTermResult};
