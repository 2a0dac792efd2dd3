//! Scripted serial device for deterministic tests.
//!
//! Reads replay a script of bytes, silent intervals and failures, so framing
//! can be asserted without depending on real inter-byte timing. Writes are
//! logged and can be made to fail or come up short.

use super::device::SerialDevice;
use crate::domain::error::{ComTermError, ComTermResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// One step of the read script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// The next read returns this byte
    Byte(u8),
    /// The next read times out with no data
    Silence,
    /// The next read fails
    Fail(String),
}

/// How writes behave
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Accept,
    /// Accept one byte less than requested
    Short,
    /// Accept at most this many bytes per call
    Chunked(usize),
    /// Fail every write
    Fail(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    script: VecDeque<ReadStep>,
    write_log: Vec<Vec<u8>>,
    write_mode: WriteMode,
}

/// Device driven by a read script; clones share the script and the write log
#[derive(Debug, Clone)]
pub struct ScriptedDevice {
    name: String,
    read_timeout: Duration,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            read_timeout: Duration::from_millis(2),
            state: Arc::new(Mutex::new(ScriptState::default())),
        }
    }

    /// Time a silent read takes; also used once the script is exhausted
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Append bytes that arrive back to back
    pub fn bytes(self, data: &[u8]) -> Self {
        self.state
            .lock()
            .script
            .extend(data.iter().copied().map(ReadStep::Byte));
        self
    }

    /// Append one silent read timeout
    pub fn silence(self) -> Self {
        self.state.lock().script.push_back(ReadStep::Silence);
        self
    }

    /// Append a read failure
    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.state
            .lock()
            .script
            .push_back(ReadStep::Fail(reason.into()));
        self
    }

    pub fn with_write_mode(self, mode: WriteMode) -> Self {
        self.state.lock().write_mode = mode;
        self
    }

    /// Every buffer handed to `write_bytes`, in order
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Steps not yet consumed
    pub fn remaining_steps(&self) -> usize {
        self.state.lock().script.len()
    }
}

impl SerialDevice for ScriptedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_byte(&mut self) -> ComTermResult<Option<u8>> {
        let step = self.state.lock().script.pop_front();
        match step {
            Some(ReadStep::Byte(byte)) => Ok(Some(byte)),
            Some(ReadStep::Fail(reason)) => Err(ComTermError::Read(reason)),
            Some(ReadStep::Silence) | None => {
                std::thread::sleep(self.read_timeout);
                Ok(None)
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> ComTermResult<usize> {
        let mut state = self.state.lock();
        match state.write_mode.clone() {
            WriteMode::Accept => {
                state.write_log.push(data.to_vec());
                Ok(data.len())
            }
            WriteMode::Short => {
                let accepted = data.len().saturating_sub(1);
                if accepted > 0 {
                    state.write_log.push(data[..accepted].to_vec());
                }
                Ok(accepted)
            }
            WriteMode::Chunked(limit) => {
                let accepted = data.len().min(limit);
                state.write_log.push(data[..accepted].to_vec());
                Ok(accepted)
            }
            WriteMode::Fail(reason) => Err(ComTermError::Write(reason)),
        }
    }

    fn split_writer(&self) -> ComTermResult<Box<dyn SerialDevice>> {
        Ok(Box::new(self.clone()))
    }
}
