use thiserror::Error;

/// ComTerm unified error type
#[derive(Error, Debug)]
pub enum ComTermError {
    #[error("{name}: {reason}")]
    DeviceOpen { name: String, reason: String },

    #[error("Failed to flush serial port: {0}")]
    Flush(String),

    #[error("Failed to set serial timeouts: {0}")]
    TimeoutConfig(String),

    #[error("Failed to set serial settings: {0}")]
    LineConfig(String),

    #[error("Failed to clone serial port handle: {0}")]
    DeviceClone(String),

    #[error("Failed to enumerate serial ports: {0}")]
    PortEnumeration(String),

    #[error("Failed to read from port: {0}")]
    Read(String),

    #[error("Failed to write to port: {0}")]
    Write(String),

    #[error("Failed to write all bytes to port: wrote {written} of {expected}")]
    PartialWrite { written: usize, expected: usize },

    #[error("Failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Session is still running; wait until both loops have exited")]
    SessionRunning,

    #[error("Session is already closed")]
    SessionClosed,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComTermError {
    /// Whether the error comes from the device rather than the engine or the caller.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceOpen { .. }
                | Self::Flush(_)
                | Self::TimeoutConfig(_)
                | Self::LineConfig(_)
                | Self::DeviceClone(_)
                | Self::Read(_)
                | Self::Write(_)
                | Self::PartialWrite { .. }
        )
    }
}

pub type ComTermResult<T> = Result<T, ComTermError>;
