use chrono::{DateTime, Local};
use std::fmt;

/// Space reserved at the front of every message for the metadata prefix
pub const METADATA_CAPACITY: usize = 128;
/// Maximum payload carried by one message
pub const DATA_CAPACITY: usize = 1024;
/// Total message size (metadata + payload)
pub const MESSAGE_CAPACITY: usize = METADATA_CAPACITY + DATA_CAPACITY;

/// Which way the bytes travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Data received from the device
    Rx,
    /// Data sent to the device
    Tx,
}

impl Direction {
    /// Tag written after the optional timestamp
    pub fn tag(&self) -> &'static str {
        match self {
            Direction::Rx => "[RX] ",
            Direction::Tx => "[TX] ",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// A framed message: metadata prefix followed by the raw payload.
///
/// Immutable once built; the loops create one per completed read or write
/// and the caller consumes it by popping it off the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    buffer: Vec<u8>,
    prefix_len: usize,
    direction: Direction,
    timestamp: Option<String>,
}

impl Message {
    /// Build a message, prepending the direction tag and, when given, the
    /// formatted timestamp. Metadata longer than [`METADATA_CAPACITY`] and
    /// payload longer than [`DATA_CAPACITY`] are truncated.
    pub fn compose(direction: Direction, timestamp: Option<DateTime<Local>>, payload: &[u8]) -> Self {
        let timestamp = timestamp.map(|time| format_timestamp(&time));

        let mut metadata = String::new();
        if let Some(ref stamp) = timestamp {
            metadata.push_str(stamp);
            metadata.push(' ');
        }
        metadata.push_str(direction.tag());

        let mut buffer = metadata.into_bytes();
        buffer.truncate(METADATA_CAPACITY);
        let prefix_len = buffer.len();

        let payload = &payload[..payload.len().min(DATA_CAPACITY)];
        buffer.extend_from_slice(payload);

        Self {
            buffer,
            prefix_len,
            direction,
            timestamp,
        }
    }

    /// Received message stamped with the current local time when `with_timestamp` is set
    pub fn received(payload: &[u8], with_timestamp: bool) -> Self {
        Self::compose(Direction::Rx, with_timestamp.then(Local::now), payload)
    }

    /// Sent message stamped with the current local time when `with_timestamp` is set
    pub fn sent(payload: &[u8], with_timestamp: bool) -> Self {
        Self::compose(Direction::Tx, with_timestamp.then(Local::now), payload)
    }

    /// Whole message: prefix then payload
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Total length, prefix included
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn prefix(&self) -> &[u8] {
        &self.buffer[..self.prefix_len]
    }

    /// Prefix as text; it is always built from ASCII
    pub fn prefix_str(&self) -> String {
        String::from_utf8_lossy(self.prefix()).into_owned()
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.prefix_len..]
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// `[HH:MM:SS.mmm]` if the message was stamped
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// Payload as text, replacing invalid UTF-8 sequences
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(self.payload()).into_owned()
    }

    /// Payload as space separated hex bytes
    pub fn payload_as_hex(&self) -> String {
        self.payload()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Format a wall-clock time as `[HH:MM:SS.mmm]`
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("[%H:%M:%S%.3f]").to_string()
}
