use super::message::DATA_CAPACITY;

/// Timeout-delimited framer.
///
/// Bytes accumulate until either a read times out with at least one byte
/// buffered (the line went quiet for one timeout interval) or the buffer
/// reaches capacity. A timeout with nothing buffered is idle polling and
/// produces nothing.
#[derive(Debug)]
pub struct Framer {
    buffer: Vec<u8>,
    capacity: usize,
}

impl Framer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a byte; returns the frame when the buffer just filled up
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        self.buffer.push(byte);
        if self.buffer.len() == self.capacity {
            return self.take();
        }
        None
    }

    /// A read timed out; returns the frame if anything was buffered
    pub fn timeout(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            return None;
        }
        self.take()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take(&mut self) -> Option<Vec<u8>> {
        Some(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.capacity),
        ))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DATA_CAPACITY)
    }
}
