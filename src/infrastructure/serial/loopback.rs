use super::device::SerialDevice;
use crate::domain::error::ComTermResult;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Line {
    pending: VecDeque<u8>,
    bytes_written: usize,
}

/// In-memory device whose transmit line is wired back to its receive line.
///
/// Everything written becomes readable, and [`LoopbackDevice::inject`] plays
/// the part of a remote peer. Reads block on a condition variable for at
/// most the read timeout, like a real port with a configured timeout.
#[derive(Debug, Clone)]
pub struct LoopbackDevice {
    name: String,
    read_timeout: Duration,
    line: Arc<(Mutex<Line>, Condvar)>,
}

impl LoopbackDevice {
    pub fn new(name: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            read_timeout,
            line: Arc::new((Mutex::new(Line::default()), Condvar::new())),
        }
    }

    /// Queue bytes as if a remote peer had sent them
    pub fn inject(&self, data: &[u8]) {
        let (line, ready) = &*self.line;
        line.lock().pending.extend(data);
        ready.notify_all();
    }

    /// Bytes waiting to be read
    pub fn available(&self) -> usize {
        self.line.0.lock().pending.len()
    }

    /// Total bytes accepted by `write_bytes` across all handles
    pub fn bytes_written(&self) -> usize {
        self.line.0.lock().bytes_written
    }
}

impl SerialDevice for LoopbackDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_byte(&mut self) -> ComTermResult<Option<u8>> {
        let (line, ready) = &*self.line;
        let deadline = Instant::now() + self.read_timeout;
        let mut line = line.lock();

        loop {
            if let Some(byte) = line.pending.pop_front() {
                return Ok(Some(byte));
            }
            if ready.wait_until(&mut line, deadline).timed_out() {
                return Ok(line.pending.pop_front());
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> ComTermResult<usize> {
        let (line, ready) = &*self.line;
        {
            let mut line = line.lock();
            line.pending.extend(data);
            line.bytes_written += data.len();
        }
        ready.notify_all();
        Ok(data.len())
    }

    fn split_writer(&self) -> ComTermResult<Box<dyn SerialDevice>> {
        Ok(Box::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_write_then_read_back() {
        let mut device = LoopbackDevice::new("loop0", Duration::from_millis(5));
        assert_eq!(device.write_bytes(b"ok").unwrap(), 2);

        assert_eq!(device.read_byte().unwrap(), Some(b'o'));
        assert_eq!(device.read_byte().unwrap(), Some(b'k'));
        assert_eq!(device.read_byte().unwrap(), None);
        assert_eq!(device.bytes_written(), 2);
    }

    #[test]
    fn test_read_times_out_when_silent() {
        let mut device = LoopbackDevice::new("loop0", Duration::from_millis(20));
        let started = Instant::now();

        assert_eq!(device.read_byte().unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_split_writer_shares_line() {
        let mut reader = LoopbackDevice::new("loop0", Duration::from_millis(500));
        let mut writer = reader.split_writer().unwrap();

        let handle = thread::spawn(move || reader.read_byte().unwrap());
        thread::sleep(Duration::from_millis(20));
        writer.write_bytes(b"z").unwrap();

        assert_eq!(handle.join().unwrap(), Some(b'z'));
    }

    #[test]
    fn test_inject_simulates_peer() {
        let mut device = LoopbackDevice::new("loop0", Duration::from_millis(5));
        device.inject(b"hi");

        assert_eq!(device.available(), 2);
        assert_eq!(device.read_byte().unwrap(), Some(b'h'));
        assert_eq!(device.bytes_written(), 0);
    }
}
