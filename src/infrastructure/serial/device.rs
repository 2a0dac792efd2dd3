use crate::domain::config::{ParityConfig, PortSettings};
use crate::domain::error::{ComTermError, ComTermResult};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An opened, configured serial device as seen by the communication engine.
///
/// The receive loop owns one handle and the transmit loop owns a second one
/// obtained through [`SerialDevice::split_writer`]; both refer to the same
/// physical line.
pub trait SerialDevice: Send + std::fmt::Debug {
    /// Port name/path
    fn name(&self) -> &str;

    /// Read one byte, waiting at most the configured read timeout.
    ///
    /// `Ok(None)` means the timeout elapsed with the line silent; that is
    /// not an error.
    fn read_byte(&mut self) -> ComTermResult<Option<u8>>;

    /// Write the buffer, returning how many bytes the device accepted
    /// within the write timeout. `Ok(0)` means the line stalled.
    fn write_bytes(&mut self, data: &[u8]) -> ComTermResult<usize>;

    /// Second handle on the same device for the transmit side.
    fn split_writer(&self) -> ComTermResult<Box<dyn SerialDevice>>;
}

/// Serial device backed by the `serialport` crate.
///
/// Both handles keep the read timeout set at open time. On Windows the
/// cloned handle shares the device's COMMTIMEOUTS, so re-timing it would
/// change the receive side's framing gap as well; the write timeout is
/// applied as a deadline around the write calls instead.
pub struct SystemSerialDevice {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    write_timeout: Duration,
}

impl SystemSerialDevice {
    /// Open a port, flush stale data, then apply timeouts and line settings.
    ///
    /// Each step maps to its own error kind so the caller can tell an absent
    /// device from a device that refused the configuration.
    pub fn open(name: &str, settings: &PortSettings) -> ComTermResult<Self> {
        let mut port = serialport::new(name, settings.baud_rate)
            .timeout(settings.read_timeout())
            .open()
            .map_err(|e| ComTermError::DeviceOpen {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        port.clear(serialport::ClearBuffer::All)
            .map_err(|e| ComTermError::Flush(e.to_string()))?;

        port.set_timeout(settings.read_timeout())
            .map_err(|e| ComTermError::TimeoutConfig(e.to_string()))?;

        apply_line_settings(port.as_mut(), settings)?;

        info!("Opened serial port {} at {}", name, settings);

        Ok(Self {
            port,
            name: name.to_string(),
            write_timeout: settings.write_timeout(),
        })
    }

    pub fn baud_rate(&self) -> Option<u32> {
        self.port.baud_rate().ok()
    }
}

fn apply_line_settings(
    port: &mut dyn serialport::SerialPort,
    settings: &PortSettings,
) -> ComTermResult<()> {
    let data_bits = match settings.data_bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        other => {
            return Err(ComTermError::LineConfig(format!(
                "invalid data bits: {}",
                other
            )))
        }
    };

    let stop_bits = match settings.stop_bits {
        1 => serialport::StopBits::One,
        2 => serialport::StopBits::Two,
        other => {
            return Err(ComTermError::LineConfig(format!(
                "invalid stop bits: {}",
                other
            )))
        }
    };

    let parity = match settings.parity {
        ParityConfig::None => serialport::Parity::None,
        ParityConfig::Odd => serialport::Parity::Odd,
        ParityConfig::Even => serialport::Parity::Even,
    };

    let line_error = |e: serialport::Error| ComTermError::LineConfig(e.to_string());
    port.set_baud_rate(settings.baud_rate).map_err(line_error)?;
    port.set_data_bits(data_bits).map_err(line_error)?;
    port.set_stop_bits(stop_bits).map_err(line_error)?;
    port.set_parity(parity).map_err(line_error)?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(line_error)?;

    Ok(())
}

impl SerialDevice for SystemSerialDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_byte(&mut self) -> ComTermResult<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(ComTermError::Read(e.to_string())),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> ComTermResult<usize> {
        let deadline = Instant::now() + self.write_timeout;
        write_until(self.port.as_mut(), &self.name, data, deadline)
    }

    fn split_writer(&self) -> ComTermResult<Box<dyn SerialDevice>> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| ComTermError::DeviceClone(e.to_string()))?;

        debug!("Cloned {} for the transmit side", self.name);

        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
            write_timeout: self.write_timeout,
        }))
    }
}

/// Write as much of `data` as the port takes before `deadline`, then drain.
///
/// Short writes are continued and timed-out calls retried until the
/// deadline passes; the count written so far is returned either way.
fn write_until<W>(port: &mut W, name: &str, data: &[u8], deadline: Instant) -> ComTermResult<usize>
where
    W: Write + ?Sized,
{
    let mut written = 0;
    while written < data.len() {
        match port.write(&data[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                if Instant::now() >= deadline {
                    break;
                }
            }
            Err(e) => return Err(ComTermError::Write(e.to_string())),
        }
    }

    if written > 0 {
        if let Err(e) = port.flush() {
            warn!("Failed to drain {} after writing {} bytes: {}", name, written, e);
        }
    }
    Ok(written)
}

impl std::fmt::Debug for SystemSerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSerialDevice")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Port stand-in: times out `stalls` times, then takes `chunk` bytes per call
    #[derive(Default)]
    struct FakePort {
        accepted: Vec<u8>,
        chunk: usize,
        stalls: usize,
        stall_forever: bool,
        flush_fails: bool,
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.stall_forever || self.stalls > 0 {
                self.stalls = self.stalls.saturating_sub(1);
                std::thread::sleep(Duration::from_millis(1));
                return Err(io::Error::new(ErrorKind::TimedOut, "timed out"));
            }
            let n = buf.len().min(self.chunk);
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.flush_fails {
                Err(io::Error::new(ErrorKind::BrokenPipe, "drain failed"))
            } else {
                Ok(())
            }
        }
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(500)
    }

    #[test]
    fn test_open_missing_device_reports_open_error() {
        let result = SystemSerialDevice::open("/dev/comterm_missing_port_0", &PortSettings::default());

        match result {
            Err(ComTermError::DeviceOpen { name, .. }) => {
                assert!(name.contains("comterm_missing_port_0"));
            }
            other => panic!("Expected DeviceOpen error, got: {:?}", other),
        }
    }

    #[test]
    fn test_write_continues_short_writes() {
        let mut port = FakePort {
            chunk: 2,
            ..FakePort::default()
        };

        assert_eq!(write_until(&mut port, "fake", b"hello", soon()).unwrap(), 5);
        assert_eq!(port.accepted, b"hello");
    }

    #[test]
    fn test_write_retries_timeouts_before_deadline() {
        let mut port = FakePort {
            chunk: 8,
            stalls: 3,
            ..FakePort::default()
        };

        assert_eq!(write_until(&mut port, "fake", b"ping", soon()).unwrap(), 4);
        assert_eq!(port.accepted, b"ping");
    }

    #[test]
    fn test_write_stops_at_deadline() {
        let mut port = FakePort {
            stall_forever: true,
            ..FakePort::default()
        };
        let started = Instant::now();
        let deadline = started + Duration::from_millis(20);

        assert_eq!(write_until(&mut port, "fake", b"ping", deadline).unwrap(), 0);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_drain_failure_keeps_write_count() {
        let mut port = FakePort {
            chunk: 8,
            flush_fails: true,
            ..FakePort::default()
        };

        assert_eq!(write_until(&mut port, "fake", b"ok", soon()).unwrap(), 2);
        assert_eq!(port.accepted, b"ok");
    }

    #[test]
    fn test_write_error_is_reported() {
        struct Unplugged;

        impl Write for Unplugged {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let err = write_until(&mut Unplugged, "fake", b"x", soon()).unwrap_err();
        assert!(matches!(err, ComTermError::Write(reason) if reason == "unplugged"));
    }
}
