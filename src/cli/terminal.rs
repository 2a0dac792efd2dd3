use crate::cli::args::DataFormat;
use crate::cli::output::OutputWriter;
use crate::core::communication::{
    ChannelSource, CommunicationEngine, Liveness, Session, SessionSettings,
};
use crate::domain::config::{LineEnding, PortSettings};
use crate::domain::error::{ComTermError, ComTermResult};
use crate::infrastructure::serial::{list_ports, SerialDevice};
use base64::Engine as _;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, Lines};
use tracing::{debug, info, warn};

/// How long the transmit thread waits on its channel before re-checking
/// the receive loop
const TX_POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Terminal behaviour resolved from configuration and flags
#[derive(Debug, Clone)]
pub struct TerminalOptions {
    pub show_timestamp: bool,
    pub line_ending: LineEnding,
    pub input_format: DataFormat,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub once: bool,
}

/// Why a terminal session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Ctrl-C or end of input
    UserQuit,
    /// The device failed or went away
    DeviceLost,
}

/// Turn a typed line into the bytes to transmit.
///
/// Text lines get the line ending appended; hex and base64 lines are sent
/// exactly as decoded.
pub fn encode_line(line: &str, format: DataFormat, line_ending: LineEnding) -> ComTermResult<Vec<u8>> {
    match format {
        DataFormat::Text => {
            let mut data = line.as_bytes().to_vec();
            data.extend_from_slice(line_ending.as_bytes());
            Ok(data)
        }
        DataFormat::Hex => {
            let cleaned: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            hex::decode(&cleaned)
                .map_err(|e| ComTermError::InvalidInput(format!("Invalid hex data: {}", e)))
        }
        DataFormat::Base64 => base64::engine::general_purpose::STANDARD
            .decode(line.trim())
            .map_err(|e| ComTermError::InvalidInput(format!("Invalid base64 data: {}", e))),
    }
}

/// Read a device name, skipping blank lines. `None` at end of input.
pub async fn prompt_device<R>(input: &mut Lines<R>) -> ComTermResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        print!("Device name: ");
        std::io::stdout().flush()?;

        match input.next_line().await? {
            Some(line) => {
                let name = line.trim();
                if !name.is_empty() {
                    return Ok(Some(name.to_string()));
                }
            }
            None => return Ok(None),
        }
    }
}

/// Block until at least one serial port is present, then show them
async fn wait_for_ports(writer: &dyn OutputWriter, retry_delay: Duration) -> ComTermResult<()> {
    let mut announced = false;
    loop {
        let ports = list_ports()?;
        if !ports.is_empty() {
            writer.write_ports(&ports)?;
            return Ok(());
        }
        if !announced {
            writer.write_message("Waiting for a serial port to appear...")?;
            announced = true;
        }
        tokio::time::sleep(retry_delay).await;
    }
}

/// Interactive serial terminal.
///
/// Prompts for a device unless `port` is given, opens it and runs a
/// session. Open failures and lost devices are reported and retried after
/// the retry delay; quitting (Ctrl-C or end of input) ends the terminal.
pub async fn run_connect<R>(
    engine: &CommunicationEngine,
    port: Option<String>,
    settings: &PortSettings,
    options: &TerminalOptions,
    input: &mut Lines<R>,
    writer: &dyn OutputWriter,
) -> ComTermResult<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let name = match &port {
            Some(name) => name.clone(),
            None => {
                wait_for_ports(writer, options.retry_delay).await?;
                match prompt_device(input).await? {
                    Some(name) => name,
                    None => return Ok(()),
                }
            }
        };

        let device = match engine.open_device(&name, settings) {
            Ok(device) => device,
            Err(e) => {
                let message = engine.take_last_error().unwrap_or_else(|| e.to_string());
                writer.write_error(&message)?;
                if options.once {
                    return Err(e);
                }
                tokio::time::sleep(options.retry_delay).await;
                continue;
            }
        };

        writer.write_message(&format!("Connected to {} ({})", name, settings))?;

        let end = run_session(engine, device, options, input, writer).await?;
        if end == SessionEnd::UserQuit || options.once {
            return Ok(());
        }

        info!("Session on {} ended, retrying", name);
        tokio::time::sleep(options.retry_delay).await;
    }
}

/// Run one session over an opened device until both loops exit.
///
/// Input lines are encoded and handed to the transmit loop; queued
/// messages are drained every poll interval. End of input and Ctrl-C ask
/// the transmit loop to terminate, which winds down the receive loop too.
pub async fn run_session<R>(
    engine: &CommunicationEngine,
    device: Box<dyn SerialDevice>,
    options: &TerminalOptions,
    input: &mut Lines<R>,
    writer: &dyn OutputWriter,
) -> ComTermResult<SessionEnd>
where
    R: AsyncBufRead + Unpin,
{
    let (handle, source) = ChannelSource::new(TX_POLL_TIMEOUT);
    let settings = SessionSettings::new(source).with_timestamps(options.show_timestamp);
    let mut session = engine.start(device, settings)?;

    let mut ticker = tokio::time::interval(options.poll_interval.max(Duration::from_millis(1)));
    let mut end = SessionEnd::DeviceLost;
    let mut quitting = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                drain(&session, writer)?;
                if session.poll_liveness() == Liveness::AllExited {
                    break;
                }
            }
            line = input.next_line(), if !quitting => {
                match line {
                    Ok(Some(line)) => match encode_line(&line, options.input_format, options.line_ending) {
                        Ok(data) => {
                            if handle.send(data).is_err() {
                                debug!(session = session.id(), "Transmit loop already gone");
                            }
                        }
                        Err(e) => writer.write_error(&e.to_string())?,
                    },
                    Ok(None) => {
                        debug!(session = session.id(), "End of input");
                        quitting = true;
                        end = SessionEnd::UserQuit;
                        handle.terminate();
                    }
                    Err(e) => {
                        warn!(session = session.id(), "Failed to read input: {}", e);
                        quitting = true;
                        end = SessionEnd::UserQuit;
                        handle.terminate();
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if !quitting => {
                debug!(session = session.id(), "Interrupted");
                quitting = true;
                end = SessionEnd::UserQuit;
                handle.terminate();
            }
        }
    }

    drain(&session, writer)?;
    finish(&mut session, writer)?;
    Ok(end)
}

fn drain(session: &Session, writer: &dyn OutputWriter) -> ComTermResult<()> {
    while let Some(message) = session.pop_message() {
        writer.write_frame(&message)?;
    }
    Ok(())
}

fn finish(session: &mut Session, writer: &dyn OutputWriter) -> ComTermResult<()> {
    if let Some(error) = session.take_last_error() {
        writer.write_error(&error)?;
    }
    session.close()
}
