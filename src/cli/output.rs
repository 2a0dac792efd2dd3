use crate::cli::args::{DisplayFormat, OutputFormat};
use crate::core::communication::Message;
use crate::domain::config::{ComTermConfig, DeviceProfile};
use crate::infrastructure::serial::PortSummary;
use std::io::{self, Write};
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_ports(&self, ports: &[PortSummary]) -> Result<(), OutputError>;
    fn write_config(&self, config: &ComTermConfig) -> Result<(), OutputError>;
    fn write_frame(&self, message: &Message) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::ComTermError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
#[derive(Debug, Clone, Copy)]
pub struct ConsoleWriter {
    format: OutputFormat,
    display: DisplayFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            display: DisplayFormat::Text,
        }
    }

    pub fn with_display(mut self, display: DisplayFormat) -> Self {
        self.display = display;
        self
    }
}

/// Render a message the way the terminal prints it.
///
/// Text display passes the payload through untouched, so a device that
/// sends partial lines shows up as a continuous stream.
pub fn render_frame(message: &Message, format: OutputFormat, display: DisplayFormat) -> Vec<u8> {
    match (format, display) {
        (OutputFormat::Json, _) => {
            let value = serde_json::json!({
                "direction": message.direction().to_string(),
                "timestamp": message.timestamp(),
                "payload": message.payload_lossy(),
                "hex": hex::encode(message.payload()),
            });
            let mut line = value.to_string().into_bytes();
            line.push(b'\n');
            line
        }
        (_, DisplayFormat::Hex) => {
            format!("{}{}\n", message.prefix_str(), message.payload_as_hex()).into_bytes()
        }
        (_, DisplayFormat::Text) => message.as_bytes().to_vec(),
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_ports(&self, ports: &[PortSummary]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                if ports.is_empty() {
                    println!("No serial ports found");
                    return Ok(());
                }
                println!("Available serial ports:");
                for port in ports {
                    if port.description.is_empty() {
                        println!("  {} ({})", port.name, port.kind);
                    } else {
                        println!("  {} ({}, {})", port.name, port.kind, port.description);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(ports)?);
            }
            OutputFormat::Table => {
                if !ports.is_empty() {
                    let table_data: Vec<PortTableRow> = ports.iter().map(PortTableRow::from).collect();
                    println!("{}", Table::new(table_data));
                }
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &ComTermConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("ComTerm Configuration:");
                println!("  Log level: {}", config.global.log_level);
                println!("  Timestamps: {}", config.global.show_timestamp);
                println!("  Line ending: {:?}", config.global.line_ending);
                println!("  Retry delay: {}ms", config.global.retry_delay_ms);
                println!("  Poll interval: {}ms", config.global.poll_interval_ms);
                println!("  Queue capacity: {}", config.global.queue_capacity);
                println!("  Port defaults: {}", config.port);

                if !config.devices.is_empty() {
                    println!("  Devices:");
                    for device in &config.devices {
                        let desc = if device.description.is_empty() {
                            "No description"
                        } else {
                            &device.description
                        };
                        println!("    {} ({}): {}", device.name, device.port, desc);
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Table => {
                if !config.devices.is_empty() {
                    let table_data: Vec<DeviceTableRow> = config
                        .devices
                        .iter()
                        .map(|device| DeviceTableRow::new(device, config))
                        .collect();
                    println!("{}", Table::new(table_data));
                }
            }
        }
        Ok(())
    }

    fn write_frame(&self, message: &Message) -> Result<(), OutputError> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(&render_frame(message, self.format, self.display))?;
        stdout.flush()?;
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for an enumerated port
#[derive(Tabled)]
struct PortTableRow {
    name: String,
    kind: String,
    description: String,
}

impl From<&PortSummary> for PortTableRow {
    fn from(port: &PortSummary) -> Self {
        Self {
            name: port.name.clone(),
            kind: port.kind.clone(),
            description: port.description.clone(),
        }
    }
}

/// Table row for a device profile
#[derive(Tabled)]
struct DeviceTableRow {
    name: String,
    port: String,
    settings: String,
    description: String,
}

impl DeviceTableRow {
    fn new(device: &DeviceProfile, config: &ComTermConfig) -> Self {
        Self {
            name: device.name.clone(),
            port: device.port.clone(),
            settings: config.settings_for(device).to_string(),
            description: device.description.clone(),
        }
    }
}
