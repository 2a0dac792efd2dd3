use crate::domain::config::{LineEnding, ParityConfig, PortSettings};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for ComTerm
#[derive(Parser, Debug)]
#[command(
    name = "comterm",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bidirectional serial terminal",
    long_about = "A serial (COM) terminal that streams timeout-framed messages from a device while sending typed lines to it."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available serial ports
    List,
    /// Open a serial device and run the interactive terminal
    Connect(ConnectArgs),
    /// Run the terminal against an in-memory loopback device
    Loopback(LoopbackArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Options shared by every command that runs the terminal
#[derive(ClapArgs, Debug, Clone)]
pub struct TerminalArgs {
    /// Do not prefix messages with a timestamp
    #[arg(long)]
    pub no_timestamp: bool,

    /// Line ending appended to each typed line
    #[arg(long, value_enum)]
    pub line_ending: Option<LineEndingArg>,

    /// How typed lines are interpreted
    #[arg(long, value_enum, default_value = "text")]
    pub input_format: DataFormat,

    /// How message payloads are printed
    #[arg(long, value_enum, default_value = "text")]
    pub display: DisplayFormat,
}

/// Serial connection arguments
#[derive(ClapArgs, Debug)]
pub struct ConnectArgs {
    /// Serial port path; prompted for when omitted
    #[arg(short, long, conflicts_with = "device")]
    pub port: Option<String>,

    /// Named device profile from the configuration
    #[arg(short, long)]
    pub device: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Data bits
    #[arg(long)]
    pub data_bits: Option<u8>,

    /// Stop bits
    #[arg(long)]
    pub stop_bits: Option<u8>,

    /// Parity (none, even, odd)
    #[arg(long, value_enum)]
    pub parity: Option<ParityArg>,

    /// Read timeout in milliseconds; also the gap that ends a message
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Exit after the first session instead of prompting again
    #[arg(long)]
    pub once: bool,

    #[command(flatten)]
    pub terminal: TerminalArgs,
}

/// Loopback demo arguments
#[derive(ClapArgs, Debug)]
pub struct LoopbackArgs {
    /// Read timeout in milliseconds
    #[arg(short, long, default_value = "50")]
    pub timeout: u64,

    #[command(flatten)]
    pub terminal: TerminalArgs,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Create default configuration
    Init {
        /// Directory to create `.comterm/config.toml` in
        #[arg(short, long)]
        output: Option<String>,
        /// Global configuration
        #[arg(short, long)]
        global: bool,
    },
}

/// Parity configuration argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Line ending argument
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum LineEndingArg {
    None,
    Cr,
    Lf,
    Crlf,
}

/// Data format argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Text,
    Hex,
    Base64,
}

/// Payload display argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayFormat {
    Text,
    Hex,
}

impl From<ParityArg> for ParityConfig {
    fn from(parity: ParityArg) -> Self {
        match parity {
            ParityArg::None => Self::None,
            ParityArg::Even => Self::Even,
            ParityArg::Odd => Self::Odd,
        }
    }
}

impl From<LineEndingArg> for LineEnding {
    fn from(line_ending: LineEndingArg) -> Self {
        match line_ending {
            LineEndingArg::None => Self::None,
            LineEndingArg::Cr => Self::Cr,
            LineEndingArg::Lf => Self::Lf,
            LineEndingArg::Crlf => Self::CrLf,
        }
    }
}

impl ConnectArgs {
    /// Apply command line overrides on top of configured settings
    pub fn apply_overrides(&self, mut settings: PortSettings) -> PortSettings {
        if let Some(baud) = self.baud {
            settings.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            settings.data_bits = data_bits;
        }
        if let Some(stop_bits) = self.stop_bits {
            settings.stop_bits = stop_bits;
        }
        if let Some(parity) = self.parity {
            settings.parity = parity.into();
        }
        if let Some(timeout) = self.timeout {
            settings.read_timeout_ms = timeout;
        }
        settings
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Text => write!(f, "text"),
            DataFormat::Hex => write!(f, "hex"),
            DataFormat::Base64 => write!(f, "base64"),
        }
    }
}
