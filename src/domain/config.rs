use serde::{Deserialize, Serialize};
use std::time::Duration;

/// ComTerm configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComTermConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Default line settings used when a device profile does not override them
    #[serde(default)]
    pub port: PortSettings,
    /// Named device profiles
    #[serde(default)]
    pub devices: Vec<DeviceProfile>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prefix every message with a `[HH:MM:SS.mmm]` timestamp
    #[serde(default = "default_show_timestamp")]
    pub show_timestamp: bool,
    /// Line ending appended to each typed line
    #[serde(default)]
    pub line_ending: LineEnding,
    /// Pause before re-prompting after an open failure or a failed session
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Console drain cadence while a session runs
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Capacity of the per-session message queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Serial line settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSettings {
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: ParityConfig,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Per-byte read timeout; also the inter-message gap used for framing
    #[serde(default = "default_io_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_io_timeout")]
    pub write_timeout_ms: u64,
}

/// Named device profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Profile name
    pub name: String,
    /// Device description
    #[serde(default)]
    pub description: String,
    /// Port path (`/dev/ttyUSB0`, `COM3`, ...)
    pub port: String,
    /// Line settings; falls back to the top-level `[port]` table
    #[serde(default)]
    pub settings: Option<PortSettings>,
}

/// Parity configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParityConfig {
    #[default]
    None,
    Odd,
    Even,
}

/// Line ending appended to outbound lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    None,
    Cr,
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            LineEnding::None => b"",
            LineEnding::Cr => b"\r",
            LineEnding::Lf => b"\n",
            LineEnding::CrLf => b"\r\n",
        }
    }
}

impl PortSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl ComTermConfig {
    /// Find a device profile by name
    pub fn find_device(&self, name: &str) -> Option<&DeviceProfile> {
        self.devices.iter().find(|device| device.name == name)
    }

    /// Effective line settings for a profile
    pub fn settings_for(&self, device: &DeviceProfile) -> PortSettings {
        device.settings.clone().unwrap_or_else(|| self.port.clone())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_show_timestamp() -> bool {
    true
}

fn default_retry_delay() -> u64 {
    2000
}

fn default_poll_interval() -> u64 {
    20
}

fn default_queue_capacity() -> usize {
    10
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_io_timeout() -> u64 {
    50
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            show_timestamp: default_show_timestamp(),
            line_ending: LineEnding::default(),
            retry_delay_ms: default_retry_delay(),
            poll_interval_ms: default_poll_interval(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: ParityConfig::default(),
            stop_bits: default_stop_bits(),
            read_timeout_ms: default_io_timeout(),
            write_timeout_ms: default_io_timeout(),
        }
    }
}

impl std::fmt::Display for PortSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parity = match self.parity {
            ParityConfig::None => 'N',
            ParityConfig::Odd => 'O',
            ParityConfig::Even => 'E',
        };
        write!(
            f,
            "{} {}{}{} (timeouts {}ms/{}ms)",
            self.baud_rate,
            self.data_bits,
            parity,
            self.stop_bits,
            self.read_timeout_ms,
            self.write_timeout_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = ComTermConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ComTermConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.port, config.port);
    }

    #[test]
    fn test_port_defaults_are_9600_8n1() {
        let settings = PortSettings::default();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.data_bits, 8);
        assert_eq!(settings.parity, ParityConfig::None);
        assert_eq!(settings.stop_bits, 1);
        assert_eq!(settings.read_timeout(), Duration::from_millis(50));
        assert_eq!(settings.write_timeout(), Duration::from_millis(50));
        assert_eq!(settings.to_string(), "9600 8N1 (timeouts 50ms/50ms)");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: ComTermConfig = toml::from_str(
            r#"
            [global]
            line_ending = "crlf"

            [port]
            baud_rate = 115200

            [[devices]]
            name = "bench"
            port = "/dev/ttyACM0"
            "#,
        )
        .unwrap();

        assert_eq!(config.global.line_ending, LineEnding::CrLf);
        assert!(config.global.show_timestamp);
        assert_eq!(config.port.baud_rate, 115200);
        assert_eq!(config.port.read_timeout_ms, 50);

        let bench = config.find_device("bench").unwrap();
        assert_eq!(config.settings_for(bench).baud_rate, 115200);
        assert!(config.find_device("missing").is_none());
    }

    #[test]
    fn test_line_endings() {
        assert_eq!(LineEnding::None.as_bytes(), b"");
        assert_eq!(LineEnding::Cr.as_bytes(), b"\r");
        assert_eq!(LineEnding::Lf.as_bytes(), b"\n");
        assert_eq!(LineEnding::CrLf.as_bytes(), b"\r\n");
    }
}
