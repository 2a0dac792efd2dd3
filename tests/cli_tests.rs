use std::process::Command;
use std::str;

fn comterm() -> Command {
    Command::new(env!("CARGO_BIN_EXE_comterm"))
}

/// CLI interface tests
#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help() {
        let output = comterm().arg("--help").output().expect("Failed to execute command");

        let stdout = str::from_utf8(&output.stdout).expect("Invalid UTF-8");
        assert!(output.status.success());
        assert!(stdout.contains("Usage:"));
        assert!(stdout.contains("Commands:"));
        assert!(stdout.contains("list"));
        assert!(stdout.contains("connect"));
        assert!(stdout.contains("loopback"));
        assert!(stdout.contains("config"));
    }

    #[test]
    fn test_cli_version() {
        let output = comterm().arg("version").output().expect("Failed to execute command");

        let stdout = str::from_utf8(&output.stdout).expect("Invalid UTF-8");
        assert!(output.status.success());
        assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_cli_connect_help() {
        let output = comterm()
            .args(["connect", "--help"])
            .output()
            .expect("Failed to execute command");

        let stdout = str::from_utf8(&output.stdout).expect("Invalid UTF-8");
        assert!(stdout.contains("--port"));
        assert!(stdout.contains("--baud"));
        assert!(stdout.contains("--once"));
        assert!(stdout.contains("--line-ending"));
    }

    #[test]
    fn test_cli_invalid_command() {
        let output = comterm().arg("invalid-command").output().expect("Failed to execute command");
        assert!(!output.status.success());
    }

    #[test]
    fn test_cli_open_failure_with_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("config.toml");

        let output = comterm()
            .args(["-q", "--config"])
            .arg(&config)
            .args(["connect", "--port", "/dev/comterm_missing_port_9", "--once"])
            .output()
            .expect("Failed to execute command");

        let stderr = str::from_utf8(&output.stderr).expect("Invalid UTF-8");
        assert!(!output.status.success());
        assert!(stderr.contains("/dev/comterm_missing_port_9"));
    }

    #[test]
    fn test_cli_config_show_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "[global]\nretry_delay_ms = 750\n").unwrap();

        let output = comterm()
            .args(["-q", "--output", "json", "--config"])
            .arg(&config)
            .args(["config", "show"])
            .output()
            .expect("Failed to execute command");

        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["global"]["retry_delay_ms"], 750);
        assert_eq!(value["port"]["baud_rate"], 9600);
    }

    #[test]
    fn test_cli_quiet_flag() {
        let output = comterm().args(["-q", "--help"]).output().expect("Failed to execute command");

        let stderr = str::from_utf8(&output.stderr).expect("Invalid UTF-8");
        assert!(!stderr.contains("unexpected argument"));
    }
}
