use crate::cli::args::{Args, Command, ConfigCommand, ConnectArgs, LoopbackArgs, TerminalArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::cli::terminal::{self, TerminalOptions};
use crate::core::communication::CommunicationEngine;
use crate::domain::config::{ComTermConfig, GlobalConfig, PortSettings};
use crate::domain::error::{ComTermError, ComTermResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{list_ports, LoopbackDevice};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Execute CLI command
pub async fn execute_command(args: Args) -> ComTermResult<()> {
    let writer = ConsoleWriter::new(args.output);

    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_paths(PathBuf::from(path), None),
        None => ConfigManager::new()?,
    };
    let config = config_manager.load_config()?;

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command {
        Command::List => {
            let ports = list_ports()?;
            writer.write_ports(&ports)?;
            Ok(())
        }
        Command::Connect(connect_args) => execute_connect(connect_args, writer, &config).await,
        Command::Loopback(loopback_args) => execute_loopback(loopback_args, writer, &config).await,
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("comterm {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Port name and line settings for `connect`: a named profile, an explicit
/// port, or neither (prompt later), with flag overrides on top.
pub fn resolve_target(
    args: &ConnectArgs,
    config: &ComTermConfig,
) -> ComTermResult<(Option<String>, PortSettings)> {
    let (port, settings) = match &args.device {
        Some(name) => {
            let profile = config.find_device(name).ok_or_else(|| ComTermError::Config {
                message: format!("Unknown device profile '{}'", name),
            })?;
            (Some(profile.port.clone()), config.settings_for(profile))
        }
        None => (args.port.clone(), config.port.clone()),
    };
    Ok((port, args.apply_overrides(settings)))
}

/// Merge terminal flags into the configured defaults
pub fn terminal_options(args: &TerminalArgs, global: &GlobalConfig, once: bool) -> TerminalOptions {
    TerminalOptions {
        show_timestamp: global.show_timestamp && !args.no_timestamp,
        line_ending: args
            .line_ending
            .map(Into::into)
            .unwrap_or(global.line_ending),
        input_format: args.input_format,
        poll_interval: Duration::from_millis(global.poll_interval_ms),
        retry_delay: Duration::from_millis(global.retry_delay_ms),
        once,
    }
}

fn engine_for(config: &ComTermConfig) -> CommunicationEngine {
    CommunicationEngine::new().with_queue_capacity(config.global.queue_capacity)
}

async fn execute_connect(
    args: ConnectArgs,
    writer: ConsoleWriter,
    config: &ComTermConfig,
) -> ComTermResult<()> {
    let (port, settings) = resolve_target(&args, config)?;
    let options = terminal_options(&args.terminal, &config.global, args.once);
    let writer = writer.with_display(args.terminal.display);
    let engine = engine_for(config);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    terminal::run_connect(&engine, port, &settings, &options, &mut input, &writer).await
}

async fn execute_loopback(
    args: LoopbackArgs,
    writer: ConsoleWriter,
    config: &ComTermConfig,
) -> ComTermResult<()> {
    let options = terminal_options(&args.terminal, &config.global, true);
    let writer = writer.with_display(args.terminal.display);
    let engine = engine_for(config);
    let device = LoopbackDevice::new("loopback", Duration::from_millis(args.timeout));

    writer.write_message("Loopback device ready; typed lines are echoed back")?;

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    terminal::run_session(&engine, Box::new(device), &options, &mut input, &writer).await?;
    Ok(())
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    config: &ComTermConfig,
    config_manager: &ConfigManager,
) -> ComTermResult<()> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Init { output, global } => {
            let path = if global {
                config_manager.init_global_config()?
            } else {
                let dir = match output {
                    Some(dir) => PathBuf::from(dir),
                    None => std::env::current_dir().map_err(|e| ComTermError::Config {
                        message: format!("Failed to get current directory: {}", e),
                    })?,
                };
                config_manager.init_project_config(&dir)?
            };
            writer.write_message(&format!("Configuration initialized at '{}'", path.display()))?;
            Ok(())
        }
    }
}
