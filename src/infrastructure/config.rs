use crate::domain::config::{ComTermConfig, DeviceProfile, GlobalConfig, PortSettings};
use crate::domain::error::{ComTermError, ComTermResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR: &str = ".comterm";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
#[derive(Debug, Clone)]
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> ComTermResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_project_config_path(&dir));

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager over explicit paths, used for `--config` and in tests
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files
    pub fn load_config(&self) -> ComTermResult<ComTermConfig> {
        let mut config = ComTermConfig::default();

        if self.global_config_path.exists() {
            debug!("Loading global config from {}", self.global_config_path.display());
            let global_config = self.load_config_from_path(&self.global_config_path)?;
            config.global = global_config.global;
            config.port = global_config.port;
            config.devices = global_config.devices;
        }

        // Project devices shadow global ones of the same name
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                debug!("Loading project config from {}", project_path.display());
                let project_config = self.load_config_from_path(project_path)?;
                for device in project_config.devices {
                    config.devices.retain(|existing| existing.name != device.name);
                    config.devices.push(device);
                }
            }
        }

        Ok(config)
    }

    /// Save the global part of a configuration
    pub fn save_global_config(&self, config: &ComTermConfig) -> ComTermResult<()> {
        if let Some(parent) = self.global_config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ComTermError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        let global_config = ComTermConfig {
            global: config.global.clone(),
            port: config.port.clone(),
            devices: Vec::new(),
        };
        self.save_config_to_path(&self.global_config_path, &global_config)
    }

    /// Write a default global configuration unless one exists
    pub fn init_global_config(&self) -> ComTermResult<PathBuf> {
        if self.global_config_path.exists() {
            return Err(ComTermError::Config {
                message: format!(
                    "Global configuration already exists at {}",
                    self.global_config_path.display()
                ),
            });
        }
        self.save_global_config(&ComTermConfig::default())?;
        Ok(self.global_config_path.clone())
    }

    /// Get global configuration path
    fn get_global_config_path() -> ComTermResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| ComTermError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("comterm").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up from `start`
    pub fn find_project_config_path(start: &Path) -> Option<PathBuf> {
        let mut path = start;

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> ComTermResult<ComTermConfig> {
        let content = fs::read_to_string(path).map_err(|e| ComTermError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| ComTermError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &ComTermConfig) -> ComTermResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| ComTermError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| ComTermError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration
    pub fn init_project_config(&self, path: &Path) -> ComTermResult<PathBuf> {
        let config_dir = path.join(CONFIG_DIR);
        let config_file = config_dir.join(CONFIG_FILE);

        if config_file.exists() {
            return Err(ComTermError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| ComTermError::Config {
            message: format!("Failed to create {} directory: {}", CONFIG_DIR, e),
        })?;

        let default_config = ComTermConfig {
            global: GlobalConfig::default(),
            port: PortSettings::default(),
            devices: vec![
                DeviceProfile {
                    name: "example_serial".to_string(),
                    description: "Example serial device".to_string(),
                    port: "/dev/ttyUSB0".to_string(),
                    settings: None,
                },
                DeviceProfile {
                    name: "example_fast".to_string(),
                    description: "Example device at 115200 baud".to_string(),
                    port: "/dev/ttyACM0".to_string(),
                    settings: Some(PortSettings {
                        baud_rate: 115_200,
                        ..PortSettings::default()
                    }),
                },
            ],
        };

        self.save_config_to_path(&config_file, &default_config)?;

        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}
