use std::fs;
use std::path::{Path, PathBuf};

use eoslink_records::RecordTarget;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Settings;

/// Configuration manager for eoslink settings
/// Separates the schema (defaults, ranges, descriptions) from the persisted values.
/// Configuration is stored in config.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub console: ConsoleConfigSchema,
    pub timing: TimingConfigSchema,
    pub sync: SyncConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfigSchema {
    pub console_host: ConfigOption<String>,
    pub console_port: ConfigOption<u16>,
    pub local_port: ConfigOption<u16>,
    pub client_name: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfigSchema {
    pub heartbeat_interval_ms: ConfigOption<u64>,
    pub heartbeat_failure_ms: ConfigOption<u64>,
    pub partial_expiry_ms: ConfigOption<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfigSchema {
    pub targets: ConfigOption<Vec<RecordTarget>>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes a default file first if none exists
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    /// The original creation stamp is kept when the file already exists
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = fs::read_to_string(&self.config_path)
            .ok()
            .and_then(|content| serde_json::from_str::<ConfigFile>(&content).ok())
            .map(|existing| existing.created_at)
            .unwrap_or_else(|| now.clone());

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, update and save settings
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = Settings::default();
        ConfigSchema {
            console: ConsoleConfigSchema {
                console_host: ConfigOption {
                    default: defaults.console_host,
                    valid_range: None,
                    valid_choices: None,
                    description: "Host name or IP address of the console".to_string(),
                    requires_restart: true,
                },
                console_port: ConfigOption {
                    default: defaults.console_port,
                    valid_range: Some((1, 65535)),
                    valid_choices: None,
                    description: "UDP port the console receives OSC on".to_string(),
                    requires_restart: true,
                },
                local_port: ConfigOption {
                    default: defaults.local_port,
                    valid_range: Some((1024, 65535)),
                    valid_choices: None,
                    description: "Local UDP port replies are sent to".to_string(),
                    requires_restart: true,
                },
                client_name: ConfigOption {
                    default: defaults.client_name,
                    valid_range: None,
                    valid_choices: None,
                    description: "Name used in log output for this client".to_string(),
                    requires_restart: false,
                },
            },
            timing: TimingConfigSchema {
                heartbeat_interval_ms: ConfigOption {
                    default: defaults.heartbeat_interval_ms,
                    valid_range: Some((1000, 60_000)),
                    valid_choices: None,
                    description: "Time between heartbeats in milliseconds".to_string(),
                    requires_restart: true,
                },
                heartbeat_failure_ms: ConfigOption {
                    default: defaults.heartbeat_failure_ms,
                    valid_range: Some((100, 10_000)),
                    valid_choices: None,
                    description: "Time to wait for a heartbeat reply before retrying"
                        .to_string(),
                    requires_restart: true,
                },
                partial_expiry_ms: ConfigOption {
                    default: defaults.partial_expiry_ms,
                    valid_range: Some((1000, 600_000)),
                    valid_choices: None,
                    description: "Time an incomplete record may wait for its remaining messages"
                        .to_string(),
                    requires_restart: true,
                },
            },
            sync: SyncConfigSchema {
                targets: ConfigOption {
                    default: defaults.targets,
                    valid_range: None,
                    valid_choices: Some(vec![RecordTarget::ALL.to_vec()]),
                    description: "Record categories to mirror after connecting".to_string(),
                    requires_restart: false,
                },
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if settings.console_host.trim().is_empty() {
            errors.push("console_host must not be empty".to_string());
        }

        if let Some((min, max)) = schema.console.console_port.valid_range {
            if settings.console_port < min || settings.console_port > max {
                errors.push(format!("console_port must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.console.local_port.valid_range {
            if settings.local_port < min || settings.local_port > max {
                errors.push(format!("local_port must be between {} and {}", min, max));
            }
        }

        if let Some((min, max)) = schema.timing.heartbeat_interval_ms.valid_range {
            if settings.heartbeat_interval_ms < min || settings.heartbeat_interval_ms > max {
                errors.push(format!(
                    "heartbeat_interval_ms must be between {} and {}",
                    min, max
                ));
            }
        }

        if let Some((min, max)) = schema.timing.heartbeat_failure_ms.valid_range {
            if settings.heartbeat_failure_ms < min || settings.heartbeat_failure_ms > max {
                errors.push(format!(
                    "heartbeat_failure_ms must be between {} and {}",
                    min, max
                ));
            }
        }

        if settings.heartbeat_failure_ms >= settings.heartbeat_interval_ms {
            errors.push("heartbeat_failure_ms must be shorter than heartbeat_interval_ms".to_string());
        }

        if let Some((min, max)) = schema.timing.partial_expiry_ms.valid_range {
            if settings.partial_expiry_ms < min || settings.partial_expiry_ms > max {
                errors.push(format!(
                    "partial_expiry_ms must be between {} and {}",
                    min, max
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to serialize config: {0}")]
    SerializeError(String),

    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}
