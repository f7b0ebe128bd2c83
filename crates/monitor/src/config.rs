//! Monitor configuration management

use anyhow::{Context, Result, anyhow};
use attach::AttachConfig;
use protocol::ServiceClass;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub monitor: MonitorSettings,
    /// Attachment policy
    #[serde(default)]
    pub attach: AttachConfig,
    /// Service classes to watch; each entry registers one client
    #[serde(default)]
    pub watch: Vec<WatchEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    pub log_level: String,
}

/// One watched service class
///
/// # Example Configuration
/// ```toml
/// [[watch]]
/// name = "room-temp"
/// service_class = "thermometer"   # or "0x1421bac7"
///
/// [[watch]]
/// name = "ignored-pad"
/// service_class = "arcade-gamepad"
/// reject = true                   # veto every attachment
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEntry {
    pub name: String,
    /// Well-known class name, `0x`-prefixed hex, or decimal
    pub service_class: String,
    /// Veto every proposed attachment
    #[serde(default)]
    pub reject: bool,
}

impl WatchEntry {
    pub fn class(&self) -> Result<ServiceClass> {
        self.service_class
            .parse()
            .with_context(|| format!("Invalid service class for watch '{}'", self.name))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorSettings {
                log_level: "info".to_string(),
            },
            attach: AttachConfig::default(),
            watch: vec![
                WatchEntry {
                    name: "thermometer".to_string(),
                    service_class: "thermometer".to_string(),
                    reject: false,
                },
                WatchEntry {
                    name: "gamepad".to_string(),
                    service_class: "arcade-gamepad".to_string(),
                    reject: false,
                },
            ],
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(anyhow!("No configuration file found, using defaults"));
                }
                default
            }
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("busattach").join("monitor.toml")
        } else {
            PathBuf::from(".config/busattach/monitor.toml")
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.monitor.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.monitor.log_level,
                valid_levels.join(", ")
            ));
        }

        for entry in &self.watch {
            if entry.name.is_empty() {
                return Err(anyhow!("Empty name in watch list"));
            }
            if !entry.class()?.is_matchable() {
                return Err(anyhow!(
                    "Watch '{}' uses the control service class, which never attaches",
                    entry.name
                ));
            }
        }

        Ok(())
    }
}
