//! Configuration management for CrabEye
//!
//! Adapter settings come from an optional TOML file layered with
//! `CRABEYE__SECTION__KEY` environment overrides.

use crate::errors::PinError;
use crate::format::catalog;
use crate::pin::PinSettings;
use crate::platform::DeviceTuning;
use crate::types::{AllocatorProperties, FormatSpec};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of environment overrides, e.g. `CRABEYE__STREAM__FORMAT=320x240@60`.
pub const ENV_PREFIX: &str = "CRABEYE";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub logging: LoggingConfig,
    pub stream: StreamSettings,
    pub device: DeviceTuning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "crabeye=info".to_string(),
        }
    }
}

/// Stream behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Timestamp samples against a monotonic clock
    pub reference_clock: bool,
    /// Stream blank frames if the device fails to initialize
    pub blank_frames_on_device_failure: bool,
    /// Format forced on the pin at construction
    pub format: Option<FormatSpec>,
    /// Requested sample pool size, 0 for the pin default
    pub buffer_count: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reference_clock: true,
            blank_frames_on_device_failure: false,
            format: None,
            buffer_count: 0,
        }
    }
}

impl AdapterConfig {
    /// Load from a TOML file (missing file means defaults) plus environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PinError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
        }

        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PinError::Config(format!("Failed to read configuration: {}", e)))?;

        let config: AdapterConfig = settings
            .try_deserialize()
            .map_err(|e| PinError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;

        log::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse a TOML document, without environment overrides.
    pub fn from_toml_str(contents: &str) -> Result<Self, PinError> {
        let config: AdapterConfig = toml::from_str(contents)
            .map_err(|e| PinError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PinError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PinError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| PinError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| PinError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabeye.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), PinError> {
        if self.logging.level.trim().is_empty() {
            return Err(PinError::Config("Logging level must not be empty".to_string()));
        }
        if let Some(spec) = &self.stream.format {
            if let Some(reason) = catalog::rejection_reason(&spec.to_media_format()) {
                return Err(PinError::Config(format!(
                    "Configured format {} is not supported: {}",
                    spec, reason
                )));
            }
        }
        Ok(())
    }

    pub fn pin_settings(&self) -> PinSettings {
        PinSettings {
            tuning: self.device,
            blank_frames_on_device_failure: self.stream.blank_frames_on_device_failure,
        }
    }

    /// Allocator request derived from `stream.buffer_count`.
    pub fn buffer_request(&self) -> AllocatorProperties {
        AllocatorProperties::new(self.stream.buffer_count, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AdapterConfig::default();
        assert!(config.stream.reference_clock);
        assert!(!config.stream.blank_frames_on_device_failure);
        assert!(config.device.flip_vertical);
        assert!(!config.device.flip_horizontal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AdapterConfig::from_toml_str(
            r#"
            [stream]
            format = "320x240@60"
            "#,
        )
        .unwrap();
        assert_eq!(config.stream.format, Some(FormatSpec::new(320, 240, 60)));
        assert!(config.stream.reference_clock);
        assert_eq!(config.device, DeviceTuning::default());
    }

    #[test]
    fn test_unsupported_format_rejected() {
        let result = AdapterConfig::from_toml_str(
            r#"
            [stream]
            format = "1920x1080@30"
            "#,
        );
        assert!(matches!(result, Err(PinError::Config(_))));
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&AdapterConfig::default()).unwrap();
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("[stream]"));
        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("auto_white_balance"));
    }

    #[test]
    fn test_pin_settings_follow_config() {
        let mut config = AdapterConfig::default();
        config.stream.blank_frames_on_device_failure = true;
        config.device.autogain = false;
        let settings = config.pin_settings();
        assert!(settings.blank_frames_on_device_failure);
        assert!(!settings.tuning.autogain);
        assert_eq!(config.buffer_request().buffer_count, 0);
    }
}
