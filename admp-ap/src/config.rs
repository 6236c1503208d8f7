//! Configuration management for the admp-ap audio player
//!
//! A single bootstrap TOML file plus command-line overrides; there is no
//! runtime settings store. Every field has a built-in default, so the
//! player runs with no config file at all.
//!
//! # Settings sources priority
//!
//! 1. Command-line arguments (--port, --audio-folder, --device)
//! 2. Environment variables (ADMP_AUDIO_FOLDER)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Streaming parameters (chunk size, prefetch margin) take effect at the
//! next file open; device parameters require a restart.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the audio folder
pub const AUDIO_FOLDER_ENV: &str = "ADMP_AUDIO_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Folder containing the multichannel render files
    #[serde(default)]
    pub audio_folder: Option<PathBuf>,

    /// HTTP control interface port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Audio output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,

    /// Device sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Device buffer size in frames per callback
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: u32,

    /// Channel count the render files are expected to have
    #[serde(default = "default_expected_channels")]
    pub expected_channels: usize,

    /// Physical output channel count to request from the device
    #[serde(default = "default_output_channels")]
    pub output_channels: u16,

    /// Stream chunk length in seconds of audio
    #[serde(default = "default_chunk_seconds")]
    pub chunk_seconds: u32,

    /// Portion of a chunk, in percent, used as the prefetch margin
    #[serde(default = "default_prefetch_margin_percent")]
    pub prefetch_margin_percent: u32,

    /// Metering configuration
    #[serde(default)]
    pub meter: MeterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MeterConfig {
    /// Level decay half-life in seconds.
    ///
    /// Converted to a per-callback decay factor at startup; the default
    /// matches the classic 0.95-per-callback ballistics at 512 frames
    /// and 48 kHz.
    #[serde(default = "default_meter_half_life")]
    pub half_life_secs: f32,

    /// Peak hold length in callbacks
    #[serde(default = "default_peak_hold_callbacks")]
    pub peak_hold_callbacks: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            half_life_secs: default_meter_half_life(),
            peak_hold_callbacks: default_peak_hold_callbacks(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5750
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_buffer_frames() -> u32 {
    512
}

fn default_expected_channels() -> usize {
    56
}

fn default_output_channels() -> u16 {
    60
}

fn default_chunk_seconds() -> u32 {
    60
}

fn default_prefetch_margin_percent() -> u32 {
    25
}

fn default_meter_half_life() -> f32 {
    crate::playback::meter::DEFAULT_HALF_LIFE_SECS
}

fn default_peak_hold_callbacks() -> u32 {
    crate::playback::meter::DEFAULT_PEAK_HOLD_CALLBACKS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub audio_folder: Option<PathBuf>,
    pub device: Option<String>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub audio_folder: PathBuf,
    pub port: u16,
    pub device: Option<String>,
    pub sample_rate: u32,
    pub buffer_frames: u32,
    pub expected_channels: usize,
    pub output_channels: u16,
    pub chunk_seconds: u32,
    pub prefetch_margin_percent: u32,
    pub meter: MeterConfig,
    pub log_level: String,
}

impl Config {
    /// Load configuration from an optional TOML file and CLI overrides.
    ///
    /// # Errors
    /// - The config file exists but cannot be read or parsed
    /// - A value fails validation
    pub fn load(toml_path: Option<&PathBuf>, overrides: ConfigOverrides) -> Result<Self> {
        let toml_config = match toml_path {
            Some(path) => {
                let toml_str = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                toml::from_str::<TomlConfig>(&toml_str)
                    .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?
            }
            None => TomlConfig::default(),
        };

        let audio_folder = admp_common::config::resolve_audio_folder(
            overrides.audio_folder.as_deref().and_then(|p| p.to_str()),
            AUDIO_FOLDER_ENV,
            toml_config.audio_folder.as_ref(),
        )
        .map_err(|e| Error::Config(e.to_string()))?;

        let config = Self {
            audio_folder,
            port: overrides.port.unwrap_or(toml_config.port),
            device: overrides.device.or(toml_config.device),
            sample_rate: toml_config.sample_rate,
            buffer_frames: toml_config.buffer_frames,
            expected_channels: toml_config.expected_channels,
            output_channels: toml_config.output_channels,
            chunk_seconds: toml_config.chunk_seconds,
            prefetch_margin_percent: toml_config.prefetch_margin_percent,
            meter: toml_config.meter,
            log_level: toml_config.logging.level,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_seconds == 0 {
            return Err(Error::Config("chunk_seconds must be at least 1".to_string()));
        }
        if self.buffer_frames == 0 {
            return Err(Error::Config("buffer_frames must be at least 1".to_string()));
        }
        if self.prefetch_margin_percent > 100 {
            return Err(Error::Config(
                "prefetch_margin_percent must be 0-100".to_string(),
            ));
        }
        if self.output_channels == 0 {
            return Err(Error::Config("output_channels must be at least 1".to_string()));
        }
        if !(self.meter.half_life_secs > 0.0) {
            return Err(Error::Config(
                "meter.half_life_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_port(), 5750);
        assert_eq!(default_sample_rate(), 48_000);
        assert_eq!(default_buffer_frames(), 512);
        assert_eq!(default_expected_channels(), 56);
        assert_eq!(default_output_channels(), 60);
        assert_eq!(default_chunk_seconds(), 60);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = Config::load(
            None,
            ConfigOverrides {
                audio_folder: Some(PathBuf::from("/tmp/audio")),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(config.port, 5750);
        assert_eq!(config.audio_folder, PathBuf::from("/tmp/audio"));
        assert_eq!(config.chunk_seconds, 60);
        assert_eq!(config.meter.peak_hold_callbacks, 24);
    }

    #[test]
    fn test_toml_parsing_and_cli_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admp.toml");
        std::fs::write(
            &path,
            r#"
audio_folder = "/from/toml"
port = 6000
chunk_seconds = 30

[meter]
half_life_secs = 0.25

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = Config::load(
            Some(&path),
            ConfigOverrides {
                port: Some(7000),
                ..Default::default()
            },
        )
        .unwrap();

        // CLI port wins over TOML
        assert_eq!(config.port, 7000);
        assert_eq!(config.chunk_seconds, 30);
        assert_eq!(config.meter.half_life_secs, 0.25);
        assert_eq!(config.log_level, "debug");
        // Unset fields fall back to defaults
        assert_eq!(config.buffer_frames, 512);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admp.toml");
        std::fs::write(&path, "audio_folder = \"/a\"\nchunk_seconds = 0\n").unwrap();

        let err = Config::load(Some(&path), ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_error() {
        let path = PathBuf::from("/no/such/admp.toml");
        let err = Config::load(Some(&path), ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
