//! Configuration loading and audio folder resolution

use crate::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Audio folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file value (passed in by the caller)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_audio_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_value: Option<&PathBuf>,
) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        debug!("Audio folder from command line: {}", path);
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            debug!("Audio folder from {}: {}", env_var_name, path);
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_value {
        debug!("Audio folder from config file: {}", path.display());
        return Ok(path.clone());
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_audio_folder())
}

/// Get OS-dependent default audio folder path
pub fn default_audio_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("admp").join("audio"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/admp/audio"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("admp").join("audio"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/admp/audio"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("admp").join("audio"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\admp\\audio"))
    } else {
        PathBuf::from("./admp_audio")
    }
}

/// Validate that a resolved audio folder exists and is a directory
pub fn validate_audio_folder(path: &PathBuf) -> Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Audio folder does not exist: {}",
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "Audio folder is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}
