/// Tool configuration for sweepx
///
/// sweepx stores its own settings (not the sweep declaration) in
/// ~/.sweepx/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// sweepx configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Sweep bookkeeping settings
    #[serde(default)]
    pub sweep: SweepSettings,

    /// Terminal output settings
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Number of sweep manifests kept in the ledger
    #[serde(default = "default_max_history")]
    pub max_history: Option<usize>,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            max_history: Some(50),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Colorize progress lines and previews
    #[serde(default = "default_color")]
    pub color: Option<bool>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { color: Some(true) }
    }
}

// Default functions for serde
fn default_max_history() -> Option<usize> {
    Some(50)
}
fn default_color() -> Option<bool> {
    Some(true)
}

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;

    let config_dir = home_dir.join(".sweepx");
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    Ok(config_dir.join("config.toml"))
}

/// Get the default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# sweepx Configuration File
#
# This file controls default behavior for sweepx. The sweep declaration
# itself (paths, lines, values) lives in the YAML file passed with -f.

[sweep]
# Number of sweep manifests kept under ~/.sweepx/sweeps/ (default: 50)
# Older manifests are pruned after each sweep. Run logs and patched
# artifacts in the temp directory are never touched.
max_history = 50

[output]
# Colorize progress lines and dry-run previews (default: true)
color = true
"#
}

/// Save the default commented configuration file
pub fn save_default_config() -> Result<()> {
    let config_path = config_file_path()?;

    fs::write(&config_path, get_default_config_content()).with_context(|| {
        format!(
            "Failed to write default config file: {}",
            config_path.display()
        )
    })?;

    Ok(())
}

/// Load configuration from file, creating default if needed
///
/// If the config file doesn't exist, creates it with defaults and returns them.
/// If the config file is malformed, recreates it with defaults.
pub fn load_config() -> Result<ToolConfig> {
    let config_path = config_file_path()?;

    if !config_path.exists() {
        save_default_config()?;
    }

    let config_str = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config: ToolConfig = match toml::from_str(&config_str) {
        Ok(config) => config,
        Err(_) => {
            // Config is malformed, recreate with defaults
            save_default_config()?;
            return Ok(ToolConfig::default());
        }
    };

    Ok(config)
}

/// Ensure the config file exists and parses, recreating it when malformed
pub fn ensure_complete_config() -> Result<()> {
    let config_path = config_file_path()?;

    if !config_path.exists() {
        save_default_config()?;
        return Ok(());
    }

    let config_str = fs::read_to_string(&config_path)?;
    if toml::from_str::<ToolConfig>(&config_str).is_err() {
        save_default_config()?;
    }

    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &ToolConfig) -> Result<()> {
    if let Some(max_history) = config.sweep.max_history {
        if max_history == 0 || max_history > 1000 {
            anyhow::bail!("Invalid max_history: {} (must be 1-1000)", max_history);
        }
    }

    Ok(())
}
