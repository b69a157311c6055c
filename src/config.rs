/// Configuration management for SwapX
///
/// SwapX stores configuration in ~/.swapx/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Upper bound for `processing.jobs`
pub const MAX_JOBS: usize = 256;

/// SwapX configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Rule construction settings
    #[serde(default)]
    pub rules: RulesConfig,

    /// Output destination settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Batch processing settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Debug logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to do with rule candidates containing U+FFFD
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidCharPolicy {
    /// Drop silently (still logged when debug logging is on)
    #[default]
    Drop,
    /// Drop and print a warning for each dropped candidate
    Warn,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub invalid_char_policy: InvalidCharPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Inserted between file stem and extension for new output files
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Overwrite originals by default
    #[serde(default)]
    pub overwrite: bool,

    /// Back up originals before overwriting them
    #[serde(default = "default_backup")]
    pub backup: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            overwrite: false,
            backup: default_backup(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Worker threads for batches (0 = one per CPU)
    #[serde(default)]
    pub jobs: usize,

    /// Extensions picked up when a folder is given
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Descend into sub-folders
    #[serde(default)]
    pub recursive: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            extensions: default_extensions(),
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
}

// Default functions for serde
fn default_suffix() -> String { "_edited".to_string() }
fn default_backup() -> bool { true }
fn default_extensions() -> Vec<String> { vec!["txt".to_string()] }

/// The SwapX state directory (~/.swapx), created if missing
pub fn config_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;

    let config_dir = home_dir.join(".swapx");
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;

    Ok(config_dir)
}

/// Get the configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# SwapX Configuration File
#
# This file controls default behavior for SwapX. Values set here can be
# overridden by command-line flags.
#
# For more information, run: swapx config --help

[rules]
# What to do with rules containing U+FFFD (a sign of a broken encoding
# upstream). Such rules are never applied.
# drop - skip them quietly (recorded in the debug log)
# warn - skip them and print a warning for each one
invalid_char_policy = "drop"

[output]
# Inserted before the extension when writing new files (default: "_edited")
# notes.txt -> notes_edited.txt, then notes_edited_1.txt if that exists.
suffix = "_edited"

# Overwrite the original files instead of writing new ones (default: false)
overwrite = false

# Back up originals to ~/.swapx/backups/ before overwriting (default: true)
backup = true

[processing]
# Number of files processed in parallel, 0 = one per CPU (default: 0)
jobs = 0

# Extensions picked up when a folder is given (default: ["txt"])
extensions = ["txt"]

# Descend into sub-folders (default: false)
recursive = false

[logging]
# Write a debug log to ~/.swapx/swapx.log (default: false)
debug = false
"#
}

/// Save the default commented configuration file
pub fn save_default_config_to(config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    fs::write(config_path, get_default_config_content()).with_context(|| {
        format!(
            "Failed to write default config file: {}",
            config_path.display()
        )
    })?;

    Ok(())
}

/// Load configuration from the default location
pub fn load_config() -> Result<Config> {
    load_config_from(&config_file_path()?)
}

/// Load configuration from file, creating default if needed
///
/// If the config file doesn't exist, creates it with defaults and returns them.
/// If the config file is malformed, recreates it with defaults.
pub fn load_config_from(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        save_default_config_to(config_path)?;
    }

    let config_str = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    let config: Config = match toml::from_str(&config_str) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "malformed config, restoring defaults");
            save_default_config_to(config_path)?;
            return Ok(Config::default());
        }
    };

    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let config_str = toml::to_string_pretty(config)
        .context("Failed to serialize config")?;

    fs::write(config_path, config_str)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    let suffix = &config.output.suffix;
    if suffix.is_empty() {
        anyhow::bail!(
            "Invalid output.suffix: must not be empty (output would replace the original)"
        );
    }
    if suffix.contains('/') || suffix.contains('\\') {
        anyhow::bail!("Invalid output.suffix: {} (must not contain path separators)", suffix);
    }

    if config.processing.jobs > MAX_JOBS {
        anyhow::bail!("Invalid processing.jobs: {} (max {})", config.processing.jobs, MAX_JOBS);
    }

    if config.processing.extensions.is_empty() {
        anyhow::bail!("Invalid processing.extensions: at least one extension is required");
    }
    for ext in &config.processing.extensions {
        if ext.is_empty() || ext.starts_with('.') {
            anyhow::bail!(
                "Invalid extension: '{}' (use the bare extension, e.g. \"txt\")",
                ext
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rules.invalid_char_policy, InvalidCharPolicy::Drop);
        assert_eq!(config.output.suffix, "_edited");
        assert!(!config.output.overwrite);
        assert!(config.output.backup);
        assert_eq!(config.processing.jobs, 0);
        assert_eq!(config.processing.extensions, vec!["txt".to_string()]);
        assert!(!config.logging.debug);
    }

    #[test]
    fn test_default_template_parses_to_defaults() {
        let config: Config = toml::from_str(get_default_config_content()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[rules]\ninvalid_char_policy = \"warn\"\n").unwrap();
        assert_eq!(config.rules.invalid_char_policy, InvalidCharPolicy::Warn);
        assert_eq!(config.output.suffix, "_edited");
    }

    #[test]
    fn test_validate_config_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_config_empty_suffix() {
        let mut config = Config::default();
        config.output.suffix = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_suffix_with_separator() {
        let mut config = Config::default();
        config.output.suffix = "/out".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_dotted_extension() {
        let mut config = Config::default();
        config.processing.extensions = vec![".txt".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_config_too_many_jobs() {
        let mut config = Config::default();
        config.processing.jobs = MAX_JOBS + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_creates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = load_config_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_load_recreates_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(fs::read_to_string(&path).unwrap().contains("[processing]"));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let mut config = Config::default();
        config.processing.jobs = 4;
        config.output.suffix = "_fixed".to_string();

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml_str.contains("[rules]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[processing]"));
        assert!(toml_str.contains("[logging]"));
    }
}
