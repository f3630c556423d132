//! Configuration management.
//!
//! This module handles loading configuration from `gluegen.toml` files
//! and merging with command-line arguments.

use crate::error::{CliResult, ConfigError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "gluegen.toml";

/// Main configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output configuration.
    pub output: OutputConfig,

    /// Input configuration.
    pub input: InputConfig,

    /// Emission toggles.
    pub emit: EmitConfig,
}

/// Output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory for generated headers.
    pub dir: PathBuf,
}

/// Input configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Extension annotated sources are expected to carry. The module name
    /// is the filename minus this extension.
    pub extension: String,
}

/// Emission toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    /// Emit the command/variable registration glue.
    pub commands: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".build/include"),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extension: "c".to_string(),
        }
    }
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self { commands: true }
    }
}

/// Configuration manager for loading and merging configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// If the path is None, attempts to load from the default location.
    /// If no config file exists, returns default configuration.
    pub fn load(path: Option<&Path>) -> CliResult<Config> {
        let config_path = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::InvalidToml {
            path: config_path,
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref out_dir) = args.out_dir {
            config.output.dir = out_dir.clone();
        }
        config
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# gluegen configuration file

[output]
# Output directory for generated headers
dir = ".build/include"

[input]
# Extension annotated sources are expected to carry; the module name is
# the filename minus this extension
extension = "c"

[emit]
# Emit the command/variable registration glue (cmdinit.gen.h)
commands = true
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Output directory override.
    pub out_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output.dir, PathBuf::from(".build/include"));
        assert_eq!(config.input.extension, "c");
        assert!(config.emit.commands);
    }

    #[test]
    fn test_merge_cli_args_out_dir() {
        let config = Config::default();
        let args = CliArgs {
            out_dir: Some(PathBuf::from("./generated")),
        };

        let merged = ConfigManager::merge_cli_args(config, &args);
        assert_eq!(merged.output.dir, PathBuf::from("./generated"));
    }

    #[test]
    fn test_merge_cli_args_preserves_unset() {
        let config = Config::default();
        let merged = ConfigManager::merge_cli_args(config.clone(), &CliArgs::default());
        assert_eq!(merged.output.dir, config.output.dir);
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[output]
dir = "gen/include"

[input]
extension = "cc"

[emit]
commands = false
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("gen/include"));
        assert_eq!(config.input.extension, "cc");
        assert!(!config.emit.commands);
    }

    #[test]
    fn test_default_content_parses() {
        let config: Config = toml::from_str(ConfigManager::default_config_content()).unwrap();
        assert_eq!(config.output.dir, PathBuf::from(".build/include"));
    }
}
