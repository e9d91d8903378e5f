//! Supervisor configuration with TOML support
//!
//! Settings that apply to every node managed by one supervisor installation:
//! - where node directories live
//! - which server binaries to launch for each product
//! - how verbose logging should be
//!
//! Values load from a TOML file, then environment overrides are applied, then
//! the result is validated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DevbaoError, DevbaoResult};
use crate::node::Product;

/// Relative location of node directories beneath a home directory.
pub const DEFAULT_NODES_SUBDIR: &str = ".local/share/devbao/nodes";

/// Complete configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DevbaoConfig {
    /// Directory holding one subdirectory per node. Empty until resolved.
    pub base_dir: PathBuf,

    /// Server binaries per product
    pub binaries: BinaryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server binary names or paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BinaryConfig {
    /// OpenBao binary
    pub bao: String,

    /// HashiCorp Vault binary
    pub vault: String,

    /// Binary used for nodes without an explicit product
    pub default: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (full, compact, pretty)
    pub format: String,
}

impl Default for BinaryConfig {
    fn default() -> Self {
        Self {
            bao: "bao".to_string(),
            vault: "vault".to_string(),
            default: "bao".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

impl BinaryConfig {
    pub fn binary_for(&self, product: Product) -> &str {
        match product {
            Product::Default => &self.default,
            Product::Bao => &self.bao,
            Product::Vault => &self.vault,
        }
    }
}

impl DevbaoConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> DevbaoResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DevbaoError::io("read config file", path, e))?;

        let mut config: DevbaoConfig = toml::from_str(&contents)
            .map_err(|e| DevbaoError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DEVBAO_BASE_DIR") {
            self.base_dir = PathBuf::from(dir);
        }
        if let Ok(level) = std::env::var("DEVBAO_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(binary) = std::env::var("DEVBAO_BAO_BINARY") {
            self.binaries.bao = binary;
        }
        if let Ok(binary) = std::env::var("DEVBAO_VAULT_BINARY") {
            self.binaries.vault = binary;
        }
    }

    /// Fill `base_dir` from a home directory when no value was configured.
    pub fn resolve_base_dir(&mut self, home: &Path) {
        if self.base_dir.as_os_str().is_empty() {
            self.base_dir = home.join(DEFAULT_NODES_SUBDIR);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> DevbaoResult<()> {
        for (product, binary) in [
            ("bao", &self.binaries.bao),
            ("vault", &self.binaries.vault),
            ("default", &self.binaries.default),
        ] {
            if binary.trim().is_empty() {
                return Err(DevbaoError::ConfigError(format!(
                    "Binary for {} servers cannot be empty",
                    product
                )));
            }
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(DevbaoError::ConfigError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "full" | "compact" | "pretty" => {}
            _ => {
                return Err(DevbaoError::ConfigError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: DevbaoConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = dir.into();
        self
    }

    pub fn bao_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.binaries.bao = binary.into();
        self
    }

    pub fn vault_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.binaries.vault = binary.into();
        self
    }

    pub fn default_binary(mut self, binary: impl Into<String>) -> Self {
        self.config.binaries.default = binary.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> DevbaoResult<DevbaoConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = DevbaoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.binaries.binary_for(Product::Default), "bao");
        assert_eq!(config.binaries.binary_for(Product::Vault), "vault");
    }

    #[test]
    fn test_from_file_partial_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("devbao.toml");
        std::fs::write(
            &path,
            r#"
base_dir = "/srv/devbao"

[binaries]
vault = "/opt/vault/bin/vault"
"#,
        )
        .unwrap();

        let config = DevbaoConfig::from_file(&path).unwrap();
        // DEVBAO_BASE_DIR may be set in the environment running the tests
        if std::env::var("DEVBAO_BASE_DIR").is_err() {
            assert_eq!(config.base_dir, PathBuf::from("/srv/devbao"));
        }
        assert_eq!(config.binaries.bao, "bao");
        assert_eq!(config.binaries.binary_for(Product::Default), "bao");
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = ConfigBuilder::new().log_level("verbose").build();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_empty_binary_rejected() {
        let result = ConfigBuilder::new().vault_binary(" ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_base_dir_only_when_unset() {
        let mut config = DevbaoConfig::default();
        config.resolve_base_dir(Path::new("/home/user"));
        assert_eq!(
            config.base_dir,
            PathBuf::from("/home/user/.local/share/devbao/nodes")
        );

        let mut config = ConfigBuilder::new().base_dir("/data").build().unwrap();
        config.resolve_base_dir(Path::new("/home/user"));
        assert_eq!(config.base_dir, PathBuf::from("/data"));
    }
}
