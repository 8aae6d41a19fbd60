//! Configuration loading and config file resolution
//!
//! Every key is optional: a missing file, section or key falls back to the
//! compiled defaults, so the core always runs with a usable configuration.

use crate::schema::ParameterId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CATCHTREE_CONFIG";

/// Batch model compiler settings (`[compiler]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Maximum tree depth, counted in edges from the catch root
    pub max_depth: usize,
    /// Smallest value count for a qualitative parameter to branch
    pub min_branching_values: usize,
    /// Largest value count for a qualitative parameter to branch
    pub max_branching_values: usize,
    /// Qualitative parameters that never branch (e.g. child gear)
    pub excluded_parameter_ids: Vec<ParameterId>,
    /// Label of a synthesized catch root
    pub catch_batch_label: String,
    /// Label prefix of the first level of sorting batches
    pub sorting_batch_prefix: String,
    /// Display name of the catch root when the data gives none
    pub catch_batch_name: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_branching_values: 2,
            max_branching_values: 3,
            excluded_parameter_ids: Vec::new(),
            catch_batch_label: "CATCH_BATCH".to_string(),
            sorting_batch_prefix: "SORTING_BATCH#".to_string(),
            catch_batch_name: "Catch".to_string(),
        }
    }
}

impl CompilerConfig {
    /// Default settings with another maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    /// Check the settings are consistent
    pub fn validate(&self) -> Result<()> {
        if self.min_branching_values == 0 {
            return Err(Error::Config(
                "compiler.min_branching_values must be at least 1".to_string(),
            ));
        }
        if self.min_branching_values > self.max_branching_values {
            return Err(Error::Config(format!(
                "compiler.min_branching_values ({}) exceeds compiler.max_branching_values ({})",
                self.min_branching_values, self.max_branching_values
            )));
        }
        Ok(())
    }
}

/// Logging settings (`[logging]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter level (overridden by `RUST_LOG`)
    pub level: String,
    /// Dump every compiled batch model tree at debug level
    pub log_tree: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_tree: false,
        }
    }
}

/// Whole TOML config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub compiler: CompilerConfig,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.compiler.validate()?;
        Ok(config)
    }
}

/// Load and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    TomlConfig::from_toml_str(&content)
}

/// Config file resolution following this priority order:
/// 1. Explicit path (command-line argument, highest priority)
/// 2. `CATCHTREE_CONFIG` environment variable
/// 3. Per-user config file (`<config_dir>/catchtree/config.toml`)
/// 4. Compiled defaults (fallback)
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Config file to read, if any tier names one
    ///
    /// Explicit and environment paths are returned even if the file does not
    /// exist, so [`ConfigResolver::load`] can warn about them. The per-user
    /// file is only returned when present.
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: Per-user config file
        default_config_path().filter(|p| p.exists())
    }

    /// Load the resolved config
    ///
    /// A config file that cannot be found logs a warning and yields the
    /// compiled defaults. A file that exists but is malformed or inconsistent
    /// is an error.
    pub fn load(&self) -> Result<TomlConfig> {
        let Some(path) = self.resolve() else {
            info!("No config file found, using compiled defaults");
            return Ok(TomlConfig::default());
        };

        if !path.exists() {
            warn!("Config file {} not found, using compiled defaults", path.display());
            return Ok(TomlConfig::default());
        }

        let config = load_toml_config(&path)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Platform config file location (`~/.config/catchtree/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catchtree").join("config.toml"))
}
