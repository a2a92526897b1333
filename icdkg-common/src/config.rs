//! Configuration loading and config file resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`ICDKG_*`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing or malformed TOML file never aborts startup: the problem is
//! logged and compiled defaults are used instead.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "ICDKG_CONFIG";
pub const ENV_PORT: &str = "ICDKG_PORT";
pub const ENV_TAXONOMY_PATH: &str = "ICDKG_TAXONOMY_PATH";
pub const ENV_SYNONYMS_PATH: &str = "ICDKG_SYNONYMS_PATH";
pub const ENV_NARRATIVE_API_KEY: &str = "ICDKG_NARRATIVE_API_KEY";

/// Bootstrap configuration loaded from TOML
///
/// Every field has a compiled default, so an empty file (or no file at all)
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Taxonomy source (plain hierarchy or prediction snapshot envelope)
    pub taxonomy_path: PathBuf,

    /// Synonym/alias mapping source
    pub synonyms_path: PathBuf,

    /// Where the latest prediction snapshot is written (disabled if absent)
    pub snapshot_path: Option<PathBuf>,

    /// SQLite case store (disabled if absent)
    pub database_path: Option<PathBuf>,

    /// HTTP bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    pub logging: LoggingConfig,
    pub prediction: PredictionConfig,
    pub preprocessing: PreprocessingConfig,
    pub narrative: NarrativeConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            taxonomy_path: PathBuf::from("data/icd_hierarchy.json"),
            synonyms_path: PathBuf::from("data/umls_mappings.json"),
            snapshot_path: None,
            database_path: None,
            host: "127.0.0.1".to_string(),
            port: 5780,
            logging: LoggingConfig::default(),
            prediction: PredictionConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            narrative: NarrativeConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Candidate generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub top_k: usize,
    pub threshold: f64,
    pub model: String,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            threshold: 0.5,
            model: "CAML".to_string(),
        }
    }
}

/// Case text preprocessing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub max_text_length: usize,
    pub remove_stopwords: bool,
    pub keep_numbers: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            max_text_length: 512,
            remove_stopwords: true,
            keep_numbers: true,
        }
    }
}

/// Narrative generator (chat-completion service) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// "none", "openai", "anthropic" or "local"
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl TomlConfig {
    /// Apply `ICDKG_*` environment overrides on top of file values
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = env_value::<u16>(ENV_PORT) {
            self.port = port;
        }
        if let Some(path) = env_value::<PathBuf>(ENV_TAXONOMY_PATH) {
            self.taxonomy_path = path;
        }
        if let Some(path) = env_value::<PathBuf>(ENV_SYNONYMS_PATH) {
            self.synonyms_path = path;
        }
        if let Ok(key) = std::env::var(ENV_NARRATIVE_API_KEY) {
            if !key.trim().is_empty() {
                self.narrative.api_key = Some(key);
            }
        }
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable value for {}: {:?}", name, raw);
            None
        }
    }
}

/// Config file resolution
///
/// Priority order:
/// 1. Command-line `--config` path
/// 2. `ICDKG_CONFIG` environment variable
/// 3. `<user config dir>/icdkg/config.toml`
/// 4. `/etc/icdkg/config.toml` (Linux only)
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file to use, if any
    pub fn config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        let user_config = dirs::config_dir().map(|d| d.join("icdkg").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/icdkg/config.toml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Resolve the effective configuration (file + environment)
    ///
    /// Never fails; problems fall back to compiled defaults.
    pub fn resolve(&self) -> TomlConfig {
        let mut config = match self.config_file() {
            Some(path) => match load_toml_config(&path) {
                Ok(config) => {
                    info!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{}; using compiled defaults", e);
                    TomlConfig::default()
                }
            },
            None => {
                info!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        config
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, 5780);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.prediction.top_k, 10);
        assert_eq!(config.prediction.threshold, 0.5);
        assert_eq!(config.narrative.provider, "none");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 6000

            [narrative]
            provider = "local"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.narrative.provider, "local");
        assert_eq!(config.narrative.timeout_secs, 30);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.taxonomy_path, PathBuf::from("data/icd_hierarchy.json"));
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }
}
