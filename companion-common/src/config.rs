//! Bootstrap configuration and root folder resolution
//!
//! Configuration comes from a TOML file. Every section is optional; a missing
//! file or section falls back to built-in defaults so that the service can
//! start with zero configuration.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `COMPANION_ROOT_FOLDER`
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "COMPANION_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for models and the reference database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub analyze: AnalyzeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Location of the four model resources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding the model files (default: `<root_folder>/nlp`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Message bus sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Undelivered messages buffered per address
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,

    /// Buffered service events for SSE subscribers
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// HTTP gateway binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport-boundary timeout for bus requests made through the gateway
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Reference store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map; only this process can write entries
    Memory,
    /// SQLite database shared by every process on the host
    #[default]
    Sqlite,
}

/// Reference store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite file (default: `<root_folder>/companion.db`)
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Serialize fetch/process/persist per reference identifier
    #[serde(default = "default_true")]
    pub serialize_per_reference: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database: None,
            serialize_per_reference: true,
        }
    }
}

/// How `nlp.analyze` interprets a text payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeMode {
    /// Payload is the text to analyze; reply is the analyzed text
    #[default]
    Inline,
    /// Payload is a reference identifier; reply echoes the identifier
    Reference,
}

impl std::str::FromStr for AnalyzeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inline" => Ok(AnalyzeMode::Inline),
            "reference" => Ok(AnalyzeMode::Reference),
            other => Err(Error::Config(format!("Unknown analyze mode: {}", other))),
        }
    }
}

/// Analyze topic configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeConfig {
    #[serde(default)]
    pub mode: AnalyzeMode,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bus_capacity() -> usize {
    256
}

fn default_event_capacity() -> usize {
    100
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl TomlConfig {
    /// Reject settings the service cannot run with
    ///
    /// Reference mode needs a store other processes can write into, so it
    /// cannot be the default mode over the in-process backend.
    pub fn validate(&self) -> Result<()> {
        if self.analyze.mode == AnalyzeMode::Reference && self.store.backend == StoreBackend::Memory {
            return Err(Error::Config(
                "analyze mode \"reference\" requires store backend \"sqlite\"".to_string(),
            ));
        }
        Ok(())
    }

    /// Model directory, falling back to `<root_folder>/nlp`
    pub fn models_dir(&self, root_folder: &Path) -> PathBuf {
        self.models
            .dir
            .clone()
            .unwrap_or_else(|| root_folder.join("nlp"))
    }

    /// Reference database path, falling back to `<root_folder>/companion.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        self.store
            .database
            .clone()
            .unwrap_or_else(|| root_folder.join("companion.db"))
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load the config file if present, otherwise built-in defaults
///
/// A missing file is not an error. A file that exists but does not parse is.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => Ok(TomlConfig::default()),
    }
}

/// Default per-module config file: `<config_dir>/companion/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("companion").join(format!("{}.toml", module_name)))
}

/// Resolves the root folder following the priority order in the module docs
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        default_root_folder()
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("companion"))
        .unwrap_or_else(|| PathBuf::from("./companion_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.bus.capacity, 256);
        assert_eq!(config.http.port, 5790);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.store.serialize_per_reference);
        assert_eq!(config.analyze.mode, AnalyzeMode::Inline);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reference_mode_requires_shared_store() {
        let config: TomlConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"

            [analyze]
            mode = "reference"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(msg)) if msg.contains("sqlite")));

        let config: TomlConfig = toml::from_str(
            r#"
            [analyze]
            mode = "reference"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(config.validate().is_ok());

        let config: TomlConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            root_folder = "/srv/companion"

            [store]
            backend = "sqlite"
            serialize_per_reference = false

            [analyze]
            mode = "reference"

            [http]
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/companion")));
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert!(!config.store.serialize_per_reference);
        assert_eq!(config.analyze.mode, AnalyzeMode::Reference);
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.host, "127.0.0.1");
    }

    #[test]
    fn test_derived_paths_fall_back_to_root_folder() {
        let config = TomlConfig::default();
        let root = Path::new("/data");
        assert_eq!(config.models_dir(root), PathBuf::from("/data/nlp"));
        assert_eq!(config.database_path(root), PathBuf::from("/data/companion.db"));
    }

    #[test]
    fn test_analyze_mode_from_str() {
        assert_eq!("inline".parse::<AnalyzeMode>().unwrap(), AnalyzeMode::Inline);
        assert_eq!("reference".parse::<AnalyzeMode>().unwrap(), AnalyzeMode::Reference);
        assert!(matches!("batch".parse::<AnalyzeMode>(), Err(Error::Config(_))));
    }
}
