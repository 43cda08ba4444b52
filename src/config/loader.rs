//! Configuration Loader
//!
//! Environment-aware layered loading. Later sources win:
//!
//! 1. embedded defaults (`config/event-bridge.toml`, compiled in)
//! 2. `<config dir>/event-bridge.toml` (optional)
//! 3. `<config dir>/event-bridge.<environment>.toml` (optional)
//! 4. `TASKER_BRIDGE_*` environment variables, `__` between nesting levels
//!    (`TASKER_BRIDGE_CONSUMER__GROUP_ID=orders`)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, Environment, File, FileFormat};
use serde_json::Value;
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::BridgeConfig;
use crate::constants::{CONFIG_FILE_STEM, ENV_PREFIX};

/// Embedded default configuration
pub const DEFAULT_CONFIG: &str = include_str!("../../config/event-bridge.toml");

/// Keys whose values are masked in [`ConfigManager::debug_config`]
const SENSITIVE_KEY_MARKERS: [&str; 5] = ["password", "secret", "token", "sasl", "credential"];

/// Loaded, validated bridge configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: BridgeConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = crate::logging::get_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading event bridge configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build(&config_directory, environment)?;
        config.validate()?;

        let manager = ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        };
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&manager.debug_config())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(manager))
    }

    fn build(config_directory: &Path, environment: &str) -> ConfigResult<BridgeConfig> {
        let base = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let overlay = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        let merged = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(base).required(false))
            .add_source(File::from(overlay).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::environment(environment, e))?;

        merged
            .try_deserialize::<BridgeConfig>()
            .map_err(ConfigurationError::from)
    }

    fn default_config_directory() -> PathBuf {
        std::env::var("TASKER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credential-like fields masked
    pub fn debug_config(&self) -> Value {
        let mut value = serde_json::to_value(&self.config).unwrap_or(Value::Null);
        mask_sensitive(&mut value);
        value
    }
}

fn mask_sensitive(value: &mut Value) {
    match value {
        Value::Object(fields) => {
            for (key, field) in fields.iter_mut() {
                let lowered = key.to_ascii_lowercase();
                if SENSITIVE_KEY_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                    *field = Value::String("***REDACTED***".to_string());
                } else {
                    mask_sensitive(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_sensitive),
        _ => {}
    }
}
