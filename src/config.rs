//! Configuration system for aura-keygen.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `AURA_CREDENTIALS_PATH` - Path to the service account key file
//! - `AURA_FIRESTORE_BASE_URL` - Firestore REST endpoint
//! - `AURA_FIRESTORE_DATABASE` - Firestore database ID
//! - `AURA_FIRESTORE_COLLECTION` - Collection that receives the keys
//! - `FIRESTORE_EMULATOR_HOST` - Talk to a local emulator without auth
//! - `AURA_NUM_KEYS` - Number of keys to generate
//! - `AURA_KEY_PREFIX` - Key prefix
//! - `AURA_WRITE_MODE` - `create` or `upsert`
//! - `AURA_MAX_COLLISION_ATTEMPTS` - Regeneration attempts per key on ID collision
//! - `AURA_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use std::env;
use std::path::{Path, PathBuf};

use config::Config;
use serde::Deserialize;

use crate::errors::{KeygenError, KeygenResult};

/// Default location of the service account key, relative to the working directory.
pub const DEFAULT_CREDENTIALS_PATH: &str = "aura-opt-admin-firebase-adminsdk.json";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub credentials: CredentialsConfig,
    pub firestore: FirestoreConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Where to find the service account key.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
        }
    }
}

/// Firestore endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FirestoreConfig {
    /// Base URL of the Firestore REST API
    pub base_url: String,
    /// Database ID, `(default)` for the project's default database
    pub database: String,
    /// Collection receiving one document per key
    pub collection: String,
    /// `host:port` of a Firestore emulator; disables authentication when set
    pub emulator_host: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com".to_string(),
            database: "(default)".to_string(),
            collection: "license_keys".to_string(),
            emulator_host: None,
            request_timeout_secs: 30,
        }
    }
}

/// How each key document is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Create-if-absent; an existing ID is reported as a collision.
    #[default]
    Create,
    /// Overwrite whatever document already has the ID.
    Upsert,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteMode::Create => write!(f, "create"),
            WriteMode::Upsert => write!(f, "upsert"),
        }
    }
}

/// Upload loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Number of keys generated per run
    pub num_keys: usize,
    /// Prefix for generated keys ("AURA" -> "AURA-XXXXX-XXXXX-XXXXX")
    pub key_prefix: String,
    pub write_mode: WriteMode,
    /// Attempts per key before a collision is reported (create mode only)
    pub max_collision_attempts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            num_keys: 10,
            key_prefix: "AURA".to_string(),
            write_mode: WriteMode::Create,
            max_collision_attempts: 3,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn config_error(e: config::ConfigError) -> KeygenError {
    KeygenError::ConfigError(e.to_string())
}

/// Reads an integer override. Unset means no override; a value that does not
/// parse is an error rather than a silent fallback to the file or default.
fn env_parsed<T>(name: &str) -> KeygenResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(v) => v.trim().parse::<T>().map(Some).map_err(|e| {
            KeygenError::ConfigError(format!("{name} must be an integer, got '{v}': {e}"))
        }),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from `config.toml` (optional) and the environment.
    pub fn load() -> KeygenResult<Self> {
        Self::load_from("config")
    }

    /// Load configuration from the given file stem (optional) and the environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. The config file, if present
    /// 3. Environment variables
    pub fn load_from(file: impl AsRef<Path>) -> KeygenResult<Self> {
        let file = file.as_ref().to_string_lossy().into_owned();
        let defaults = AppConfig::default();

        let builder = Config::builder()
            .set_default(
                "credentials.path",
                defaults.credentials.path.to_string_lossy().into_owned(),
            )
            .map_err(config_error)?
            .set_default("firestore.base_url", defaults.firestore.base_url)
            .map_err(config_error)?
            .set_default("firestore.database", defaults.firestore.database)
            .map_err(config_error)?
            .set_default("firestore.collection", defaults.firestore.collection)
            .map_err(config_error)?
            .set_default(
                "firestore.request_timeout_secs",
                defaults.firestore.request_timeout_secs as i64,
            )
            .map_err(config_error)?
            .set_default("upload.num_keys", defaults.upload.num_keys as i64)
            .map_err(config_error)?
            .set_default("upload.key_prefix", defaults.upload.key_prefix)
            .map_err(config_error)?
            .set_default("upload.write_mode", defaults.upload.write_mode.to_string())
            .map_err(config_error)?
            .set_default(
                "upload.max_collision_attempts",
                defaults.upload.max_collision_attempts as i64,
            )
            .map_err(config_error)?
            .set_default("logging.level", defaults.logging.level)
            .map_err(config_error)?
            // Load from config file (optional)
            .add_source(config::File::with_name(&file).required(false))
            // Override with environment variables
            .set_override_option("credentials.path", env::var("AURA_CREDENTIALS_PATH").ok())
            .map_err(config_error)?
            .set_override_option(
                "firestore.base_url",
                env::var("AURA_FIRESTORE_BASE_URL").ok(),
            )
            .map_err(config_error)?
            .set_override_option(
                "firestore.database",
                env::var("AURA_FIRESTORE_DATABASE").ok(),
            )
            .map_err(config_error)?
            .set_override_option(
                "firestore.collection",
                env::var("AURA_FIRESTORE_COLLECTION").ok(),
            )
            .map_err(config_error)?
            .set_override_option(
                "firestore.emulator_host",
                env::var("FIRESTORE_EMULATOR_HOST")
                    .ok()
                    .filter(|host| !host.is_empty()),
            )
            .map_err(config_error)?
            .set_override_option("upload.num_keys", env_parsed::<i64>("AURA_NUM_KEYS")?)
            .map_err(config_error)?
            .set_override_option("upload.key_prefix", env::var("AURA_KEY_PREFIX").ok())
            .map_err(config_error)?
            .set_override_option("upload.write_mode", env::var("AURA_WRITE_MODE").ok())
            .map_err(config_error)?
            .set_override_option(
                "upload.max_collision_attempts",
                env_parsed::<i64>("AURA_MAX_COLLISION_ATTEMPTS")?,
            )
            .map_err(config_error)?
            .set_override_option("logging.level", env::var("AURA_LOG_LEVEL").ok())
            .map_err(config_error)?;

        let settings = builder
            .build()
            .map_err(|e| KeygenError::ConfigError(format!("failed to build config: {e}")))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| KeygenError::ConfigError(format!("failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> KeygenResult<()> {
        if self.credentials.path.as_os_str().is_empty() {
            return Err(KeygenError::ConfigError(
                "credentials.path cannot be empty".to_string(),
            ));
        }

        if self.firestore.collection.is_empty() || self.firestore.collection.contains('/') {
            return Err(KeygenError::ConfigError(format!(
                "firestore.collection must be a single non-empty segment, got '{}'",
                self.firestore.collection
            )));
        }
        if self.firestore.database.is_empty() {
            return Err(KeygenError::ConfigError(
                "firestore.database cannot be empty".to_string(),
            ));
        }
        if self.firestore.request_timeout_secs == 0 {
            return Err(KeygenError::ConfigError(
                "firestore.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let prefix = &self.upload.key_prefix;
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(KeygenError::ConfigError(format!(
                "upload.key_prefix must be non-empty uppercase alphanumeric, got '{prefix}'"
            )));
        }
        if self.upload.max_collision_attempts == 0 {
            return Err(KeygenError::ConfigError(
                "upload.max_collision_attempts must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(KeygenError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_write_ten_aura_keys() {
        let config = AppConfig::default();
        assert_eq!(config.firestore.collection, "license_keys");
        assert_eq!(config.upload.num_keys, 10);
        assert_eq!(config.upload.key_prefix, "AURA");
        assert_eq!(config.upload.write_mode, WriteMode::Create);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_lowercase_prefix() {
        let mut config = AppConfig::default();
        config.upload.key_prefix = "aura".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nested_collection() {
        let mut config = AppConfig::default();
        config.firestore.collection = "keys/nested".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_collision_attempts() {
        let mut config = AppConfig::default();
        config.upload.max_collision_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn write_mode_deserializes_lowercase() {
        let mode: WriteMode = serde_json::from_str("\"upsert\"").unwrap();
        assert_eq!(mode, WriteMode::Upsert);
        assert_eq!(WriteMode::Create.to_string(), "create");
    }
}
