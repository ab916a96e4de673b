//! Configuration loading for tenant connections.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `LIMINAL_`, producing a typed [`LiminalConfig`] whose connections are
//! defined as `LIMINAL_CONNECTION_<KEY>_<FIELD>`.

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::connection::{ConnectionError, ConnectionRegistry, RegistryError, TenantConnection};

const ENV_PREFIX: &str = "LIMINAL_";
const CONNECTION_PREFIX: &str = "CONNECTION_";

/// Configuration derived from `LIMINAL_*` environment variables.
#[derive(Debug, Clone)]
pub struct LiminalConfig {
    pub profile: String,
    pub log_level: String,
    pub log_format: String,
    pub connections: ConnectionRegistry,
}

impl Default for LiminalConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            connections: ConnectionRegistry::new(),
        }
    }
}

#[derive(Serialize)]
struct RedactedConfig<'a> {
    profile: &'a str,
    log_level: &'a str,
    log_format: &'a str,
    connections: Vec<serde_json::Value>,
}

impl LiminalConfig {
    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let connections = self
            .connections
            .iter()
            .map(TenantConnection::redacted_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        serde_json::to_string_pretty(&RedactedConfig {
            profile: &self.profile,
            log_level: &self.log_level,
            log_format: &self.log_format,
            connections,
        })
    }

    /// Validates the configuration values not checked while parsing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }
        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("environment variable {key} is not valid Unicode")]
    NonUnicodeEnv { key: String },
    #[error("invalid log format '{value}'; expected 'json' or 'pretty'")]
    InvalidLogFormat { value: String },
    #[error("invalid connection '{key}': {source}")]
    Connection {
        key: String,
        source: ConnectionError,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Loads configuration using layered `.env` files and `LIMINAL_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads configuration and builds every configured tenant connection.
    pub fn load(&self) -> Result<LiminalConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;
        layered.overlay_process_env()?;

        let mut settings = layered.settings;
        let profile = settings
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let log_level = settings
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = settings
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);

        let mut connections = ConnectionRegistry::new();
        for (key, fields) in layered.connections {
            let connection = TenantConnection::from_values(fields)
                .map_err(|source| ConfigError::Connection { key, source })?;
            connections.insert(connection)?;
        }

        let config = LiminalConfig {
            profile,
            log_level,
            log_format,
            connections,
        };
        config.validate()?;

        info!(
            profile = %config.profile,
            connections = config.connections.len(),
            "loaded tenant connection configuration"
        );
        Ok(config)
    }

    /// Merge `.env`, `.env.local`, then the profile-specific files; the profile
    /// comes from `LIMINAL_PROFILE` or the first two files.
    fn collect_layered_env(&self) -> Result<(LayeredEnv, String), ConfigError> {
        let mut layered = LayeredEnv::default();
        for name in [".env", ".env.local"] {
            self.merge_dotenv(self.base_dir.join(name), &mut layered)?;
        }

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| layered.settings.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        for name in [format!(".env.{profile}"), format!(".env.{profile}.local")] {
            self.merge_dotenv(self.base_dir.join(name), &mut layered)?;
        }

        Ok((layered, profile))
    }

    fn merge_dotenv(&self, path: PathBuf, layered: &mut LayeredEnv) -> Result<(), ConfigError> {
        let entries = match dotenvy::from_path_iter(&path) {
            Ok(entries) => entries,
            Err(dotenvy::Error::Io(ref io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(());
            }
            Err(source) => return Err(ConfigError::EnvFile { path, source }),
        };

        for entry in entries {
            let (key, value) = entry.map_err(|source| ConfigError::EnvFile {
                path: path.clone(),
                source,
            })?;
            layered.absorb(&key, value);
        }
        debug!(path = %path.display(), "merged environment file");
        Ok(())
    }
}

/// `LIMINAL_*` values merged so far, split into plain settings and
/// per-connection field maps keyed by the lowercased `<KEY>` segment.
#[derive(Debug, Default)]
struct LayeredEnv {
    settings: BTreeMap<String, String>,
    connections: BTreeMap<String, BTreeMap<String, String>>,
}

impl LayeredEnv {
    /// Record one variable; later calls override earlier ones per field.
    fn absorb(&mut self, key: &str, value: String) {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            return;
        };
        let Some(suffix) = name.strip_prefix(CONNECTION_PREFIX) else {
            self.settings.insert(name.to_string(), value);
            return;
        };
        match suffix.split_once('_') {
            Some((group, field)) if !group.is_empty() && !field.is_empty() => {
                self.connections
                    .entry(group.to_lowercase())
                    .or_default()
                    .insert(field.to_ascii_lowercase(), value);
            }
            _ => debug!(key = %key, "ignoring malformed connection variable"),
        }
    }

    /// Overlay the process environment last so it wins.
    ///
    /// Variables whose name is not Unicode cannot carry the prefix and are
    /// skipped; a prefixed variable with a non-Unicode value is an error.
    fn overlay_process_env(&mut self) -> Result<(), ConfigError> {
        for (key, value) in env::vars_os() {
            let Ok(key) = key.into_string() else {
                continue;
            };
            if !key.starts_with(ENV_PREFIX) {
                continue;
            }
            let value = value
                .into_string()
                .map_err(|_| ConfigError::NonUnicodeEnv { key: key.clone() })?;
            self.absorb(&key, value);
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
