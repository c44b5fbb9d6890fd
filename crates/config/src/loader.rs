//! Configuration loader for storegate
//!
//! Resolves the configuration file, applies environment overrides and
//! validates the result, recording where each layer came from.

use crate::config::GatewayConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use storegate_core::{
    constants::{
        STOREGATE_BASE_URL_VAR, STOREGATE_CONFIG_VAR, STOREGATE_MAX_RETRIES_VAR,
        STOREGATE_STATE_DIR_VAR, STOREGATE_TIMEOUT_MS_VAR, STATE_FILENAME,
    },
    Error, Result, ResultExt,
};
use storegate_utils::XdgPaths;
use tracing::debug;

/// Where the effective configuration came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSource {
    /// Configuration file that was read, if any
    pub file: Option<PathBuf>,
    /// Environment variables that overrode file or default values
    pub env_overrides: Vec<&'static str>,
}

/// A validated configuration together with its provenance
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: GatewayConfig,
    pub source: ConfigSource,
}

/// Configuration loader that layers defaults, file and environment
pub struct ConfigLoader {
    /// Explicit configuration file; must exist when set
    file: Option<PathBuf>,
    /// Whether `STOREGATE_*` variables are consulted
    use_env: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            file: None,
            use_env: true,
        }
    }

    /// Read this file instead of the default location
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Ignore environment variables
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load and validate the configuration
    pub fn load(self) -> Result<LoadedConfig> {
        let mut source = ConfigSource::default();

        let (path, required) = self.resolve_file();
        let mut config = match read_file(&path, required)? {
            Some(config) => {
                source.file = Some(path);
                config
            }
            None => GatewayConfig::default(),
        };

        if self.use_env {
            source.env_overrides = apply_env(&mut config)?;
        }

        config.validate()?;
        debug!(
            file = ?source.file,
            env_overrides = ?source.env_overrides,
            "configuration_loaded"
        );

        Ok(LoadedConfig { config, source })
    }

    /// The file to read and whether its absence is an error
    fn resolve_file(&self) -> (PathBuf, bool) {
        if let Some(path) = &self.file {
            return (path.clone(), true);
        }
        if self.use_env {
            if let Some(path) = env_string(STOREGATE_CONFIG_VAR) {
                return (PathBuf::from(path), true);
            }
        }
        (XdgPaths::config_file(), false)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path, required: bool) -> Result<Option<GatewayConfig>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => return Ok(None),
        Err(e) => return Err(Error::storage(path.display().to_string(), "read config", e)),
    };

    let config = serde_json::from_str(&content)
        .with_context(|| format!("invalid configuration file {}", path.display()))?;
    Ok(Some(config))
}

fn apply_env(config: &mut GatewayConfig) -> Result<Vec<&'static str>> {
    let mut applied = Vec::new();

    if let Some(url) = env_string(STOREGATE_BASE_URL_VAR) {
        config.request.base_url = url;
        applied.push(STOREGATE_BASE_URL_VAR);
    }
    if let Some(timeout) = env_parsed::<u64>(STOREGATE_TIMEOUT_MS_VAR)? {
        config.request.timeout_ms = timeout;
        applied.push(STOREGATE_TIMEOUT_MS_VAR);
    }
    if let Some(retries) = env_parsed::<u32>(STOREGATE_MAX_RETRIES_VAR)? {
        config.request.max_retries = retries;
        applied.push(STOREGATE_MAX_RETRIES_VAR);
    }
    if let Some(dir) = env_string(STOREGATE_STATE_DIR_VAR) {
        config.storage.path = Some(PathBuf::from(dir).join(STATE_FILENAME));
        applied.push(STOREGATE_STATE_DIR_VAR);
    }

    Ok(applied)
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(name) {
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            Error::configuration(format!("{name} has invalid value '{raw}': {e}"))
        }),
        None => Ok(None),
    }
}
