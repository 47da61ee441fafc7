use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::{config::GraftConfig, errors::ConfigError};

/// Environment prefix read by default, `GRAFT_NAMING__ACCESSOR_PREFIX=get_`
pub const DEFAULT_ENV_PREFIX: &str = "GRAFT_";

/// A provider layering all config sources.
///
/// Sources are merged in this order, later sources override earlier ones:
/// 1. Defaults from [`GraftConfig::default`]
/// 2. The TOML file, if one was given
/// 3. Environment variables with the prefix, `__` separating nested keys
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    file: Option<PathBuf>,
    require_file: bool,
    env_prefix: String,
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider {
    /// Provider reading defaults and the environment only
    pub fn new() -> Self {
        Self {
            file: None,
            require_file: false,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Reads the given TOML file if it exists
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.require_file = false;
        self
    }

    /// Reads the given TOML file, failing if it does not exist
    pub fn with_required_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.require_file = true;
        self
    }

    /// Changes the environment prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Builds the layered figment without extracting it
    pub fn figment(&self) -> Result<Figment, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(GraftConfig::default()));

        if let Some(path) = &self.file {
            if path.exists() {
                tracing::debug!("Reading graft config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            } else if self.require_file {
                return Err(ConfigError::FileMissing(path.clone()));
            } else {
                tracing::debug!("Config file {} not found, using defaults", path.display());
            }
        }

        Ok(figment.merge(Env::prefixed(&self.env_prefix).split("__")))
    }

    /// Extracts and validates the config
    pub fn load(&self) -> Result<GraftConfig, ConfigError> {
        let config: GraftConfig = self.figment()?.extract()?;
        config.validate()?;
        Ok(config)
    }
}
