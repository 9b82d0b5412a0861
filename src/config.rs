use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::{error::Result, logging::DEFAULT_LOG_CONFIG};

/// File the configuration is read from, relative to the working directory.
pub const CONFIG_FILE: &str = "BallotIndex.toml";

/// Prefix of environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "BALLOT_INDEX_";

/// Application configuration, derived from `BallotIndex.toml` and
/// `BALLOT_INDEX_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    index_path: PathBuf,
    #[serde(default = "default_log_config")]
    log_config: PathBuf,
}

fn default_log_config() -> PathBuf {
    DEFAULT_LOG_CONFIG.into()
}

impl Config {
    /// The default configuration sources: the config file, then the environment.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration from the default sources.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    /// Location of the vote index file. Vote files live in a `votes`
    /// directory beside it.
    /// Configured via `INDEX_PATH`.
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Location of the log4rs configuration file.
    /// Configured via `LOG_CONFIG`.
    pub fn log_config(&self) -> &Path {
        &self.log_config
    }
}
