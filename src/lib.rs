#[cfg(test)]
#[macro_use]
extern crate index_test;

use log::info;

pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod pseudonym;

pub use config::Config;
pub use error::{Error, Result};
pub use index::VoteIndex;

/// Initialise logging and load the vote index named by `config`.
/// Call `VoteIndex::flush` on shutdown.
pub fn start(config: &Config) -> Result<VoteIndex> {
    logging::init(config.log_config())?;
    info!("Loading vote index from {}", config.index_path().display());
    let index = VoteIndex::open(config)?;
    info!("...vote index online!");
    Ok(index)
}
