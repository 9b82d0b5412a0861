use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// Where the log4rs configuration is read from unless configured otherwise.
pub const DEFAULT_LOG_CONFIG: &str = "log4rs.yaml";

/// Set up the global logger from a log4rs YAML file.
/// Can only succeed once per process.
pub fn init(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    log4rs::init_file(path, log4rs_dynamic_filters::default_deserializers())
        .map_err(|err| Error::Logging(format!("{}: {err}", path.display())))?;
    info!("Initialised logging from {}", path.display());
    Ok(())
}
