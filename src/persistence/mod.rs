//! The durable store the index writes through. Stores deal in raw bytes
//! keyed by path; JSON encoding of the index and vote files happens here.

use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] IoError),
}

impl StoreError {
    /// Attach the path this error occurred at.
    fn at(self, path: &Path) -> Error {
        let source = match self {
            Self::NotFound => IoError::from(ErrorKind::NotFound),
            Self::Io(err) => err,
        };
        Error::PersistenceUnavailable {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A key-value durable store.
pub trait Store: Send + Sync {
    /// Read the full contents at `path`, distinguishing absence from failure.
    fn load(&self, path: &Path) -> std::result::Result<Vec<u8>, StoreError>;

    /// Replace the contents at `path`. A reader must observe either the old or
    /// the new contents in full, even if the process dies mid-write.
    fn save(&self, path: &Path, bytes: &[u8]) -> std::result::Result<(), StoreError>;
}

/// Load and decode a JSON document. Returns `None` if nothing is stored at `path`.
pub fn load_json<S, T>(store: &S, path: &Path) -> Result<Option<T>>
where
    S: Store + ?Sized,
    T: DeserializeOwned,
{
    let bytes = match store.load(path) {
        Ok(bytes) => bytes,
        Err(StoreError::NotFound) => return Ok(None),
        Err(err) => return Err(err.at(path)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|err| malformed(path, err))
}

/// Encode and save a JSON document.
pub fn save_json<S, T>(store: &S, path: &Path, value: &T) -> Result<()>
where
    S: Store + ?Sized,
    T: Serialize,
{
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| malformed(path, err))?;
    store.save(path, &bytes).map_err(|err| err.at(path))
}

pub(crate) fn malformed(path: &Path, reason: impl ToString) -> Error {
    Error::MalformedPersistedState {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}
