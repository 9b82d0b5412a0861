use std::collections::HashMap;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Store, StoreError};

/// A store that keeps everything in process memory. It can be switched
/// offline to simulate an unavailable backend.
#[derive(Debug)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            files: Mutex::default(),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    /// Make every subsequent load and save succeed or fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(IoError::new(ErrorKind::Other, "memory store is offline").into())
        }
    }
}

impl Store for MemoryStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        self.check_available()?;
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(path).cloned().ok_or(StoreError::NotFound)
    }

    fn save(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_available()?;
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}
