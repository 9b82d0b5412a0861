use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{Store, StoreError};

/// A store backed by the local filesystem.
///
/// Writes go to a hidden temporary sibling which is synced and then renamed
/// over the destination, so a crash never leaves a half-written file behind.
#[derive(Debug, Default, Copy, Clone)]
pub struct FileStore;

impl Store for FileStore {
    fn load(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        fs::read(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StoreError::NotFound,
            _ => err.into(),
        })
    }

    fn save(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(path);
        let written = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, path));
        if let Err(err) = written {
            // Best effort; the original error is what matters.
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }
}

/// `dir/name` -> `dir/.name.tmp<random>`. Vote IDs cannot start with `.`,
/// so this never collides with a real file.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let random: u32 = rand::random();
    path.with_file_name(format!(".{name}.tmp{random:08x}"))
}
