//! Writer presence marker.
//!
//! A writer creates `~<prefix><suffix>` next to its files and holds an
//! exclusive advisory lock on it for its whole life. A marker that exists
//! but can be locked was left behind by a writer that did not shut down
//! cleanly.

use crate::error::{CoreError, CoreResult};
use crate::location::Location;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MARKER_TEXT: &[u8] = b"Lock blackbox";

/// Held by the active writer of a location.
#[derive(Debug)]
pub(crate) struct WriterMarker {
    path: PathBuf,
    file: File,
}

impl WriterMarker {
    /// Creates and locks the marker of `location`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriterActive`] if another writer holds it.
    pub(crate) fn acquire(location: &Location) -> CoreResult<Self> {
        let path = location.marker_path();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if FileExt::try_lock_exclusive(&file).is_err() {
            return Err(CoreError::WriterActive {
                path: path.display().to_string(),
            });
        }
        file.set_len(0)?;
        file.write_all(MARKER_TEXT)?;

        Ok(Self { path, file })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterMarker {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot remove writer marker");
        }
        let _ = FileExt::unlock(&self.file);
    }
}

/// True if a live writer holds the marker of `location`.
#[must_use]
pub fn writer_active(location: &Location) -> bool {
    let Ok(file) = File::open(location.marker_path()) else {
        return false;
    };
    match FileExt::try_lock_shared(&file) {
        Ok(()) => {
            let _ = FileExt::unlock(&file);
            false
        }
        Err(_) => true,
    }
}
