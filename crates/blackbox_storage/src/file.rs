//! Region-locked file handle.

use crate::error::StorageResult;
use crate::lock::{self, LockKind};
use crate::section::Section;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// How a [`RegionFile`] is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read only; allows shared sections.
    Read,
    /// Read and write; allows shared and exclusive sections.
    ReadWrite,
}

/// A file accessed through byte-range locked sections.
///
/// # Locking
///
/// - [`shared`](Self::shared) and [`exclusive`](Self::exclusive) block
///   until the range is granted and return a guard
/// - the `try_` variants never block
/// - [`hold`](Self::hold) takes a lock that lives as long as the handle,
///   used to mark a file as in use
///
/// # Example
///
/// ```no_run
/// use blackbox_storage::{AccessMode, LockKind, RegionFile};
/// use std::path::Path;
///
/// let file = RegionFile::open(Path::new("box.bin"), AccessMode::Read).unwrap();
/// file.hold(LockKind::Shared, 3 << 30, 1024).unwrap();
/// println!("{} bytes", file.len().unwrap());
/// ```
#[derive(Debug)]
pub struct RegionFile {
    path: PathBuf,
    file: File,
    mode: AccessMode,
}

impl RegionFile {
    /// Opens an existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened in the requested mode.
    pub fn open(path: &Path, mode: AccessMode) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(mode == AccessMode::ReadWrite)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            mode,
        })
    }

    /// Creates a file that must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an `AlreadyExists` I/O error if the path is taken.
    pub fn create_new(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            mode: AccessMode::ReadWrite,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the mode the file was opened with.
    #[must_use]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Current size of the file in bytes.
    pub fn len(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns true if the file has no bytes.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Flushes written data to disk.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Locks `[offset, offset + len)` for reading, waiting if needed.
    pub fn shared(&self, offset: u64, len: u64) -> StorageResult<Section<'_>> {
        self.section(LockKind::Shared, offset, len)
    }

    /// Locks `[offset, offset + len)` for writing, waiting if needed.
    pub fn exclusive(&self, offset: u64, len: u64) -> StorageResult<Section<'_>> {
        self.section(LockKind::Exclusive, offset, len)
    }

    /// Locks a range for reading unless someone holds it exclusively.
    pub fn try_shared(&self, offset: u64, len: u64) -> StorageResult<Option<Section<'_>>> {
        self.try_section(LockKind::Shared, offset, len)
    }

    /// Locks a range for writing unless anyone else holds any lock on it.
    pub fn try_exclusive(&self, offset: u64, len: u64) -> StorageResult<Option<Section<'_>>> {
        self.try_section(LockKind::Exclusive, offset, len)
    }

    /// Takes a lock that is released only when this handle is closed.
    pub fn hold(&self, kind: LockKind, offset: u64, len: u64) -> StorageResult<()> {
        lock::lock(&self.file, kind, offset, len)
    }

    fn section(&self, kind: LockKind, offset: u64, len: u64) -> StorageResult<Section<'_>> {
        lock::lock(&self.file, kind, offset, len)?;
        Ok(Section::new(&self.file, offset, len))
    }

    fn try_section(
        &self,
        kind: LockKind,
        offset: u64,
        len: u64,
    ) -> StorageResult<Option<Section<'_>>> {
        if lock::try_lock(&self.file, kind, offset, len)? {
            Ok(Some(Section::new(&self.file, offset, len)))
        } else {
            Ok(None)
        }
    }
}
