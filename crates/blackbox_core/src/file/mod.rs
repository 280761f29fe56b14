//! Box files.
//!
//! ```text
//! +-------------+----------------+--------+--------+-----
//! | FileHeader  | metadata (JSON)| page 0 | page 1 | ...
//! | 24 bytes    | extension_size | page_size each
//! +-------------+----------------+--------+--------+-----
//! ```
//!
//! Every process that opens a box file holds a shared lock on the
//! presence range, far past any real data. A file is deleted only if an
//! exclusive lock on that range can be taken, so files in use by a
//! reader survive retention.

mod reader;
mod writer;

pub(crate) use reader::FileReader;
pub(crate) use writer::FileWriter;
pub use writer::WrittenCounts;

use crate::error::CoreResult;
use crate::extension::Extension;
use crate::layout::{FileHeader, PageHeader, PartHeader};
use crate::reader::ReadResult;
use crate::stamp::Stamp;
use blackbox_storage::{AccessMode, RegionFile, StorageError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Offset of the presence range.
pub(crate) const PRESENCE_OFFSET: u64 = 3 << 30;
/// Length of the presence range.
pub(crate) const PRESENCE_LEN: u64 = 1024;

/// Smallest file worth opening: anything shorter has no complete header.
pub(crate) const MIN_READABLE_SIZE: u64 = 24;

/// Position of a record inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Page index, counted from the first page.
    pub page: usize,
    /// Part index inside the page.
    pub part: usize,
}

/// Summary of one box file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Full path.
    pub path: PathBuf,
    /// Stamp of the first reference.
    pub start: Stamp,
    /// Stamp of the last record.
    pub end: Stamp,
    /// Size in bytes.
    pub size: u64,
}

impl FileInfo {
    /// Reads the header of the file at `path`.
    ///
    /// Returns `None` if the file cannot be opened, if its header, metadata
    /// or first page cannot be read, or if it holds no record yet.
    #[must_use]
    pub fn read(path: &Path) -> Option<Self> {
        let reader = FileReader::open(path).ok()?;
        if reader.starts_from().is_zero() || reader.ends_with().is_zero() {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            start: reader.starts_from(),
            end: reader.ends_with(),
            size: reader.file_size(),
        })
    }
}

/// Part table of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    /// Page index.
    pub index: usize,
    /// False if the page header could not be read.
    pub valid: bool,
    /// Page header.
    pub header: PageHeader,
    /// Part headers in order.
    pub parts: Vec<PartHeader>,
    /// Data stops before the page's capacity.
    pub clipped: bool,
}

/// Page-level view of a box file, used by inspection tools.
#[derive(Debug, Clone)]
pub struct FileSummary {
    /// Full path.
    pub path: PathBuf,
    /// File header.
    pub header: FileHeader,
    /// Metadata document.
    pub extension: Extension,
    /// Size in bytes.
    pub size: u64,
    /// Every page, in order.
    pub pages: Vec<PageSummary>,
}

impl FileSummary {
    /// Opens `path` and loads the part table of every page.
    pub fn read(path: &Path) -> Result<Self, ReadResult> {
        let reader = FileReader::open(path)?;
        let pages = (0..reader.page_count())
            .map(|index| {
                let page = reader.load(index);
                PageSummary {
                    index,
                    valid: page.valid(),
                    header: page.header(),
                    parts: page.parts().iter().map(|p| p.header).collect(),
                    clipped: page.is_clipped(),
                }
            })
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            header: reader.header(),
            extension: reader.extension().clone(),
            size: reader.file_size(),
            pages,
        })
    }
}

/// Removes `path` unless another handle holds its presence range.
///
/// Returns true if the file is gone.
pub(crate) fn safe_remove(path: &Path) -> CoreResult<bool> {
    let file = match RegionFile::open(path, AccessMode::ReadWrite) {
        Ok(file) => file,
        Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    };

    let Some(_mark) = file.try_exclusive(PRESENCE_OFFSET, PRESENCE_LEN)? else {
        tracing::debug!(path = %path.display(), "file in use, not removed");
        return Ok(false);
    };
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_storage::LockKind;
    use tempfile::tempdir;

    #[test]
    fn safe_remove_respects_presence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("held.bin");
        fs::write(&path, b"data").unwrap();

        let holder = RegionFile::open(&path, AccessMode::Read).unwrap();
        holder.hold(LockKind::Shared, PRESENCE_OFFSET, PRESENCE_LEN).unwrap();
        assert!(!safe_remove(&path).unwrap());
        assert!(path.exists());

        drop(holder);
        assert!(safe_remove(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn safe_remove_missing_file() {
        let dir = tempdir().unwrap();
        assert!(safe_remove(&dir.path().join("gone.bin")).unwrap());
    }

    #[test]
    fn info_of_garbage_is_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.bin");
        fs::write(&path, [0xffu8; 100]).unwrap();
        assert_eq!(FileInfo::read(&path), None);
        assert_eq!(FileInfo::read(&dir.path().join("none.bin")), None);
    }
}
