//! Scoped access to a locked byte range.

use crate::error::{StorageError, StorageResult};
use crate::lock;
use std::fs::File;
use std::os::unix::fs::FileExt;

/// A locked byte range of a [`RegionFile`](crate::RegionFile).
///
/// The lock is released when the section is dropped. Reads and writes
/// start at the beginning of the range and may not run past its end.
#[derive(Debug)]
pub struct Section<'a> {
    file: &'a File,
    offset: u64,
    len: u64,
}

impl<'a> Section<'a> {
    pub(crate) fn new(file: &'a File, offset: u64, len: u64) -> Self {
        Self { file, offset, len }
    }

    /// Start of the locked range.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the locked range.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills `buf` from the start of the section.
    ///
    /// Returns `Ok(false)` if the file ends before `buf` is full, which is
    /// how a reader observes a page that is still being written.
    pub fn read(&self, buf: &mut [u8]) -> StorageResult<bool> {
        self.check(buf.len())?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read_at(&mut buf[filled..], self.offset + filled as u64)?;
            if n == 0 {
                return Ok(false);
            }
            filled += n;
        }
        Ok(true)
    }

    /// Writes `data` at the start of the section.
    pub fn write(&self, data: &[u8]) -> StorageResult<()> {
        self.check(data.len())?;
        self.file.write_all_at(data, self.offset)?;
        Ok(())
    }

    fn check(&self, requested: usize) -> StorageResult<()> {
        if requested as u64 > self.len {
            return Err(StorageError::OutOfSection {
                requested,
                locked: self.len,
            });
        }
        Ok(())
    }
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        if let Err(e) = lock::unlock(self.file, self.offset, self.len) {
            tracing::warn!(offset = self.offset, len = self.len, error = %e, "cannot release region lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    #[test]
    fn drop_survives_failed_unlock() {
        let file = tempfile().unwrap();
        // A zero length range cannot be unlocked.
        assert!(matches!(
            lock::unlock(&file, 0, 0),
            Err(StorageError::BadRange { .. })
        ));
        drop(Section::new(&file, 0, 0));

        let section = Section::new(&file, 8, 4);
        section.write(b"abcd").unwrap();
        drop(section);
        assert_eq!(file.metadata().unwrap().len(), 12);
    }
}
