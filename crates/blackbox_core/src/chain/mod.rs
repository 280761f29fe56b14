//! Sorted view of a box's files.
//!
//! A [`FileChain`] is an immutable snapshot: names and sizes of every file
//! matching a location, in time order. Snapshots are built by the
//! [`ChainRegistry`], which rebuilds them when the directory changes and
//! hands them out as `Arc`s.

mod order;
mod registry;
mod watch;

pub use registry::ChainRegistry;

use crate::file::FileInfo;
use crate::location::mask_matches;
use crate::stamp::Stamp;
use order::NameKey;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One file of a chain.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    name: String,
    size: u64,
    key: NameKey,
}

impl ChainEntry {
    /// File name without directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes at scan time.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Time-ordered list of a box's files.
#[derive(Debug, Clone, Default)]
pub struct FileChain {
    directory: PathBuf,
    prefix: String,
    suffix: String,
    entries: Vec<ChainEntry>,
    earliest_end: Option<Stamp>,
}

impl FileChain {
    /// Lists `directory` and keeps files matching `prefix*suffix`.
    pub(crate) fn scan(directory: &Path, prefix: &str, suffix: &str) -> Self {
        let mut entries = Vec::new();
        match fs::read_dir(directory) {
            Ok(listing) => {
                for entry in listing.flatten() {
                    let Ok(meta) = entry.metadata() else {
                        continue;
                    };
                    if !meta.is_file() {
                        continue;
                    }
                    let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                        continue;
                    };
                    if mask_matches(&name, prefix, suffix) {
                        entries.push(ChainEntry {
                            key: NameKey::new(&name, prefix, suffix),
                            name,
                            size: meta.len(),
                        });
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(dir = %directory.display(), error = %e, "cannot list box directory");
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let earliest_end = entries
            .first()
            .and_then(|e| FileInfo::read(&directory.join(&e.name)))
            .map(|info| info.end);

        tracing::debug!(
            dir = %directory.display(),
            files = entries.len(),
            "file chain rebuilt"
        );

        Self {
            directory: directory.to_path_buf(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            entries,
            earliest_end,
        }
    }

    fn path_of(&self, entry: &ChainEntry) -> PathBuf {
        self.directory.join(&entry.name)
    }

    /// Files in time order.
    #[must_use]
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the box has no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of file sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Oldest file.
    #[must_use]
    pub fn earliest(&self) -> Option<PathBuf> {
        self.entries.first().map(|e| self.path_of(e))
    }

    /// Stamp of the oldest file's last record, read when the chain was built.
    #[must_use]
    pub fn earliest_end(&self) -> Option<Stamp> {
        self.earliest_end
    }

    /// Drops the oldest file from this snapshot and returns its path.
    pub fn take_earliest(&mut self) -> Option<PathBuf> {
        self.earliest_end = None;
        if self.entries.is_empty() {
            return None;
        }
        let entry = self.entries.remove(0);
        Some(self.path_of(&entry))
    }

    /// Newest file of at least `min_size` bytes.
    #[must_use]
    pub fn latest(&self, min_size: u64) -> Option<PathBuf> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.size >= min_size)
            .map(|e| self.path_of(e))
    }

    /// Files whose names could hold stamps between the two names.
    ///
    /// The range is widened by one file on each side since a file's name
    /// only tells when it starts.
    #[must_use]
    pub fn files_around_range(&self, first: &str, last: &str, min_size: u64) -> Vec<PathBuf> {
        let first = NameKey::new(first, &self.prefix, &self.suffix);
        let last = NameKey::new(last, &self.prefix, &self.suffix);

        let lower = self
            .entries
            .partition_point(|e| e.key < first)
            .saturating_sub(1);
        let mut upper = lower + self.entries[lower..].partition_point(|e| e.key <= last);
        if upper < self.entries.len() {
            upper += 1;
        }

        self.entries[lower..upper]
            .iter()
            .filter(|e| e.size >= min_size)
            .map(|e| self.path_of(e))
            .collect()
    }

    /// Neighbour of `current` in the reading direction.
    #[must_use]
    pub fn next_file(&self, current: &Path, min_size: u64, forward: bool) -> Option<PathBuf> {
        let name = current.file_name()?.to_str()?;
        let at = self.entries.iter().position(|e| e.name == name)?;
        let found = if forward {
            self.entries[at + 1..].iter().find(|e| e.size >= min_size)
        } else {
            self.entries[..at].iter().rev().find(|e| e.size >= min_size)
        };
        found.map(|e| self.path_of(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str, size: usize) {
        fs::write(dir.join(name), vec![0u8; size]).unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn scan_sorts_and_filters() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b-170101-1201Z.x", 30);
        touch(dir.path(), "b-170101-1200Z_01.x", 30);
        touch(dir.path(), "b-170101-1200Z.x", 30);
        touch(dir.path(), "b-160101-1200.x", 30);
        touch(dir.path(), "~b-.x", 10);
        touch(dir.path(), "other.txt", 10);

        let chain = FileChain::scan(dir.path(), "b-", ".x");
        let listed: Vec<&str> = chain.entries().iter().map(ChainEntry::name).collect();
        assert_eq!(
            listed,
            [
                "b-160101-1200.x",
                "b-170101-1200Z.x",
                "b-170101-1200Z_01.x",
                "b-170101-1201Z.x"
            ]
        );
        assert_eq!(chain.total_size(), 120);
        // Zero-filled header: not a readable box file.
        assert_eq!(chain.earliest_end(), None);
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let chain = FileChain::scan(&dir.path().join("nope"), "b-", ".x");
        assert!(chain.is_empty());
        assert_eq!(chain.earliest(), None);
    }

    #[test]
    fn neighbours_skip_small_files() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b-170101-1200Z.x", 30);
        touch(dir.path(), "b-170101-1300Z.x", 5);
        touch(dir.path(), "b-170101-1400Z.x", 30);

        let chain = FileChain::scan(dir.path(), "b-", ".x");
        let first = dir.path().join("b-170101-1200Z.x");
        let last = dir.path().join("b-170101-1400Z.x");
        assert_eq!(chain.next_file(&first, 24, true), Some(last.clone()));
        assert_eq!(chain.next_file(&last, 24, false), Some(first.clone()));
        assert_eq!(chain.next_file(&last, 24, true), None);
        assert_eq!(chain.latest(24), Some(last));
        assert_eq!(chain.latest(100), None);
        assert_eq!(chain.next_file(&dir.path().join("b-x.x"), 0, true), None);
    }

    #[test]
    fn range_is_widened_by_one() {
        let dir = tempdir().unwrap();
        for hour in 10..16 {
            touch(dir.path(), &format!("b-170101-{hour}00Z.x"), 30);
        }
        let chain = FileChain::scan(dir.path(), "b-", ".x");

        let around = chain.files_around_range("b-170101-1230Z.x", "b-170101-1230Z.x", 0);
        assert_eq!(
            names(&around),
            ["b-170101-1200Z.x", "b-170101-1300Z.x"]
        );

        let before_all = chain.files_around_range("b-170101-0900Z.x", "b-170101-0900Z.x", 0);
        assert_eq!(names(&before_all), ["b-170101-1000Z.x"]);

        let exact = chain.files_around_range("b-170101-1500Z.x", "b-170101-1500Z.x", 0);
        assert_eq!(names(&exact), ["b-170101-1400Z.x", "b-170101-1500Z.x"]);
    }

    #[test]
    fn take_earliest_shrinks_snapshot() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b-170101-1200Z.x", 30);
        touch(dir.path(), "b-170101-1300Z.x", 30);

        let mut chain = FileChain::scan(dir.path(), "b-", ".x");
        let taken = chain.take_earliest().unwrap();
        assert!(taken.ends_with("b-170101-1200Z.x"));
        assert_eq!(chain.len(), 1);
        assert!(dir.path().join("b-170101-1200Z.x").exists());
    }
}
