//! Where a box lives and how its files are named.

use crate::chain::{ChainRegistry, FileChain};
use crate::stamp::Stamp;
use chrono::DateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Letter closing the time part of a file name; marks names in UTC.
pub const ZONE_MARKER: char = 'Z';

/// Most names tried for one stamp before giving up.
pub const MAX_NAME_ATTEMPTS: u32 = 100;

/// A box: directory plus file name prefix and suffix.
///
/// File names follow `<prefix>YYMMDD-HHMMZ[_NN]<suffix>`, with the time
/// taken in UTC from the stamp of the file's first reference and `_NN`
/// disambiguating files created within the same minute.
///
/// # Example
///
/// ```rust,ignore
/// let bb = BlackBox::new();
/// let location = bb.location("/var/log/box", "unit-", ".bbx");
/// assert_eq!(location.file_name(Stamp::new(0), 0), "unit-700101-0000Z.bbx");
/// ```
#[derive(Debug, Clone)]
pub struct Location {
    directory: PathBuf,
    prefix: String,
    suffix: String,
    registry: Arc<ChainRegistry>,
}

impl Location {
    pub(crate) fn new(
        registry: Arc<ChainRegistry>,
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
            registry,
        }
    }

    /// Directory holding the box files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// File name suffix.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// True if no directory was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directory.as_os_str().is_empty()
    }

    /// Name of the file whose first reference has `stamp`.
    #[must_use]
    pub fn file_name(&self, stamp: Stamp, attempt: u32) -> String {
        let time = DateTime::from_timestamp(stamp.secs(), 0).unwrap_or_default();
        let mut name = format!(
            "{}{}{}",
            self.prefix,
            time.format("%y%m%d-%H%M"),
            ZONE_MARKER
        );
        if attempt > 0 {
            name.push_str(&format!("_{attempt:02}"));
        }
        name.push_str(&self.suffix);
        name
    }

    /// Full path of [`file_name`](Self::file_name).
    #[must_use]
    pub fn file_path(&self, stamp: Stamp, attempt: u32) -> PathBuf {
        self.directory.join(self.file_name(stamp, attempt))
    }

    /// Path of the writer presence marker.
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.directory.join(self.marker_name())
    }

    fn marker_name(&self) -> String {
        marker_name(&self.prefix, &self.suffix)
    }

    /// True if `name` looks like a file of this box.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        mask_matches(name, &self.prefix, &self.suffix)
    }

    /// Current snapshot of the box's file chain.
    #[must_use]
    pub fn chain(&self) -> Arc<FileChain> {
        self.registry.chain(self)
    }

    /// Rescans the directory and returns the fresh chain.
    #[must_use]
    pub fn refresh_chain(&self) -> Arc<FileChain> {
        self.registry.invalidate(&self.directory);
        self.registry.chain(self)
    }

    /// Marks the directory listing stale after a file was created or removed.
    pub(crate) fn invalidate(&self) {
        self.registry.invalidate(&self.directory);
    }
}

fn marker_name(prefix: &str, suffix: &str) -> String {
    format!("~{prefix}{suffix}")
}

/// `prefix*suffix`, excluding the presence marker.
pub(crate) fn mask_matches(name: &str, prefix: &str, suffix: &str) -> bool {
    name.len() >= prefix.len() + suffix.len()
        && name.starts_with(prefix)
        && name.ends_with(suffix)
        && name != marker_name(prefix, suffix)
}
