//! Process-scoped cache of file chains.

use super::watch::DirWatch;
use super::FileChain;
use crate::location::Location;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct MaskedChain {
    prefix: String,
    suffix: String,
    chain: Arc<FileChain>,
}

#[derive(Debug)]
struct Folder {
    watch: DirWatch,
    stale: bool,
    chains: Vec<MaskedChain>,
}

impl Folder {
    fn rebuild(&mut self) {
        tracing::trace!(dir = %self.watch.dir().display(), "directory changed");
        for masked in &mut self.chains {
            masked.chain = Arc::new(FileChain::scan(
                self.watch.dir(),
                &masked.prefix,
                &masked.suffix,
            ));
        }
    }
}

/// Watched directories and the chains of every box inside them.
///
/// One registry is owned by each [`BlackBox`](crate::BlackBox) engine and
/// shared by all of its locations. Chains are rebuilt lazily: a directory
/// change (or the poll interval, or an explicit invalidation) only marks
/// the folder, and the next [`Location::chain`] call rescans it.
#[derive(Debug)]
pub struct ChainRegistry {
    folders: Mutex<HashMap<PathBuf, Folder>>,
    poll_interval: Duration,
}

impl ChainRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            folders: Mutex::new(HashMap::new()),
            poll_interval,
        }
    }

    /// Current chain of `location`, rebuilt first if the directory changed.
    pub(crate) fn chain(&self, location: &Location) -> Arc<FileChain> {
        let dir = location.directory();
        let mut folders = self.folders.lock();
        let folder = folders.entry(dir.to_path_buf()).or_insert_with(|| Folder {
            watch: DirWatch::new(dir, self.poll_interval),
            stale: false,
            chains: Vec::new(),
        });

        let changed = folder.watch.changed();
        if changed || folder.stale {
            folder.stale = false;
            folder.rebuild();
        }

        if let Some(masked) = folder
            .chains
            .iter()
            .find(|m| m.prefix == location.prefix() && m.suffix == location.suffix())
        {
            return Arc::clone(&masked.chain);
        }

        let chain = Arc::new(FileChain::scan(dir, location.prefix(), location.suffix()));
        folder.chains.push(MaskedChain {
            prefix: location.prefix().to_string(),
            suffix: location.suffix().to_string(),
            chain: Arc::clone(&chain),
        });
        chain
    }

    /// Forces a rescan of `dir` on next access.
    pub(crate) fn invalidate(&self, dir: &Path) {
        if let Some(folder) = self.folders.lock().get_mut(dir) {
            folder.stale = true;
        }
    }

    /// Number of watched directories.
    #[must_use]
    pub fn watched_dirs(&self) -> usize {
        self.folders.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn snapshot_reused_until_invalidated() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(ChainRegistry::new(Duration::from_secs(3600)));
        let location = Location::new(Arc::clone(&registry), dir.path(), "a-", ".x");

        let first = location.chain();
        assert!(first.is_empty());
        assert!(Arc::ptr_eq(&first, &location.chain()));

        fs::write(dir.path().join("a-170101-1200Z.x"), [0u8; 30]).unwrap();
        location.invalidate();
        let second = location.chain();
        assert_eq!(second.len(), 1);
        // The old snapshot is untouched.
        assert!(first.is_empty());
    }

    #[test]
    fn masks_share_a_folder() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a-170101-1200Z.x"), [0u8; 30]).unwrap();
        fs::write(dir.path().join("b-170101-1200Z.x"), [0u8; 30]).unwrap();
        fs::write(dir.path().join("b-170101-1300Z.x"), [0u8; 30]).unwrap();

        let registry = Arc::new(ChainRegistry::new(Duration::from_secs(3600)));
        let a = Location::new(Arc::clone(&registry), dir.path(), "a-", ".x");
        let b = Location::new(Arc::clone(&registry), dir.path(), "b-", ".x");

        assert_eq!(a.chain().len(), 1);
        assert_eq!(b.refresh_chain().len(), 2);
        assert_eq!(registry.watched_dirs(), 1);
    }
}
