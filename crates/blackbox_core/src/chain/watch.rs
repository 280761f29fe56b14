//! Directory change detection.
//!
//! On Linux an inotify descriptor reports created, deleted and renamed
//! entries. Everywhere a poll interval marks the directory changed as a
//! fallback, so a missing or overflowing notifier only delays a rescan.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub(crate) struct DirWatch {
    dir: PathBuf,
    #[cfg(target_os = "linux")]
    notify: Option<inotify::Inotify>,
    last_scan: Instant,
    poll_interval: Duration,
}

impl DirWatch {
    pub(crate) fn new(dir: &Path, poll_interval: Duration) -> Self {
        Self {
            dir: dir.to_path_buf(),
            #[cfg(target_os = "linux")]
            notify: inotify::Inotify::watch(dir).ok(),
            last_scan: Instant::now(),
            poll_interval,
        }
    }

    /// True if the directory may have changed since the last true result.
    pub(crate) fn changed(&mut self) -> bool {
        let mut changed = self.last_scan.elapsed() >= self.poll_interval;

        #[cfg(target_os = "linux")]
        match &mut self.notify {
            Some(notify) => changed |= notify.drain(),
            // The directory may not have existed yet.
            None => {
                self.notify = inotify::Inotify::watch(&self.dir).ok();
                changed |= self.notify.is_some();
            }
        }

        if changed {
            self.last_scan = Instant::now();
        }
        changed
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(target_os = "linux")]
mod inotify {
    use std::ffi::CString;
    use std::fs::File;
    use std::io::{self, Read};
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
    use std::path::Path;

    const EVENTS: u32 = libc::IN_CREATE
        | libc::IN_DELETE
        | libc::IN_MOVED_FROM
        | libc::IN_MOVED_TO
        | libc::IN_DELETE_SELF;

    #[derive(Debug)]
    pub(super) struct Inotify {
        file: File,
    }

    impl Inotify {
        #[allow(unsafe_code)]
        pub(super) fn watch(dir: &Path) -> io::Result<Self> {
            let path = CString::new(dir.as_os_str().as_bytes())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "NUL in path"))?;

            // SAFETY: no pointer arguments.
            let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: `fd` was just returned by inotify_init1 and has no other owner.
            let owned = unsafe { OwnedFd::from_raw_fd(fd) };

            // SAFETY: `owned` is open and `path` is NUL-terminated.
            let wd = unsafe { libc::inotify_add_watch(owned.as_raw_fd(), path.as_ptr(), EVENTS) };
            if wd < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(Self {
                file: File::from(owned),
            })
        }

        /// Consumes queued events; true if there were any.
        pub(super) fn drain(&mut self) -> bool {
            let mut buf = [0u8; 4096];
            let mut seen = false;
            loop {
                match self.file.read(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => seen = true,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(_) => {
                        seen = true;
                        break;
                    }
                }
            }
            seen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn poll_interval_reports_change() {
        let dir = tempdir().unwrap();
        let mut watch = DirWatch::new(dir.path(), Duration::ZERO);
        assert!(watch.changed());
        assert_eq!(watch.dir(), dir.path());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn notification_reports_created_file() {
        let dir = tempdir().unwrap();
        let mut watch = DirWatch::new(dir.path(), Duration::from_secs(3600));
        assert!(!watch.changed());

        std::fs::write(dir.path().join("new.bin"), b"x").unwrap();
        assert!(watch.changed());
        assert!(!watch.changed());
    }
}
