//! Byte-range locking via `fcntl`.
//!
//! On Linux the open-file-description commands (`F_OFD_SETLK*`) are used so
//! that locks taken through different handles of one process conflict with
//! each other. Other unix systems fall back to classic POSIX record locks.

use crate::error::{StorageError, StorageResult};
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;

/// Kind of byte-range lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Many holders at once; requires a readable handle.
    Shared,
    /// Single holder; requires a writable handle.
    Exclusive,
}

#[cfg(target_os = "linux")]
const SET_LOCK: libc::c_int = libc::F_OFD_SETLK;
#[cfg(target_os = "linux")]
const SET_LOCK_WAIT: libc::c_int = libc::F_OFD_SETLKW;
#[cfg(not(target_os = "linux"))]
const SET_LOCK: libc::c_int = libc::F_SETLK;
#[cfg(not(target_os = "linux"))]
const SET_LOCK_WAIT: libc::c_int = libc::F_SETLKW;

#[derive(Clone, Copy)]
enum Request {
    Lock(LockKind),
    Unlock,
}

/// Blocks until the range is locked.
pub(crate) fn lock(file: &File, kind: LockKind, offset: u64, len: u64) -> StorageResult<()> {
    apply(file, Request::Lock(kind), offset, len, true).map(|_| ())
}

/// Returns `Ok(false)` if a conflicting lock is held elsewhere.
pub(crate) fn try_lock(file: &File, kind: LockKind, offset: u64, len: u64) -> StorageResult<bool> {
    apply(file, Request::Lock(kind), offset, len, false)
}

pub(crate) fn unlock(file: &File, offset: u64, len: u64) -> StorageResult<()> {
    apply(file, Request::Unlock, offset, len, false).map(|_| ())
}

#[allow(unsafe_code)]
fn apply(file: &File, request: Request, offset: u64, len: u64, wait: bool) -> StorageResult<bool> {
    let bad_range = || StorageError::BadRange { offset, len };
    let start = libc::off_t::try_from(offset).map_err(|_| bad_range())?;
    let size = libc::off_t::try_from(len).map_err(|_| bad_range())?;
    // A zero length would extend the lock to end of file.
    if size == 0 {
        return Err(bad_range());
    }

    let l_type = match request {
        Request::Lock(LockKind::Shared) => libc::F_RDLCK,
        Request::Lock(LockKind::Exclusive) => libc::F_WRLCK,
        Request::Unlock => libc::F_UNLCK,
    };

    // SAFETY: `flock` is a plain C struct for which all-zero bytes are a
    // valid value; OFD locks additionally require `l_pid == 0`.
    let mut fl: libc::flock = unsafe { std::mem::zeroed() };
    fl.l_type = l_type as libc::c_short;
    fl.l_whence = libc::SEEK_SET as libc::c_short;
    fl.l_start = start;
    fl.l_len = size;

    let cmd = if wait { SET_LOCK_WAIT } else { SET_LOCK };
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the
        // duration of the call; `fl` is a valid, initialized flock.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), cmd, &mut fl) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EAGAIN) | Some(libc::EACCES) if !wait => return Ok(false),
            _ => {
                return Err(StorageError::Lock {
                    offset,
                    len,
                    source: err,
                })
            }
        }
    }
}
