//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The operating system refused a byte-range lock.
    #[error("region lock failed at offset {offset}, len {len}: {source}")]
    Lock {
        /// Start of the requested range.
        offset: u64,
        /// Length of the requested range.
        len: u64,
        /// Underlying OS error.
        source: io::Error,
    },

    /// A buffer does not fit in the locked section.
    #[error("buffer of {requested} bytes exceeds locked section of {locked} bytes")]
    OutOfSection {
        /// Size of the buffer passed in.
        requested: usize,
        /// Size of the locked range.
        locked: u64,
    },

    /// The range cannot be represented as a file offset.
    #[error("unsupported range: offset {offset}, len {len}")]
    BadRange {
        /// Start of the requested range.
        offset: u64,
        /// Length of the requested range.
        len: u64,
    },
}
