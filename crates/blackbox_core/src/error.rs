//! Error types for the blackbox engine.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in blackbox core operations.
///
/// Reader navigation does not use this type; it reports
/// [`ReadResult`](crate::ReadResult) codes instead.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] blackbox_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Metadata document could not be encoded or decoded.
    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// A configuration value was rejected.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Why the value was rejected.
        message: String,
    },

    /// The writer failed earlier and accepts no more records.
    #[error("writer is dead: {message}")]
    WriterDead {
        /// Diagnostic recorded at the first failure.
        message: String,
    },

    /// Increments and packages need a preceding reference.
    #[error("no reference record has been written yet")]
    NoReference,

    /// Another writer holds the location's presence marker.
    #[error("writer already active: {path}")]
    WriterActive {
        /// Path of the marker file.
        path: String,
    },

    /// Every candidate file name for a stamp was taken.
    #[error("cannot create a new file for {name} after {attempts} attempts")]
    FileCreation {
        /// First candidate name.
        name: String,
        /// Number of names tried.
        attempts: u32,
    },

    /// A record buffer exceeds the 32-bit length prefix.
    #[error("record buffer too large: {size} bytes")]
    RecordTooLarge {
        /// Size of the offending buffer.
        size: usize,
    },

    /// Operation is not valid in the current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
