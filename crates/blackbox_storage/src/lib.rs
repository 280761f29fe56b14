//! # Blackbox Storage
//!
//! Positioned file access under cross-process byte-range locks.
//!
//! This crate is the lowest layer of the blackbox record store. Files are
//! **opaque byte stores** here: the crate knows nothing about headers,
//! pages or records, only about ranges of bytes and who may touch them.
//!
//! ## Design Principles
//!
//! - Every read or write goes through a [`Section`], a scoped lock over
//!   the exact byte range being touched
//! - Shared sections for readers, exclusive sections for the writer
//! - Locks are released when the section is dropped, including on error
//! - Locks belong to the open file description, so two handles in the
//!   same process conflict exactly like two processes do
//!
//! ## Example
//!
//! ```no_run
//! use blackbox_storage::RegionFile;
//! use std::path::Path;
//!
//! let file = RegionFile::create_new(Path::new("box.bin")).unwrap();
//! file.exclusive(0, 5).unwrap().write(b"hello").unwrap();
//!
//! let mut buf = [0u8; 5];
//! assert!(file.shared(0, 5).unwrap().read(&mut buf).unwrap());
//! assert_eq!(&buf, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(not(unix))]
compile_error!("blackbox_storage requires a unix platform with fcntl byte-range locks");

mod error;
mod file;
mod lock;
mod section;

pub use error::{StorageError, StorageResult};
pub use file::{AccessMode, RegionFile};
pub use lock::LockKind;
pub use section::Section;
