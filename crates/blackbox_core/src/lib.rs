//! # Blackbox Core
//!
//! Engine of the blackbox record store: an append-only, time-ordered
//! journal of state snapshots, state changes and exchanged messages,
//! kept as a rotating chain of files that can be replayed in either
//! direction.
//!
//! This crate provides:
//! - [`Writer`]: a single appender per box with a background thread,
//!   page caching, file rotation and retention
//! - [`Reader`]: any number of independent cursors that seek by stamp and
//!   step record by record across files
//! - [`BlackBox`]: the engine instance that owns directory watches and
//!   shared settings
//!
//! ## Records
//!
//! A *reference* is a full snapshot of state; an *increment* holds the
//! state before and after one change; *packages* are messages received
//! or sent. Every file begins and ends with a reference, so replay can
//! start at any file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use blackbox_core::{BlackBox, Identifier, ReadResult, Stamp, WriterConfig};
//!
//! let bb = BlackBox::new();
//! let location = bb.location("/var/log/box", "unit-", ".bbx");
//!
//! let writer = bb.writer(location.clone(), WriterConfig::new())?;
//! writer.push_reference(Stamp::new(100), Identifier::default(), "c0", "d0")?;
//! writer.push_increment(Stamp::new(110), Identifier::default(), "c1", "b", "a")?;
//! writer.flush()?;
//!
//! let reader = bb.reader(location);
//! reader.rewind(Stamp::new(100));
//! while reader.next() == ReadResult::Success {
//!     let record = reader.read_any()?;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod config;
mod engine;
mod error;
pub mod extension;
mod file;
mod identifier;
pub mod layout;
mod location;
mod marker;
mod page;
mod reader;
mod record;
mod stamp;
mod writer;

pub use chain::{ChainEntry, ChainRegistry, FileChain};
pub use config::{DeviateDelay, EngineConfig, WriterConfig};
pub use engine::BlackBox;
pub use error::{CoreError, CoreResult};
pub use extension::{Extension, Version};
pub use file::{Cursor, FileInfo, FileSummary, PageSummary, WrittenCounts};
pub use identifier::{Identifier, Source};
pub use layout::{FileHeader, PageHeader, PartHeader, PartTag, RecordType};
pub use location::Location;
pub use marker::writer_active;
pub use reader::{available_time_interval, ReadResult, Reader};
pub use record::{IncrementRecord, ReadRecord, Record};
pub use stamp::Stamp;
pub use writer::{next_reference_moment, Writer};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
