//! # Blackbox Testkit
//!
//! Test utilities for blackbox record stores.
//!
//! This crate provides:
//! - Temporary boxes with small pages and files
//! - Property-based test generators using proptest
//! - Golden byte vectors for the on-disk headers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blackbox_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_box() {
//!     let tb = TestBox::new();
//!     let writer = tb.writer();
//!     writer.push_reference(Stamp::new(100), Identifier::default(), "c", "d").unwrap();
//!     drop(writer);
//!     assert_eq!(tb.replay().len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod golden;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::golden::*;
    pub use blackbox_core::{
        BlackBox, Identifier, ReadResult, Record, RecordType, Source, Stamp, WriterConfig,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use golden::*;
