//! Pages: fixed-size units of a box file.
//!
//! The write side stages parts in a [`PageCache`] and flushes its unwritten
//! tail to disk. The read side loads a page's part table into a
//! [`PageIndex`] and answers questions about record boundaries.

mod cache;
mod index;

pub(crate) use cache::PageCache;
pub(crate) use index::{PageIndex, PartEntry};

use crate::layout::PartHeader;

/// Space below which a page accepts no further parts: room for a part
/// header and at least as many payload bytes.
pub(crate) const LARGEST_UNUSED_SPACE: usize = 2 * PartHeader::SIZE;

/// Location of a page inside its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileAddress {
    /// Offset of the page header.
    pub offset: u64,
    /// Page size in bytes.
    pub size: u64,
}

impl FileAddress {
    /// Creates an address.
    #[must_use]
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// Offset of the following page.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Address of the following page.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self::new(self.end(), self.size)
    }
}
