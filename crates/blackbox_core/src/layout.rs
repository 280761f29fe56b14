//! Byte-exact on-disk headers.
//!
//! All integers are little-endian and headers are packed without padding:
//!
//! ```text
//! FileHeader  (24 bytes): page_size u32 | extension_size u32 | time_begin i64 | time_end i64
//! PageHeader  (20 bytes): extension_size u32 | time_begin i64 | time_end i64
//! PartHeader  (18 bytes): tag u8 | type u8 | stamp i64 | id u32 | size u32
//! ```
//!
//! A file is a `FileHeader`, an extension zone holding the metadata
//! document, then fixed-size pages. Each page starts with a `PageHeader`
//! and its own (zero-filled) extension zone, followed by parts.

use crate::identifier::Identifier;
use crate::stamp::Stamp;

/// Kind of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Before/after delta.
    Increment = 0,
    /// Self-contained state snapshot.
    Reference = 1,
    /// Message received from outside.
    IncomingPackage = 2,
    /// Message sent outside.
    OutboxPackage = 4,
}

impl RecordType {
    /// Decodes the on-disk type byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Increment),
            1 => Some(Self::Reference),
            2 => Some(Self::IncomingPackage),
            4 => Some(Self::OutboxPackage),
            _ => None,
        }
    }

    /// Lower-case name for listings.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Reference => "reference",
            Self::IncomingPackage => "incoming",
            Self::OutboxPackage => "outbox",
        }
    }

    /// True for the two package kinds.
    #[must_use]
    pub const fn is_package(self) -> bool {
        matches!(self, Self::IncomingPackage | Self::OutboxPackage)
    }
}

/// Role of a part in reassembling its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PartTag {
    /// Whole record in one part.
    Full = 8,
    /// First part of a split record.
    Begin = 16,
    /// Last part of a split record.
    End = 32,
    /// Inner part of a split record.
    Middle = 64,
}

impl PartTag {
    /// Decodes the on-disk tag byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            8 => Some(Self::Full),
            16 => Some(Self::Begin),
            32 => Some(Self::End),
            64 => Some(Self::Middle),
            _ => None,
        }
    }

    /// Tag for a part that starts and/or finishes its record.
    #[must_use]
    pub const fn from_bounds(starts: bool, finishes: bool) -> Self {
        match (starts, finishes) {
            (true, true) => Self::Full,
            (true, false) => Self::Begin,
            (false, true) => Self::End,
            (false, false) => Self::Middle,
        }
    }

    /// Part holds the first bytes of a record.
    #[must_use]
    pub const fn contains_beginning(self) -> bool {
        matches!(self, Self::Begin | Self::Full)
    }

    /// Part holds the last bytes of a record.
    #[must_use]
    pub const fn contains_end(self) -> bool {
        matches!(self, Self::End | Self::Full)
    }

    /// Part continues a record begun on an earlier page.
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        matches!(self, Self::End | Self::Middle)
    }
}

/// File-level header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Size of every page in bytes.
    pub page_size: u32,
    /// Length of the metadata zone following this header.
    pub extension_size: u32,
    /// Stamp of the first reference in the file.
    pub time_begin: i64,
    /// Stamp of the last record in the file.
    pub time_end: i64,
}

impl FileHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 24;
    /// Extension size assumed before the metadata document is known.
    pub const DEFAULT_EXTENSION_SIZE: u32 = 32;

    /// Creates a header for the given page size.
    #[must_use]
    pub const fn new(page_size: u32) -> Self {
        Self {
            page_size,
            extension_size: Self::DEFAULT_EXTENSION_SIZE,
            time_begin: 0,
            time_end: 0,
        }
    }

    /// Offset of the first page.
    #[must_use]
    pub const fn header_size(&self) -> u64 {
        Self::SIZE as u64 + self.extension_size as u64
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.extension_size.to_le_bytes());
        buf[8..16].copy_from_slice(&self.time_begin.to_le_bytes());
        buf[16..24].copy_from_slice(&self.time_end.to_le_bytes());
        buf
    }

    /// Decodes a header.
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            page_size: read_u32(buf, 0),
            extension_size: read_u32(buf, 4),
            time_begin: read_i64(buf, 8),
            time_end: read_i64(buf, 16),
        }
    }
}

/// Page-level header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Length of the zero-filled zone after this header.
    pub extension_size: u32,
    /// Stamp of the first part written to the page.
    pub time_begin: i64,
    /// Latest stamp written to the page.
    pub time_end: i64,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self {
            extension_size: Self::DEFAULT_EXTENSION_SIZE,
            time_begin: 0,
            time_end: 0,
        }
    }
}

impl PageHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 20;
    /// Extension size of new pages.
    pub const DEFAULT_EXTENSION_SIZE: u32 = 16;

    /// A fresh header that keeps the extension size of `self`.
    #[must_use]
    pub const fn reset(&self) -> Self {
        Self {
            extension_size: self.extension_size,
            time_begin: 0,
            time_end: 0,
        }
    }

    /// Offset of the first part relative to the page start.
    #[must_use]
    pub const fn parts_offset(&self) -> u64 {
        Self::SIZE as u64 + self.extension_size as u64
    }

    /// Widens the page's time range to include `stamp`.
    pub fn add_record_time(&mut self, stamp: Stamp) {
        if self.time_begin == 0 {
            self.time_begin = stamp.secs();
        }
        if self.time_end < stamp.secs() {
            self.time_end = stamp.secs();
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.extension_size.to_le_bytes());
        buf[4..12].copy_from_slice(&self.time_begin.to_le_bytes());
        buf[12..20].copy_from_slice(&self.time_end.to_le_bytes());
        buf
    }

    /// Decodes a header.
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            extension_size: read_u32(buf, 0),
            time_begin: read_i64(buf, 4),
            time_end: read_i64(buf, 12),
        }
    }
}

/// Header of one part inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartHeader {
    /// Role of the part.
    pub tag: PartTag,
    /// Type of the record the part belongs to.
    pub record_type: RecordType,
    /// Record stamp.
    pub stamp: Stamp,
    /// Record identifier.
    pub id: Identifier,
    /// Payload bytes following the header.
    pub size: u32,
}

impl PartHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 18;

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.tag as u8;
        buf[1] = self.record_type as u8;
        buf[2..10].copy_from_slice(&self.stamp.secs().to_le_bytes());
        buf[10..14].copy_from_slice(&self.id.raw().to_le_bytes());
        buf[14..18].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Decodes a header, or `None` if the tag or type byte is unknown.
    ///
    /// Zero-filled space after the last part decodes to `None`, which is
    /// how the end of a page's part table is found.
    #[must_use]
    pub fn decode(buf: &[u8; Self::SIZE]) -> Option<Self> {
        Some(Self {
            tag: PartTag::from_u8(buf[0])?,
            record_type: RecordType::from_u8(buf[1])?,
            stamp: Stamp::new(read_i64(buf, 2)),
            id: Identifier::from_raw(read_u32(buf, 10)),
            size: read_u32(buf, 14),
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    i64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Source;

    #[test]
    fn tag_roles() {
        assert!(PartTag::Full.contains_beginning() && PartTag::Full.contains_end());
        assert!(PartTag::Begin.contains_beginning() && !PartTag::Begin.contains_end());
        assert!(PartTag::End.is_continuation() && PartTag::End.contains_end());
        assert!(PartTag::Middle.is_continuation() && !PartTag::Middle.contains_end());
        assert!(!PartTag::Full.is_continuation());
        assert_eq!(PartTag::from_bounds(false, false), PartTag::Middle);
    }

    #[test]
    fn part_header_bytes() {
        let header = PartHeader {
            tag: PartTag::Begin,
            record_type: RecordType::Reference,
            stamp: Stamp::new(0x0102),
            id: Identifier::new(Source::LocalOutput, 3),
            size: 9,
        };
        let bytes = header.encode();
        assert_eq!(bytes[0], 16);
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..4], &[0x02, 0x01]);
        assert_eq!(&bytes[10..14], &[3, 0, 0, 0x10]);
        assert_eq!(PartHeader::decode(&bytes), Some(header));
    }

    #[test]
    fn zero_bytes_are_not_a_part() {
        assert_eq!(PartHeader::decode(&[0u8; PartHeader::SIZE]), None);
    }

    #[test]
    fn unknown_type_is_not_a_part() {
        let mut bytes = [0u8; PartHeader::SIZE];
        bytes[0] = PartTag::Full as u8;
        bytes[1] = 3;
        assert_eq!(PartHeader::decode(&bytes), None);
    }

    #[test]
    fn page_time_range() {
        let mut header = PageHeader::default();
        header.add_record_time(Stamp::new(50));
        header.add_record_time(Stamp::new(40));
        header.add_record_time(Stamp::new(70));
        assert_eq!((header.time_begin, header.time_end), (50, 70));

        let fresh = header.reset();
        assert_eq!(fresh.extension_size, PageHeader::DEFAULT_EXTENSION_SIZE);
        assert_eq!(fresh.time_begin, 0);
    }

    #[test]
    fn file_header_size_includes_extension() {
        let mut header = FileHeader::new(256);
        assert_eq!(header.header_size(), 56);
        header.extension_size = 80;
        assert_eq!(header.header_size(), 104);
        assert_eq!(FileHeader::decode(&header.encode()), header);
    }
}
