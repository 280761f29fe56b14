//! Outcome codes of reader operations.

use std::fmt;

/// Outcome of a reader operation.
///
/// Codes below `0x80` describe where the cursor landed; codes from `0x80`
/// up report that the file or the reader itself is in a bad state.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadResult {
    /// Exact match.
    Success = 0x00,
    /// The closest match was used.
    FoundApproximateValue = 0x01,
    /// Nothing further in this direction.
    NoDataAvailable = 0x02,
    /// The record at the cursor has another type.
    WrongRecordType = 0x03,
    /// The next record breaks time order.
    TimeSequenceViolation = 0x04,
    /// The next file does not continue the current one.
    NewSession = 0x05,
    /// A forced step found an ordinary continuation.
    NormalSequenceFound = 0x06,
    /// File format version cannot be read.
    VersionNotSupported = 0x07,

    /// Unexpected internal state.
    InternalError = 0x80,
    /// No file is open.
    NoFileOpened = 0x81,
    /// A file could not be opened.
    ErrorOpeningFile = 0x82,
    /// The part at the cursor does not start a record.
    NotContainsBeginning = 0x83,
    /// File header could not be read.
    ReadingFileHeader = 0x84,
    /// A page header could not be read.
    ReadingPageHeader = 0x85,
    /// A page header or metadata zone is malformed.
    BadPageHeader = 0x86,
    /// A page could not be read.
    PageRead = 0x87,
    /// No page with a record start was found.
    PageNotFound = 0x88,
}

impl ReadResult {
    /// True for [`Success`](Self::Success) and [`FoundApproximateValue`](Self::FoundApproximateValue).
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Success | Self::FoundApproximateValue)
    }

    /// True for codes that report a broken file or reader state.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self as u8 >= 0x80
    }

    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Converts `Ok`-ish codes to `Ok(())`, everything else to `Err(self)`.
    pub fn into_result(self) -> Result<(), ReadResult> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Short description.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FoundApproximateValue => "found approximate value",
            Self::NoDataAvailable => "no data available",
            Self::WrongRecordType => "wrong record type",
            Self::TimeSequenceViolation => "time sequence violation",
            Self::NewSession => "new session",
            Self::NormalSequenceFound => "normal sequence found",
            Self::VersionNotSupported => "version not supported",
            Self::InternalError => "internal error",
            Self::NoFileOpened => "no file opened",
            Self::ErrorOpeningFile => "error opening file",
            Self::NotContainsBeginning => "part does not start a record",
            Self::ReadingFileHeader => "cannot read file header",
            Self::ReadingPageHeader => "cannot read page header",
            Self::BadPageHeader => "bad page header",
            Self::PageRead => "cannot read page",
            Self::PageNotFound => "page not found",
        }
    }
}

impl fmt::Display for ReadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.describe(), self.code())
    }
}

impl std::error::Error for ReadResult {}
