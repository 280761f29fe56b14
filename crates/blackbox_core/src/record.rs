//! Logical records and their serialized form.
//!
//! A record is serialized as its buffers in order, each prefixed by a
//! little-endian `u32` length. The serialized bytes are then cut into parts
//! by the page cache, and glued back together by [`RecordAssembler`].

use crate::error::{CoreError, CoreResult};
use crate::identifier::Identifier;
use crate::layout::RecordType;
use crate::stamp::Stamp;

/// A record with its type-specific buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Self-contained state snapshot.
    Reference {
        /// Short description of the state.
        caption: Vec<u8>,
        /// Serialized state.
        data: Vec<u8>,
    },
    /// Delta between two states.
    Increment {
        /// Short description of the change.
        caption: Vec<u8>,
        /// State before the change.
        before: Vec<u8>,
        /// State after the change.
        after: Vec<u8>,
    },
    /// Message received from outside.
    IncomingPackage {
        /// Short description of the message.
        caption: Vec<u8>,
        /// Message body.
        data: Vec<u8>,
    },
    /// Message sent outside.
    OutboxPackage {
        /// Short description of the message.
        caption: Vec<u8>,
        /// Message body.
        data: Vec<u8>,
    },
}

impl Record {
    /// On-disk type of this record.
    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Reference { .. } => RecordType::Reference,
            Self::Increment { .. } => RecordType::Increment,
            Self::IncomingPackage { .. } => RecordType::IncomingPackage,
            Self::OutboxPackage { .. } => RecordType::OutboxPackage,
        }
    }

    /// Buffers in serialization order.
    #[must_use]
    pub fn buffers(&self) -> Vec<&[u8]> {
        match self {
            Self::Reference { caption, data }
            | Self::IncomingPackage { caption, data }
            | Self::OutboxPackage { caption, data } => vec![caption, data],
            Self::Increment {
                caption,
                before,
                after,
            } => vec![caption, before, after],
        }
    }

    /// Sum of buffer lengths; used for queue backpressure.
    #[must_use]
    pub fn weight(&self) -> usize {
        self.buffers().iter().map(|b| b.len()).sum()
    }

    /// Checks every buffer fits its length prefix.
    pub fn validate(&self) -> CoreResult<()> {
        for buf in self.buffers() {
            if u32::try_from(buf.len()).is_err() {
                return Err(CoreError::RecordTooLarge { size: buf.len() });
            }
        }
        Ok(())
    }

    /// Length-prefixed serialization.
    pub fn serialize(&self) -> CoreResult<Vec<u8>> {
        self.validate()?;
        let buffers = self.buffers();
        let total = buffers.iter().map(|b| 4 + b.len()).sum();
        let mut out = Vec::with_capacity(total);
        for buf in buffers {
            out.extend_from_slice(&(buf.len() as u32).to_le_bytes());
            out.extend_from_slice(buf);
        }
        Ok(out)
    }
}

/// Number of buffers a record of this type carries.
pub(crate) const fn buffer_count(record_type: RecordType) -> usize {
    match record_type {
        RecordType::Increment => 3,
        _ => 2,
    }
}

/// A serialized record being cut into parts.
#[derive(Debug)]
pub(crate) struct OutRecord {
    pub(crate) record_type: RecordType,
    pub(crate) stamp: Stamp,
    pub(crate) id: Identifier,
    bytes: Vec<u8>,
    written: usize,
}

impl OutRecord {
    pub(crate) fn new(stamp: Stamp, id: Identifier, record: &Record) -> CoreResult<Self> {
        Ok(Self {
            record_type: record.record_type(),
            stamp,
            id,
            bytes: record.serialize()?,
            written: 0,
        })
    }

    /// Total serialized length.
    pub(crate) fn size(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.written
    }

    pub(crate) fn is_untouched(&self) -> bool {
        self.written == 0
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.written == self.bytes.len()
    }

    /// Hands out the next `n` bytes (or fewer at the end).
    pub(crate) fn take(&mut self, n: usize) -> &[u8] {
        let start = self.written;
        let end = start + n.min(self.remaining());
        self.written = end;
        &self.bytes[start..end]
    }

    /// Starts over, for writing the same record into a new file.
    pub(crate) fn rewind(&mut self) {
        self.written = 0;
    }
}

/// Rebuilds a record's buffers from part payloads.
///
/// Length prefixes may be split between parts, so the assembler is a
/// small state machine fed one payload at a time.
#[derive(Debug)]
pub(crate) struct RecordAssembler {
    expected: usize,
    sources: Vec<Vec<u8>>,
    prefix: [u8; 4],
    prefix_len: usize,
    current: Option<(usize, Vec<u8>)>,
}

impl RecordAssembler {
    pub(crate) fn new(record_type: RecordType) -> Self {
        let expected = buffer_count(record_type);
        Self {
            expected,
            sources: Vec::with_capacity(expected),
            prefix: [0; 4],
            prefix_len: 0,
            current: None,
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.sources.len() == self.expected
    }

    /// Consumes one part payload.
    ///
    /// Returns false if the payload carries bytes past the last buffer.
    pub(crate) fn feed(&mut self, mut chunk: &[u8]) -> bool {
        while !chunk.is_empty() {
            if self.is_complete() {
                return false;
            }
            match self.current.take() {
                None => {
                    let n = (4 - self.prefix_len).min(chunk.len());
                    self.prefix[self.prefix_len..self.prefix_len + n].copy_from_slice(&chunk[..n]);
                    self.prefix_len += n;
                    chunk = &chunk[n..];
                    if self.prefix_len == 4 {
                        self.prefix_len = 0;
                        let len = u32::from_le_bytes(self.prefix) as usize;
                        if len == 0 {
                            self.sources.push(Vec::new());
                        } else {
                            // Cap the reservation; a corrupt prefix must not allocate wildly.
                            self.current = Some((len, Vec::with_capacity(len.min(1 << 20))));
                        }
                    }
                }
                Some((len, mut buf)) => {
                    let n = (len - buf.len()).min(chunk.len());
                    buf.extend_from_slice(&chunk[..n]);
                    chunk = &chunk[n..];
                    if buf.len() == len {
                        self.sources.push(buf);
                    } else {
                        self.current = Some((len, buf));
                    }
                }
            }
        }
        true
    }

    pub(crate) fn into_sources(self) -> Vec<Vec<u8>> {
        self.sources
    }
}

/// A record read back as caption plus one data buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// Record type.
    pub record_type: RecordType,
    /// Record stamp.
    pub stamp: Stamp,
    /// Record identifier.
    pub id: Identifier,
    /// Caption buffer.
    pub caption: Vec<u8>,
    /// Data buffer; for increments, the state on the side of travel.
    pub data: Vec<u8>,
}

/// An increment read back with both of its states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementRecord {
    /// Record stamp.
    pub stamp: Stamp,
    /// Record identifier.
    pub id: Identifier,
    /// Caption buffer.
    pub caption: Vec<u8>,
    /// State before the change.
    pub before: Vec<u8>,
    /// State after the change.
    pub after: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn increment() -> Record {
        Record::Increment {
            caption: b"cap".to_vec(),
            before: Vec::new(),
            after: b"after".to_vec(),
        }
    }

    #[test]
    fn serialized_form() {
        let bytes = increment().serialize().unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&3u32.to_le_bytes());
        expected.extend_from_slice(b"cap");
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.extend_from_slice(&5u32.to_le_bytes());
        expected.extend_from_slice(b"after");
        assert_eq!(bytes, expected);
        assert_eq!(increment().weight(), 8);
    }

    #[test]
    fn out_record_cursor() {
        let mut out = OutRecord::new(Stamp::new(1), Identifier::default(), &increment()).unwrap();
        assert!(out.is_untouched());
        assert_eq!(out.take(5).len(), 5);
        assert_eq!(out.remaining(), out.size() - 5);
        out.take(usize::MAX);
        assert!(out.is_complete());
        out.rewind();
        assert!(out.is_untouched());
    }

    #[test]
    fn assembler_rejects_trailing_bytes() {
        let mut bytes = Record::Reference {
            caption: b"c".to_vec(),
            data: b"d".to_vec(),
        }
        .serialize()
        .unwrap();
        bytes.push(0xff);

        let mut asm = RecordAssembler::new(RecordType::Reference);
        assert!(!asm.feed(&bytes));
    }

    proptest! {
        #[test]
        fn assembler_accepts_any_split(
            caption in prop::collection::vec(any::<u8>(), 0..40),
            before in prop::collection::vec(any::<u8>(), 0..40),
            after in prop::collection::vec(any::<u8>(), 0..40),
            cut in 1usize..17,
        ) {
            let record = Record::Increment { caption: caption.clone(), before: before.clone(), after: after.clone() };
            let bytes = record.serialize().unwrap();

            let mut asm = RecordAssembler::new(RecordType::Increment);
            for chunk in bytes.chunks(cut) {
                prop_assert!(asm.feed(chunk));
            }
            prop_assert!(asm.is_complete());
            prop_assert_eq!(asm.into_sources(), vec![caption, before, after]);
        }
    }
}
