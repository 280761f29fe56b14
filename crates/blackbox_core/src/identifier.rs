//! Tagged 32-bit record identifiers.

use std::fmt;

const SOURCE_SHIFT: u32 = 28;
const COUNTER_MASK: u32 = (1 << SOURCE_SHIFT) - 1;

/// Category of the component that produced a record.
///
/// Stored in the top four bits of an [`Identifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Source {
    /// Input received by the local subsystem.
    LocalInput = 0,
    /// Output produced by the local subsystem.
    LocalOutput = 1,
    /// Input received from a remote peer.
    RemoteInput = 2,
    /// Output sent to a remote peer.
    RemoteOutput = 4,
    /// Source not known.
    Undefined = 8,
}

impl Source {
    /// Decodes the four source bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::LocalInput),
            1 => Some(Self::LocalOutput),
            2 => Some(Self::RemoteInput),
            4 => Some(Self::RemoteOutput),
            8 => Some(Self::Undefined),
            _ => None,
        }
    }

    /// Short tag used in descriptions.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::LocalInput => "li",
            Self::LocalOutput => "lo",
            Self::RemoteInput => "ri",
            Self::RemoteOutput => "ro",
            Self::Undefined => "UNDEFINED",
        }
    }
}

/// A 32-bit identifier: four source bits and a 28-bit wrapping counter.
///
/// Identifiers compare by their raw value, so by source first and counter
/// second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(u32);

impl Identifier {
    /// Largest counter value before wrapping to zero.
    pub const MAX_COUNTER: u32 = COUNTER_MASK;

    /// Creates an identifier; counter bits above 28 are dropped.
    #[must_use]
    pub const fn new(source: Source, counter: u32) -> Self {
        Self(((source as u32) << SOURCE_SHIFT) | (counter & COUNTER_MASK))
    }

    /// Wraps a raw on-disk value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw 32-bit value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Source category, or `None` for bits outside the known set.
    #[must_use]
    pub const fn source(self) -> Option<Source> {
        Source::from_bits((self.0 >> SOURCE_SHIFT) as u8)
    }

    /// The 28-bit counter.
    #[must_use]
    pub const fn counter(self) -> u32 {
        self.0 & COUNTER_MASK
    }

    /// Returns the following identifier of the same source.
    #[must_use]
    pub const fn next(self) -> Self {
        let counter = if self.counter() < COUNTER_MASK {
            self.counter() + 1
        } else {
            0
        };
        Self((self.0 & !COUNTER_MASK) | counter)
    }

    /// Advances this identifier in place.
    pub fn increment(&mut self) {
        *self = self.next();
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::new(Source::Undefined, 0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            Some(source) => write!(f, "{}:{}", source.short_name(), self.counter()),
            None => write!(f, "ERROR:{}", self.counter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn layout_of_bits() {
        let id = Identifier::new(Source::RemoteOutput, 7);
        assert_eq!(id.raw(), 0x4000_0007);
        assert_eq!(id.source(), Some(Source::RemoteOutput));
        assert_eq!(id.counter(), 7);
    }

    #[test]
    fn wraps_at_max_counter() {
        let mut id = Identifier::new(Source::LocalOutput, Identifier::MAX_COUNTER);
        id.increment();
        assert_eq!(id.counter(), 0);
        assert_eq!(id.source(), Some(Source::LocalOutput));
    }

    #[test]
    fn description() {
        assert_eq!(Identifier::new(Source::LocalInput, 12).to_string(), "li:12");
        assert_eq!(Identifier::default().to_string(), "UNDEFINED:0");
        assert_eq!(Identifier::from_raw(0x3000_0001).to_string(), "ERROR:1");
    }

    #[test]
    fn compares_source_first() {
        let a = Identifier::new(Source::LocalInput, Identifier::MAX_COUNTER);
        let b = Identifier::new(Source::LocalOutput, 0);
        assert!(a < b);
    }

    proptest! {
        #[test]
        fn next_keeps_source(counter in 0u32..=Identifier::MAX_COUNTER, bits in prop::sample::select(vec![0u8, 1, 2, 4, 8])) {
            let source = Source::from_bits(bits).unwrap();
            let next = Identifier::new(source, counter).next();
            prop_assert_eq!(next.source(), Some(source));
            prop_assert_eq!(next.counter(), (counter + 1) & Identifier::MAX_COUNTER);
        }
    }
}
