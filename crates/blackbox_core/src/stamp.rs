//! Time ordering key.

use std::fmt;

/// Epoch seconds attached to every record.
///
/// Stamps order records in time; [`mod_difference`](Self::mod_difference)
/// is the distance used by nearest-match searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Stamp(pub i64);

impl Stamp {
    /// Creates a stamp from epoch seconds.
    #[must_use]
    pub const fn new(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the epoch seconds.
    #[must_use]
    pub const fn secs(self) -> i64 {
        self.0
    }

    /// Absolute difference between two stamps.
    #[must_use]
    pub const fn mod_difference(self, other: Stamp) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// True for the zero stamp, which marks "no time recorded".
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<i64> for Stamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
