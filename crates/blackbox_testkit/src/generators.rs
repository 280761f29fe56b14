//! Property-based test generators using proptest.
//!
//! Batches produced here are always accepted by a writer: they open with
//! a reference and their stamps never decrease.

use crate::fixtures::Entry;
use blackbox_core::{Identifier, Record, Source, Stamp};
use proptest::prelude::*;

/// Stamp of the first record in a generated batch.
pub const BATCH_START: i64 = 1_000_000;

/// Strategy for identifier sources.
pub fn source_strategy() -> impl Strategy<Value = Source> {
    prop_oneof![
        Just(Source::LocalInput),
        Just(Source::LocalOutput),
        Just(Source::RemoteInput),
        Just(Source::RemoteOutput),
        Just(Source::Undefined),
    ]
}

/// Strategy for identifiers with any source and counter.
pub fn identifier_strategy() -> impl Strategy<Value = Identifier> {
    (source_strategy(), 0..=Identifier::MAX_COUNTER)
        .prop_map(|(source, counter)| Identifier::new(source, counter))
}

/// Strategy for record buffers, sometimes longer than a small page.
pub fn buffer_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        4 => prop::collection::vec(any::<u8>(), 0..64),
        1 => prop::collection::vec(any::<u8>(), 200..700),
    ]
}

/// Strategy for a reference record.
pub fn reference_strategy() -> impl Strategy<Value = Record> {
    (buffer_strategy(), buffer_strategy())
        .prop_map(|(caption, data)| Record::Reference { caption, data })
}

/// Strategy for a record of any type.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    prop_oneof![
        reference_strategy(),
        (buffer_strategy(), buffer_strategy(), buffer_strategy()).prop_map(
            |(caption, before, after)| Record::Increment {
                caption,
                before,
                after,
            }
        ),
        (buffer_strategy(), buffer_strategy())
            .prop_map(|(caption, data)| Record::IncomingPackage { caption, data }),
        (buffer_strategy(), buffer_strategy())
            .prop_map(|(caption, data)| Record::OutboxPackage { caption, data }),
    ]
}

/// Strategy for a writable batch of up to `max_len` records.
///
/// The first record is a reference. Stamps start at [`BATCH_START`] and
/// grow by 0 to 4 seconds; identifiers count up from a random start so no
/// two entries are equal.
pub fn batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<Entry>> {
    let rest = prop::collection::vec((0i64..5, record_strategy()), 0..max_len.max(1));
    (reference_strategy(), identifier_strategy(), rest).prop_map(|(first, start, rest)| {
        let mut id = start;
        let mut stamp = BATCH_START;
        let mut batch = vec![(Stamp::new(stamp), id, first)];
        for (step, record) in rest {
            stamp += step;
            id = id.next();
            batch.push((Stamp::new(stamp), id, record));
        }
        batch
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::RecordType;

    proptest! {
        #[test]
        fn batches_are_writable(batch in batch_strategy(20)) {
            prop_assert_eq!(batch[0].2.record_type(), RecordType::Reference);
            prop_assert_eq!(batch[0].0, Stamp::new(BATCH_START));
            for pair in batch.windows(2) {
                prop_assert!(pair[0].0 <= pair[1].0);
                prop_assert_ne!(&pair[0], &pair[1]);
            }
        }

        #[test]
        fn identifiers_keep_source(id in identifier_strategy()) {
            prop_assert!(id.source().is_some());
            prop_assert_eq!(id.next().source(), id.source());
        }
    }
}
