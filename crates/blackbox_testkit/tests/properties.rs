//! Property tests: whatever a writer accepts, a reader gives back.

use blackbox_core::ReadResult;
use blackbox_testkit::prelude::*;
use proptest::prelude::*;

/// Small pages, files large enough that no rotation happens.
fn single_file_config() -> WriterConfig {
    TestBox::small_config().file_size(64 * 1024 * 1024)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn replay_matches_pushed(batch in batch_strategy(40)) {
        let tb = TestBox::new();
        {
            let writer = tb.writer_with(single_file_config()).unwrap();
            for (stamp, id, record) in &batch {
                writer.push(*stamp, *id, record.clone()).unwrap();
            }
        }
        prop_assert_eq!(tb.file_names().len(), 1);
        prop_assert_eq!(tb.replay(), batch);
    }

    #[test]
    fn backward_walk_mirrors_forward(batch in batch_strategy(30)) {
        let tb = TestBox::new();
        {
            let writer = tb.writer_with(single_file_config()).unwrap();
            for (stamp, id, record) in &batch {
                writer.push(*stamp, *id, record.clone()).unwrap();
            }
        }

        let reader = tb.reader();
        let (_, end) = reader.available_time_interval();
        prop_assert!(reader.rewind_to_any(end).is_ok());
        while reader.next() == ReadResult::Success {}
        reader.set_direction(false);

        let mut ids = vec![reader.current_identifier().unwrap()];
        while reader.next() == ReadResult::Success {
            ids.push(reader.current_identifier().unwrap());
        }
        let expected: Vec<Identifier> = batch.iter().rev().map(|(_, id, _)| *id).collect();
        prop_assert_eq!(ids, expected);
    }
}
