//! End-to-end scenarios: writers and readers on a real directory.

use blackbox_core::{CoreError, FileSummary, PartTag, ReadResult, RecordType};
use blackbox_testkit::prelude::*;

fn minute(i: i64) -> Stamp {
    Stamp::new(1_000_000 + 60 * i)
}

/// References of 3000 bytes, so every second one rotates a small file.
fn push_big_references(writer: &blackbox_core::Writer, range: std::ops::Range<i64>) {
    for i in range {
        writer
            .push(minute(i), Identifier::default(), reference("ref", vec![i as u8; 3000]))
            .unwrap();
    }
    writer.flush().unwrap();
}

#[test]
fn forward_replay_in_order() {
    let tb = TestBox::new();
    let id = Identifier::new(Source::LocalInput, 1);
    let entries = vec![
        (Stamp::new(100), id, reference("r", "s0")),
        (Stamp::new(110), id.next(), incoming("in", "p")),
        (Stamp::new(120), id.next().next(), increment("i", "s0", "s1")),
    ];
    tb.write_all(&entries);
    assert_eq!(tb.replay(), entries);
}

#[test]
fn backward_increment_yields_previous_state() {
    let tb = TestBox::new();
    tb.write_all(&[
        (Stamp::new(100), Identifier::default(), reference("r", "s")),
        (Stamp::new(110), Identifier::default(), increment("i", "b", "a")),
    ]);

    let reader = tb.reader();
    reader.set_direction(false);
    assert_eq!(reader.rewind_to_any(Stamp::new(110)), ReadResult::Success);
    assert_eq!(reader.read_any().unwrap().data, b"b");
    assert_eq!(reader.next(), ReadResult::Success);
    assert_eq!(reader.current_type(), Some(RecordType::Reference));
    assert_eq!(reader.next(), ReadResult::NoDataAvailable);
}

#[test]
fn restart_is_reported_as_new_session() {
    let tb = TestBox::new();
    tb.write_all(&[
        (Stamp::new(100), Identifier::default(), reference("r", "a")),
        (Stamp::new(110), Identifier::default(), outbox("o", "x")),
        (Stamp::new(200), Identifier::default(), reference("r", "b")),
    ]);
    tb.write_all(&[(Stamp::new(5000), Identifier::default(), reference("r", "c"))]);
    assert_eq!(tb.file_names().len(), 2);

    let reader = tb.reader();
    assert_eq!(reader.rewind(Stamp::new(100)), ReadResult::Success);
    assert_eq!(reader.next(), ReadResult::Success);
    assert_eq!(reader.next(), ReadResult::Success);
    assert_eq!(reader.current_stamp(), Some(Stamp::new(200)));

    assert_eq!(reader.next(), ReadResult::NewSession);
    assert_eq!(reader.current_stamp(), Some(Stamp::new(200)));
    assert_eq!(reader.force_next(), ReadResult::Success);
    assert_eq!(reader.current_stamp(), Some(Stamp::new(5000)));
    assert_eq!(reader.read_reference().unwrap().data, b"c");

    reader.set_direction(false);
    assert_eq!(reader.next(), ReadResult::NewSession);
}

#[test]
fn disk_limit_below_two_files_rejected() {
    let tb = TestBox::new();
    let result = tb.writer_with(TestBox::small_config().disk_limit(1000));
    assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));

    let writer = tb.writer();
    let before = writer.disk_limit();
    assert!(writer.set_disk_limit(100).is_err());
    assert_eq!(writer.disk_limit(), before);
    writer.set_disk_limit_text("1M").unwrap();
    assert_eq!(writer.disk_limit(), 1 << 20);
}

#[test]
fn identifier_counter_wraps() {
    let tb = TestBox::new();
    let last = Identifier::new(Source::LocalOutput, Identifier::MAX_COUNTER);
    tb.write_all(&[
        (Stamp::new(100), last, reference("r", "s")),
        (Stamp::new(101), last.next(), outbox("o", "m")),
    ]);

    let ids: Vec<Identifier> = tb.replay().into_iter().map(|(_, id, _)| id).collect();
    assert_eq!(ids[0].counter(), Identifier::MAX_COUNTER);
    assert_eq!(ids[1].counter(), 0);
    assert_eq!(ids[1].source(), Some(Source::LocalOutput));
}

#[test]
fn record_spanning_many_pages() {
    let tb = TestBox::new();
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let entries = vec![
        (Stamp::new(100), Identifier::default(), reference("big", data.clone())),
        (Stamp::new(101), Identifier::default(), incoming("small", "x")),
    ];
    tb.write_all(&entries);
    assert_eq!(tb.replay(), entries);

    let path = tb.location.refresh_chain().earliest().unwrap();
    let summary = FileSummary::read(&path).unwrap();
    assert!(summary.pages.len() > 20);
    let first = summary.pages[0].parts[0];
    assert_eq!(first.tag, PartTag::Begin);
}

#[test]
fn rewind_is_idempotent() {
    let tb = TestBox::new();
    tb.write_all(&[
        (Stamp::new(100), Identifier::default(), reference("r", "a")),
        (Stamp::new(110), Identifier::default(), outbox("o", "x")),
        (Stamp::new(120), Identifier::default(), reference("r", "b")),
        (Stamp::new(130), Identifier::default(), outbox("o", "y")),
    ]);

    let reader = tb.reader();
    let first = reader.rewind(Stamp::new(125));
    let cursor = reader.current_cursor();
    assert!(first.is_ok());
    assert_eq!(reader.current_type(), Some(RecordType::Reference));

    assert_eq!(reader.rewind(Stamp::new(125)), first);
    assert_eq!(reader.current_cursor(), cursor);
    assert_eq!(reader.rewind(Stamp::new(120)), ReadResult::Success);
}

#[test]
fn rotated_files_continue_each_other() {
    let tb = TestBox::new();
    let writer = tb.writer();
    for i in 0..5 {
        writer
            .push(minute(i), Identifier::default(), reference("ref", vec![1u8; 3000]))
            .unwrap();
        writer
            .push(minute(i), Identifier::default(), outbox("o", vec![2u8; 40]))
            .unwrap();
    }
    drop(writer);

    let chain = tb.location.refresh_chain();
    assert!(chain.len() > 1);
    let summaries: Vec<FileSummary> = chain
        .entries()
        .iter()
        .map(|e| FileSummary::read(&tb.path().join(e.name())).unwrap())
        .collect();

    for summary in &summaries {
        let first = summary.pages[0].parts[0];
        assert!(first.tag.contains_beginning());
        assert_eq!(first.record_type, RecordType::Reference);
        assert_eq!(summary.extension.time_zone, "");
    }
    for pair in summaries.windows(2) {
        assert_eq!(pair[1].header.time_begin, pair[0].header.time_end);
    }

    // The repeated boundary reference is read once.
    let replayed = tb.replay();
    assert_eq!(replayed.len(), 10);
    assert!(replayed.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[test]
fn retention_keeps_box_under_limit() {
    let tb = TestBox::new();
    let writer = tb
        .writer_with(TestBox::small_config().disk_limit(8192))
        .unwrap();
    push_big_references(&writer, 0..8);
    drop(writer);

    let chain = tb.location.refresh_chain();
    assert_eq!(chain.len(), 2);
    let earliest = FileSummary::read(&chain.earliest().unwrap()).unwrap();
    assert_eq!(earliest.header.time_begin, minute(6).secs());

    let reader = tb.reader();
    let (begin, end) = reader.available_time_interval();
    assert_eq!((begin, end), (minute(6), minute(7)));
}

#[test]
fn retention_spares_file_in_use() {
    let tb = TestBox::new();
    let writer = tb
        .writer_with(TestBox::small_config().disk_limit(8192))
        .unwrap();
    push_big_references(&writer, 0..2);
    let first = tb.file_names()[0].clone();

    let reader = tb.reader();
    assert_eq!(reader.rewind(minute(0)), ReadResult::Success);
    push_big_references(&writer, 2..3);
    assert!(tb.file_names().contains(&first));

    drop(reader);
    push_big_references(&writer, 3..4);
    assert!(!tb.file_names().contains(&first));
}

#[test]
fn reader_follows_live_writer() {
    let tb = TestBox::new();
    let writer = tb.writer();
    writer
        .push(Stamp::new(100), Identifier::default(), reference("r", "s"))
        .unwrap();
    writer
        .push(Stamp::new(110), Identifier::default(), incoming("in", "1"))
        .unwrap();
    writer.flush().unwrap();

    let reader = tb.reader();
    assert!(reader.exists_actual_writer());
    assert_eq!(reader.rewind(Stamp::new(100)), ReadResult::Success);
    assert_eq!(reader.next(), ReadResult::Success);
    assert_eq!(reader.next(), ReadResult::NoDataAvailable);

    writer
        .push(Stamp::new(120), Identifier::default(), incoming("in", "2"))
        .unwrap();
    writer.flush().unwrap();
    assert_eq!(reader.next(), ReadResult::Success);
    assert_eq!(reader.read_package().unwrap().data, b"2");

    drop(writer);
    assert!(!reader.exists_actual_writer());
}
