//! Test fixtures and box helpers.
//!
//! Provides a temporary box with small pages and files, so rotation and
//! multi-page records show up after a handful of writes.

use blackbox_core::{
    BlackBox, EngineConfig, Identifier, Location, ReadResult, Reader, Record, RecordType, Stamp,
    Writer, WriterConfig,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Page size used by [`TestBox::small_config`].
pub const SMALL_PAGE: u32 = 256;
/// File size used by [`TestBox::small_config`].
pub const SMALL_FILE: u64 = 4096;

/// A record as pushed to or replayed from a box.
pub type Entry = (Stamp, Identifier, Record);

/// A box in a temporary directory with automatic cleanup.
pub struct TestBox {
    /// The engine instance.
    pub engine: BlackBox,
    /// Location of the box files.
    pub location: Location,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestBox {
    /// Creates an empty box with file mask `tb-*.bbx`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = EngineConfig::new().poll_interval(Duration::from_millis(5));
        let engine = BlackBox::with_config(config);
        let location = engine.location(temp_dir.path(), "tb-", ".bbx");
        Self {
            engine,
            location,
            _temp_dir: temp_dir,
        }
    }

    /// Writer settings with 256-byte pages and 4 KiB files.
    pub fn small_config() -> WriterConfig {
        WriterConfig::new().page_size(SMALL_PAGE).file_size(SMALL_FILE)
    }

    /// Directory holding the box.
    pub fn path(&self) -> &Path {
        self.location.directory()
    }

    /// Opens a writer with [`small_config`](Self::small_config).
    pub fn writer(&self) -> Writer {
        self.writer_with(Self::small_config())
            .expect("Failed to create writer")
    }

    /// Opens a writer with the given settings.
    pub fn writer_with(&self, config: WriterConfig) -> blackbox_core::CoreResult<Writer> {
        self.engine.writer(self.location.clone(), config)
    }

    /// Opens a reader on the box.
    pub fn reader(&self) -> Reader {
        self.engine.reader(self.location.clone())
    }

    /// Names of the box files in time order.
    pub fn file_names(&self) -> Vec<String> {
        self.location
            .refresh_chain()
            .entries()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Pushes every entry, then drops the writer.
    pub fn write_all(&self, entries: &[Entry]) {
        let writer = self.writer();
        for (stamp, id, record) in entries {
            writer
                .push(*stamp, *id, record.clone())
                .expect("Failed to push record");
        }
    }

    /// Reads the whole box from the first reference forward.
    ///
    /// Writer restarts are crossed; the reference repeated at the start of
    /// a continuing file is returned once.
    pub fn replay(&self) -> Vec<Entry> {
        let reader = self.reader();
        let (begin, _) = reader.available_time_interval();
        if !reader.rewind(begin).is_ok() {
            return Vec::new();
        }
        let mut entries = vec![read_entry(&reader)];
        loop {
            match reader.next() {
                ReadResult::Success => {}
                ReadResult::NewSession | ReadResult::TimeSequenceViolation => {
                    if reader.force_next() != ReadResult::Success {
                        break;
                    }
                }
                _ => break,
            }
            let entry = read_entry(&reader);
            let repeated = entries.last().is_some_and(|last: &Entry| {
                matches!(last.2, Record::Reference { .. }) && *last == entry
            });
            if !repeated {
                entries.push(entry);
            }
        }
        entries
    }
}

impl Default for TestBox {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the record under the reader's cursor with all of its buffers.
pub fn read_entry(reader: &Reader) -> Entry {
    if reader.current_type() == Some(RecordType::Increment) {
        let inc = reader.read_increment().expect("Failed to read increment");
        let record = Record::Increment {
            caption: inc.caption,
            before: inc.before,
            after: inc.after,
        };
        return (inc.stamp, inc.id, record);
    }

    let r = reader.read_any().expect("Failed to read record");
    let record = match r.record_type {
        RecordType::Reference => Record::Reference {
            caption: r.caption,
            data: r.data,
        },
        RecordType::IncomingPackage => Record::IncomingPackage {
            caption: r.caption,
            data: r.data,
        },
        _ => Record::OutboxPackage {
            caption: r.caption,
            data: r.data,
        },
    };
    (r.stamp, r.id, record)
}

/// Shorthand for a reference record.
pub fn reference(caption: &str, data: impl Into<Vec<u8>>) -> Record {
    Record::Reference {
        caption: caption.as_bytes().to_vec(),
        data: data.into(),
    }
}

/// Shorthand for an increment record.
pub fn increment(caption: &str, before: impl Into<Vec<u8>>, after: impl Into<Vec<u8>>) -> Record {
    Record::Increment {
        caption: caption.as_bytes().to_vec(),
        before: before.into(),
        after: after.into(),
    }
}

/// Shorthand for an incoming package.
pub fn incoming(caption: &str, data: impl Into<Vec<u8>>) -> Record {
    Record::IncomingPackage {
        caption: caption.as_bytes().to_vec(),
        data: data.into(),
    }
}

/// Shorthand for an outbox package.
pub fn outbox(caption: &str, data: impl Into<Vec<u8>>) -> Record {
    Record::OutboxPackage {
        caption: caption.as_bytes().to_vec(),
        data: data.into(),
    }
}

/// Runs a test with a temporary box.
///
/// # Example
///
/// ```rust,ignore
/// use blackbox_testkit::with_test_box;
///
/// #[test]
/// fn my_test() {
///     with_test_box(|tb| {
///         assert!(tb.replay().is_empty());
///     });
/// }
/// ```
pub fn with_test_box<F, R>(f: F) -> R
where
    F: FnOnce(&TestBox) -> R,
{
    let tb = TestBox::new();
    f(&tb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_replays_nothing() {
        with_test_box(|tb| {
            assert!(tb.replay().is_empty());
            assert!(tb.file_names().is_empty());
        });
    }

    #[test]
    fn write_all_then_replay() {
        let tb = TestBox::new();
        let id = Identifier::default();
        let entries = vec![
            (Stamp::new(100), id, reference("r", "state")),
            (Stamp::new(105), id, increment("i", "state", "next")),
            (Stamp::new(107), id.next(), outbox("o", "msg")),
        ];
        tb.write_all(&entries);
        assert_eq!(tb.replay(), entries);
        assert_eq!(tb.file_names().len(), 1);
        assert!(tb.file_names()[0].starts_with("tb-"));
    }
}
