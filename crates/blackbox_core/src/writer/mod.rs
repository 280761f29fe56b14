//! Writer: the single appender of a box.
//!
//! Callers push records from any thread. Each push is validated, queued
//! and written by one background thread, which owns the open file and
//! performs rotation and retention.
//!
//! # Example
//!
//! ```rust,ignore
//! use blackbox_core::{BlackBox, Identifier, Stamp, WriterConfig};
//!
//! let bb = BlackBox::new();
//! let writer = bb.writer(bb.location("/var/log/box", "unit-", ".bbx"), WriterConfig::new())?;
//! writer.push_reference(Stamp::new(100), Identifier::default(), "state", b"...".to_vec())?;
//! writer.push_incoming_package(Stamp::new(101), Identifier::default(), "msg", b"hello".to_vec())?;
//! writer.flush()?;
//! ```

mod queue;
mod worker;

use crate::config::{
    check_disk_limit, clamp_page_size, parse_disk_limit, DeviateDelay, WriterConfig,
};
use crate::error::{CoreError, CoreResult};
use crate::file::WrittenCounts;
use crate::identifier::Identifier;
use crate::layout::RecordType;
use crate::location::Location;
use crate::marker::WriterMarker;
use crate::record::Record;
use crate::stamp::Stamp;
use parking_lot::Mutex;
use queue::{Shared, Task};
use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use worker::Worker;

/// Queued bytes allowed per page of page size before pushes block.
const QUEUE_PAGES: usize = 64;

/// Appends records to a box.
///
/// Dropping the writer finishes every accepted record, flushes the last
/// file and releases the presence marker.
#[derive(Debug)]
pub struct Writer {
    location: Location,
    shared: Arc<Shared>,
    settings: Arc<Mutex<WriterConfig>>,
    last_reference: Mutex<Option<Stamp>>,
    worker: Option<JoinHandle<()>>,
    _marker: WriterMarker,
}

impl Writer {
    pub(crate) fn create(
        location: Location,
        config: WriterConfig,
        delay: DeviateDelay,
    ) -> CoreResult<Self> {
        if location.is_empty() {
            return Err(CoreError::invalid_config("location has no directory"));
        }
        let config = config.validated()?;
        fs::create_dir_all(location.directory())?;
        let marker = WriterMarker::acquire(&location)?;
        tracing::debug!(marker = %marker.path().display(), "writer marker acquired");

        let shared = Arc::new(Shared::default());
        let settings = Arc::new(Mutex::new(config));
        let worker = Worker::new(
            location.clone(),
            Arc::clone(&shared),
            Arc::clone(&settings),
            delay,
        );
        let handle = thread::Builder::new()
            .name("blackbox-writer".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            location,
            shared,
            settings,
            last_reference: Mutex::new(None),
            worker: Some(handle),
            _marker: marker,
        })
    }

    /// Box this writer appends to.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Queues `record`.
    ///
    /// Blocks while too many bytes are waiting to be written. The first
    /// reference is flushed before returning so readers see the new file.
    ///
    /// # Errors
    ///
    /// - [`CoreError::WriterDead`] after an earlier write failure
    /// - [`CoreError::NoReference`] for a non-reference before any reference
    /// - [`CoreError::RecordTooLarge`] if a buffer exceeds `u32::MAX` bytes
    pub fn push(&self, stamp: Stamp, id: Identifier, record: Record) -> CoreResult<()> {
        self.ensure_alive()?;
        record.validate()?;

        let is_reference = record.record_type() == RecordType::Reference;
        let first = self.last_reference.lock().is_none();
        if first && !is_reference {
            return Err(CoreError::NoReference);
        }

        let cap = self.settings.lock().page_size as usize * QUEUE_PAGES;
        if !self.shared.push_write(Task { stamp, id, record }, cap) {
            return Err(self.dead_error());
        }
        if is_reference {
            *self.last_reference.lock() = Some(stamp);
        }
        if first {
            self.flush()?;
        }
        Ok(())
    }

    /// Queues a reference.
    pub fn push_reference(
        &self,
        stamp: Stamp,
        id: Identifier,
        caption: impl Into<Vec<u8>>,
        data: impl Into<Vec<u8>>,
    ) -> CoreResult<()> {
        let record = Record::Reference {
            caption: caption.into(),
            data: data.into(),
        };
        self.push(stamp, id, record)
    }

    /// Queues an increment.
    pub fn push_increment(
        &self,
        stamp: Stamp,
        id: Identifier,
        caption: impl Into<Vec<u8>>,
        before: impl Into<Vec<u8>>,
        after: impl Into<Vec<u8>>,
    ) -> CoreResult<()> {
        let record = Record::Increment {
            caption: caption.into(),
            before: before.into(),
            after: after.into(),
        };
        self.push(stamp, id, record)
    }

    /// Queues an incoming package.
    pub fn push_incoming_package(
        &self,
        stamp: Stamp,
        id: Identifier,
        caption: impl Into<Vec<u8>>,
        data: impl Into<Vec<u8>>,
    ) -> CoreResult<()> {
        let record = Record::IncomingPackage {
            caption: caption.into(),
            data: data.into(),
        };
        self.push(stamp, id, record)
    }

    /// Queues an outbox package.
    pub fn push_outbox_package(
        &self,
        stamp: Stamp,
        id: Identifier,
        caption: impl Into<Vec<u8>>,
        data: impl Into<Vec<u8>>,
    ) -> CoreResult<()> {
        let record = Record::OutboxPackage {
            caption: caption.into(),
            data: data.into(),
        };
        self.push(stamp, id, record)
    }

    /// Waits until every queued record and the page cache are on disk.
    pub fn flush(&self) -> CoreResult<()> {
        self.ensure_alive()?;
        let Some(done) = self.shared.push_flush() else {
            return Ok(());
        };
        if done.recv().is_err() {
            return Err(CoreError::invalid_state("writer thread stopped"));
        }
        self.ensure_alive()
    }

    /// True if no reference was pushed yet or `now` has reached the next
    /// reference moment.
    #[must_use]
    pub fn need_reference(&self, now: Stamp) -> bool {
        let Some(last) = *self.last_reference.lock() else {
            return true;
        };
        now >= next_reference_moment(last, self.reference_interval())
    }

    /// Records written to the current file, per type.
    #[must_use]
    pub fn written_counts(&self) -> WrittenCounts {
        *self.shared.counts.lock()
    }

    /// True once a write failed; the writer accepts nothing further.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.shared.is_dead()
    }

    /// Diagnostic of the failure that killed the writer.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error()
    }

    fn ensure_alive(&self) -> CoreResult<()> {
        if self.is_dead() {
            Err(self.dead_error())
        } else {
            Ok(())
        }
    }

    fn dead_error(&self) -> CoreError {
        CoreError::WriterDead {
            message: self.last_error().unwrap_or_default(),
        }
    }

    // Settings apply to the next file.

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> WriterConfig {
        self.settings.lock().clone()
    }

    fn change(&self, apply: impl FnOnce(&mut WriterConfig)) -> CoreResult<()> {
        let mut settings = self.settings.lock();
        let mut candidate = settings.clone();
        apply(&mut candidate);
        *settings = candidate.validated()?;
        Ok(())
    }

    /// Page size in bytes.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.settings.lock().page_size
    }

    /// Sets the page size; the value is clamped and the file size re-rounded.
    pub fn set_page_size(&self, size: u64) -> CoreResult<()> {
        let size = clamp_page_size(size);
        self.change(|c| c.page_size = size)
    }

    /// Recommended file size in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.settings.lock().file_size
    }

    /// Sets the recommended file size; the value is rounded to whole pages.
    pub fn set_file_size(&self, size: u64) -> CoreResult<()> {
        self.change(|c| c.file_size = size)
    }

    /// Disk quota in bytes.
    #[must_use]
    pub fn disk_limit(&self) -> u64 {
        self.settings.lock().disk_limit
    }

    /// Sets the disk quota.
    ///
    /// # Errors
    ///
    /// Rejects a quota below twice the file size or above 1 PiB.
    pub fn set_disk_limit(&self, limit: u64) -> CoreResult<()> {
        check_disk_limit(limit, self.file_size())?;
        self.change(|c| c.disk_limit = limit)
    }

    /// Sets the disk quota from text such as `"20G"`.
    pub fn set_disk_limit_text(&self, text: &str) -> CoreResult<()> {
        self.set_disk_limit(parse_disk_limit(text)?)
    }

    /// Retention lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.settings.lock().lifetime
    }

    /// Sets the retention lifetime.
    pub fn set_lifetime(&self, lifetime: Duration) -> CoreResult<()> {
        self.change(|c| c.lifetime = lifetime)
    }

    /// Time zone written into new files.
    #[must_use]
    pub fn time_zone(&self) -> String {
        self.settings.lock().time_zone.clone()
    }

    /// Sets the time zone written into new files.
    pub fn set_time_zone(&self, tz: impl Into<String>) -> CoreResult<()> {
        let tz = tz.into();
        self.change(|c| c.time_zone = tz)
    }

    /// Spacing between suggested references.
    #[must_use]
    pub fn reference_interval(&self) -> Duration {
        self.settings.lock().reference_interval
    }

    /// Sets the spacing between suggested references.
    pub fn set_reference_interval(&self, interval: Duration) -> CoreResult<()> {
        self.change(|c| c.reference_interval = interval)
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        self.shared.shutdown();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::warn!("writer thread panicked");
            }
        }
    }
}

/// First multiple of `interval` at least half an interval after `last`.
#[must_use]
pub fn next_reference_moment(last: Stamp, interval: Duration) -> Stamp {
    let step = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX).max(1);
    let moment = last.secs().saturating_add(step.saturating_mul(3) / 2);
    Stamp::new(moment - moment.rem_euclid(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainRegistry;
    use std::path::Path;
    use tempfile::tempdir;

    fn location(dir: &Path) -> Location {
        let registry = Arc::new(ChainRegistry::new(Duration::from_secs(1)));
        Location::new(registry, dir, "wr-", ".bbx")
    }

    fn writer(dir: &Path) -> Writer {
        let config = WriterConfig::new().page_size(256).file_size(4096);
        Writer::create(
            location(dir),
            config,
            DeviateDelay::new(Duration::from_millis(30)),
        )
        .unwrap()
    }

    #[test]
    fn reference_moments() {
        let interval = Duration::from_secs(300);
        assert_eq!(next_reference_moment(Stamp::new(100), interval), Stamp::new(300));
        assert_eq!(next_reference_moment(Stamp::new(300), interval), Stamp::new(600));
        assert_eq!(next_reference_moment(Stamp::new(449), interval), Stamp::new(600));
        assert_eq!(next_reference_moment(Stamp::new(450), interval), Stamp::new(900));
    }

    #[test]
    fn increment_before_reference_rejected() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        assert!(writer.need_reference(Stamp::new(1)));
        assert!(matches!(
            writer.push_increment(Stamp::new(1), Identifier::default(), "c", "b", "a"),
            Err(CoreError::NoReference)
        ));

        writer
            .push_reference(Stamp::new(100), Identifier::default(), "c", "d")
            .unwrap();
        assert!(!writer.need_reference(Stamp::new(299)));
        assert!(writer.need_reference(Stamp::new(300)));
        writer
            .push_increment(Stamp::new(110), Identifier::default(), "c", "b", "a")
            .unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written_counts().references, 1);
        assert_eq!(writer.written_counts().increments, 1);
    }

    #[test]
    fn rejected_reference_keeps_schedule() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        writer
            .push_reference(Stamp::new(100), Identifier::default(), "c", "d")
            .unwrap();

        writer.shared.shutdown();
        assert!(matches!(
            writer.push_reference(Stamp::new(1000), Identifier::default(), "c", "d"),
            Err(CoreError::WriterDead { .. })
        ));
        assert!(writer.need_reference(Stamp::new(300)));
    }

    #[test]
    fn first_reference_visible_without_flush() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        writer
            .push_reference(Stamp::new(100), Identifier::default(), "c", "d")
            .unwrap();
        let chain = writer.location().refresh_chain();
        assert_eq!(chain.len(), 1);
        assert!(chain.entries()[0].size() > 24);
    }

    #[test]
    fn second_writer_refused_until_drop() {
        let dir = tempdir().unwrap();
        let first = writer(dir.path());
        let config = WriterConfig::new();
        let delay = DeviateDelay::new(Duration::from_millis(30));
        assert!(matches!(
            Writer::create(location(dir.path()), config.clone(), delay.clone()),
            Err(CoreError::WriterActive { .. })
        ));
        drop(first);
        assert!(Writer::create(location(dir.path()), config, delay).is_ok());
    }

    #[test]
    fn settings_validated() {
        let dir = tempdir().unwrap();
        let writer = writer(dir.path());
        assert_eq!(writer.file_size(), 56 + 15 * 256);

        assert!(writer.set_disk_limit(1000).is_err());
        assert!(writer.set_disk_limit_text("1.5G").is_err());
        writer.set_disk_limit_text("1M").unwrap();
        assert_eq!(writer.disk_limit(), 1 << 20);

        writer.set_page_size(10).unwrap();
        assert_eq!(writer.page_size(), 256);
        assert!(writer.set_lifetime(Duration::ZERO).is_err());
        writer.set_time_zone("Asia/Tokyo").unwrap();
        assert_eq!(writer.config().time_zone, "Asia/Tokyo");
    }

    #[test]
    fn missing_directory_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let writer = writer(&nested);
        assert!(nested.is_dir());
        assert!(writer.location().marker_path().exists());
        drop(writer);
        assert!(!nested.join("~wr-.bbx").exists());
    }
}
