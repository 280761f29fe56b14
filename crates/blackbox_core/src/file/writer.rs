//! Write side of one box file.

use super::{PRESENCE_LEN, PRESENCE_OFFSET};
use crate::config::{DeviateDelay, WriterConfig};
use crate::error::{CoreError, CoreResult};
use crate::extension::Extension;
use crate::layout::{FileHeader, RecordType};
use crate::location::{Location, MAX_NAME_ATTEMPTS};
use crate::page::{FileAddress, PageCache};
use crate::record::OutRecord;
use crate::stamp::Stamp;
use blackbox_storage::{LockKind, RegionFile, StorageError};
use std::io;
use std::path::Path;

/// Longest time span of one file, in seconds.
const MAX_FILE_AGE: i64 = 60 * 60;

/// Records written to the current file, per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WrittenCounts {
    /// Reference records.
    pub references: u32,
    /// Increment records.
    pub increments: u32,
    /// Incoming packages.
    pub incoming: u32,
    /// Outbox packages.
    pub outbox: u32,
}

impl WrittenCounts {
    fn add(&mut self, record_type: RecordType) {
        let slot = match record_type {
            RecordType::Reference => &mut self.references,
            RecordType::Increment => &mut self.increments,
            RecordType::IncomingPackage => &mut self.incoming,
            RecordType::OutboxPackage => &mut self.outbox,
        };
        *slot = slot.saturating_add(1);
    }
}

/// An open box file being appended to.
///
/// Only a reference may open a file, so the first record of every file
/// is a reference and `time_begin` in the header is its stamp.
#[derive(Debug)]
pub(crate) struct FileWriter {
    file: RegionFile,
    header: FileHeader,
    cache: PageCache,
    start: Stamp,
    file_size: u64,
    bytes_written: u64,
    last_was_reference: bool,
    counts: WrittenCounts,
    closed: bool,
}

impl FileWriter {
    /// Creates a new file named after `stamp` and writes its header and metadata.
    pub(crate) fn create(
        location: &Location,
        stamp: Stamp,
        config: &WriterConfig,
        delay: DeviateDelay,
    ) -> CoreResult<Self> {
        let file = create_file(location, stamp)?;
        file.hold(LockKind::Shared, PRESENCE_OFFSET, PRESENCE_LEN)?;

        let extension = Extension::current(&config.time_zone).encode()?;
        let mut header = FileHeader::new(config.page_size);
        header.extension_size = u32::try_from(extension.len())
            .map_err(|_| CoreError::invalid_config("time zone name too long"))?;

        file.exclusive(0, FileHeader::SIZE as u64)?
            .write(&header.encode())?;
        file.exclusive(FileHeader::SIZE as u64, extension.len() as u64)?
            .write(&extension)?;

        let first_page = FileAddress::new(header.header_size(), u64::from(config.page_size));
        tracing::info!(path = %file.path().display(), "box file created");

        Ok(Self {
            file,
            header,
            cache: PageCache::new(first_page, delay),
            start: stamp,
            file_size: config.file_size,
            bytes_written: 0,
            last_was_reference: false,
            counts: WrittenCounts::default(),
            closed: false,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }

    pub(crate) fn counts(&self) -> WrittenCounts {
        self.counts
    }

    /// Appends `record`, or stages it in the page cache.
    pub(crate) fn write_record(&mut self, record: &mut OutRecord) -> CoreResult<()> {
        if record.record_type == RecordType::Reference {
            if self.counts.references == 0 {
                self.header.time_begin = record.stamp.secs();
            }
        } else if self.counts.references == 0 {
            return Err(CoreError::NoReference);
        }
        if self.closed {
            return Err(CoreError::invalid_state("file already closed"));
        }

        self.header.time_end = record.stamp.secs();
        if self.cache.will_write_to_file(record) {
            let header_section = self.file.exclusive(0, FileHeader::SIZE as u64)?;
            self.cache.process_record(&self.file, record)?;
            header_section.write(&self.header.encode())?;
        } else {
            self.cache.append_part(record);
        }

        self.last_was_reference = record.record_type == RecordType::Reference;
        self.bytes_written += record.size() as u64;
        self.counts.add(record.record_type);
        Ok(())
    }

    /// True once the file is old or large enough, right after a reference.
    pub(crate) fn time_to_close(&self, stamp: Stamp) -> bool {
        let ready = self.last_was_reference && self.counts.references > 1;
        ready && (self.exceeds_age(stamp) || self.bytes_written >= self.file_size)
    }

    fn exceeds_age(&self, stamp: Stamp) -> bool {
        let now = stamp.secs();
        let start = self.start.secs();
        now - start >= MAX_FILE_AGE || now - now.rem_euclid(MAX_FILE_AGE) > start
    }

    /// Writes the cache tail and header if due, or always when `force` is set.
    pub(crate) fn update(&mut self, force: bool) -> CoreResult<()> {
        if self.closed || !(force || self.cache.should_flush_now()) {
            return Ok(());
        }
        let header_section = self.file.exclusive(0, FileHeader::SIZE as u64)?;
        self.cache.update(&self.file)?;
        header_section.write(&self.header.encode())?;
        drop(header_section);
        self.file.sync()?;
        Ok(())
    }

    /// Final flush. The file stays readable but accepts no more records.
    pub(crate) fn close(&mut self) -> CoreResult<()> {
        self.update(true)?;
        self.closed = true;
        tracing::debug!(
            path = %self.file.path().display(),
            bytes = self.bytes_written,
            "box file closed"
        );
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                tracing::warn!(path = %self.file.path().display(), error = %e, "final flush failed");
            }
        }
    }
}

fn create_file(location: &Location, stamp: Stamp) -> CoreResult<RegionFile> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        match RegionFile::create_new(&location.file_path(stamp, attempt)) {
            Ok(file) => return Ok(file),
            Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(CoreError::FileCreation {
        name: location.file_name(stamp, 0),
        attempts: MAX_NAME_ATTEMPTS,
    })
}
