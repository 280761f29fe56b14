//! Write-side page cache.

use super::{FileAddress, LARGEST_UNUSED_SPACE};
use crate::config::DeviateDelay;
use crate::layout::{PageHeader, PartHeader, PartTag};
use crate::record::OutRecord;
use blackbox_storage::{RegionFile, StorageResult};
use std::time::Instant;

/// Staging buffer for one page.
///
/// The buffer always starts with the page header and its zero-filled
/// extension zone. Parts are appended behind them; `written` counts how
/// many bytes past the page header are already on disk, so each flush
/// writes only the new tail.
#[derive(Debug)]
pub(crate) struct PageCache {
    address: FileAddress,
    header: PageHeader,
    buf: Vec<u8>,
    written: usize,
    first_unflushed: Option<Instant>,
    delay: DeviateDelay,
}

impl PageCache {
    pub(crate) fn new(address: FileAddress, delay: DeviateDelay) -> Self {
        let mut cache = Self {
            address,
            header: PageHeader::default(),
            buf: Vec::with_capacity(address.size as usize),
            written: 0,
            first_unflushed: None,
            delay,
        };
        cache.init();
        cache
    }

    fn init(&mut self) {
        self.buf.clear();
        self.buf.extend_from_slice(&self.header.encode());
        let ext = self.header.extension_size as usize;
        self.reserve(ext);
    }

    /// Appends `n` zero bytes and returns them.
    fn reserve(&mut self, n: usize) -> &mut [u8] {
        debug_assert!(n <= self.remaining_to_fill());
        let n = n.min(self.remaining_to_fill());
        let start = self.buf.len();
        self.buf.resize(start + n, 0);
        &mut self.buf[start..]
    }

    pub(crate) fn address(&self) -> FileAddress {
        self.address
    }

    pub(crate) fn remaining_to_fill(&self) -> usize {
        self.address.size as usize - self.buf.len()
    }

    fn remaining_to_write(&self) -> usize {
        self.buf.len() - PageHeader::SIZE - self.written
    }

    fn cannot_take_more(&self) -> bool {
        self.remaining_to_fill() <= LARGEST_UNUSED_SPACE
    }

    fn fully_filled_and_written(&self) -> bool {
        self.remaining_to_fill() == 0 && self.remaining_to_write() == 0
    }

    pub(crate) fn should_flush_at(&self, now: Instant) -> bool {
        self.cannot_take_more()
            || self
                .first_unflushed
                .is_some_and(|first| now.saturating_duration_since(first) >= self.delay.get())
    }

    pub(crate) fn should_flush_now(&self) -> bool {
        self.should_flush_at(Instant::now())
    }

    /// True if the record must go through [`process_record`](Self::process_record)
    /// rather than being appended in one part.
    pub(crate) fn will_write_to_file(&self, record: &OutRecord) -> bool {
        record.remaining() + PartHeader::SIZE >= self.remaining_to_fill() || self.should_flush_now()
    }

    /// Carves one part for `record` out of the free space.
    pub(crate) fn append_part(&mut self, record: &mut OutRecord) {
        debug_assert!(PartHeader::SIZE < self.remaining_to_fill());

        let header_at = self.buf.len();
        self.reserve(PartHeader::SIZE);

        let starts = record.is_untouched();
        let n = record.remaining().min(self.remaining_to_fill());
        self.buf.extend_from_slice(record.take(n));
        let finishes = record.is_complete();

        let part = PartHeader {
            tag: PartTag::from_bounds(starts, finishes),
            record_type: record.record_type,
            stamp: record.stamp,
            id: record.id,
            size: n as u32,
        };
        self.buf[header_at..header_at + PartHeader::SIZE].copy_from_slice(&part.encode());

        self.header.add_record_time(record.stamp);
        self.first_unflushed.get_or_insert_with(Instant::now);

        if self.cannot_take_more() {
            let rest = self.remaining_to_fill();
            self.reserve(rest);
        }
    }

    /// Writes `record` through the cache, flushing page by page.
    pub(crate) fn process_record(
        &mut self,
        file: &RegionFile,
        record: &mut OutRecord,
    ) -> StorageResult<()> {
        while !record.is_complete() {
            if !self.cannot_take_more() {
                self.append_part(record);
            }
            self.write_to_file(file)?;
        }
        Ok(())
    }

    /// Flushes the unwritten tail if there is one.
    pub(crate) fn update(&mut self, file: &RegionFile) -> StorageResult<()> {
        if self.remaining_to_write() > 0 {
            self.write_to_file(file)?;
        }
        Ok(())
    }

    fn write_to_file(&mut self, file: &RegionFile) -> StorageResult<()> {
        let header_bytes = self.header.encode();
        self.buf[..PageHeader::SIZE].copy_from_slice(&header_bytes);

        let header_section = file.exclusive(self.address.offset, PageHeader::SIZE as u64)?;
        let start = PageHeader::SIZE + self.written;
        if start < self.buf.len() {
            let tail = &self.buf[start..];
            file.exclusive(self.address.offset + start as u64, tail.len() as u64)?
                .write(tail)?;
            self.written += tail.len();
        }
        header_section.write(&header_bytes)?;
        drop(header_section);
        self.first_unflushed = None;

        tracing::trace!(
            offset = self.address.offset,
            written = self.written,
            "page flushed"
        );

        if self.fully_filled_and_written() {
            self.next_page();
        }
        Ok(())
    }

    fn next_page(&mut self) {
        self.address = self.address.next();
        self.written = 0;
        self.first_unflushed = None;
        self.header = self.header.reset();
        self.init();
    }
}
