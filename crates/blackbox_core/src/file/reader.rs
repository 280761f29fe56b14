//! Read side of one box file.
//!
//! Pages are addressed by index; every page is loaded on demand into a
//! [`PageIndex`]. Only the page under the cursor is kept.

use super::{Cursor, MIN_READABLE_SIZE, PRESENCE_LEN, PRESENCE_OFFSET};
use crate::config::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::extension::Extension;
use crate::layout::{FileHeader, PartHeader, RecordType};
use crate::page::{FileAddress, PageIndex};
use crate::reader::ReadResult;
use crate::record::RecordAssembler;
use crate::stamp::Stamp;
use blackbox_storage::{AccessMode, LockKind, RegionFile};
use std::path::Path;

#[derive(Debug)]
pub(crate) struct FileReader {
    file: RegionFile,
    header: FileHeader,
    extension: Extension,
    cursor: Cursor,
    page: PageIndex,
}

impl FileReader {
    /// Opens `path` and reads its header, metadata and first page.
    pub(crate) fn open(path: &Path) -> Result<Self, ReadResult> {
        let file =
            RegionFile::open(path, AccessMode::Read).map_err(|_| ReadResult::ErrorOpeningFile)?;
        file.hold(LockKind::Shared, PRESENCE_OFFSET, PRESENCE_LEN)
            .map_err(|_| ReadResult::ErrorOpeningFile)?;

        let header = read_header(&file).ok_or(ReadResult::ReadingFileHeader)?;
        let len = file.len().map_err(|_| ReadResult::ReadingFileHeader)?;
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&header.page_size)
            || header.extension_size == 0
            || header.header_size() > len
        {
            return Err(ReadResult::BadPageHeader);
        }

        let extension = read_extension(&file, &header)?;
        if !extension.is_supported() {
            return Err(ReadResult::VersionNotSupported);
        }

        let mut reader = Self {
            file,
            header,
            extension,
            cursor: Cursor::default(),
            page: PageIndex::default(),
        };
        let first = reader.load(0);
        if !first.valid() {
            return Err(ReadResult::PageRead);
        }
        reader.page = first;
        Ok(reader)
    }

    pub(crate) fn path(&self) -> &Path {
        self.file.path()
    }

    pub(crate) fn header(&self) -> FileHeader {
        self.header
    }

    pub(crate) fn extension(&self) -> &Extension {
        &self.extension
    }

    pub(crate) fn starts_from(&self) -> Stamp {
        Stamp::new(self.header.time_begin)
    }

    pub(crate) fn ends_with(&self) -> Stamp {
        Stamp::new(self.header.time_end)
    }

    pub(crate) fn file_size(&self) -> u64 {
        self.file.len().unwrap_or(0)
    }

    pub(crate) fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Number of pages, counting a partially written last page.
    pub(crate) fn page_count(&self) -> usize {
        let size = u64::from(self.header.page_size);
        let data = self.file_size().saturating_sub(self.header.header_size());
        data.div_ceil(size) as usize
    }

    fn address(&self, page: usize) -> FileAddress {
        let size = u64::from(self.header.page_size);
        FileAddress::new(self.header.header_size() + page as u64 * size, size)
    }

    pub(crate) fn load(&self, page: usize) -> PageIndex {
        PageIndex::load(&self.file, self.address(page))
    }

    fn current_part(&self) -> Option<PartHeader> {
        self.page.part(self.cursor.part).map(|p| p.header)
    }

    pub(crate) fn current_stamp(&self) -> Option<Stamp> {
        self.current_part().map(|p| p.stamp)
    }

    pub(crate) fn current_header(&self) -> Option<PartHeader> {
        self.current_part()
    }

    /// Re-reads the file header and the parts added to the current page.
    pub(crate) fn update(&mut self) -> bool {
        if let Some(header) = read_header(&self.file) {
            self.header = header;
        }
        self.page.update(&self.file)
    }

    /// Cursor sits on the last part of a page that was cut short.
    pub(crate) fn comes_to_truncated(&self) -> bool {
        self.page.contains_truncation_after(self.cursor.part)
    }

    fn set_part(&mut self, part: usize) -> ReadResult {
        match self.page.part(part) {
            Some(p) if p.header.tag.contains_beginning() => {
                self.cursor.part = part;
                ReadResult::Success
            }
            _ => ReadResult::NotContainsBeginning,
        }
    }

    fn set_page_part(&mut self, index: usize, page: PageIndex, part: usize) -> ReadResult {
        match page.part(part) {
            Some(p) if p.header.tag.contains_beginning() => {
                self.page = page;
                self.cursor = Cursor { page: index, part };
                ReadResult::Success
            }
            _ => ReadResult::NotContainsBeginning,
        }
    }

    /// Lands on the first record, or on the last one.
    pub(crate) fn rewind_to_extreme(&mut self, to_start: bool) -> bool {
        let count = self.page_count();
        if self.file_size() <= MIN_READABLE_SIZE || count == 0 {
            return false;
        }

        if to_start {
            let page = self.load(0);
            if !page.is_readable() {
                return false;
            }
            return self.set_page_part(0, page, 0).is_ok();
        }

        for index in (0..count).rev() {
            let page = self.load(index);
            if let Some(part) = page.last_record() {
                return self.set_page_part(index, page, part).is_ok();
            }
        }
        false
    }

    /// First page whose last stamp is not before `stamp`, or the last page.
    fn bound_page(&self, stamp: Stamp) -> Option<usize> {
        let count = self.page_count();
        if count == 0 {
            return None;
        }
        let (mut lo, mut hi) = (0, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.load(mid).ends_before(stamp) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Some(lo.min(count - 1))
    }

    /// Lands on the reference closest to `stamp`.
    pub(crate) fn rewind_to_stamp(&mut self, stamp: Stamp) -> bool {
        let Some(bound) = self.bound_page(stamp) else {
            return false;
        };
        let count = self.page_count();

        let forward = (bound..count)
            .map(|i| (i, self.load(i)))
            .find(|(_, page)| page.contains_reference_beginning());
        let backward = (0..bound)
            .rev()
            .map(|i| (i, self.load(i)))
            .find(|(_, page)| page.contains_reference_beginning());

        let chosen = match (forward, backward) {
            (Some(f), Some(b)) => {
                if f.0 - bound < bound - b.0 {
                    f
                } else {
                    b
                }
            }
            (Some(f), None) => f,
            (None, Some(b)) => b,
            (None, None) => return false,
        };

        let (index, page) = chosen;
        match page.closest_reference_part(stamp) {
            Some(part) => self.set_page_part(index, page, part).is_ok(),
            None => false,
        }
    }

    /// Lands on the record of any type closest to `stamp`.
    ///
    /// Pages at and before the bound are searched first, so a record
    /// that precedes `stamp` is preferred.
    pub(crate) fn rewind_to_any(&mut self, stamp: Stamp) -> bool {
        let Some(bound) = self.bound_page(stamp) else {
            return false;
        };
        let count = self.page_count();

        let found = (0..=bound)
            .rev()
            .chain(bound + 1..count)
            .map(|i| (i, self.load(i)))
            .find(|(_, page)| page.contains_any_beginning());

        let Some((index, page)) = found else {
            return false;
        };
        match page.closest_any_part(stamp) {
            Some(part) => self.set_page_part(index, page, part).is_ok(),
            None => false,
        }
    }

    /// Moves to a saved position.
    pub(crate) fn rewind_to_cursor(&mut self, target: Cursor) -> ReadResult {
        if target.page == self.cursor.page && target.part < self.page.len() {
            return self.set_part(target.part);
        }
        let page = self.load(target.page);
        if !page.valid() {
            return ReadResult::ReadingPageHeader;
        }
        self.set_page_part(target.page, page, target.part)
    }

    /// True if a record starts after (or before) the cursor in this file.
    pub(crate) fn has_more_records(&self, forward: bool) -> bool {
        let part = self.cursor.part;
        if forward {
            if self.page.contains_beginning_after(part) {
                return true;
            }
            !self.comes_to_truncated()
                && (self.cursor.page + 1..self.page_count())
                    .any(|i| self.load(i).contains_any_beginning())
        } else {
            self.page.contains_beginning_before(part)
                || (0..self.cursor.page).any(|i| self.load(i).contains_any_beginning())
        }
    }

    /// Steps to the neighbouring record in this file.
    ///
    /// In normal mode a neighbour that breaks time order is refused with
    /// [`ReadResult::TimeSequenceViolation`]. In forced mode only such a
    /// neighbour is taken; an ordinary one yields
    /// [`ReadResult::NormalSequenceFound`].
    pub(crate) fn move_to_next_record(&mut self, forward: bool, normal: bool) -> ReadResult {
        let Some(old) = self.current_stamp() else {
            return ReadResult::BadPageHeader;
        };
        let part = self.cursor.part;

        if forward {
            if self.comes_to_truncated() {
                ReadResult::NoDataAvailable
            } else if self.page.contains_beginning_after(part) {
                self.step_in_page(part + 1, old, true, normal)
            } else {
                self.set_following_page(old, normal)
            }
        } else if self.page.contains_beginning_before(part) {
            self.step_in_page(part - 1, old, false, normal)
        } else {
            self.set_preceding_page(old, normal)
        }
    }

    fn step_in_page(&mut self, part: usize, old: Stamp, forward: bool, normal: bool) -> ReadResult {
        let Some(new) = self.page.part(part).map(|p| p.header.stamp) else {
            return ReadResult::NotContainsBeginning;
        };
        match order_check(new, old, forward, normal) {
            None => self.set_part(part),
            Some(refused) => refused,
        }
    }

    fn step_to_page(
        &mut self,
        index: usize,
        page: PageIndex,
        part: usize,
        old: Stamp,
        forward: bool,
        normal: bool,
    ) -> ReadResult {
        let Some(new) = page.part(part).map(|p| p.header.stamp) else {
            return ReadResult::NotContainsBeginning;
        };
        match order_check(new, old, forward, normal) {
            None => self.set_page_part(index, page, part),
            Some(refused) => refused,
        }
    }

    fn set_following_page(&mut self, old: Stamp, normal: bool) -> ReadResult {
        // The file may have grown since the page count was last taken.
        if let Some(header) = read_header(&self.file) {
            self.header = header;
        }
        for index in self.cursor.page + 1..self.page_count() {
            let page = self.load(index);
            if !page.valid() {
                return ReadResult::ReadingPageHeader;
            }
            if let Some(part) = page.first_record() {
                return self.step_to_page(index, page, part, old, true, normal);
            }
        }
        ReadResult::PageNotFound
    }

    fn set_preceding_page(&mut self, old: Stamp, normal: bool) -> ReadResult {
        for index in (0..self.cursor.page).rev() {
            let page = self.load(index);
            if !page.valid() {
                return ReadResult::ReadingPageHeader;
            }
            if let Some(part) = page.last_record() {
                return self.step_to_page(index, page, part, old, false, normal);
            }
        }
        ReadResult::PageNotFound
    }

    /// Reassembles the record under the cursor into its buffers.
    pub(crate) fn read_current(&mut self) -> Option<(PartHeader, Vec<Vec<u8>>)> {
        self.page.update(&self.file);
        let start = *self.page.part(self.cursor.part)?;
        if !start.header.tag.contains_beginning() {
            return None;
        }

        let mut assembler = RecordAssembler::new(start.header.record_type);
        let payload = self.page.read_payload(&self.file, self.cursor.part)?;
        if !assembler.feed(&payload) {
            return None;
        }

        let count = self.page_count();
        let mut index = self.cursor.page + 1;
        while !assembler.is_complete() {
            if index >= count {
                return None;
            }
            let page = self.load(index);
            let continuation = page.part(0)?;
            if !continuation.header.tag.is_continuation() {
                return None;
            }
            let payload = page.read_payload(&self.file, 0)?;
            if !assembler.feed(&payload) {
                return None;
            }
            index += 1;
        }
        Some((start.header, assembler.into_sources()))
    }

    /// Compares replaying from the cursor against seeking a reference.
    ///
    /// Walks the pages strictly between the cursor page and the page
    /// holding `stamp`. Increments carry two states, so replay loses once
    /// the non-reference bytes exceed twice the largest reference seen.
    pub(crate) fn is_reference_search_better(&self, stamp: Stamp) -> bool {
        let Some(desired) = self.bound_page(stamp) else {
            return false;
        };
        let (from, to) = if desired < self.cursor.page {
            (desired, self.cursor.page)
        } else {
            (self.cursor.page, desired)
        };
        if to - from <= 1 {
            return false;
        }

        let mut largest_reference = 0u64;
        let mut replay = 0u64;
        for index in from + 1..to {
            for part in self.load(index).parts() {
                let size = u64::from(part.header.size);
                if part.header.record_type == RecordType::Reference {
                    largest_reference = largest_reference.max(size);
                } else {
                    replay += size;
                }
            }
            if replay > 2 * largest_reference {
                return true;
            }
        }
        false
    }
}

/// `None` if the step may be taken, or the code refusing it.
fn order_check(new: Stamp, old: Stamp, forward: bool, normal: bool) -> Option<ReadResult> {
    let ordered = if forward { new >= old } else { new <= old };
    match (ordered, normal) {
        (true, true) | (false, false) => None,
        (true, false) => Some(ReadResult::NormalSequenceFound),
        (false, true) => Some(ReadResult::TimeSequenceViolation),
    }
}

fn read_header(file: &RegionFile) -> Option<FileHeader> {
    let mut buf = [0u8; FileHeader::SIZE];
    let section = file.shared(0, FileHeader::SIZE as u64).ok()?;
    match section.read(&mut buf) {
        Ok(true) => Some(FileHeader::decode(&buf)),
        _ => None,
    }
}

fn read_extension(file: &RegionFile, header: &FileHeader) -> Result<Extension, ReadResult> {
    let mut buf = vec![0u8; header.extension_size as usize];
    let section = file
        .shared(FileHeader::SIZE as u64, buf.len() as u64)
        .map_err(|_| ReadResult::ReadingFileHeader)?;
    match section.read(&mut buf) {
        Ok(true) => Extension::decode(&buf).map_err(|_| ReadResult::BadPageHeader),
        _ => Err(ReadResult::ReadingFileHeader),
    }
}
