//! Read-side page index.

use super::{FileAddress, LARGEST_UNUSED_SPACE};
use crate::layout::{PageHeader, PartHeader, RecordType};
use crate::stamp::Stamp;
use blackbox_storage::RegionFile;

/// A part header together with its offset in the file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PartEntry {
    pub(crate) header: PartHeader,
    pub(crate) offset: u64,
}

impl PartEntry {
    pub(crate) fn payload_offset(&self) -> u64 {
        self.offset + PartHeader::SIZE as u64
    }

    fn end(&self) -> u64 {
        self.payload_offset() + u64::from(self.header.size)
    }

    fn starts_reference(&self) -> bool {
        self.header.record_type == RecordType::Reference && self.header.tag.contains_beginning()
    }
}

/// Header and part table of one page.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageIndex {
    address: FileAddress,
    header: Option<PageHeader>,
    parts: Vec<PartEntry>,
    clipped: bool,
}

impl PageIndex {
    /// Reads the page header and every part header that can be parsed.
    pub(crate) fn load(file: &RegionFile, address: FileAddress) -> Self {
        let mut page = Self {
            address,
            header: read_page_header(file, address),
            parts: Vec::new(),
            clipped: true,
        };
        if page.header.is_some() {
            page.read_parts(file);
        }
        page
    }

    /// Reads part headers written since the last load.
    pub(crate) fn update(&mut self, file: &RegionFile) -> bool {
        self.header.is_some() && self.read_parts(file)
    }

    fn read_parts(&mut self, file: &RegionFile) -> bool {
        let Some(header) = self.header else {
            return false;
        };
        let mut offset = match self.parts.last() {
            Some(last) => last.end(),
            None => self.address.offset + header.parts_offset(),
        };

        let part_size = PartHeader::SIZE as u64;
        while offset + part_size < self.address.end() {
            let Some(part) = read_part_header(file, offset) else {
                break;
            };
            let entry = PartEntry {
                header: part,
                offset,
            };
            if entry.end() > self.address.end() {
                tracing::warn!(offset, size = part.size, "part runs past page end");
                break;
            }
            offset = entry.end();
            self.parts.push(entry);
        }

        self.clipped = match self.parts.last() {
            None => true,
            Some(last) => last.end() < self.address.end() - LARGEST_UNUSED_SPACE as u64,
        };
        !self.parts.is_empty()
    }

    /// Page header was read.
    pub(crate) fn valid(&self) -> bool {
        self.header.is_some()
    }

    /// Page header and at least one part were read.
    pub(crate) fn is_readable(&self) -> bool {
        self.valid() && !self.parts.is_empty()
    }

    pub(crate) fn address(&self) -> FileAddress {
        self.address
    }

    pub(crate) fn header(&self) -> PageHeader {
        self.header.unwrap_or_default()
    }

    pub(crate) fn parts(&self) -> &[PartEntry] {
        &self.parts
    }

    pub(crate) fn part(&self, index: usize) -> Option<&PartEntry> {
        self.parts.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.parts.len()
    }

    /// Data stops before the page's capacity.
    pub(crate) fn is_clipped(&self) -> bool {
        self.clipped
    }

    /// Page sorts before `stamp` in a page search.
    pub(crate) fn ends_before(&self, stamp: Stamp) -> bool {
        match self.header {
            Some(header) => header.time_end < stamp.secs(),
            None => true,
        }
    }

    pub(crate) fn contains_reference_beginning(&self) -> bool {
        self.parts.iter().any(PartEntry::starts_reference)
    }

    pub(crate) fn contains_any_beginning(&self) -> bool {
        match self.parts.first() {
            None => false,
            Some(first) => self.parts.len() > 1 || first.header.tag.contains_beginning(),
        }
    }

    /// Any part after `index` starts a record: it can only be a beginning.
    pub(crate) fn contains_beginning_after(&self, index: usize) -> bool {
        index + 1 < self.parts.len()
    }

    pub(crate) fn contains_beginning_before(&self, until: usize) -> bool {
        let until = until.min(self.parts.len());
        match until {
            0 => false,
            1 => self.parts[0].header.tag.contains_beginning(),
            _ => true,
        }
    }

    pub(crate) fn contains_truncation_after(&self, index: usize) -> bool {
        self.clipped && index + 1 == self.parts.len()
    }

    /// First part that starts a record (the first part may be a continuation).
    pub(crate) fn first_record(&self) -> Option<usize> {
        let first = self.parts.first()?;
        if first.header.tag.contains_beginning() {
            Some(0)
        } else if self.parts.len() > 1 {
            Some(1)
        } else {
            None
        }
    }

    /// Last part that starts a record; only the last part can be it.
    pub(crate) fn last_record(&self) -> Option<usize> {
        let last = self.parts.last()?;
        if self.parts.len() > 1 || last.header.tag.contains_beginning() {
            Some(self.parts.len() - 1)
        } else {
            None
        }
    }

    /// Reference-starting part closest to `stamp`; ties keep the first found.
    pub(crate) fn closest_reference_part(&self, stamp: Stamp) -> Option<usize> {
        self.closest_part(stamp, PartEntry::starts_reference)
    }

    /// Record-starting part of any type closest to `stamp`.
    pub(crate) fn closest_any_part(&self, stamp: Stamp) -> Option<usize> {
        self.closest_part(stamp, |p| p.header.tag.contains_beginning())
    }

    fn closest_part(&self, stamp: Stamp, accept: impl Fn(&PartEntry) -> bool) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (i, part) in self.parts.iter().enumerate() {
            if !accept(part) {
                continue;
            }
            let diff = stamp.mod_difference(part.header.stamp);
            if best.map_or(true, |(_, d)| diff < d) {
                best = Some((i, diff));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Reads the payload of part `index`.
    pub(crate) fn read_payload(&self, file: &RegionFile, index: usize) -> Option<Vec<u8>> {
        let part = self.parts.get(index)?;
        let mut buf = vec![0u8; part.header.size as usize];
        if buf.is_empty() {
            return Some(buf);
        }
        let section = file
            .shared(part.payload_offset(), buf.len() as u64)
            .ok()?;
        match section.read(&mut buf) {
            Ok(true) => Some(buf),
            _ => None,
        }
    }
}

fn read_page_header(file: &RegionFile, address: FileAddress) -> Option<PageHeader> {
    let mut buf = [0u8; PageHeader::SIZE];
    let section = file.shared(address.offset, buf.len() as u64).ok()?;
    match section.read(&mut buf) {
        Ok(true) => Some(PageHeader::decode(&buf)),
        _ => None,
    }
}

fn read_part_header(file: &RegionFile, offset: u64) -> Option<PartHeader> {
    let mut buf = [0u8; PartHeader::SIZE];
    let section = file.shared(offset, buf.len() as u64).ok()?;
    match section.read(&mut buf) {
        Ok(true) => PartHeader::decode(&buf),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviateDelay;
    use crate::identifier::Identifier;
    use crate::page::PageCache;
    use crate::record::{OutRecord, Record};
    use crate::stamp::Stamp;
    use std::time::Duration;
    use tempfile::tempdir;

    const PAGE: u64 = 512;

    fn write_page(file: &RegionFile, records: &[(i64, Record)]) {
        let mut cache = PageCache::new(
            FileAddress::new(0, PAGE),
            DeviateDelay::new(Duration::from_secs(15)),
        );
        for (stamp, record) in records {
            let mut out = OutRecord::new(Stamp::new(*stamp), Identifier::default(), record).unwrap();
            if cache.will_write_to_file(&out) {
                cache.process_record(file, &mut out).unwrap();
            } else {
                cache.append_part(&mut out);
            }
        }
        cache.update(file).unwrap();
    }

    fn reference(len: usize) -> Record {
        Record::Reference {
            caption: Vec::new(),
            data: vec![1u8; len],
        }
    }

    fn package() -> Record {
        Record::IncomingPackage {
            caption: Vec::new(),
            data: b"p".to_vec(),
        }
    }

    #[test]
    fn empty_file_is_not_readable() {
        let dir = tempdir().unwrap();
        let file = RegionFile::create_new(&dir.path().join("p.bin")).unwrap();

        let page = PageIndex::load(&file, FileAddress::new(0, PAGE));
        assert!(!page.valid());
        assert!(page.ends_before(Stamp::new(i64::MIN)));
    }

    #[test]
    fn queries_on_partial_page() {
        let dir = tempdir().unwrap();
        let file = RegionFile::create_new(&dir.path().join("p.bin")).unwrap();
        write_page(
            &file,
            &[(10, reference(4)), (20, package()), (30, reference(4)), (40, package())],
        );

        let page = PageIndex::load(&file, FileAddress::new(0, PAGE));
        assert!(page.is_readable());
        assert_eq!(page.len(), 4);
        assert!(page.is_clipped());
        assert!(page.contains_reference_beginning());
        assert!(page.contains_any_beginning());
        assert_eq!(page.first_record(), Some(0));
        assert_eq!(page.last_record(), Some(3));
        assert!(page.contains_beginning_after(2));
        assert!(!page.contains_beginning_after(3));
        assert!(page.contains_truncation_after(3));
        assert!(!page.contains_beginning_before(0));
        assert!(page.contains_beginning_before(1));

        assert_eq!(page.closest_reference_part(Stamp::new(26)), Some(2));
        assert_eq!(page.closest_any_part(Stamp::new(19)), Some(1));
        // Equidistant: the first part found wins.
        assert_eq!(page.closest_reference_part(Stamp::new(20)), Some(0));

        assert!(page.ends_before(Stamp::new(41)));
        assert!(!page.ends_before(Stamp::new(40)));
    }

    #[test]
    fn continuation_first_part() {
        let dir = tempdir().unwrap();
        let file = RegionFile::create_new(&dir.path().join("p.bin")).unwrap();
        write_page(&file, &[(10, reference(700))]);

        let second = PageIndex::load(&file, FileAddress::new(PAGE, PAGE));
        assert_eq!(second.len(), 1);
        assert!(!second.contains_any_beginning());
        assert!(!second.contains_reference_beginning());
        assert_eq!(second.first_record(), None);
        assert_eq!(second.last_record(), None);
        assert!(!second.contains_beginning_before(1));
        assert_eq!(second.read_payload(&file, 0).unwrap().len(), 4 + 4 + 700 - (512 - 36 - 18));
    }

    #[test]
    fn update_picks_up_new_parts() {
        let dir = tempdir().unwrap();
        let file = RegionFile::create_new(&dir.path().join("p.bin")).unwrap();
        let mut cache = PageCache::new(
            FileAddress::new(0, PAGE),
            DeviateDelay::new(Duration::from_secs(15)),
        );

        let mut first = OutRecord::new(Stamp::new(1), Identifier::default(), &reference(3)).unwrap();
        cache.append_part(&mut first);
        cache.update(&file).unwrap();

        let mut page = PageIndex::load(&file, FileAddress::new(0, PAGE));
        assert_eq!(page.len(), 1);

        let mut second = OutRecord::new(Stamp::new(2), Identifier::default(), &package()).unwrap();
        cache.append_part(&mut second);
        cache.update(&file).unwrap();

        assert!(page.update(&file));
        assert_eq!(page.len(), 2);
        assert_eq!(page.part(1).unwrap().header.stamp, Stamp::new(2));
    }

    #[test]
    fn oversized_part_is_not_indexed() {
        let dir = tempdir().unwrap();
        let file = RegionFile::create_new(&dir.path().join("p.bin")).unwrap();
        write_page(&file, &[(10, reference(4)), (20, package())]);

        let page = PageIndex::load(&file, FileAddress::new(0, PAGE));
        assert_eq!(page.len(), 2);
        let second = *page.part(1).unwrap();
        let mut header = second.header;
        header.size = u32::MAX;
        file.exclusive(second.offset, PartHeader::SIZE as u64)
            .unwrap()
            .write(&header.encode())
            .unwrap();

        let page = PageIndex::load(&file, FileAddress::new(0, PAGE));
        assert_eq!(page.len(), 1);
        assert!(page.is_clipped());
        assert_eq!(page.read_payload(&file, 0).unwrap().len(), 4 + 4 + 4);
        assert!(page.read_payload(&file, 1).is_none());
    }
}
