//! Reader: walks a box record by record.
//!
//! A reader keeps one open file and a cursor in it. Stepping past the
//! first or last record of the file moves to the neighbouring file of the
//! chain, provided the boundary references of both files agree; a
//! mismatch marks a restart of the writer and is reported as
//! [`ReadResult::NewSession`].
//!
//! Every navigation call returns a [`ReadResult`] that is also kept as
//! [`Reader::last_result`].

mod result;

pub use result::ReadResult;

use crate::chain::FileChain;
use crate::file::{Cursor, FileInfo, FileReader, MIN_READABLE_SIZE};
use crate::identifier::Identifier;
use crate::layout::{PartHeader, RecordType};
use crate::location::Location;
use crate::marker;
use crate::record::{IncrementRecord, ReadRecord};
use crate::stamp::Stamp;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Reads the records of one box.
#[derive(Debug)]
pub struct Reader {
    location: Location,
    state: Mutex<State>,
}

/// Chain extremes seen when the end of data was last confirmed.
#[derive(Debug, PartialEq, Eq)]
struct EndOfData {
    forward: bool,
    normal: bool,
    earliest: Option<PathBuf>,
    latest: Option<PathBuf>,
}

impl EndOfData {
    fn of(chain: &FileChain, forward: bool, normal: bool) -> Self {
        Self {
            forward,
            normal,
            earliest: chain.earliest(),
            latest: chain.latest(MIN_READABLE_SIZE),
        }
    }
}

#[derive(Debug)]
struct State {
    file: Option<FileReader>,
    forward: bool,
    last: ReadResult,
    end: Option<EndOfData>,
}

impl State {
    fn save(&mut self, result: ReadResult) -> ReadResult {
        self.last = result;
        result
    }

    fn fail<T>(&mut self, result: ReadResult) -> Result<T, ReadResult> {
        self.last = result;
        Err(result)
    }

    fn is_open(&self, path: &Path) -> bool {
        self.file.as_ref().is_some_and(|f| f.path() == path)
    }

    /// Makes `path` the open file, reusing it when already open.
    fn open(&mut self, path: &Path) -> Result<&mut FileReader, ReadResult> {
        if !self.is_open(path) {
            self.end = None;
            let file = FileReader::open(path)?;
            tracing::debug!(path = %path.display(), "reader opened file");
            self.file = Some(file);
        }
        let file = self.file.as_mut().ok_or(ReadResult::NoFileOpened)?;
        file.update();
        Ok(file)
    }

    fn step(&mut self, location: &Location, normal: bool) -> ReadResult {
        let forward = self.forward;
        let Some(file) = self.file.as_mut() else {
            return ReadResult::NoFileOpened;
        };
        if forward && file.comes_to_truncated() {
            file.update();
        }
        if file.has_more_records(forward) {
            let result = file.move_to_next_record(forward, normal);
            self.end = None;
            return result;
        }
        let current = file.path().to_path_buf();

        let chain = location.chain();
        let here = EndOfData::of(&chain, forward, normal);
        if self.end.as_ref() == Some(&here) {
            return ReadResult::NoDataAvailable;
        }
        let Some(next) = chain.next_file(&current, MIN_READABLE_SIZE, forward) else {
            tracing::trace!(path = %current.display(), forward, "reader reached end of data");
            self.end = Some(here);
            return ReadResult::NoDataAvailable;
        };
        self.cross_to(&next, normal)
    }

    /// Moves to the boundary record of the neighbouring file.
    fn cross_to(&mut self, next: &Path, normal: bool) -> ReadResult {
        self.end = None;
        let Some(old) = self.file.as_ref().and_then(FileReader::current_stamp) else {
            return ReadResult::NoFileOpened;
        };
        let Ok(mut candidate) = FileReader::open(next) else {
            return ReadResult::ErrorOpeningFile;
        };
        if !candidate.rewind_to_extreme(self.forward) {
            return ReadResult::ErrorOpeningFile;
        }

        let continues = candidate.current_stamp() == Some(old);
        match (continues, normal) {
            (true, false) => ReadResult::NormalSequenceFound,
            (false, true) => ReadResult::NewSession,
            (true, true) | (false, false) => {
                tracing::debug!(path = %next.display(), new_session = !continues, "reader switched file");
                self.file = Some(candidate);
                ReadResult::Success
            }
        }
    }

    fn read(
        &mut self,
        accept: impl Fn(RecordType) -> bool,
    ) -> Result<(PartHeader, Vec<Vec<u8>>), ReadResult> {
        let Some(file) = self.file.as_mut() else {
            return self.fail(ReadResult::NoFileOpened);
        };
        let Some(header) = file.current_header() else {
            return self.fail(ReadResult::NoDataAvailable);
        };
        if !accept(header.record_type) {
            return self.fail(ReadResult::WrongRecordType);
        }
        match file.read_current() {
            Some(record) => {
                self.last = ReadResult::Success;
                Ok(record)
            }
            None => self.fail(ReadResult::NoDataAvailable),
        }
    }
}

impl Reader {
    /// Creates a reader with no file open, reading forward.
    #[must_use]
    pub fn new(location: Location) -> Self {
        Self {
            location,
            state: Mutex::new(State {
                file: None,
                forward: true,
                last: ReadResult::NoDataAvailable,
                end: None,
            }),
        }
    }

    /// Box this reader walks.
    #[must_use]
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Sets the reading direction.
    pub fn set_direction(&self, forward: bool) {
        self.state.lock().forward = forward;
    }

    /// True when reading forward.
    #[must_use]
    pub fn direction(&self) -> bool {
        self.state.lock().forward
    }

    /// Result of the last navigation or read.
    #[must_use]
    pub fn last_result(&self) -> ReadResult {
        self.state.lock().last
    }

    /// Moves to the reference closest to `stamp`.
    ///
    /// Returns [`ReadResult::Success`] on an exact hit and
    /// [`ReadResult::FoundApproximateValue`] otherwise.
    pub fn rewind(&self, stamp: Stamp) -> ReadResult {
        self.rewind_with(stamp, FileReader::rewind_to_stamp)
    }

    /// Moves to the record of any type closest to `stamp`.
    pub fn rewind_to_any(&self, stamp: Stamp) -> ReadResult {
        self.rewind_with(stamp, FileReader::rewind_to_any)
    }

    fn rewind_with(&self, stamp: Stamp, seek: fn(&mut FileReader, Stamp) -> bool) -> ReadResult {
        let mut state = self.state.lock();
        let Some(path) = select_file(&self.location, stamp) else {
            return state.save(ReadResult::NoDataAvailable);
        };
        let file = match state.open(&path) {
            Ok(file) => file,
            Err(result) => return state.save(result),
        };
        let result = if !seek(file, stamp) {
            ReadResult::NoDataAvailable
        } else if file.current_stamp() == Some(stamp) {
            ReadResult::Success
        } else {
            ReadResult::FoundApproximateValue
        };
        state.save(result)
    }

    /// Returns to a position taken from [`current_cursor`](Self::current_cursor).
    pub fn rewind_to_cursor(&self, path: &Path, cursor: Cursor) -> ReadResult {
        let mut state = self.state.lock();
        let result = match state.open(path) {
            Ok(file) => file.rewind_to_cursor(cursor),
            Err(_) => ReadResult::NoDataAvailable,
        };
        state.save(result)
    }

    /// Steps to the next record in time order.
    ///
    /// Refuses records that break time order and files that do not
    /// continue the current one.
    pub fn next(&self) -> ReadResult {
        let mut state = self.state.lock();
        let result = state.step(&self.location, true);
        state.save(result)
    }

    /// Steps across a break that [`next`](Self::next) refused.
    ///
    /// Where `next` would succeed this returns
    /// [`ReadResult::NormalSequenceFound`] and stays in place.
    pub fn force_next(&self) -> ReadResult {
        let mut state = self.state.lock();
        let result = state.step(&self.location, false);
        state.save(result)
    }

    /// True if the open file has more records in the reading direction.
    #[must_use]
    pub fn has_more_records(&self) -> bool {
        let state = self.state.lock();
        let forward = state.forward;
        state
            .file
            .as_ref()
            .is_some_and(|f| f.has_more_records(forward))
    }

    /// Picks up data appended to the open file.
    pub fn update(&self) {
        if let Some(file) = self.state.lock().file.as_mut() {
            file.update();
        }
    }

    #[cfg(test)]
    fn has_end_memo(&self) -> bool {
        self.state.lock().end.is_some()
    }

    /// True if a file is open.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.state.lock().file.is_some()
    }

    /// Reads the current record, which must be a reference.
    pub fn read_reference(&self) -> Result<ReadRecord, ReadResult> {
        let mut state = self.state.lock();
        let (header, sources) = state.read(|t| t == RecordType::Reference)?;
        Ok(read_record(header, sources, 1))
    }

    /// Reads the current record, which must be a package.
    pub fn read_package(&self) -> Result<ReadRecord, ReadResult> {
        let mut state = self.state.lock();
        let (header, sources) = state.read(RecordType::is_package)?;
        Ok(read_record(header, sources, 1))
    }

    /// Reads the current record whatever its type.
    ///
    /// An increment yields the state after the change when reading forward
    /// and the state before it when reading backward.
    pub fn read_any(&self) -> Result<ReadRecord, ReadResult> {
        let mut state = self.state.lock();
        let forward = state.forward;
        let (header, sources) = state.read(|_| true)?;
        let data = match (header.record_type, forward) {
            (RecordType::Increment, true) => 2,
            _ => 1,
        };
        Ok(read_record(header, sources, data))
    }

    /// Reads the current record, which must be an increment.
    pub fn read_increment(&self) -> Result<IncrementRecord, ReadResult> {
        let mut state = self.state.lock();
        let (header, sources) = state.read(|t| t == RecordType::Increment)?;
        let mut sources = sources.into_iter();
        Ok(IncrementRecord {
            stamp: header.stamp,
            id: header.id,
            caption: sources.next().unwrap_or_default(),
            before: sources.next().unwrap_or_default(),
            after: sources.next().unwrap_or_default(),
        })
    }

    fn current_header(&self) -> Option<PartHeader> {
        self.state
            .lock()
            .file
            .as_ref()
            .and_then(FileReader::current_header)
    }

    /// Stamp of the current record.
    #[must_use]
    pub fn current_stamp(&self) -> Option<Stamp> {
        self.current_header().map(|h| h.stamp)
    }

    /// Identifier of the current record.
    #[must_use]
    pub fn current_identifier(&self) -> Option<Identifier> {
        self.current_header().map(|h| h.id)
    }

    /// Type of the current record.
    #[must_use]
    pub fn current_type(&self) -> Option<RecordType> {
        self.current_header().map(|h| h.record_type)
    }

    /// Open file and position in it.
    #[must_use]
    pub fn current_cursor(&self) -> Option<(PathBuf, Cursor)> {
        let state = self.state.lock();
        let file = state.file.as_ref()?;
        Some((file.path().to_path_buf(), file.cursor()))
    }

    /// Path of the open file.
    #[must_use]
    pub fn current_file_path(&self) -> Option<PathBuf> {
        let state = self.state.lock();
        state.file.as_ref().map(|f| f.path().to_path_buf())
    }

    /// Time zone of the open file, or of the newest file of the box.
    #[must_use]
    pub fn timezone(&self) -> String {
        if let Some(file) = self.state.lock().file.as_ref() {
            return file.extension().time_zone.clone();
        }
        self.location
            .chain()
            .latest(MIN_READABLE_SIZE)
            .and_then(|path| FileReader::open(&path).ok())
            .map(|file| file.extension().time_zone.clone())
            .unwrap_or_default()
    }

    /// First and last stamps held by the box; zero where unknown.
    #[must_use]
    pub fn available_time_interval(&self) -> (Stamp, Stamp) {
        available_time_interval(&self.location)
    }

    /// True if a live writer is appending to this box.
    #[must_use]
    pub fn exists_actual_writer(&self) -> bool {
        marker::writer_active(&self.location)
    }

    /// True if seeking the reference nearest to `stamp` beats replaying
    /// from the current record.
    #[must_use]
    pub fn resolve_to_search_reference(&self, stamp: Stamp) -> bool {
        let state = self.state.lock();
        let Some(file) = state.file.as_ref() else {
            return true;
        };
        if file.starts_from() > stamp || file.ends_with() < stamp {
            return true;
        }
        file.is_reference_search_better(stamp)
    }
}

/// First and last stamps held by the box at `location`.
#[must_use]
pub fn available_time_interval(location: &Location) -> (Stamp, Stamp) {
    let chain = location.chain();
    let start = chain
        .earliest()
        .and_then(|p| FileInfo::read(&p))
        .map_or(Stamp::default(), |info| info.start);
    let end = chain
        .latest(MIN_READABLE_SIZE)
        .and_then(|p| FileInfo::read(&p))
        .map_or(Stamp::default(), |info| info.end);
    (start, end)
}

/// File that should hold `stamp`: the last one starting at or before it.
fn select_file(location: &Location, stamp: Stamp) -> Option<PathBuf> {
    let first = location.file_name(stamp, 0);
    let last = location.file_name(Stamp::new(stamp.secs().saturating_add(1)), 0);
    let candidates = location
        .chain()
        .files_around_range(&first, &last, MIN_READABLE_SIZE);

    let starts_before =
        |path: &PathBuf| FileInfo::read(path).map_or(true, |info| info.start < stamp);
    let bound = candidates.partition_point(starts_before);
    if bound == 0 {
        return candidates.first().cloned();
    }
    match candidates.get(bound) {
        None => candidates.last().cloned(),
        Some(path) if FileInfo::read(path).is_some_and(|info| info.start <= stamp) => {
            Some(path.clone())
        }
        Some(_) => candidates.get(bound - 1).cloned(),
    }
}

fn read_record(header: PartHeader, sources: Vec<Vec<u8>>, data: usize) -> ReadRecord {
    let mut sources = sources.into_iter();
    let caption = sources.next().unwrap_or_default();
    ReadRecord {
        record_type: header.record_type,
        stamp: header.stamp,
        id: header.id,
        caption,
        data: sources.nth(data - 1).unwrap_or_default(),
    }
}
