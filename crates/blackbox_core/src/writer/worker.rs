//! The writer thread: file lifecycle, rotation and retention.

use super::queue::{Command, Next, Shared, Task};
use crate::chain::FileChain;
use crate::config::{DeviateDelay, WriterConfig};
use crate::error::{CoreError, CoreResult};
use crate::file::{safe_remove, FileInfo, FileWriter};
use crate::layout::RecordType;
use crate::location::Location;
use crate::record::OutRecord;
use crate::stamp::Stamp;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Wait for new commands before checking the page cache.
pub(crate) const IDLE_TICK: Duration = Duration::from_millis(30);

/// Deletion passes per retention run.
const RETENTION_PASSES: usize = 2;

pub(crate) struct Worker {
    location: Location,
    shared: Arc<Shared>,
    settings: Arc<Mutex<WriterConfig>>,
    delay: DeviateDelay,
    file: Option<FileWriter>,
}

impl Worker {
    pub(crate) fn new(
        location: Location,
        shared: Arc<Shared>,
        settings: Arc<Mutex<WriterConfig>>,
        delay: DeviateDelay,
    ) -> Self {
        Self {
            location,
            shared,
            settings,
            delay,
            file: None,
        }
    }

    /// Processes commands until shutdown, then closes the current file.
    pub(crate) fn run(mut self) {
        tracing::info!(dir = %self.location.directory().display(), "writer started");
        loop {
            match self.shared.next(IDLE_TICK) {
                Next::Run(Command::Write(task)) => {
                    if !self.shared.is_dead() {
                        let result = self.process(task);
                        self.check(result);
                    }
                }
                Next::Run(Command::Flush(ack)) => {
                    if !self.shared.is_dead() {
                        let result = self.update(true);
                        self.check(result);
                    }
                    let _ = ack.send(());
                }
                Next::Idle => {
                    if !self.shared.is_dead() {
                        let result = self.update(false);
                        self.check(result);
                    }
                }
                Next::Stop => break,
            }
        }

        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.close() {
                tracing::warn!(error = %e, "closing the last file failed");
            }
        }
        tracing::info!(dir = %self.location.directory().display(), "writer stopped");
    }

    fn check(&mut self, result: CoreResult<()>) {
        if let Err(e) = result {
            self.shared.die(e.to_string());
            self.file = None;
        }
    }

    fn update(&mut self, force: bool) -> CoreResult<()> {
        match &mut self.file {
            Some(file) => file.update(force),
            None => Ok(()),
        }
    }

    fn process(&mut self, task: Task) -> CoreResult<()> {
        let mut record = OutRecord::new(task.stamp, task.id, &task.record)?;
        if record.record_type == RecordType::Reference {
            self.process_reference(&mut record)?;
        } else {
            self.file
                .as_mut()
                .ok_or(CoreError::NoReference)?
                .write_record(&mut record)?;
        }
        if let Some(file) = &self.file {
            *self.shared.counts.lock() = file.counts();
        }
        Ok(())
    }

    fn process_reference(&mut self, record: &mut OutRecord) -> CoreResult<()> {
        let stamp = record.stamp;
        if self.file.is_none() {
            self.open_file(stamp)?;
        }
        let file = self.current()?;
        file.write_record(record)?;

        if file.time_to_close(stamp) {
            let mut closed = self.file.take().ok_or(CoreError::NoReference)?;
            closed.close()?;
            let previous = closed.path().to_path_buf();
            drop(closed);

            self.open_file(stamp)?;
            record.rewind();
            let file = self.current()?;
            file.write_record(record)?;
            tracing::info!(
                from = %previous.display(),
                to = %file.path().display(),
                "box file rotated"
            );
        }
        Ok(())
    }

    fn current(&mut self) -> CoreResult<&mut FileWriter> {
        self.file
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("no open file"))
    }

    fn open_file(&mut self, stamp: Stamp) -> CoreResult<()> {
        let config = self.settings.lock().clone();
        self.enforce_retention(stamp, &config)?;
        let file = FileWriter::create(&self.location, stamp, &config, self.delay.clone())?;
        self.location.invalidate();
        self.file = Some(file);
        Ok(())
    }

    /// Deletes the earliest files while the box is over its quota or
    /// they have outlived the configured lifetime.
    fn enforce_retention(&self, stamp: Stamp, config: &WriterConfig) -> CoreResult<()> {
        let mut chain: FileChain = (*self.location.refresh_chain()).clone();
        if chain.is_empty() {
            return Ok(());
        }

        let lifetime = i64::try_from(config.lifetime.as_secs()).unwrap_or(i64::MAX);
        let expired = |end: Stamp| end.secs().saturating_add(lifetime) < stamp.secs();
        let over_limit =
            |chain: &FileChain| chain.total_size() + config.file_size > config.disk_limit;

        if !over_limit(&chain) && !chain.earliest_end().is_some_and(expired) {
            return Ok(());
        }

        let mut removed = false;
        for _ in 0..RETENTION_PASSES {
            let Some(path) = chain.earliest() else {
                break;
            };
            let reason = match FileInfo::read(&path) {
                None => Some("unreadable"),
                Some(info) if expired(info.end) => Some("expired"),
                // The newest file is kept for quota reasons.
                Some(_) if over_limit(&chain) && chain.len() > 1 => Some("over disk limit"),
                Some(_) => None,
            };
            let Some(reason) = reason else {
                break;
            };

            if !safe_remove(&path)? {
                tracing::warn!(path = %path.display(), "file in use, retention postponed");
                break;
            }
            tracing::info!(path = %path.display(), reason, "box file removed");
            chain.take_earliest();
            removed = true;
        }

        if removed {
            self.location.invalidate();
        }
        Ok(())
    }
}
