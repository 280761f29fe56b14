//! Engine instance: process-scoped state shared by locations and writers.

use crate::chain::ChainRegistry;
use crate::config::{DeviateDelay, EngineConfig, WriterConfig};
use crate::error::CoreResult;
use crate::location::Location;
use crate::reader::Reader;
use crate::writer::Writer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Entry point of the engine.
///
/// Owns the directory watches behind every [`Location`] it hands out and
/// the cache deviate delay used by its writers. Several instances can
/// coexist; they share nothing.
///
/// # Example
///
/// ```rust,ignore
/// use blackbox_core::{BlackBox, Stamp, WriterConfig};
///
/// let bb = BlackBox::new();
/// let location = bb.location("/var/log/box", "unit-", ".bbx");
///
/// let reader = bb.reader(location.clone());
/// if reader.rewind(Stamp::new(1_500_000_000)).is_ok() {
///     let record = reader.read_reference()?;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BlackBox {
    registry: Arc<ChainRegistry>,
    delay: DeviateDelay,
}

impl Default for BlackBox {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl BlackBox {
    /// Creates an engine with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given settings.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(ChainRegistry::new(config.poll_interval)),
            delay: DeviateDelay::new(config.deviate_delay),
        }
    }

    /// A box in `directory` made of files named `prefix*suffix`.
    #[must_use]
    pub fn location(
        &self,
        directory: impl Into<PathBuf>,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Location {
        Location::new(Arc::clone(&self.registry), directory, prefix, suffix)
    }

    /// Starts the writer of `location`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is rejected, the directory cannot be
    /// created, or another writer is active on the location.
    pub fn writer(&self, location: Location, config: WriterConfig) -> CoreResult<Writer> {
        Writer::create(location, config, self.delay.clone())
    }

    /// Creates a reader of `location`.
    #[must_use]
    pub fn reader(&self, location: Location) -> Reader {
        Reader::new(location)
    }

    /// Sets the longest time written data may wait in a page cache.
    ///
    /// The value is clamped to 30 ms..=15 s; the applied value is returned.
    /// Running writers pick it up on their next check.
    pub fn set_cache_deviate_delay(&self, delay: Duration) -> Duration {
        self.delay.set(delay)
    }

    /// Current cache deviate delay.
    #[must_use]
    pub fn cache_deviate_delay(&self) -> Duration {
        self.delay.get()
    }

    /// Directory watches held by this engine.
    #[must_use]
    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }
}
