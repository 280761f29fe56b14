//! Engine and writer configuration.

use crate::error::{CoreError, CoreResult};
use crate::layout::FileHeader;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Smallest accepted page size.
pub const MIN_PAGE_SIZE: u32 = 256;
/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 1 << 30;
/// Page size of new writers.
pub const DEFAULT_PAGE_SIZE: u32 = 256 * 1024;
/// Recommended file size of new writers.
pub const DEFAULT_FILE_SIZE: u64 = 32 * 1024 * 1024;
/// Upper bound for the recommended file size.
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;
/// Upper bound (and default) for the disk quota.
pub const MAX_DISK_LIMIT: u64 = 1 << 50;
/// Default retention lifetime.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(30 * 24 * 3600);
/// Default spacing between suggested references.
pub const DEFAULT_REFERENCE_INTERVAL: Duration = Duration::from_secs(300);

/// Bounds of the cache deviate delay.
pub const MIN_DEVIATE_DELAY: Duration = Duration::from_millis(30);
/// Upper bound of the cache deviate delay.
pub const MAX_DEVIATE_DELAY: Duration = Duration::from_secs(15);
/// Default cache deviate delay.
pub const DEFAULT_DEVIATE_DELAY: Duration = Duration::from_millis(500);

/// Configuration of a [`BlackBox`](crate::BlackBox) engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Longest time written data may wait in a page cache.
    pub deviate_delay: Duration,

    /// How often directory listings are rescanned without notification.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deviate_delay: DEFAULT_DEVIATE_DELAY,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache deviate delay (clamped when applied).
    #[must_use]
    pub const fn deviate_delay(mut self, delay: Duration) -> Self {
        self.deviate_delay = delay;
        self
    }

    /// Sets the directory poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Deviate delay shared by every page cache of an engine instance.
#[derive(Debug, Clone)]
pub struct DeviateDelay(Arc<AtomicU64>);

impl DeviateDelay {
    /// Creates a shared delay, clamped to the accepted range.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let shared = Self(Arc::new(AtomicU64::new(0)));
        shared.set(delay);
        shared
    }

    /// Current delay.
    #[must_use]
    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }

    /// Stores a clamped delay and returns the applied value.
    pub fn set(&self, delay: Duration) -> Duration {
        let applied = delay.clamp(MIN_DEVIATE_DELAY, MAX_DEVIATE_DELAY);
        self.0.store(applied.as_millis() as u64, Ordering::Relaxed);
        applied
    }
}

/// Configuration for a [`Writer`](crate::Writer).
///
/// Values are validated when the writer is created; the same checks back
/// the writer's live setters.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Page size in bytes.
    pub page_size: u32,

    /// File size after which a file is rotated.
    pub file_size: u64,

    /// Total bytes the box may occupy.
    pub disk_limit: u64,

    /// Files whose last record is older than this are removed.
    pub lifetime: Duration,

    /// Time zone recorded in each file's metadata.
    pub time_zone: String,

    /// Spacing between suggested references.
    pub reference_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            file_size: DEFAULT_FILE_SIZE,
            disk_limit: MAX_DISK_LIMIT,
            lifetime: DEFAULT_LIFETIME,
            time_zone: String::new(),
            reference_interval: DEFAULT_REFERENCE_INTERVAL,
        }
    }
}

impl WriterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the recommended file size.
    #[must_use]
    pub const fn file_size(mut self, size: u64) -> Self {
        self.file_size = size;
        self
    }

    /// Sets the disk quota in bytes.
    #[must_use]
    pub const fn disk_limit(mut self, limit: u64) -> Self {
        self.disk_limit = limit;
        self
    }

    /// Sets the retention lifetime.
    #[must_use]
    pub const fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Sets the time zone name.
    #[must_use]
    pub fn time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = tz.into();
        self
    }

    /// Sets the reference interval.
    #[must_use]
    pub const fn reference_interval(mut self, interval: Duration) -> Self {
        self.reference_interval = interval;
        self
    }

    /// Clamps and rounds sizes, then checks the remaining values.
    pub(crate) fn validated(mut self) -> CoreResult<Self> {
        self.page_size = clamp_page_size(u64::from(self.page_size));
        self.file_size = round_file_size(self.file_size, self.page_size);
        check_disk_limit(self.disk_limit, self.file_size)?;
        check_nonzero("lifetime", self.lifetime)?;
        check_nonzero("reference interval", self.reference_interval)?;
        Ok(self)
    }
}

/// Rejects a zero duration.
pub(crate) fn check_nonzero(what: &str, value: Duration) -> CoreResult<()> {
    if value.as_secs() == 0 {
        return Err(CoreError::invalid_config(format!(
            "{what} must be at least one second"
        )));
    }
    Ok(())
}

/// Clamps a page size into the accepted range.
#[must_use]
pub fn clamp_page_size(size: u64) -> u32 {
    size.clamp(u64::from(MIN_PAGE_SIZE), u64::from(MAX_PAGE_SIZE)) as u32
}

/// Rounds a file size to the file header plus a whole number of pages.
///
/// The result always holds at least one page and never exceeds
/// [`MAX_FILE_SIZE`].
#[must_use]
pub fn round_file_size(size: u64, page_size: u32) -> u64 {
    let header = FileHeader::SIZE as u64 + u64::from(FileHeader::DEFAULT_EXTENSION_SIZE);
    let page = u64::from(page_size);
    let wanted = size.max(header + page).min(MAX_FILE_SIZE);
    let pages = (wanted - header) / page;
    header + pages * page
}

/// Checks a disk quota against the recommended file size.
pub fn check_disk_limit(limit: u64, file_size: u64) -> CoreResult<()> {
    if limit < file_size.saturating_mul(2) {
        return Err(CoreError::invalid_config(format!(
            "disk limit {limit} is below twice the file size {file_size}"
        )));
    }
    if limit > MAX_DISK_LIMIT {
        return Err(CoreError::invalid_config(format!(
            "disk limit {limit} exceeds {MAX_DISK_LIMIT}"
        )));
    }
    Ok(())
}

/// Parses a disk quota such as `"512M"` or `"2GB"`.
///
/// Accepts a positive integer optionally followed by one of `K M G T P`
/// (binary multiples) and an optional `B`.
pub fn parse_disk_limit(text: &str) -> CoreResult<u64> {
    let text = text.trim();
    let digits = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if digits == 0 {
        return Err(CoreError::invalid_config(format!(
            "disk limit '{text}' does not start with a number"
        )));
    }
    let mut value: u64 = text[..digits]
        .parse()
        .map_err(|_| CoreError::invalid_config(format!("disk limit '{text}' is too large")))?;
    if value == 0 {
        return Err(CoreError::invalid_config("disk limit must be positive"));
    }

    let rest = &text[digits..];
    if rest.starts_with('.') {
        return Err(CoreError::invalid_config(format!(
            "disk limit '{text}' must be a whole number"
        )));
    }
    let rest = rest.trim_start();
    let mut chars = rest.chars();
    let shifts = match chars.next() {
        None => 0,
        Some('K') => 1,
        Some('M') => 2,
        Some('G') => 3,
        Some('T') => 4,
        Some('P') => 5,
        Some(other) => {
            return Err(CoreError::invalid_config(format!(
                "unknown disk limit suffix '{other}'"
            )))
        }
    };
    if !matches!(chars.as_str(), "" | "B") {
        return Err(CoreError::invalid_config(format!(
            "unknown disk limit suffix '{rest}'"
        )));
    }

    for _ in 0..shifts {
        value = value
            .checked_mul(1024)
            .filter(|v| *v <= MAX_DISK_LIMIT)
            .ok_or_else(|| {
                CoreError::invalid_config(format!("disk limit '{text}' exceeds {MAX_DISK_LIMIT}"))
            })?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = WriterConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.disk_limit, MAX_DISK_LIMIT);
        assert!(config.time_zone.is_empty());
    }

    #[test]
    fn builder_pattern() {
        let config = WriterConfig::new()
            .page_size(512)
            .file_size(4096)
            .time_zone("Europe/Riga");
        assert_eq!(config.page_size, 512);
        assert_eq!(config.file_size, 4096);
        assert_eq!(config.time_zone, "Europe/Riga");
    }

    #[test]
    fn page_size_clamped() {
        assert_eq!(clamp_page_size(1), MIN_PAGE_SIZE);
        assert_eq!(clamp_page_size(u64::MAX), MAX_PAGE_SIZE);
        assert_eq!(clamp_page_size(4096), 4096);
    }

    #[test]
    fn file_size_rounded_to_pages() {
        assert_eq!(round_file_size(0, 256), 56 + 256);
        assert_eq!(round_file_size(1000, 256), 56 + 3 * 256);
        assert_eq!(round_file_size(56 + 512, 256), 56 + 512);
        assert!(round_file_size(u64::MAX, 256) <= MAX_FILE_SIZE);
    }

    #[test]
    fn disk_limit_below_two_files_rejected() {
        assert!(check_disk_limit(1000, 600).is_err());
        assert!(check_disk_limit(1200, 600).is_ok());
        assert!(check_disk_limit(MAX_DISK_LIMIT + 1, 600).is_err());
    }

    #[test]
    fn parse_disk_limit_suffixes() {
        assert_eq!(parse_disk_limit("100").unwrap(), 100);
        assert_eq!(parse_disk_limit("10K").unwrap(), 10 * 1024);
        assert_eq!(parse_disk_limit("3 GB").unwrap(), 3 << 30);
        assert_eq!(parse_disk_limit("1P").unwrap(), MAX_DISK_LIMIT);
    }

    #[test]
    fn parse_disk_limit_rejects_malformed() {
        for text in ["", "G", "0", "1.5G", "-4K", "12X", "2P", "10KiB", "5Gx"] {
            assert!(parse_disk_limit(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn deviate_delay_clamped() {
        let delay = DeviateDelay::new(Duration::from_millis(1));
        assert_eq!(delay.get(), MIN_DEVIATE_DELAY);
        assert_eq!(delay.set(Duration::from_secs(60)), MAX_DEVIATE_DELAY);
        assert_eq!(delay.get(), MAX_DEVIATE_DELAY);

        let shared = delay.clone();
        delay.set(Duration::from_millis(200));
        assert_eq!(shared.get(), Duration::from_millis(200));
    }

    #[test]
    fn validated_normalizes_sizes() {
        let config = WriterConfig::new()
            .page_size(100)
            .file_size(1000)
            .disk_limit(10_000)
            .validated()
            .unwrap();
        assert_eq!(config.page_size, MIN_PAGE_SIZE);
        assert_eq!(config.file_size, 56 + 3 * 256);

        let small_limit = WriterConfig::new().page_size(256).file_size(1000).disk_limit(1000);
        assert!(small_limit.validated().is_err());
        let no_lifetime = WriterConfig::new().lifetime(Duration::ZERO);
        assert!(no_lifetime.validated().is_err());
    }
}
