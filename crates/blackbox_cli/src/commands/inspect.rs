//! Inspect command implementation.

use super::{format_size, format_stamp};
use blackbox_core::{available_time_interval, writer_active, FileSummary, Location, Stamp};
use serde::Serialize;

/// Box inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Box directory.
    pub directory: String,
    /// File name prefix.
    pub prefix: String,
    /// File name suffix.
    pub suffix: String,
    /// Files in time order.
    pub files: Vec<FileStats>,
    /// Total size in bytes.
    pub total_size: u64,
    /// First stamp held by the box.
    pub time_begin: i64,
    /// Last stamp held by the box.
    pub time_end: i64,
    /// A writer holds the box.
    pub writer_active: bool,
}

/// Statistics for a single file.
#[derive(Debug, Serialize)]
pub struct FileStats {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Why the file cannot be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// First stamp in the header.
    pub time_begin: i64,
    /// Last stamp in the header.
    pub time_end: i64,
    /// Time zone from the metadata.
    pub time_zone: String,
    /// Format version from the metadata.
    pub version: String,
    /// Page size in bytes.
    pub page_size: u32,
    /// Number of pages.
    pub pages: usize,
    /// Number of parts over all pages.
    pub parts: usize,
}

/// Runs the inspect command.
pub fn run(location: &Location, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(location)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Collects statistics for every file of `location`.
pub fn inspect(location: &Location) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !location.directory().is_dir() {
        return Err(format!("No box directory at {:?}", location.directory()).into());
    }

    let chain = location.refresh_chain();
    let mut files = Vec::with_capacity(chain.len());
    for entry in chain.entries() {
        let path = location.directory().join(entry.name());
        let mut stats = FileStats {
            name: entry.name().to_string(),
            size: entry.size(),
            error: None,
            time_begin: 0,
            time_end: 0,
            time_zone: String::new(),
            version: String::new(),
            page_size: 0,
            pages: 0,
            parts: 0,
        };
        match FileSummary::read(&path) {
            Ok(summary) => {
                stats.size = summary.size;
                stats.time_begin = summary.header.time_begin;
                stats.time_end = summary.header.time_end;
                stats.time_zone = summary.extension.time_zone.clone();
                stats.version = summary.extension.version.to_string();
                stats.page_size = summary.header.page_size;
                stats.pages = summary.pages.len();
                stats.parts = summary.pages.iter().map(|p| p.parts.len()).sum();
            }
            Err(code) => stats.error = Some(code.to_string()),
        }
        files.push(stats);
    }

    let (begin, end) = available_time_interval(location);
    Ok(InspectResult {
        directory: location.directory().display().to_string(),
        prefix: location.prefix().to_string(),
        suffix: location.suffix().to_string(),
        total_size: chain.total_size(),
        files,
        time_begin: begin.secs(),
        time_end: end.secs(),
        writer_active: writer_active(location),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Blackbox Inspection");
    println!("===================");
    println!();
    println!("Directory: {}", result.directory);
    println!("Mask:      {}*{}", result.prefix, result.suffix);
    println!();
    println!("Box:");
    println!("  Files:         {}", result.files.len());
    println!("  Total size:    {} bytes", format_size(result.total_size));
    println!("  From:          {}", format_stamp(Stamp::new(result.time_begin)));
    println!("  To:            {}", format_stamp(Stamp::new(result.time_end)));
    println!(
        "  Writer:        {}",
        if result.writer_active { "active" } else { "none" }
    );

    if result.files.is_empty() {
        return;
    }
    println!();
    println!("Files:");
    for file in &result.files {
        match &file.error {
            Some(error) => println!("  {}  {} bytes  unreadable: {}", file.name, file.size, error),
            None => println!(
                "  {}  {} bytes  v{}  tz={:?}  {} pages of {}  {} parts  {} .. {}",
                file.name,
                format_size(file.size),
                file.version,
                file.time_zone,
                file.pages,
                file.page_size,
                file.parts,
                format_stamp(Stamp::new(file.time_begin)),
                format_stamp(Stamp::new(file.time_end)),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::{BlackBox, Identifier, WriterConfig};
    use tempfile::tempdir;

    #[test]
    fn inspect_lists_files() {
        let dir = tempdir().unwrap();
        let bb = BlackBox::new();
        let location = bb.location(dir.path(), "i-", ".bbx");
        {
            let config = WriterConfig::new()
                .page_size(256)
                .file_size(4096)
                .time_zone("Europe/Riga");
            let writer = bb.writer(location.clone(), config).unwrap();
            writer
                .push_reference(Stamp::new(100), Identifier::default(), "c", "d")
                .unwrap();
            writer
                .push_incoming_package(Stamp::new(120), Identifier::default(), "c", "p")
                .unwrap();
        }
        std::fs::write(dir.path().join("i-991231-2359Z.bbx"), b"junk").unwrap();

        let result = inspect(&location).unwrap();
        assert_eq!(result.files.len(), 2);
        let file = &result.files[0];
        assert_eq!(file.error, None);
        assert_eq!((file.time_begin, file.time_end), (100, 120));
        assert_eq!(file.time_zone, "Europe/Riga");
        assert_eq!(file.parts, 2);
        assert!(result.files[1].error.is_some());
        assert_eq!((result.time_begin, result.time_end), (100, 120));
        assert!(!result.writer_active);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let bb = BlackBox::new();
        assert!(inspect(&bb.location(dir.path().join("nope"), "", ".bbx")).is_err());
    }
}
