//! Dump command implementation.

use super::format_stamp;
use blackbox_core::{BlackBox, Location, ReadResult, Reader, Stamp};
use serde::Serialize;

/// Where and how far to walk.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Stamp to start at; the first (or last) record when unset.
    pub from: Option<Stamp>,
    /// Maximum number of records.
    pub limit: Option<usize>,
    /// Walk from oldest to newest.
    pub forward: bool,
}

/// Record representation for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Record stamp.
    pub stamp: i64,
    /// Record type.
    pub record_type: String,
    /// Identifier as `source:counter`.
    pub id: String,
    /// Caption size in bytes.
    pub caption_size: usize,
    /// Size of the data returned for the reading direction.
    pub data_size: usize,
    /// First record after a writer restart.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub new_session: bool,
    /// Record breaks time order.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub out_of_order: bool,
}

/// Runs the dump command.
pub fn run(
    bb: &BlackBox,
    location: &Location,
    options: &DumpOptions,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(bb, location, options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Walks the box and collects up to `options.limit` records.
pub fn read_records(
    bb: &BlackBox,
    location: &Location,
    options: &DumpOptions,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let reader = bb.reader(location.clone());
    reader.set_direction(options.forward);

    let start = match options.from {
        Some(stamp) => stamp,
        None => {
            let (begin, end) = reader.available_time_interval();
            if options.forward {
                begin
            } else {
                end
            }
        }
    };
    let landed = reader.rewind_to_any(start);
    if !landed.is_ok() {
        return Err(format!("No records near {}: {}", format_stamp(start), landed).into());
    }

    let max_records = options.limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    let mut marks = (false, false);
    while records.len() < max_records {
        let record = reader
            .read_any()
            .map_err(|code| format!("Cannot read record: {}", code))?;
        records.push(RecordInfo {
            stamp: record.stamp.secs(),
            record_type: record.record_type.name().to_string(),
            id: record.id.to_string(),
            caption_size: record.caption.len(),
            data_size: record.data.len(),
            new_session: marks.0,
            out_of_order: marks.1,
        });

        match step(&reader) {
            Some(next) => marks = next,
            None => break,
        }
    }
    tracing::debug!(records = records.len(), result = %reader.last_result(), "dump finished");
    Ok(records)
}

/// Steps once, crossing breaks; returns the marks of the new record.
fn step(reader: &Reader) -> Option<(bool, bool)> {
    let refused = match reader.next() {
        ReadResult::Success => return Some((false, false)),
        code @ (ReadResult::NewSession | ReadResult::TimeSequenceViolation) => code,
        _ => return None,
    };
    if reader.force_next() != ReadResult::Success {
        return None;
    }
    Some((
        refused == ReadResult::NewSession,
        refused == ReadResult::TimeSequenceViolation,
    ))
}

fn print_text_output(records: &[RecordInfo]) {
    for record in records {
        if record.new_session {
            println!("---- new session ----");
        }
        println!(
            "{:>12}  {}  {:<10} {:<16} caption {:>6}  data {:>8}{}",
            record.stamp,
            format_stamp(Stamp::new(record.stamp)),
            record.record_type,
            record.id,
            record.caption_size,
            record.data_size,
            if record.out_of_order { "  (out of order)" } else { "" }
        );
    }
    println!();
    println!("{} records", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use blackbox_core::{Identifier, WriterConfig};
    use tempfile::tempdir;

    fn write_box(bb: &BlackBox, location: &Location) {
        let writer = bb
            .writer(location.clone(), WriterConfig::new().page_size(256).file_size(4096))
            .unwrap();
        let id = Identifier::default();
        writer.push_reference(Stamp::new(100), id, "c0", "d0").unwrap();
        writer.push_increment(Stamp::new(110), id, "c1", "b", "after").unwrap();
        writer.push_incoming_package(Stamp::new(120), id, "c2", "p").unwrap();
    }

    #[test]
    fn dumps_both_directions() {
        let dir = tempdir().unwrap();
        let bb = BlackBox::new();
        let location = bb.location(dir.path(), "d-", ".bbx");
        write_box(&bb, &location);

        let forward = DumpOptions {
            from: None,
            limit: None,
            forward: true,
        };
        let records = read_records(&bb, &location, &forward).unwrap();
        let stamps: Vec<i64> = records.iter().map(|r| r.stamp).collect();
        assert_eq!(stamps, [100, 110, 120]);
        assert_eq!(records[1].data_size, 5);

        let backward = DumpOptions {
            forward: false,
            limit: Some(2),
            ..forward
        };
        let records = read_records(&bb, &location, &backward).unwrap();
        let stamps: Vec<i64> = records.iter().map(|r| r.stamp).collect();
        assert_eq!(stamps, [120, 110]);
        assert_eq!(records[1].data_size, 1);
    }

    #[test]
    fn empty_box_is_an_error() {
        let dir = tempdir().unwrap();
        let bb = BlackBox::new();
        let location = bb.location(dir.path(), "d-", ".bbx");
        let options = DumpOptions {
            from: None,
            limit: None,
            forward: true,
        };
        assert!(read_records(&bb, &location, &options).is_err());
    }
}
