//! Convert command implementation.

use blackbox_core::{
    BlackBox, Location, ReadResult, Reader, Record, RecordType, Stamp, WriterConfig,
};

/// Conversion statistics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConvertStats {
    /// Records written to the target.
    pub written: usize,
    /// Packages left out.
    pub skipped: usize,
    /// Boundary references already written from the previous file.
    pub duplicates: usize,
    /// Writer restarts crossed.
    pub sessions: usize,
}

/// Runs the convert command.
pub fn run(
    bb: &BlackBox,
    source: &Location,
    target: Location,
    skip_packages: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Converting {:?} into {:?}",
        source.directory(),
        target.directory()
    );
    let stats = convert(bb, source, target, skip_packages)?;
    println!(
        "Wrote {} records ({} packages skipped, {} duplicate references, {} sessions)",
        stats.written,
        stats.skipped,
        stats.duplicates,
        stats.sessions + 1
    );
    Ok(())
}

/// Replays every record of `source` into a new writer on `target`.
pub fn convert(
    bb: &BlackBox,
    source: &Location,
    target: Location,
    skip_packages: bool,
) -> Result<ConvertStats, Box<dyn std::error::Error>> {
    let reader = bb.reader(source.clone());
    let (begin, _) = reader.available_time_interval();
    let landed = reader.rewind(begin);
    if !landed.is_ok() {
        return Err(format!("Source box has no reference: {}", landed).into());
    }

    let config = WriterConfig::new().time_zone(reader.timezone());
    let writer = bb.writer(target, config)?;

    let mut stats = ConvertStats::default();
    let mut last_reference: Option<Stamp> = None;
    loop {
        let record_type = reader.current_type().ok_or("Reader lost its position")?;
        let stamp = reader.current_stamp().ok_or("Reader lost its position")?;
        let id = reader.current_identifier().ok_or("Reader lost its position")?;

        if record_type.is_package() && skip_packages {
            stats.skipped += 1;
        } else if record_type == RecordType::Reference && last_reference == Some(stamp) {
            stats.duplicates += 1;
        } else {
            writer.push(stamp, id, read_record(&reader, record_type)?)?;
            stats.written += 1;
        }
        last_reference = match record_type {
            RecordType::Reference => Some(stamp),
            _ => None,
        };

        match reader.next() {
            ReadResult::Success => {}
            ReadResult::NewSession | ReadResult::TimeSequenceViolation => {
                if reader.force_next() != ReadResult::Success {
                    break;
                }
                stats.sessions += 1;
                last_reference = None;
            }
            _ => break,
        }
    }

    writer.flush()?;
    tracing::info!(written = stats.written, "conversion finished");
    Ok(stats)
}

fn read_record(reader: &Reader, record_type: RecordType) -> Result<Record, String> {
    let failed = |code: ReadResult| format!("Cannot read record: {}", code);
    if record_type == RecordType::Increment {
        let inc = reader.read_increment().map_err(failed)?;
        return Ok(Record::Increment {
            caption: inc.caption,
            before: inc.before,
            after: inc.after,
        });
    }
    let r = reader.read_any().map_err(failed)?;
    Ok(match record_type {
        RecordType::Reference => Record::Reference {
            caption: r.caption,
            data: r.data,
        },
        RecordType::IncomingPackage => Record::IncomingPackage {
            caption: r.caption,
            data: r.data,
        },
        _ => Record::OutboxPackage {
            caption: r.caption,
            data: r.data,
        },
    })
}
