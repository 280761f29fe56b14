//! Verify command implementation.

use blackbox_core::{FileSummary, Location, RecordType};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of files checked.
    pub files_checked: usize,
    /// Number of pages checked.
    pub pages_checked: usize,
    /// Number of parts checked.
    pub parts_checked: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// True if no problem was found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(location: &Location) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying box at {:?}", location.directory());
    println!();

    let result = verify(location);
    println!(
        "Checked {} files, {} pages, {} parts",
        result.files_checked, result.pages_checked, result.parts_checked
    );
    for error in &result.errors {
        println!("  ERROR: {}", error);
    }

    println!();
    if result.is_ok() {
        println!("✓ Box verification passed");
        Ok(())
    } else {
        println!("✗ Box verification failed");
        Err("Verification failed".into())
    }
}

/// Checks every file of `location`.
pub fn verify(location: &Location) -> VerifyResult {
    let mut result = VerifyResult::default();
    let chain = location.refresh_chain();
    for entry in chain.entries() {
        result.files_checked += 1;
        verify_file(&location.directory().join(entry.name()), &mut result);
    }
    result
}

fn verify_file(path: &Path, result: &mut VerifyResult) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let summary = match FileSummary::read(path) {
        Ok(summary) => summary,
        Err(code) => {
            result.errors.push(format!("{}: cannot open: {}", name, code));
            return;
        }
    };

    match summary.pages.first().and_then(|p| p.parts.first()) {
        Some(first)
            if first.tag.contains_beginning() && first.record_type == RecordType::Reference => {}
        Some(first) => result.errors.push(format!(
            "{}: starts with {:?} {} instead of a reference",
            name,
            first.tag,
            first.record_type.name()
        )),
        None => result.errors.push(format!("{}: holds no records", name)),
    }

    let last_page = summary.pages.len().saturating_sub(1);
    let mut unfinished = false;
    for page in &summary.pages {
        result.pages_checked += 1;
        if !page.valid {
            result
                .errors
                .push(format!("{}: page {}: unreadable header", name, page.index));
            break;
        }
        if page.clipped && page.index != last_page {
            result
                .errors
                .push(format!("{}: page {}: truncated before the last page", name, page.index));
        }

        for (i, part) in page.parts.iter().enumerate() {
            result.parts_checked += 1;
            if part.tag.is_continuation() {
                if !unfinished || i != 0 {
                    result.errors.push(format!(
                        "{}: page {} part {}: continuation without a started record",
                        name, page.index, i
                    ));
                }
            } else if unfinished {
                result.errors.push(format!(
                    "{}: page {} part {}: record starts before the previous one ended",
                    name, page.index, i
                ));
            }
            unfinished = !part.tag.contains_end();
        }
    }
}
