//! CLI command implementations.

pub mod convert;
pub mod dump;
pub mod inspect;
pub mod verify;

use blackbox_core::Stamp;
use chrono::DateTime;

/// Renders a stamp as UTC time, or `-` for an unset stamp.
pub fn format_stamp(stamp: Stamp) -> String {
    if stamp.is_zero() {
        return "-".to_string();
    }
    match DateTime::from_timestamp(stamp.secs(), 0) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => stamp.to_string(),
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
