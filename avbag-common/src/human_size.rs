//! Human-readable byte-count formatting
//!
//! Used for the `Bag-Size` field written during repair and for run
//! summaries. Binary multiples (1024), one decimal place, trailing `.0`
//! trimmed so round values read naturally.

/// Scale thresholds (bytes)
const KIB: f64 = 1024.0;
const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Format a byte count as a human-readable size.
///
/// Values under 1 KB are reported in whole bytes; larger values scale to
/// the largest unit that keeps the number above 1, with one decimal place.
///
/// # Examples
///
/// ```
/// use avbag_common::human_size::format_human_size;
///
/// assert_eq!(format_human_size(0), "0 B");
/// assert_eq!(format_human_size(512), "512 B");
/// assert_eq!(format_human_size(1536), "1.5 KB");
/// assert_eq!(format_human_size(7 * 1024 * 1024), "7 MB");
/// assert_eq!(format_human_size(66_500_000_000), "61.9 GB");
/// ```
pub fn format_human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / KIB;
    let mut unit = UNITS[0];
    for candidate in &UNITS[1..] {
        if value < KIB {
            break;
        }
        value /= KIB;
        unit = candidate;
    }

    let rounded = (value * 10.0).round() / 10.0;
    if (rounded - rounded.floor()).abs() < 0.001 {
        format!("{:.0} {}", rounded, unit)
    } else {
        format!("{:.1} {}", rounded, unit)
    }
}
