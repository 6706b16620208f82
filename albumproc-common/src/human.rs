//! Human-readable formatting for run summaries and log lines
//!
//! Byte sizes use binary units (1 KB = 1024 bytes). Elapsed times pick a
//! format by magnitude so short runs stay readable and overnight runs stay
//! compact.

/// Elapsed time format thresholds (seconds)
const SHORT_FORMAT_MAX: u64 = 100; // < 100s → X.XXs
const MEDIUM_FORMAT_MAX: u64 = 6000; // < 100m → M:SS
                                     // >= 100m → H:MM:SS

/// Format a byte count, e.g. `1536` → `"1.50 KB"`.
///
/// # Examples
///
/// ```
/// use albumproc_common::human::format_bytes;
///
/// assert_eq!(format_bytes(0), "0.00 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.2} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.2} PB", size)
}

/// Format elapsed seconds for a run summary.
///
/// # Examples
///
/// ```
/// use albumproc_common::human::format_elapsed;
///
/// assert_eq!(format_elapsed(4.5), "4.50s");
/// assert_eq!(format_elapsed(330.0), "5:30");
/// assert_eq!(format_elapsed(7261.0), "2:01:01");
/// ```
pub fn format_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let whole = seconds as u64;

    if whole < SHORT_FORMAT_MAX {
        format!("{:.2}s", seconds)
    } else if whole < MEDIUM_FORMAT_MAX {
        format!("{}:{:02}", whole / 60, whole % 60)
    } else {
        let hours = whole / 3600;
        let mins = (whole % 3600) / 60;
        let secs = whole % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Bytes to megabytes rounded to two decimals, as written in inventory lines.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}
