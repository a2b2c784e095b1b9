//! Human-friendly formatting for log output.

use std::time::Duration;

/// Elapsed-time text for run markers: sub-minute runs keep centisecond
/// precision, longer runs round to whole seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(60) {
        format!("{:.2} sec", elapsed.as_secs_f64())
    } else {
        let rounded = Duration::from_secs(elapsed.as_secs_f64().round() as u64);
        humantime::format_duration(rounded).to_string()
    }
}

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Pretty-format a byte count with decimal (1000-based) units.
pub fn prettify_size(size: u64) -> String {
    let mut value = size;
    let mut unit = 0;
    while value >= 1000 && unit < UNITS.len() - 1 {
        value /= 1000;
        unit += 1;
    }
    format!("{} {}", value, UNITS[unit])
}
