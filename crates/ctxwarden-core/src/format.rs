//! Human-readable formatting helpers.

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Format a byte count as B/KB/MB/GB (base 1024).
///
/// Whole values print without a decimal; anything else prints with one
/// decimal place.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // 1023.97 KB would otherwise print as "1024.0 KB"
    let rounded = (value * 10.0).round() / 10.0;
    if rounded >= 1024.0 && unit < UNITS.len() - 1 {
        value = rounded / 1024.0;
        unit += 1;
    }

    if value.fract() == 0.0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
