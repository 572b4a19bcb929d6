//! Human-readable sizes and timestamps for listing entries.

use std::time::SystemTime;

use chrono::{DateTime, Local};

const UNITS: [(&str, u64); 5] = [
    ("PB", 1 << 50),
    ("TB", 1 << 40),
    ("GB", 1 << 30),
    ("MB", 1 << 20),
    ("KB", 1 << 10),
];

/// Binary-prefixed size with two fixed decimals, e.g. `1.50 KB`.
pub fn human_size(len: u64) -> String {
    for (unit, scale) in UNITS {
        if len >= scale {
            return format!("{:.2} {unit}", len as f64 / scale as f64);
        }
    }
    format!("{len}.00 B")
}

/// Local time as `MM/DD/YYYY, hh:mm AM`.
pub fn format_mtime(modified: SystemTime) -> String {
    let local: DateTime<Local> = modified.into();
    local.format("%m/%d/%Y, %I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0.00 B");
        assert_eq!(human_size(1023), "1023.00 B");
        assert_eq!(human_size(1536), "1.50 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(human_size(3 << 30), "3.00 GB");
    }

    #[test]
    fn test_format_mtime_shape() {
        let formatted = format_mtime(SystemTime::now());
        // MM/DD/YYYY, hh:mm XM
        assert_eq!(formatted.len(), 20);
        assert_eq!(&formatted[2..3], "/");
        assert_eq!(&formatted[10..12], ", ");
        assert!(formatted.ends_with("AM") || formatted.ends_with("PM"));
    }
}
