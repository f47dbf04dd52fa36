//! Human-readable formatting for durations and byte sizes
//!
//! Provides consistent progress-log formatting across all pipeline steps.

/// Format seconds as a human-readable duration.
///
/// Sub-minute durations keep one decimal; longer durations switch to
/// whole-second component form.
///
/// # Examples
///
/// ```
/// use courtpulse_common::human_format::format_duration;
///
/// assert_eq!(format_duration(45.2), "45.2s");
/// assert_eq!(format_duration(125.7), "2m 5s");
/// assert_eq!(format_duration(3725.3), "1h 2m 5s");
/// ```
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{}m {}s", minutes, secs)
    } else {
        let hours = (seconds / 3600.0) as u64;
        let minutes = ((seconds % 3600.0) / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{}h {}m {}s", hours, minutes, secs)
    }
}

/// Format a byte count as a human-readable size.
///
/// Uses 1024-based units with one decimal place.
///
/// # Examples
///
/// ```
/// use courtpulse_common::human_format::format_size;
///
/// assert_eq!(format_size(512), "512.0 B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(2_411_724), "2.3 MB");
/// ```
pub fn format_size(size_bytes: u64) -> String {
    let mut size = size_bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Format a count with thousands separators.
///
/// # Examples
///
/// ```
/// use courtpulse_common::human_format::format_count;
///
/// assert_eq!(format_count(950), "950");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
