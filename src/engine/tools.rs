//! Formatting and path utilities

use std::path::Path;
use std::time::Duration;

use crate::utils::config::{GIGABYTE, KILOBYTE, MEGABYTE};

/// Byte count as `"2GB 50KB 200B"`: binary units, zero components left out.
/// Zero bytes is `"0B"`.
pub fn format_size(bytes: u64) -> String {
    let mut parts = Vec::with_capacity(4);
    let mut rest = bytes;
    for (unit, suffix) in [(GIGABYTE, "GB"), (MEGABYTE, "MB"), (KILOBYTE, "KB")] {
        if rest >= unit {
            parts.push(format!("{}{}", rest / unit, suffix));
        }
        rest %= unit;
    }
    if rest > 0 || parts.is_empty() {
        parts.push(format!("{}B", rest));
    }
    parts.join(" ")
}

/// Seconds with millisecond precision, e.g. `1.234s`.
pub fn format_secs(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

/// Hidden by the dot-file convention. Paths without a UTF-8 file name are not hidden.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n != "." && n != "..")
}

/// Display name of a path: its last component, or the whole path for roots like `/` or `.`.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
