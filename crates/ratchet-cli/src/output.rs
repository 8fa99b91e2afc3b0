//! Shared rendering helpers for the table and JSON views

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Pretty-print a payload as JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Section heading used by the multi-part views
pub(crate) fn heading(title: &str) -> String {
    format!("── {title} ──")
}

/// Timestamp format used in run tables
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Fixed-precision metric value
pub(crate) fn metric(value: f64) -> String {
    format!("{value:.6}")
}

/// Human-readable byte size, one decimal place
pub(crate) fn byte_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;
    let scaled = |unit: u64, label: &str| {
        let whole = bytes / unit;
        let tenths = bytes % unit * 10 / unit;
        format!("{whole}.{tenths} {label}")
    };
    if bytes >= GIB {
        scaled(GIB, "GB")
    } else if bytes >= MIB {
        scaled(MIB, "MB")
    } else if bytes >= KIB {
        scaled(KIB, "KB")
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn byte_sizes_scale() {
        assert_eq!(byte_size(512), "512 B");
        assert_eq!(byte_size(1024), "1.0 KB");
        assert_eq!(byte_size(1536), "1.5 KB");
        assert_eq!(byte_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(byte_size(3 * 1024 * 1024 * 1024 + 512 * 1024 * 1024), "3.5 GB");
    }

    #[test]
    fn metric_uses_fixed_precision() {
        assert_eq!(metric(0.38), "0.380000");
        assert_eq!(metric(12.0), "12.000000");
    }
}
