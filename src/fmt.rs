/// Format a spreadsheet number as plain text: integers without a trailing
/// `.0`, never scientific notation. Phone numbers stored as numeric cells
/// come through here.
pub fn plain_number(val: f64) -> String {
    if val.is_finite() && val.fract() == 0.0 && val.abs() < 1e15 {
        format!("{}", val as i64)
    } else {
        format!("{val}")
    }
}

/// Format a byte count for display: 1.2 KB, 3.4 MB.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_number() {
        assert_eq!(plain_number(9876543210.0), "9876543210");
        assert_eq!(plain_number(1500.0), "1500");
        assert_eq!(plain_number(1500.5), "1500.5");
        assert_eq!(plain_number(-42.0), "-42");
        assert_eq!(plain_number(919876543210.0), "919876543210");
    }

    #[test]
    fn test_plain_number_never_scientific() {
        let big = plain_number(1.2345678901234567e20);
        assert!(!big.contains('e'), "got {big}");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
