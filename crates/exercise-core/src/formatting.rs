/// Placeholder printed for an absent cell.
pub const ABSENT: &str = "-";

/// Format a count with a comma between each group of three digits.
///
/// # Examples
///
/// ```
/// use exercise_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(999), "999");
/// assert_eq!(format_count(86_400), "86,400");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
pub fn format_count(n: usize) -> String {
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

/// Format a table cell. Absent cells print as [`ABSENT`], never as zero.
///
/// # Examples
///
/// ```
/// use exercise_core::formatting::format_cell;
///
/// assert_eq!(format_cell(Some(142.0), 1), "142.0");
/// assert_eq!(format_cell(Some(0.0), 1), "0.0");
/// assert_eq!(format_cell(None, 1), "-");
/// ```
pub fn format_cell(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.prec$}", v, prec = decimals),
        None => ABSENT.to_string(),
    }
}

/// Format a duration in seconds as a compact string.
///
/// * `< 60` seconds → `"45s"`
/// * `< 1` hour → `"12m 5s"`
/// * otherwise → `"1h 2m"`
///
/// # Examples
///
/// ```
/// use exercise_core::formatting::format_duration;
///
/// assert_eq!(format_duration(45.0),   "45s");
/// assert_eq!(format_duration(725.0),  "12m 5s");
/// assert_eq!(format_duration(3720.0), "1h 2m");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as i64;
    if total < 60 {
        format!("{}s", total)
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero.
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

// ── Tests ──────────────────────────────────────────────────────────────────────
