//! Display helpers shared by the console summary and the exporters.

/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use insight_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let rendered = format!("{:.prec$}", value.abs(), prec = decimals as usize);

    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rendered.as_str(), None),
    };

    let mut result = group_thousands(int_part);
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(frac);
    }

    // "-0.0" reads as noise in a report.
    if negative && result.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a percentage with one decimal place, e.g. `"42.5%"`.
pub fn format_percentage(value: f64) -> String {
    format!("{}%", format_number(value, 1))
}

/// Format a duration in minutes as `"45m"`, `"2h"` or `"1h 35m"`.
///
/// Fractions are rounded to the nearest minute.
pub fn format_minutes(minutes: f64) -> String {
    if !minutes.is_finite() || minutes <= 0.0 {
        return "0m".to_string();
    }
    let total = minutes.round() as u64;
    let hours = total / 60;
    let mins = total % 60;
    match (hours, mins) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

/// Round to one decimal place, the precision used in every export.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Turn an arbitrary label (an owner name, say) into a safe file-name
/// component. Anything other than ASCII letters, digits, `-` and `_` becomes
/// `_`; runs are collapsed and the result is never empty.
pub fn sanitize_file_component(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut last_underscore = false;
    for c in label.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            out.push(c);
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
