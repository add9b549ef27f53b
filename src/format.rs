//! Number formatting for terminal output

/// Magnitude suffixes, largest first
const SUFFIXES: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

/// Formats a dollar amount with a magnitude suffix, e.g. `$2.9T` or `$950`
pub fn format_large_monetary(value: f64) -> String {
    if value < 0.0 {
        return format!("-{}", format_large_monetary(-value));
    }
    format!("${}", abbreviate(value))
}

/// Formats a count with a magnitude suffix, e.g. `15.2M` or `42`
pub fn format_large_number(value: f64) -> String {
    if value < 0.0 {
        return format!("-{}", format_large_number(-value));
    }
    abbreviate(value)
}

fn abbreviate(value: f64) -> String {
    for (scale, suffix) in SUFFIXES {
        if value >= scale {
            return format!("{:.1}{}", value / scale, suffix);
        }
    }
    format!("{}", value)
}

/// Formats a ratio rounded to two decimals
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.2}", (ratio * 100.0).round() / 100.0)
}

/// Formats an optional number with thousands separators and two decimals
///
/// Missing values render as `-`.
pub fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) => group_thousands(&format!("{:.2}", v)),
        None => "-".to_string(),
    }
}

/// Formats a fraction as a percentage with one or two decimals, e.g. `12.5%`
///
/// Missing values render as `-`.
pub fn format_percent(value: Option<f64>) -> String {
    let Some(v) = value else {
        return "-".to_string();
    };

    let mut digits = format!("{:.2}", v * 100.0);
    if digits.ends_with('0') {
        digits.pop();
    }
    format!("{}%", group_thousands(&digits))
}

/// Inserts `,` between groups of three integer digits
fn group_thousands(formatted: &str) -> String {
    let (sign, unsigned) = match formatted.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", formatted),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
