//! Display formatting contracts shared by any renderer of the
//! snapshot table: price, percent change and large-magnitude values.

/// Formats a price with a precision tier matched to its magnitude,
/// so sub-cent instruments stay readable next to five-figure ones.
pub fn format_price(price: f64) -> String {
    if price >= 1000.0 {
        format!("${}", group_thousands(price))
    } else if price >= 0.01 {
        format!("${price:.2}")
    } else if price >= 0.0001 {
        format!("${price:.4}")
    } else {
        format!("${price:.8}")
    }
}

/// Formats a percent change with an explicit sign for gains.
pub fn format_percent(change: f64) -> String {
    if change > 0.0 {
        format!("+{change:.2}%")
    } else {
        format!("{change:.2}%")
    }
}

/// Formats a volume / market-cap style magnitude with B/M/K suffixes.
pub fn format_magnitude(value: f64) -> String {
    if value >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.2}K", value / 1_000.0)
    } else {
        format!("${value:.2}")
    }
}

/// Magnitude formatting for fields the secondary source may not have.
pub fn format_magnitude_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format_magnitude(v),
        None => "N/A".to_string(),
    }
}

fn group_thousands(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, f),
        None => (formatted.as_str(), "00"),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    format!("{grouped}.{frac_part}")
}
