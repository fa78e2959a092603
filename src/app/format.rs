//! Russian display formats for prices and dates.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike};

const NBSP: char = '\u{a0}';

const MONTHS: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Formats a price as whole roubles with grouped thousands: `"1500.00"` becomes
/// `"1 500 ₽"` (the separators are non-breaking spaces).
///
/// Text that is not a number is shown trimmed as-is; a missing or blank price is empty.
#[must_use]
pub fn format_price(price: Option<&str>) -> String {
    let Some(text) = price.map(str::trim).filter(|text| !text.is_empty()) else {
        return String::new();
    };
    let value = match text.parse::<f64>() {
        Ok(value) if value.is_finite() => value.round(),
        _ => return text.to_string(),
    };

    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if value < 0.0 {
        grouped.push('-');
    }
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(NBSP);
        }
        grouped.push(digit);
    }
    grouped.push(NBSP);
    grouped.push('₽');
    grouped
}

/// `"2024-03-12T14:05:00+03:00"` becomes `"12 марта 2024 г."`. Unparsable input is empty.
#[must_use]
pub fn format_date(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(parse)
        .map(|at| date(&at))
        .unwrap_or_default()
}

/// `"2024-03-12T14:05:00+03:00"` becomes `"12 марта 2024 г., 14:05"`, in the timestamp's
/// own offset. Unparsable input is empty.
#[must_use]
pub fn format_date_time(timestamp: Option<&str>) -> String {
    timestamp
        .and_then(parse)
        .map(|at| format!("{}, {:02}:{:02}", date(&at), at.hour(), at.minute()))
        .unwrap_or_default()
}

fn date(at: &NaiveDateTime) -> String {
    let month = MONTHS[at.month0() as usize];
    format!("{} {month} {} г.", at.day(), at.year())
}

/// Local wall-clock time of an RFC 3339 timestamp; offset-less timestamps are taken as is.
fn parse(timestamp: &str) -> Option<NaiveDateTime> {
    let timestamp = timestamp.trim();
    DateTime::<FixedOffset>::parse_from_rfc3339(timestamp)
        .map(|at| at.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}
