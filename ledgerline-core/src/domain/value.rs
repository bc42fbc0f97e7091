//! Cell values shared by incoming batches and the sheet

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// A scalar held by a batch cell or a sheet cell
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Blank cell. Equal to the empty string under `loose_eq`.
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Build a text value, mapping the empty string to `Empty`
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            Value::Empty
        } else {
            Value::Text(s)
        }
    }

    /// True for `Empty` and for the empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Compare the way the sheet compares typed-in values.
    ///
    /// Timestamps compare as instants and never equal a non-timestamp.
    /// Numbers compare against text by coercing the text, where blank text
    /// coerces to zero.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Timestamp(_), _) | (_, Value::Timestamp(_)) => false,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Number(n), Value::Text(s)) | (Value::Text(s), Value::Number(n)) => {
                coerce_number(s) == Some(*n)
            }
            (Value::Number(n), Value::Empty) | (Value::Empty, Value::Number(n)) => *n == 0.0,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Empty, Value::Text(s)) | (Value::Text(s), Value::Empty) => s.is_empty(),
            (Value::Empty, Value::Empty) => true,
        }
    }

    /// Text used to key identifiers and to render cells
    pub fn key_text(&self) -> String {
        self.to_string()
    }

    /// Ordering used by sheet sorts: numbers and timestamps first (by
    /// magnitude), then text (case-insensitive), blanks always last.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Number(_) | Value::Timestamp(_) => 0,
                Value::Text(s) if s.is_empty() => 2,
                Value::Text(_) => 1,
                Value::Empty => 2,
            }
        }
        fn magnitude(v: &Value) -> f64 {
            match v {
                Value::Number(n) => *n,
                Value::Timestamp(ts) => ts.timestamp_millis() as f64,
                _ => 0.0,
            }
        }

        match rank(self).cmp(&rank(other)) {
            Ordering::Equal => match (self, other) {
                (Value::Text(a), Value::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
                _ if rank(self) == 0 => magnitude(self)
                    .partial_cmp(&magnitude(other))
                    .unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
            ord => ord,
        }
    }

    /// `sort_cmp` in the given direction, keeping blanks last either way
    pub fn sort_cmp_directed(&self, other: &Value, ascending: bool) -> Ordering {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if ascending => self.sort_cmp(other),
            (false, false) => other.sort_cmp(self),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

/// ISO-8601 UTC with milliseconds, e.g. `2024-01-15T05:00:00.000Z`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a number without a trailing `.0` for integral values
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

/// Numeric coercion of typed-in text.
///
/// Accepts surrounding whitespace, an optional sign, decimal digits with an
/// optional fraction and exponent, `Infinity`, and unsigned `0x`/`0o`/`0b`
/// integers. Blank text coerces to zero. Returns `None` for anything else.
pub fn coerce_number(text: &str) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() {
        return Some(0.0);
    }

    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = s.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
        }
    }

    let (sign, body) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if body == "Infinity" {
        return Some(sign * f64::INFINITY);
    }
    if !is_decimal_literal(body) {
        return None;
    }
    body.parse::<f64>().ok().map(|n| sign * n)
}

/// `digits [. digits] [e [+-] digits]` with at least one mantissa digit
fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut mantissa_digits = 0;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        mantissa_digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            mantissa_digits += 1;
        }
    }
    if mantissa_digits == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return false;
        }
    }
    i == bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number("1234.56"), Some(1234.56));
        assert_eq!(coerce_number("  -12 "), Some(-12.0));
        assert_eq!(coerce_number(""), Some(0.0));
        assert_eq!(coerce_number(".5"), Some(0.5));
        assert_eq!(coerce_number("1e3"), Some(1000.0));
        assert_eq!(coerce_number("0x1F"), Some(31.0));
        assert_eq!(coerce_number("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(coerce_number("inf"), None);
        assert_eq!(coerce_number("NaN"), None);
        assert_eq!(coerce_number("12abc"), None);
        assert_eq!(coerce_number("."), None);
        assert_eq!(coerce_number("1e"), None);
    }

    #[test]
    fn test_loose_eq_numbers_and_text() {
        assert!(Value::Number(12.5).loose_eq(&Value::Text("12.50".into())));
        assert!(Value::Text("7".into()).loose_eq(&Value::Number(7.0)));
        assert!(!Value::Text("7".into()).loose_eq(&Value::Text("7.0".into())));
        assert!(Value::Empty.loose_eq(&Value::Text(String::new())));
        assert!(Value::Empty.loose_eq(&Value::Number(0.0)));
        assert!(!Value::Empty.loose_eq(&Value::Text("x".into())));
    }

    #[test]
    fn test_loose_eq_timestamps_compare_instants() {
        let a = Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap();
        let b = chrono::DateTime::parse_from_rfc3339("2024-01-15T00:00:00-05:00")
            .unwrap()
            .with_timezone(&Utc);
        assert!(Value::Timestamp(a).loose_eq(&Value::Timestamp(b)));
        assert!(!Value::Timestamp(a).loose_eq(&Value::Text(format_timestamp(&a))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(100.0).to_string(), "100");
        assert_eq!(Value::Number(-0.25).to_string(), "-0.25");
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-01-15T00:00:00.000Z");
        assert_eq!(Value::Empty.to_string(), "");
    }

    #[test]
    fn test_sort_cmp_blanks_last() {
        let mut values = vec![
            Value::Empty,
            Value::Text("b".into()),
            Value::Number(3.0),
            Value::Text("A".into()),
            Value::Number(-1.0),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![
                Value::Number(-1.0),
                Value::Number(3.0),
                Value::Text("A".into()),
                Value::Text("b".into()),
                Value::Empty,
            ]
        );
    }
}
