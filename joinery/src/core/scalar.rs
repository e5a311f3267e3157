//! Scalar cell values and the coercion used for cross-type equality.
//!
//! Datasets arrive from heterogeneous sources: the same key can be the
//! integer `42` in one table, the string `"42"` in another, and `42.0`
//! after a round trip through a float column. [`Scalar::coerce_key`] maps
//! all of those onto one canonical string so that joins match them.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// Deserializes from plain JSON scalars; timestamps are only produced by
/// Arrow conversion or explicit construction and serialize as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    /// Returns true for SQL-style missing values.
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Returns true for integer and float values.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric payload as `f64`, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Canonical comparison key used by the hash join.
    ///
    /// - `Null` has no key.
    /// - numbers and booleans use their plain string form (`42.0` becomes `"42"`).
    /// - timestamps use ISO-8601 with millisecond precision in UTC.
    /// - strings that look like dates are normalized to the same ISO form.
    /// - every other string is used verbatim.
    pub fn coerce_key(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Int(i) => Some(i.to_string()),
            Scalar::Float(f) => Some(format_float(*f)),
            Scalar::Timestamp(ts) => Some(iso_string(ts)),
            Scalar::String(s) => Some(match parse_date_like(s) {
                Some(ts) => iso_string(&ts),
                None => s.clone(),
            }),
        }
    }

    /// Type-tagged key used for distinct counting.
    ///
    /// Unlike [`Scalar::coerce_key`] this keeps `1` and `"1"` apart.
    pub fn distinct_key(&self) -> String {
        match self {
            Scalar::Null => "null".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => format_float(*f),
            Scalar::String(s) => format!("{s:?}"),
            Scalar::Timestamp(ts) => format!("{:?}", iso_string(ts)),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{}", format_float(*v)),
            Scalar::String(s) => write!(f, "{s}"),
            Scalar::Timestamp(ts) => write!(f, "{}", iso_string(ts)),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value as i64)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Timestamp(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// Formats a float the way a dynamic language prints numbers:
/// integral values lose their fractional part.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
        return format!("{}", value as i64);
    }
    format!("{value}")
}

/// ISO-8601 representation with millisecond precision, `Z` suffix.
pub fn iso_string(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns true if the text is a plain decimal number.
pub fn is_plain_number(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().is_ok()
}

/// Parses strings that look like dates or date-times.
///
/// Accepts RFC 3339, ISO dates with optional time (`T` or space separated,
/// interpreted as UTC), `YYYY/MM/DD` and US-style `MM/DD/YYYY`. Plain
/// numbers never count as dates.
pub fn parse_date_like(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.len() < 8 || is_plain_number(trimmed) {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_numbers_and_strings_share_keys() {
        assert_eq!(Scalar::Int(42).coerce_key(), Scalar::from("42").coerce_key());
        assert_eq!(Scalar::Float(42.0).coerce_key(), Some("42".to_string()));
        assert_eq!(Scalar::Float(1.5).coerce_key(), Some("1.5".to_string()));
        assert_eq!(Scalar::Bool(true).coerce_key(), Some("true".to_string()));
        assert_eq!(Scalar::Null.coerce_key(), None);
    }

    #[test]
    fn test_dates_normalize_to_iso() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let expected = Some("2024-03-01T00:00:00.000Z".to_string());

        assert_eq!(Scalar::Timestamp(ts).coerce_key(), expected);
        assert_eq!(Scalar::from("2024-03-01").coerce_key(), expected);
        assert_eq!(Scalar::from("2024-03-01T00:00:00Z").coerce_key(), expected);
        assert_eq!(Scalar::from("2024-03-01 00:00:00").coerce_key(), expected);
        assert_eq!(Scalar::from("03/01/2024").coerce_key(), expected);
    }

    #[test]
    fn test_plain_numbers_are_not_dates() {
        assert!(parse_date_like("20240301").is_none());
        assert!(parse_date_like("12345.678").is_none());
        assert!(parse_date_like("hello world").is_none());
        assert_eq!(
            Scalar::from("20240301").coerce_key(),
            Some("20240301".to_string())
        );
    }

    #[test]
    fn test_distinct_key_keeps_types_apart() {
        assert_ne!(Scalar::Int(1).distinct_key(), Scalar::from("1").distinct_key());
        assert_eq!(Scalar::Int(1).distinct_key(), Scalar::Float(1.0).distinct_key());
    }

    #[test]
    fn test_deserialize_from_json() {
        let values: Vec<Scalar> =
            serde_json::from_str(r#"[null, true, 7, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Scalar::Null,
                Scalar::Bool(true),
                Scalar::Int(7),
                Scalar::Float(2.5),
                Scalar::String("x".to_string())
            ]
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Scalar::from(None::<i64>), Scalar::Null);
        assert_eq!(Scalar::from(Some("a")), Scalar::String("a".to_string()));
    }
}
