//! Value-shape recognizers and column-name heuristics.
//!
//! Everything here is a pure function over strings; the profiler and the
//! join suggestion engine combine them into their priority chains.

use once_cell::sync::Lazy;
use regex::Regex;

// These regexes are compile-time constants and known to be valid.
#[allow(clippy::expect_used)]
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Hard-coded regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?|ftp)://[^\s/$.?#][^\s]*$")
        .expect("Hard-coded regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("Hard-coded regex pattern should be valid")
});

#[allow(clippy::expect_used)]
static FOREIGN_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)[-_]?id$").expect("Hard-coded regex pattern should be valid")
});

/// Names that are identifiers regardless of their values.
const IDENTIFIER_NAMES: [&str; 4] = ["id", "uuid", "guid", "_rowindex"];

/// Suffixes that mark a numeric column as a key rather than a measure.
const NUMERIC_ID_SUFFIXES: [&str; 6] = ["id", "key", "no", "num", "index", "seq"];

/// Numeric codes that look like keys but are measures of place.
const CODE_EXCLUSIONS: [&str; 3] = ["zipcode", "postcode", "areacode"];

/// A string shape recognized by the profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePattern {
    Email,
    Url,
    Uuid,
}

impl ValuePattern {
    /// Patterns in the order they are checked.
    pub const ALL: [ValuePattern; 3] = [ValuePattern::Email, ValuePattern::Url, ValuePattern::Uuid];

    pub fn matches(&self, value: &str) -> bool {
        match self {
            ValuePattern::Email => is_email(value),
            ValuePattern::Url => is_url(value),
            ValuePattern::Uuid => is_uuid(value),
        }
    }

    /// Name recorded in `ColumnAnalysis::pattern`.
    pub fn name(&self) -> &'static str {
        match self {
            ValuePattern::Email => "email",
            ValuePattern::Url => "url",
            ValuePattern::Uuid => "uuid",
        }
    }
}

pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value.trim())
}

pub fn is_url(value: &str) -> bool {
    URL.is_match(value.trim())
}

pub fn is_uuid(value: &str) -> bool {
    UUID.is_match(value.trim())
}

/// Lower-cases a name and strips `_`, `-` and whitespace.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Name-based identifier detection.
///
/// Matches `id`, `uuid`, `guid`, `_rowindex`, anything ending in `_id`,
/// starting with `id_`, or ending in a camelCase `Id` (`customerId`).
pub fn is_identifier_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    if IDENTIFIER_NAMES.contains(&lower.as_str()) {
        return true;
    }
    if lower.ends_with("_id") || lower.starts_with("id_") {
        return true;
    }
    is_camel_case_id(name)
}

fn is_camel_case_id(name: &str) -> bool {
    let Some(prefix) = name.strip_suffix("Id") else {
        return false;
    };
    prefix
        .chars()
        .last()
        .is_some_and(|c| c.is_lowercase() || c.is_ascii_digit())
}

/// Key-like names for numeric columns (`order_no`, `customer_key`, `line_seq`).
pub fn is_numeric_id_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    if lower.starts_with("id_") {
        return true;
    }
    NUMERIC_ID_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

/// True for zip/post/area code columns, which are numeric but never keys.
pub fn is_code_exclusion(name: &str) -> bool {
    let normalized = normalize_name(name);
    CODE_EXCLUSIONS
        .iter()
        .any(|excluded| normalized.contains(excluded))
}

/// Base of a foreign-key shaped name, normalized.
///
/// `customer_id`, `customer-id`, `customerId` and `customerid` all yield
/// `customer`. A bare `id` has no base.
pub fn foreign_key_base(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    let captures = FOREIGN_KEY.captures(&lower)?;
    let base = normalize_name(captures.get(1)?.as_str());
    (!base.is_empty()).then_some(base)
}

/// Naive singular, normalized form of a table name (`customers` -> `customer`).
///
/// Only a single trailing `s` is removed, so irregular plurals come out
/// wrong (`categories` -> `categorie`).
pub fn table_base_name(table_name: &str) -> String {
    let lower = table_name.trim().to_lowercase();
    let singular = lower.strip_suffix('s').unwrap_or(&lower);
    normalize_name(singular)
}
