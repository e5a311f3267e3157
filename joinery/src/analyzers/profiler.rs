//! Column profiling and semantic classification.
//!
//! The [`ColumnProfiler`] computes per-column statistics over in-memory rows
//! and assigns each column a [`ColumnCategory`]. Categories are resolved by a
//! strict priority chain; the first rule that matches wins:
//!
//! 1. **Field hints**: caller metadata marking a column as identifier or reference.
//! 2. **Identifier shape**: UUID-valued columns become `uuid` (even over an
//!    identifier hint); id-like names or near-unique high-cardinality columns
//!    become `identifier`.
//! 3. **Value shape**: booleans, numbers (key-like names stay identifiers),
//!    dates, then string analysis (email/url/uuid patterns, unique strings,
//!    low-cardinality categoricals, free text).
//!
//! Profiling never fails: empty input produces empty output, and columns
//! without values are `unknown`.
//!
//! # Example
//!
//! ```rust
//! use joinery::analyzers::{ColumnCategory, ColumnProfiler};
//! use joinery::core::{Scalar, TabularDataset};
//!
//! let users = TabularDataset::from_values(
//!     &["user_id", "email"],
//!     vec![
//!         vec![Scalar::Int(1), Scalar::from("ada@example.com")],
//!         vec![Scalar::Int(2), Scalar::from("grace@example.com")],
//!     ],
//! );
//!
//! let profile = ColumnProfiler::new().profile_dataset(&users, None);
//! assert_eq!(profile[0].category, ColumnCategory::Identifier);
//! assert_eq!(profile[1].category, ColumnCategory::Email);
//! assert_eq!(profile[1].pattern.as_deref(), Some("email"));
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::patterns::{
    is_code_exclusion, is_identifier_name, is_numeric_id_name, ValuePattern,
};
use crate::core::scalar::parse_date_like;
use crate::core::{FieldHint, FieldHints, Row, Scalar, TabularDataset};
use crate::logging::LogConfig;
use crate::perf_debug;

/// Semantic category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnCategory {
    Identifier,
    Reference,
    Email,
    Url,
    Uuid,
    Categorical,
    Numerical,
    Temporal,
    Boolean,
    Text,
    Unknown,
}

impl ColumnCategory {
    /// Identifier or reference: the categories that make join keys.
    pub fn is_key_like(&self) -> bool {
        matches!(self, ColumnCategory::Identifier | ColumnCategory::Reference)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnCategory::Identifier => "identifier",
            ColumnCategory::Reference => "reference",
            ColumnCategory::Email => "email",
            ColumnCategory::Url => "url",
            ColumnCategory::Uuid => "uuid",
            ColumnCategory::Categorical => "categorical",
            ColumnCategory::Numerical => "numerical",
            ColumnCategory::Temporal => "temporal",
            ColumnCategory::Boolean => "boolean",
            ColumnCategory::Text => "text",
            ColumnCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics and category of one column.
///
/// `uniqueness` is `cardinality / non_null_count`, or `0` when the column
/// has no non-null values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnAnalysis {
    pub column_name: String,
    pub category: ColumnCategory,
    pub cardinality: u64,
    pub uniqueness: f64,
    pub null_count: u64,
    pub sample_values: Vec<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl ColumnAnalysis {
    /// Number of non-null values the statistics were computed from.
    pub fn non_null_count(&self) -> u64 {
        if self.uniqueness > 0.0 {
            (self.cardinality as f64 / self.uniqueness).round() as u64
        } else {
            0
        }
    }
}

/// Thresholds used by the category chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Fraction of non-empty strings that must match a pattern (default: 0.8)
    pub pattern_threshold: f64,
    /// Uniqueness above which a column is an identifier (default: 0.95)
    pub identifier_uniqueness: f64,
    /// Cardinality a near-unique column must exceed to be an identifier (default: 10)
    pub identifier_min_cardinality: u64,
    /// Cardinality/row-count ratio below which strings are categorical (default: 0.2)
    pub categorical_ratio: f64,
    /// Cardinality below which strings are always categorical (default: 50)
    pub categorical_limit: u64,
    /// Number of distinct sample values kept per column (default: 5)
    pub sample_size: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            pattern_threshold: 0.8,
            identifier_uniqueness: 0.95,
            identifier_min_cardinality: 10,
            categorical_ratio: 0.2,
            categorical_limit: 50,
            sample_size: 5,
        }
    }
}

/// Builder for ColumnProfiler
pub struct ColumnProfilerBuilder {
    config: ProfilerConfig,
    log_config: LogConfig,
}

impl ColumnProfilerBuilder {
    /// Set the pattern match threshold
    pub fn pattern_threshold(mut self, threshold: f64) -> Self {
        self.config.pattern_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the uniqueness threshold for identifier detection
    pub fn identifier_uniqueness(mut self, threshold: f64) -> Self {
        self.config.identifier_uniqueness = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the minimum cardinality for uniqueness-based identifier detection
    pub fn identifier_min_cardinality(mut self, cardinality: u64) -> Self {
        self.config.identifier_min_cardinality = cardinality;
        self
    }

    /// Set the categorical cardinality ratio
    pub fn categorical_ratio(mut self, ratio: f64) -> Self {
        self.config.categorical_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the absolute categorical cardinality limit
    pub fn categorical_limit(mut self, limit: u64) -> Self {
        self.config.categorical_limit = limit;
        self
    }

    /// Set the number of sample values kept per column
    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.sample_size = size;
        self
    }

    /// Set the logging configuration; per-column events are debug level
    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Build the ColumnProfiler
    pub fn build(self) -> ColumnProfiler {
        ColumnProfiler {
            config: self.config,
            log_config: self.log_config,
        }
    }
}

/// Computes [`ColumnAnalysis`] entries for tabular rows.
#[derive(Debug, Clone)]
pub struct ColumnProfiler {
    config: ProfilerConfig,
    log_config: LogConfig,
}

impl ColumnProfiler {
    /// Create a new builder for ColumnProfiler
    pub fn builder() -> ColumnProfilerBuilder {
        ColumnProfilerBuilder {
            config: ProfilerConfig::default(),
            log_config: LogConfig::default(),
        }
    }

    /// Create a ColumnProfiler with default configuration
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: ProfilerConfig) -> Self {
        Self {
            config,
            log_config: LogConfig::default(),
        }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profiles every column of a dataset in schema order.
    pub fn profile_dataset(
        &self,
        dataset: &TabularDataset,
        hints: Option<&FieldHints>,
    ) -> Vec<ColumnAnalysis> {
        let names = dataset.column_names();
        self.profile(&dataset.rows, Some(names.as_slice()), hints)
    }

    /// Profiles rows, one entry per column.
    ///
    /// Column names come from `columns` when given, in that order. Otherwise
    /// they are the keys of the first row, which a [`Row`] keeps sorted by
    /// name; use [`profile_dataset`](Self::profile_dataset) to keep schema order.
    #[instrument(skip_all, fields(rows = rows.len()))]
    pub fn profile(
        &self,
        rows: &[Row],
        columns: Option<&[&str]>,
        hints: Option<&FieldHints>,
    ) -> Vec<ColumnAnalysis> {
        let names: Vec<&str> = match columns {
            Some(columns) => columns.to_vec(),
            None => rows
                .first()
                .map(|row| row.keys().map(String::as_str).collect())
                .unwrap_or_default(),
        };

        names
            .into_iter()
            .map(|name| {
                let hint = hints.and_then(|h| h.get(name)).copied().unwrap_or_default();
                self.profile_column(name, rows, hint)
            })
            .collect()
    }

    /// Profiles a single column of `rows`.
    pub fn profile_column(&self, name: &str, rows: &[Row], hint: FieldHint) -> ColumnAnalysis {
        let row_count = rows.len() as u64;
        let non_null: Vec<&Scalar> = rows
            .iter()
            .filter_map(|row| row.get(name))
            .filter(|value| !value.is_null())
            .collect();

        let mut seen = HashSet::new();
        let mut sample_values = Vec::new();
        for value in &non_null {
            if seen.insert(value.distinct_key()) && sample_values.len() < self.config.sample_size
            {
                sample_values.push((*value).clone());
            }
        }

        let non_null_count = non_null.len() as u64;
        let cardinality = seen.len() as u64;
        let uniqueness = if non_null_count > 0 {
            cardinality as f64 / non_null_count as f64
        } else {
            0.0
        };

        let stats = ColumnStats {
            name,
            row_count,
            cardinality,
            uniqueness,
            values: &non_null,
        };
        let (category, pattern) = self.classify(&stats, hint);

        perf_debug!(
            self.log_config,
            column = name,
            category = %category,
            cardinality,
            uniqueness,
            "Profiled column"
        );

        ColumnAnalysis {
            column_name: name.to_string(),
            category,
            cardinality,
            uniqueness,
            null_count: row_count - non_null_count,
            sample_values,
            pattern: pattern.map(|p| p.name().to_string()),
        }
    }

    fn classify(
        &self,
        stats: &ColumnStats<'_>,
        hint: FieldHint,
    ) -> (ColumnCategory, Option<ValuePattern>) {
        let mut category = if hint.is_identifier {
            ColumnCategory::Identifier
        } else if hint.is_reference {
            ColumnCategory::Reference
        } else {
            ColumnCategory::Unknown
        };

        let may_refine = matches!(
            category,
            ColumnCategory::Unknown | ColumnCategory::Identifier
        );
        if may_refine && self.pattern_ratio(stats.values, ValuePattern::Uuid) >= self.config.pattern_threshold
        {
            return (ColumnCategory::Uuid, Some(ValuePattern::Uuid));
        }

        if category == ColumnCategory::Unknown
            && (is_identifier_name(stats.name)
                || (stats.uniqueness > self.config.identifier_uniqueness
                    && stats.cardinality > self.config.identifier_min_cardinality))
        {
            category = ColumnCategory::Identifier;
        }

        if category != ColumnCategory::Unknown {
            return (category, None);
        }

        self.classify_by_values(stats)
    }

    fn classify_by_values(&self, stats: &ColumnStats<'_>) -> (ColumnCategory, Option<ValuePattern>) {
        let Some(first) = stats.values.first() else {
            return (ColumnCategory::Unknown, None);
        };

        match first {
            Scalar::Bool(_) => return (ColumnCategory::Boolean, None),
            Scalar::Int(_) | Scalar::Float(_) => {
                let category = if is_numeric_id_name(stats.name) && !is_code_exclusion(stats.name)
                {
                    ColumnCategory::Identifier
                } else {
                    ColumnCategory::Numerical
                };
                return (category, None);
            }
            Scalar::Timestamp(_) => return (ColumnCategory::Temporal, None),
            Scalar::String(s) if parse_date_like(s).is_some() => {
                return (ColumnCategory::Temporal, None)
            }
            _ => {}
        }

        for pattern in ValuePattern::ALL {
            if self.pattern_ratio(stats.values, pattern) >= self.config.pattern_threshold {
                let category = match pattern {
                    ValuePattern::Email => ColumnCategory::Email,
                    ValuePattern::Url => ColumnCategory::Url,
                    ValuePattern::Uuid => ColumnCategory::Uuid,
                };
                return (category, Some(pattern));
            }
        }

        if stats.uniqueness == 1.0 && stats.row_count > 1 {
            return (ColumnCategory::Identifier, None);
        }

        let cardinality = stats.cardinality as f64;
        if cardinality < stats.row_count as f64 * self.config.categorical_ratio
            || stats.cardinality < self.config.categorical_limit
        {
            return (ColumnCategory::Categorical, None);
        }

        (ColumnCategory::Text, None)
    }

    /// Fraction of non-empty string values matching `pattern`; 0 without strings.
    fn pattern_ratio(&self, values: &[&Scalar], pattern: ValuePattern) -> f64 {
        let strings: Vec<&str> = values
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .collect();
        if strings.is_empty() {
            return 0.0;
        }
        let matching = strings.iter().filter(|s| pattern.matches(s)).count();
        matching as f64 / strings.len() as f64
    }
}

impl Default for ColumnProfiler {
    fn default() -> Self {
        Self::new()
    }
}

struct ColumnStats<'a> {
    name: &'a str,
    row_count: u64,
    cardinality: u64,
    uniqueness: f64,
    values: &'a [&'a Scalar],
}
