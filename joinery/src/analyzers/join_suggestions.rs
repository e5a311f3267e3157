//! Join key suggestions between two profiled tables.
//!
//! The [`JoinSuggestionEngine`] compares two [`ColumnAnalysis`] lists and proposes
//! ranked `(left, right)` column pairs. Strategies run in a fixed order and
//! never repeat a pair an earlier strategy already produced:
//!
//! 1. **Exact match** (high): identifier/reference columns with equal normalized names.
//! 2. **Forward foreign key** (high): the left table's `id` against right columns
//!    shaped `<left table>_id`.
//! 3. **Reverse foreign key** (high): left columns shaped `<right table>_id`
//!    against the right table's `id`.
//! 4. **Same name** (medium): unclaimed columns with equal normalized names and
//!    compatible categories.
//! 5. **Loose foreign key** (low): unclaimed right `<base>_id` columns against
//!    unclaimed left identifiers named after `<base>`.
//!
//! Output is stably sorted by confidence, so ties keep strategy and scan order.
//!
//! ## Example Usage
//!
//! ```rust
//! use joinery::analyzers::{ColumnProfiler, Confidence, JoinSuggestionEngine};
//! use joinery::core::{Scalar, TabularDataset};
//!
//! let customers = TabularDataset::from_values(
//!     &["id", "name"],
//!     vec![
//!         vec![Scalar::Int(1), Scalar::from("Ada")],
//!         vec![Scalar::Int(2), Scalar::from("Grace")],
//!     ],
//! );
//! let orders = TabularDataset::from_values(
//!     &["order_no", "customer_id"],
//!     vec![
//!         vec![Scalar::Int(10), Scalar::Int(1)],
//!         vec![Scalar::Int(11), Scalar::Int(1)],
//!     ],
//! );
//!
//! let profiler = ColumnProfiler::new();
//! let suggestions = JoinSuggestionEngine::new().suggest(
//!     &profiler.profile_dataset(&customers, None),
//!     &profiler.profile_dataset(&orders, None),
//!     Some("customers"),
//!     Some("orders"),
//! );
//!
//! assert_eq!(suggestions[0].left_column, "id");
//! assert_eq!(suggestions[0].right_column, "customer_id");
//! assert_eq!(suggestions[0].confidence, Confidence::High);
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::patterns::{foreign_key_base, normalize_name, table_base_name};
use super::profiler::{ColumnAnalysis, ColumnCategory};

/// Confidence tier of a join suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Sort rank; lower ranks sort first.
    pub fn rank(&self) -> u8 {
        match self {
            Confidence::High => 0,
            Confidence::Medium => 1,
            Confidence::Low => 2,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// A proposed join between a left and a right column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSuggestion {
    pub left_column: String,
    pub right_column: String,
    pub confidence: Confidence,
    pub reason: String,
}

/// Settings for [`JoinSuggestionEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionConfig {
    /// Run the low-confidence loose foreign key strategy
    pub loose_foreign_keys: bool,
    /// Keep at most this many suggestions after sorting
    pub max_suggestions: Option<usize>,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            loose_foreign_keys: true,
            max_suggestions: None,
        }
    }
}

/// Ranks candidate join columns between two column profiles.
#[derive(Debug, Clone, Default)]
pub struct JoinSuggestionEngine {
    config: SuggestionConfig,
}

impl JoinSuggestionEngine {
    /// Create a new suggestion engine with all strategies enabled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SuggestionConfig) -> Self {
        Self { config }
    }

    /// Enable or disable the loose foreign key strategy
    pub fn loose_foreign_keys(mut self, enabled: bool) -> Self {
        self.config.loose_foreign_keys = enabled;
        self
    }

    /// Set the maximum number of suggestions returned
    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.config.max_suggestions = Some(max);
        self
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    /// Suggests join column pairs, best first.
    ///
    /// Table names feed the foreign key strategies; without them only the
    /// name-matching strategies run. Never fails: empty profiles give an
    /// empty list.
    #[instrument(skip(self, left, right), fields(left_columns = left.len(), right_columns = right.len()))]
    pub fn suggest(
        &self,
        left: &[ColumnAnalysis],
        right: &[ColumnAnalysis],
        left_table: Option<&str>,
        right_table: Option<&str>,
    ) -> Vec<JoinSuggestion> {
        let left: Vec<&ColumnAnalysis> = left.iter().filter(|c| is_candidate(c)).collect();
        let right: Vec<&ColumnAnalysis> = right.iter().filter(|c| is_candidate(c)).collect();

        let mut acc = Suggestions::default();

        // 1. exact identifier/reference matches
        for l in left.iter().filter(|c| c.category.is_key_like()) {
            for r in right.iter().filter(|c| c.category.is_key_like()) {
                if normalize_name(&l.column_name) == normalize_name(&r.column_name) {
                    acc.push(l, r, Confidence::High, "exact match".to_string());
                }
            }
        }

        // 2. left.id <- right.<left table>_id
        if let Some(table) = left_table {
            let base = table_base_name(table);
            for l in left.iter().filter(|c| is_primary_id(c)) {
                for r in &right {
                    if foreign_key_base(&r.column_name).as_deref() == Some(base.as_str()) {
                        let reason = format!("{} references {}.{}", r.column_name, table, l.column_name);
                        acc.push(l, r, Confidence::High, reason);
                    }
                }
            }
        }

        // 3. left.<right table>_id -> right.id
        if let Some(table) = right_table {
            let base = table_base_name(table);
            for r in right.iter().filter(|c| is_primary_id(c)) {
                for l in &left {
                    if foreign_key_base(&l.column_name).as_deref() == Some(base.as_str()) {
                        let reason = format!("{} references {}.{}", l.column_name, table, r.column_name);
                        acc.push(l, r, Confidence::High, reason);
                    }
                }
            }
        }

        // 4. same name, compatible categories
        for l in &left {
            for r in &right {
                if acc.is_claimed(l, r) {
                    continue;
                }
                if normalize_name(&l.column_name) == normalize_name(&r.column_name)
                    && categories_compatible(l.category, r.category)
                {
                    acc.push(l, r, Confidence::Medium, "same name, compatible types".to_string());
                }
            }
        }

        // 5. loose foreign keys
        if self.config.loose_foreign_keys {
            for r in &right {
                let Some(base) = foreign_key_base(&r.column_name) else {
                    continue;
                };
                for l in left.iter().filter(|c| c.category == ColumnCategory::Identifier) {
                    if acc.is_claimed(l, r) {
                        continue;
                    }
                    let left_base = foreign_key_base(&l.column_name)
                        .unwrap_or_else(|| normalize_name(&l.column_name));
                    if left_base == base || normalize_name(&l.column_name) == base {
                        let reason = format!("{} may reference {}", r.column_name, l.column_name);
                        acc.push(l, r, Confidence::Low, reason);
                    }
                }
            }
        }

        let mut suggestions = acc.suggestions;
        suggestions.sort_by_key(|s| s.confidence.rank());
        if let Some(max) = self.config.max_suggestions {
            suggestions.truncate(max);
        }

        debug!(
            suggestions_count = suggestions.len(),
            "Generated join suggestions"
        );

        suggestions
    }
}

/// Accumulated suggestions plus the columns they use.
#[derive(Default)]
struct Suggestions {
    suggestions: Vec<JoinSuggestion>,
    pairs: HashSet<(String, String)>,
    claimed_left: HashSet<String>,
    claimed_right: HashSet<String>,
}

impl Suggestions {
    fn push(
        &mut self,
        left: &ColumnAnalysis,
        right: &ColumnAnalysis,
        confidence: Confidence,
        reason: String,
    ) {
        let pair = (left.column_name.clone(), right.column_name.clone());
        if !self.pairs.insert(pair) {
            return;
        }
        self.claimed_left.insert(left.column_name.clone());
        self.claimed_right.insert(right.column_name.clone());
        self.suggestions.push(JoinSuggestion {
            left_column: left.column_name.clone(),
            right_column: right.column_name.clone(),
            confidence,
            reason,
        });
    }

    fn is_claimed(&self, left: &ColumnAnalysis, right: &ColumnAnalysis) -> bool {
        self.claimed_left.contains(&left.column_name)
            || self.claimed_right.contains(&right.column_name)
    }
}

/// Internal and row-number columns never take part in joins.
fn is_candidate(column: &ColumnAnalysis) -> bool {
    let lower = column.column_name.to_lowercase();
    !(lower.starts_with('_') || lower == "rowindex" || lower == "row_index")
}

/// Only a column named exactly `id` anchors the foreign-key strategies.
fn is_primary_id(column: &ColumnAnalysis) -> bool {
    column.column_name == "id" && column.category.is_key_like()
}

fn categories_compatible(left: ColumnCategory, right: ColumnCategory) -> bool {
    use ColumnCategory::{Identifier, Numerical};

    left == right
        || (left.is_key_like() && right.is_key_like())
        || matches!((left, right), (Numerical, Identifier) | (Identifier, Numerical))
}
