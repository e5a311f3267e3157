//! Joining datasets.
//!
//! [`hash_join`] combines two in-memory [`TabularDataset`](crate::core::TabularDataset)s
//! with type-coercing key equality. The same [`JoinOptions`] drive the
//! query builder's engine-side joins, so a join previewed locally and a
//! join pushed down to the engine name their columns identically.
//!
//! # Examples
//!
//! ```rust
//! use joinery::core::{Scalar, TabularDataset};
//! use joinery::join::{hash_join, JoinOptions, JoinType};
//!
//! let customers = TabularDataset::from_values(
//!     &["id", "name"],
//!     vec![vec![Scalar::Int(1), Scalar::from("Ada")]],
//! );
//! let orders = TabularDataset::from_values(
//!     &["order_no", "customer_id"],
//!     vec![vec![Scalar::Int(10), Scalar::from("1")]],
//! );
//!
//! let options = JoinOptions::on_columns("id", "customer_id").how(JoinType::Left);
//! let joined = hash_join(&customers, &orders, &options).unwrap();
//!
//! // 1 and "1" coerce to the same key
//! assert_eq!(joined.len(), 1);
//! assert_eq!(joined.value(0, "order_no"), &Scalar::Int(10));
//! ```

mod hash_join;

pub use hash_join::hash_join;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Types of joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Inner join - only rows that match in both tables
    #[default]
    Inner,
    /// Left join - all rows from left table, matching rows from right
    Left,
    /// Right join - all rows from right table, matching rows from left
    Right,
    /// Full outer join - all rows from both tables
    Outer,
}

impl JoinType {
    /// Convert to SQL join syntax
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Outer => "FULL OUTER JOIN",
        }
    }

    /// True when unmatched left rows are kept.
    pub fn keeps_left(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Outer)
    }

    /// True when unmatched right rows are kept.
    pub fn keeps_right(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Outer)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "inner"),
            JoinType::Left => write!(f, "left"),
            JoinType::Right => write!(f, "right"),
            JoinType::Outer => write!(f, "outer"),
        }
    }
}

/// Join columns: one name shared by both sides, or one per side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinOn {
    Same(String),
    Columns { left: String, right: String },
}

impl JoinOn {
    pub fn left(&self) -> &str {
        match self {
            JoinOn::Same(column) => column,
            JoinOn::Columns { left, .. } => left,
        }
    }

    pub fn right(&self) -> &str {
        match self {
            JoinOn::Same(column) => column,
            JoinOn::Columns { right, .. } => right,
        }
    }
}

impl From<&str> for JoinOn {
    fn from(column: &str) -> Self {
        JoinOn::Same(column.to_string())
    }
}

impl From<String> for JoinOn {
    fn from(column: String) -> Self {
        JoinOn::Same(column)
    }
}

impl From<(&str, &str)> for JoinOn {
    fn from((left, right): (&str, &str)) -> Self {
        JoinOn::Columns {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

/// Suffixes appended to column names present on both sides of a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffixes {
    pub left: String,
    pub right: String,
}

impl Suffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl Default for Suffixes {
    fn default() -> Self {
        Self::new("_left", "_right")
    }
}

/// Options for a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    pub on: JoinOn,
    #[serde(default)]
    pub how: JoinType,
    #[serde(default)]
    pub suffixes: Suffixes,
}

impl JoinOptions {
    /// Inner join on `on`, with default suffixes.
    pub fn new(on: impl Into<JoinOn>) -> Self {
        Self {
            on: on.into(),
            how: JoinType::default(),
            suffixes: Suffixes::default(),
        }
    }

    /// Inner join of `left` against `right`.
    pub fn on_columns(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::new(JoinOn::Columns {
            left: left.into(),
            right: right.into(),
        })
    }

    pub fn how(mut self, how: JoinType) -> Self {
        self.how = how;
        self
    }

    pub fn suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = suffixes;
        self
    }
}

/// Output names of the columns of a join, following the collision policy.
///
/// A left column whose name also exists on the right gets `suffixes.left`
/// appended, and symmetrically for the right. Names unique to one side are
/// kept as they are.
pub(crate) fn output_names(
    left: &[&str],
    right: &[&str],
    suffixes: &Suffixes,
) -> (Vec<String>, Vec<String>) {
    let left_names = left
        .iter()
        .map(|name| {
            if right.contains(name) {
                format!("{name}{}", suffixes.left)
            } else {
                name.to_string()
            }
        })
        .collect();
    let right_names = right
        .iter()
        .map(|name| {
            if left.contains(name) {
                format!("{name}{}", suffixes.right)
            } else {
                name.to_string()
            }
        })
        .collect();
    (left_names, right_names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_type_sql() {
        assert_eq!(JoinType::Inner.to_sql(), "INNER JOIN");
        assert_eq!(JoinType::Left.to_sql(), "LEFT JOIN");
        assert_eq!(JoinType::Right.to_sql(), "RIGHT JOIN");
        assert_eq!(JoinType::Outer.to_sql(), "FULL OUTER JOIN");
    }

    #[test]
    fn test_join_options_deserialize() {
        let options: JoinOptions = serde_json::from_str(r#"{"on": "id"}"#).unwrap();
        assert_eq!(options.on, JoinOn::Same("id".to_string()));
        assert_eq!(options.how, JoinType::Inner);
        assert_eq!(options.suffixes, Suffixes::default());

        let options: JoinOptions = serde_json::from_str(
            r#"{"on": {"left": "id", "right": "user_id"}, "how": "outer",
                "suffixes": {"left": "_a", "right": "_b"}}"#,
        )
        .unwrap();
        assert_eq!(options.on.left(), "id");
        assert_eq!(options.on.right(), "user_id");
        assert_eq!(options.how, JoinType::Outer);
        assert_eq!(options.suffixes.right, "_b");
    }

    #[test]
    fn test_output_names() {
        let (left, right) = output_names(
            &["id", "name", "city"],
            &["id", "city", "total"],
            &Suffixes::default(),
        );
        assert_eq!(left, vec!["id_left", "name", "city_left"]);
        assert_eq!(right, vec!["id_right", "city_right", "total"]);
    }
}
