//! Operations recorded by the deferred query builder.
//!
//! Every operation is an immutable value. The SQL compiler matches on
//! [`Operation`] exhaustively, so a new kind of operation does not compile
//! until the compiler handles it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{DatasetHandle, Scalar};
use crate::error::{JoineryError, Result};
use crate::join::JoinOptions;

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::NotEq => "!=",
            FilterOperator::Lt => "<",
            FilterOperator::LtEq => "<=",
            FilterOperator::Gt => ">",
            FilterOperator::GtEq => ">=",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT LIKE",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Operators that take no value.
    pub fn is_unary(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    /// Operators that take a list of values.
    pub fn takes_list(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_sql())
    }
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredicateValue {
    #[default]
    None,
    Single(Scalar),
    List(Vec<Scalar>),
}

/// One `column op value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub op: FilterOperator,
    #[serde(default)]
    pub value: PredicateValue,
}

impl Predicate {
    /// A binary comparison such as `=` or `LIKE`.
    pub fn compare(column: impl Into<String>, op: FilterOperator, value: impl Into<Scalar>) -> Self {
        Self {
            column: column.into(),
            op,
            value: PredicateValue::Single(value.into()),
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOperator::Eq, value)
    }

    pub fn not_equals(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOperator::NotEq, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOperator::Lt, value)
    }

    pub fn lt_eq(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOperator::LtEq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOperator::Gt, value)
    }

    pub fn gt_eq(column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::compare(column, FilterOperator::GtEq, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, FilterOperator::Like, pattern.into())
    }

    pub fn not_like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, FilterOperator::NotLike, pattern.into())
    }

    pub fn is_in<V: Into<Scalar>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            column: column.into(),
            op: FilterOperator::In,
            value: PredicateValue::List(values.into_iter().map(Into::into).collect()),
        }
    }

    pub fn not_in<V: Into<Scalar>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            op: FilterOperator::NotIn,
            ..Self::is_in(column, values)
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOperator::IsNull,
            value: PredicateValue::None,
        }
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self {
            op: FilterOperator::IsNotNull,
            ..Self::is_null(column)
        }
    }

    /// Checks that the value shape fits the operator.
    ///
    /// `IS NULL`/`IS NOT NULL` take no value, `IN`/`NOT IN` take a non-empty
    /// list, and every other operator takes exactly one value.
    pub fn validate(&self) -> Result<()> {
        let fits = match (&self.value, self.op) {
            (PredicateValue::None, op) => op.is_unary(),
            (PredicateValue::List(values), op) => op.takes_list() && !values.is_empty(),
            (PredicateValue::Single(_), op) => !op.is_unary() && !op.takes_list(),
        };
        if fits {
            Ok(())
        } else {
            Err(JoineryError::invalid_operation(format!(
                "predicate on '{}': operator {} does not accept {}",
                self.column,
                self.op,
                describe(&self.value)
            )))
        }
    }
}

fn describe(value: &PredicateValue) -> &'static str {
    match value {
        PredicateValue::None => "a missing value",
        PredicateValue::Single(_) => "a single value",
        PredicateValue::List(values) if values.is_empty() => "an empty list",
        PredicateValue::List(_) => "a list of values",
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Aggregate functions available to `group_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Median,
}

impl AggregateFunction {
    pub fn to_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Median => "MEDIAN",
        }
    }
}

/// One aggregate expression; `column` may be `*` for `COUNT(*)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Aggregation {
    pub fn new(function: AggregateFunction, column: impl Into<String>) -> Self {
        Self {
            function,
            column: column.into(),
            alias: None,
        }
    }

    pub fn count_all() -> Self {
        Self::new(AggregateFunction::Count, "*")
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// One step of a deferred query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    /// Predicates ANDed together; several filters accumulate.
    Filter { predicates: Vec<Predicate> },
    /// Ordering; the latest sort replaces earlier ones.
    Sort { orders: Vec<SortKey> },
    /// Grouping and aggregation; the latest group is honored.
    Group {
        columns: Vec<String>,
        #[serde(default)]
        aggregations: Vec<Aggregation>,
    },
    /// A join against another dataset; joins accumulate.
    Join {
        right: DatasetHandle,
        options: JoinOptions,
    },
    Limit { count: u64 },
    Offset { count: u64 },
    /// Explicit projection; the latest select replaces earlier ones.
    Select { columns: Vec<String> },
}

impl Operation {
    /// Short operation name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Filter { .. } => "filter",
            Operation::Sort { .. } => "sort",
            Operation::Group { .. } => "group",
            Operation::Join { .. } => "join",
            Operation::Limit { .. } => "limit",
            Operation::Offset { .. } => "offset",
            Operation::Select { .. } => "select",
        }
    }

    /// Checks the operation is well formed.
    pub fn validate(&self) -> Result<()> {
        let empty = |what: &str| {
            Err(JoineryError::invalid_operation(format!(
                "{} requires at least one {what}",
                self.kind()
            )))
        };
        match self {
            Operation::Filter { predicates } => {
                if predicates.is_empty() {
                    return empty("predicate");
                }
                predicates.iter().try_for_each(Predicate::validate)
            }
            Operation::Sort { orders } if orders.is_empty() => empty("sort key"),
            Operation::Group {
                columns,
                aggregations,
            } if columns.is_empty() && aggregations.is_empty() => {
                empty("group column or aggregation")
            }
            Operation::Select { columns } if columns.is_empty() => empty("column"),
            _ => Ok(()),
        }
    }
}
