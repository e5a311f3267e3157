//! Compilation of recorded operations into SQL text.
//!
//! The compiler is pure: it sees the base table, the operations in insertion
//! order, and one resolved table per `join` operation (same order). It never
//! touches the engine.
//!
//! Clause rules:
//!
//! - filters accumulate and are ANDed
//! - the latest `sort`, `limit`, `offset` and `select` replace earlier ones
//! - the latest `group` defines `GROUP BY` and, unless a later `select`
//!   overrides it, the select list; a sort still applies after grouping
//! - joins accumulate; with any join present the joined tables are wrapped in
//!   a projection that renames colliding columns with the join's suffixes, and
//!   every other clause refers to those output names

use std::collections::HashSet;

use crate::core::Scalar;
use crate::error::{JoinSide, JoineryError, Result};
use crate::join::{output_names, JoinOptions};
use crate::security::SqlSecurity;

use super::operation::{Aggregation, Operation, Predicate, PredicateValue, SortKey};

/// Alias of the derived table holding the join projection.
const JOINED_ALIAS: &str = "joined";

/// A materialized table as the compiler sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Engine table identifier
    pub id: String,
    /// Column names; only required for tables taking part in a join
    pub columns: Vec<String>,
}

impl TableRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Compiles a base table plus operations into SQL.
///
/// # Examples
///
/// ```rust
/// use joinery::query::operation::{Operation, Predicate, SortKey};
/// use joinery::query::sql::{SqlCompiler, TableRef};
///
/// let base = TableRef::new("ds_orders");
/// let ops = vec![
///     Operation::Filter { predicates: vec![Predicate::gt("total", 100)] },
///     Operation::Sort { orders: vec![SortKey::desc("total")] },
///     Operation::Limit { count: 10 },
/// ];
/// let sql = SqlCompiler::new(&base, &ops, &[]).unwrap().to_sql().unwrap();
/// assert_eq!(
///     sql,
///     r#"SELECT * FROM "ds_orders" WHERE "total" > 100 ORDER BY "total" DESC LIMIT 10"#
/// );
/// ```
#[derive(Debug)]
pub struct SqlCompiler<'a> {
    base: &'a TableRef,
    joins: &'a [TableRef],
    plan: Plan<'a>,
}

/// Operations folded into clause slots.
#[derive(Debug, Default)]
struct Plan<'a> {
    filters: Vec<&'a Predicate>,
    sort: Option<&'a [SortKey]>,
    group: Option<(usize, &'a [String], &'a [Aggregation])>,
    select: Option<(usize, &'a [String])>,
    limit: Option<u64>,
    offset: Option<u64>,
    joins: Vec<&'a JoinOptions>,
}

impl<'a> SqlCompiler<'a> {
    /// Validates the operations and pairs each join with its resolved table.
    pub fn new(base: &'a TableRef, operations: &'a [Operation], joins: &'a [TableRef]) -> Result<Self> {
        let mut plan = Plan::default();
        for (idx, op) in operations.iter().enumerate() {
            op.validate()?;
            match op {
                Operation::Filter { predicates } => plan.filters.extend(predicates),
                Operation::Sort { orders } => plan.sort = Some(orders.as_slice()),
                Operation::Group {
                    columns,
                    aggregations,
                } => plan.group = Some((idx, columns.as_slice(), aggregations.as_slice())),
                Operation::Join { options, .. } => plan.joins.push(options),
                Operation::Limit { count } => plan.limit = Some(*count),
                Operation::Offset { count } => plan.offset = Some(*count),
                Operation::Select { columns } => plan.select = Some((idx, columns.as_slice())),
            }
        }

        if plan.joins.len() != joins.len() {
            return Err(JoineryError::invalid_operation(format!(
                "{} join operations but {} resolved join tables",
                plan.joins.len(),
                joins.len()
            )));
        }

        Ok(Self { base, joins, plan })
    }

    /// The full statement.
    pub fn to_sql(&self) -> Result<String> {
        let mut sql = format!("SELECT {} FROM {}", self.select_list()?, self.from_clause()?);
        sql.push_str(&self.where_clause()?);

        if let Some((_, columns, _)) = self.plan.group {
            if !columns.is_empty() {
                sql.push_str(" GROUP BY ");
                sql.push_str(&quote_all(columns)?.join(", "));
            }
        }

        if let Some(orders) = self.plan.sort {
            let orders = orders
                .iter()
                .map(|key| {
                    Ok(format!(
                        "{} {}",
                        SqlSecurity::quote_identifier(&key.column)?,
                        key.direction.to_sql()
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&orders.join(", "));
        }

        if let Some(limit) = self.plan.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.plan.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(sql)
    }

    /// A row count over filters and joins only.
    pub fn to_count_sql(&self) -> Result<String> {
        Ok(format!(
            "SELECT COUNT(*) AS count FROM (SELECT * FROM {}{})",
            self.from_clause()?,
            self.where_clause()?
        ))
    }

    fn select_list(&self) -> Result<String> {
        let select_wins = match (self.plan.select, self.plan.group) {
            (Some((select_idx, _)), Some((group_idx, _, _))) => select_idx > group_idx,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if select_wins {
            if let Some((_, columns)) = self.plan.select {
                return Ok(quote_all(columns)?.join(", "));
            }
        }

        if let Some((_, columns, aggregations)) = self.plan.group {
            let mut items = aggregations
                .iter()
                .map(render_aggregation)
                .collect::<Result<Vec<_>>>()?;
            items.extend(quote_all(columns)?);
            return Ok(items.join(", "));
        }

        Ok("*".to_string())
    }

    fn where_clause(&self) -> Result<String> {
        if self.plan.filters.is_empty() {
            return Ok(String::new());
        }
        let conditions = self
            .plan
            .filters
            .iter()
            .map(|p| render_predicate(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    fn from_clause(&self) -> Result<String> {
        let base = SqlSecurity::quote_identifier(&self.base.id)?;
        if self.plan.joins.is_empty() {
            return Ok(base);
        }

        let mut outputs: Vec<OutputColumn> = self
            .base
            .columns
            .iter()
            .map(|column| OutputColumn {
                source: base.clone(),
                column: column.clone(),
                name: column.clone(),
            })
            .collect();
        let mut used_tables: HashSet<&str> = HashSet::from([self.base.id.as_str()]);
        let mut clauses = Vec::with_capacity(self.joins.len());

        for (idx, (options, table)) in self.plan.joins.iter().zip(self.joins).enumerate() {
            let quoted = SqlSecurity::quote_identifier(&table.id)?;
            let (table_clause, source) = if used_tables.insert(table.id.as_str()) {
                (quoted.clone(), quoted)
            } else {
                let alias = SqlSecurity::quote_identifier(&format!("{}_{}", table.id, idx + 1))?;
                (format!("{quoted} AS {alias}"), alias)
            };

            let left_on = options.on.left();
            let right_on = options.on.right();
            let left_expr = outputs
                .iter()
                .find(|o| o.name == left_on)
                .or_else(|| outputs.iter().find(|o| o.source == base && o.column == left_on))
                .map(OutputColumn::qualified)
                .transpose()?
                .ok_or_else(|| JoineryError::column_not_found(left_on, JoinSide::Left))?;
            if !table.columns.iter().any(|c| c == right_on) {
                return Err(JoineryError::column_not_found(right_on, JoinSide::Right));
            }
            let right_expr = format!("{source}.{}", SqlSecurity::quote_identifier(right_on)?);

            clauses.push(format!(
                "{} {table_clause} ON {left_expr} = {right_expr}",
                options.how.to_sql()
            ));

            let left_names: Vec<&str> = outputs.iter().map(|o| o.name.as_str()).collect();
            let right_names: Vec<&str> = table.columns.iter().map(String::as_str).collect();
            let (left_renamed, right_renamed) =
                output_names(&left_names, &right_names, &options.suffixes);

            for (output, name) in outputs.iter_mut().zip(left_renamed) {
                output.name = name;
            }
            outputs.extend(table.columns.iter().zip(right_renamed).map(|(column, name)| {
                OutputColumn {
                    source: source.clone(),
                    column: column.clone(),
                    name,
                }
            }));
        }

        let projection = if outputs.is_empty() {
            "*".to_string()
        } else {
            outputs
                .iter()
                .map(|o| {
                    Ok(format!(
                        "{} AS {}",
                        o.qualified()?,
                        SqlSecurity::quote_identifier(&o.name)?
                    ))
                })
                .collect::<Result<Vec<_>>>()?
                .join(", ")
        };

        Ok(format!(
            "(SELECT {projection} FROM {base} {}) AS {}",
            clauses.join(" "),
            SqlSecurity::quote_identifier(JOINED_ALIAS)?
        ))
    }
}

/// One column of the join projection.
#[derive(Debug)]
struct OutputColumn {
    /// Quoted table name or alias
    source: String,
    column: String,
    name: String,
}

impl OutputColumn {
    fn qualified(&self) -> Result<String> {
        Ok(format!(
            "{}.{}",
            self.source,
            SqlSecurity::quote_identifier(&self.column)?
        ))
    }
}

fn quote_all(columns: &[String]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|c| SqlSecurity::quote_identifier(c))
        .collect()
}

fn render_aggregation(aggregation: &Aggregation) -> Result<String> {
    let argument = if aggregation.column == "*" {
        "*".to_string()
    } else {
        SqlSecurity::quote_identifier(&aggregation.column)?
    };
    let mut expr = format!("{}({argument})", aggregation.function.to_sql());
    if let Some(alias) = &aggregation.alias {
        expr.push_str(" AS ");
        expr.push_str(&SqlSecurity::quote_identifier(alias)?);
    }
    Ok(expr)
}

fn render_predicate(predicate: &Predicate) -> Result<String> {
    predicate.validate()?;
    let column = SqlSecurity::quote_identifier(&predicate.column)?;
    let op = predicate.op.to_sql();
    match &predicate.value {
        PredicateValue::None => Ok(format!("{column} {op}")),
        PredicateValue::Single(value) => Ok(format!("{column} {op} {}", render_literal(value)?)),
        PredicateValue::List(values) => {
            let items = values
                .iter()
                .map(render_literal)
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{column} {op} ({})", items.join(", ")))
        }
    }
}

/// Renders a value as a SQL literal.
pub fn render_literal(value: &Scalar) -> Result<String> {
    match value {
        Scalar::Null => Ok("NULL".to_string()),
        Scalar::Bool(true) => Ok("TRUE".to_string()),
        Scalar::Bool(false) => Ok("FALSE".to_string()),
        Scalar::Int(i) => Ok(i.to_string()),
        Scalar::Float(f) if f.is_finite() => Ok(f.to_string()),
        Scalar::Float(f) => Err(JoineryError::invalid_operation(format!(
            "non-finite number {f} cannot be used in a predicate"
        ))),
        Scalar::String(s) => Ok(SqlSecurity::quote_literal(s)),
        Scalar::Timestamp(_) => Ok(SqlSecurity::quote_literal(&value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DatasetHandle;
    use crate::join::{JoinOptions, JoinType, Suffixes};
    use crate::query::operation::{AggregateFunction, Aggregation};

    fn compile(ops: &[Operation]) -> String {
        let base = TableRef::new("ds_t");
        SqlCompiler::new(&base, ops, &[]).unwrap().to_sql().unwrap()
    }

    fn join_op(right: &str, options: JoinOptions) -> Operation {
        Operation::Join {
            right: DatasetHandle::new(right),
            options,
        }
    }

    #[test]
    fn test_plain_select() {
        assert_eq!(compile(&[]), r#"SELECT * FROM "ds_t""#);
    }

    #[test]
    fn test_filters_accumulate() {
        let sql = compile(&[
            Operation::Filter {
                predicates: vec![
                    Predicate::equals("name", "O'Brien"),
                    Predicate::is_null("deleted_at"),
                ],
            },
            Operation::Filter {
                predicates: vec![
                    Predicate::is_in("status", ["a", "b"]),
                    Predicate::equals("active", true),
                    Predicate::not_equals("note", Scalar::Null),
                ],
            },
        ]);
        assert_eq!(
            sql,
            r#"SELECT * FROM "ds_t" WHERE "name" = 'O''Brien' AND "deleted_at" IS NULL AND "status" IN ('a', 'b') AND "active" = TRUE AND "note" != NULL"#
        );
    }

    #[test]
    fn test_last_write_wins() {
        let sql = compile(&[
            Operation::Sort {
                orders: vec![SortKey::asc("a")],
            },
            Operation::Limit { count: 10 },
            Operation::Offset { count: 3 },
            Operation::Select {
                columns: vec!["a".to_string()],
            },
            Operation::Sort {
                orders: vec![SortKey::desc("b"), SortKey::asc("c")],
            },
            Operation::Limit { count: 5 },
            Operation::Offset { count: 7 },
            Operation::Select {
                columns: vec!["b".to_string(), "c".to_string()],
            },
        ]);
        assert_eq!(
            sql,
            r#"SELECT "b", "c" FROM "ds_t" ORDER BY "b" DESC, "c" ASC LIMIT 5 OFFSET 7"#
        );
    }

    #[test]
    fn test_group_by_with_sort() {
        let sql = compile(&[
            Operation::Sort {
                orders: vec![SortKey::desc("total")],
            },
            Operation::Group {
                columns: vec!["region".to_string()],
                aggregations: vec![
                    Aggregation::new(AggregateFunction::Sum, "amount").alias("total"),
                    Aggregation::count_all(),
                ],
            },
        ]);
        assert_eq!(
            sql,
            r#"SELECT SUM("amount") AS "total", COUNT(*), "region" FROM "ds_t" GROUP BY "region" ORDER BY "total" DESC"#
        );
    }

    #[test]
    fn test_later_select_overrides_group_list() {
        let group = Operation::Group {
            columns: vec!["region".to_string()],
            aggregations: vec![Aggregation::count_all().alias("n")],
        };
        let select = Operation::Select {
            columns: vec!["region".to_string()],
        };

        let sql = compile(&[group.clone(), select.clone()]);
        assert_eq!(sql, r#"SELECT "region" FROM "ds_t" GROUP BY "region""#);

        // a select recorded before the group is superseded by it
        let sql = compile(&[select, group]);
        assert_eq!(
            sql,
            r#"SELECT COUNT(*) AS "n", "region" FROM "ds_t" GROUP BY "region""#
        );
    }

    #[test]
    fn test_count_excludes_shaping_operations() {
        let base = TableRef::new("ds_t");
        let ops = vec![
            Operation::Filter {
                predicates: vec![Predicate::gt("x", 1)],
            },
            Operation::Sort {
                orders: vec![SortKey::asc("x")],
            },
            Operation::Select {
                columns: vec!["x".to_string()],
            },
            Operation::Group {
                columns: vec!["x".to_string()],
                aggregations: vec![],
            },
            Operation::Limit { count: 1 },
            Operation::Offset { count: 1 },
        ];
        let sql = SqlCompiler::new(&base, &ops, &[])
            .unwrap()
            .to_count_sql()
            .unwrap();
        assert_eq!(
            sql,
            r#"SELECT COUNT(*) AS count FROM (SELECT * FROM "ds_t" WHERE "x" > 1)"#
        );
    }

    #[test]
    fn test_join_projection_suffixes_collisions() {
        let base = TableRef::new("ds_users").with_columns(["id", "name", "city"]);
        let right = TableRef::new("ds_orders").with_columns(["id", "user_id", "city"]);
        let ops = vec![
            join_op(
                "orders",
                JoinOptions::on_columns("id", "user_id").how(JoinType::Left),
            ),
            Operation::Filter {
                predicates: vec![Predicate::equals("city_right", "Oslo")],
            },
        ];
        let sql = SqlCompiler::new(&base, &ops, std::slice::from_ref(&right))
            .unwrap()
            .to_sql()
            .unwrap();
        assert_eq!(
            sql,
            concat!(
                r#"SELECT * FROM (SELECT "ds_users"."id" AS "id_left", "ds_users"."name" AS "name", "#,
                r#""ds_users"."city" AS "city_left", "ds_orders"."id" AS "id_right", "#,
                r#""ds_orders"."user_id" AS "user_id", "ds_orders"."city" AS "city_right" "#,
                r#"FROM "ds_users" LEFT JOIN "ds_orders" ON "ds_users"."id" = "ds_orders"."user_id") AS "joined" "#,
                r#"WHERE "city_right" = 'Oslo'"#
            )
        );
    }

    #[test]
    fn test_self_join_is_aliased() {
        let base = TableRef::new("ds_emp").with_columns(["id", "manager_id"]);
        let ops = vec![join_op(
            "emp",
            JoinOptions::on_columns("manager_id", "id").suffixes(Suffixes::new("", "_mgr")),
        )];
        let sql = SqlCompiler::new(&base, &ops, std::slice::from_ref(&base))
            .unwrap()
            .to_sql()
            .unwrap();
        assert!(sql.contains(r#"INNER JOIN "ds_emp" AS "ds_emp_1" ON "ds_emp"."manager_id" = "ds_emp_1"."id""#));
        assert!(sql.contains(r#""ds_emp_1"."manager_id" AS "manager_id_mgr""#));
    }

    #[test]
    fn test_missing_join_columns() {
        let base = TableRef::new("a").with_columns(["id"]);
        let right = TableRef::new("b").with_columns(["a_id"]);

        let ops = vec![join_op("b", JoinOptions::on_columns("id", "nope"))];
        let err = SqlCompiler::new(&base, &ops, std::slice::from_ref(&right))
            .unwrap()
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, JoineryError::ColumnNotFound { side: JoinSide::Right, .. }));

        let ops = vec![join_op("b", JoinOptions::on_columns("nope", "a_id"))];
        let err = SqlCompiler::new(&base, &ops, std::slice::from_ref(&right))
            .unwrap()
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, JoineryError::ColumnNotFound { side: JoinSide::Left, .. }));
    }

    #[test]
    fn test_join_count_mismatch() {
        let base = TableRef::new("a");
        let ops = vec![join_op("b", JoinOptions::new("id"))];
        assert!(SqlCompiler::new(&base, &ops, &[]).is_err());
    }

    #[test]
    fn test_malformed_predicates_fail() {
        let base = TableRef::new("t");
        let ops = vec![Operation::Filter {
            predicates: vec![Predicate {
                column: "x".to_string(),
                op: crate::query::operation::FilterOperator::In,
                value: PredicateValue::Single(Scalar::Int(1)),
            }],
        }];
        let err = SqlCompiler::new(&base, &ops, &[]).unwrap_err();
        assert!(matches!(err, JoineryError::InvalidOperation(_)));
    }

    #[test]
    fn test_literals() {
        assert_eq!(render_literal(&Scalar::Float(2.5)).unwrap(), "2.5");
        assert_eq!(render_literal(&Scalar::Bool(false)).unwrap(), "FALSE");
        assert!(render_literal(&Scalar::Float(f64::NAN)).is_err());
    }
}
