//! The deferred query builder.
//!
//! A [`DatasetQuery`] records operations against a dataset without touching
//! the engine. Chaining methods return a new query with one more operation
//! appended; the receiver is left unchanged, so a query can be kept around
//! and extended in several directions. Work happens only in the terminal
//! methods ([`sql`](DatasetQuery::sql), [`rows`](DatasetQuery::rows),
//! [`count`](DatasetQuery::count), [`preview`](DatasetQuery::preview),
//! [`run`](DatasetQuery::run) and [`profile`](DatasetQuery::profile)), each of
//! which first materializes every table it reads through the shared
//! [`TableMaterializationCoordinator`].

use std::fmt;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::analyzers::{ColumnAnalysis, ColumnProfiler};
use crate::core::{DatasetHandle, FieldHints, Scalar, TabularDataset};
use crate::engine::{QueryEngine, RowSet};
use crate::error::{JoineryError, Result};
use crate::join::{JoinOn, JoinOptions, JoinType, Suffixes};
use crate::logging::{truncate_field, LogConfig};
use crate::security::SqlSecurity;
use crate::storage::{storage_key, BlobStore};

use super::coordinator::TableMaterializationCoordinator;
use super::operation::{Aggregation, Operation, Predicate, SortKey};
use super::sql::{SqlCompiler, TableRef};

/// Row count callers pass to [`DatasetQuery::preview`] when they have no
/// preference of their own.
pub const DEFAULT_PREVIEW_ROWS: u64 = 10;

/// Collaborators shared by every query of a session.
#[derive(Clone)]
pub struct QueryContext {
    pub engine: Arc<dyn QueryEngine>,
    pub store: Arc<dyn BlobStore>,
    pub coordinator: Arc<TableMaterializationCoordinator>,
    pub log_config: LogConfig,
    /// Suffixes used by [`DatasetQuery::join_on`]
    pub suffixes: Suffixes,
}

impl QueryContext {
    pub fn new(engine: Arc<dyn QueryEngine>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            engine,
            store,
            coordinator: Arc::new(TableMaterializationCoordinator::new()),
            log_config: LogConfig::default(),
            suffixes: Suffixes::default(),
        }
    }

    pub fn with_coordinator(mut self, coordinator: Arc<TableMaterializationCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = suffixes;
        self
    }

    async fn ensure_loaded(&self, dataset_id: &str) -> Result<String> {
        self.coordinator
            .ensure_loaded(&self.engine, &self.store, dataset_id)
            .await
    }

    /// Column names of a loaded table, read from an empty result.
    async fn table_columns(&self, table_id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT * FROM {} LIMIT 0",
            SqlSecurity::quote_identifier(table_id)?
        );
        let rows = self.engine.execute(&sql).await?;
        Ok(rows
            .schema
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect())
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("engine", &self.engine)
            .field("store", &self.store.backend())
            .field("loaded_tables", &self.coordinator.loaded_tables().len())
            .finish()
    }
}

/// A deferred query over one dataset.
///
/// # Examples
///
/// ```rust,no_run
/// use joinery::prelude::*;
///
/// # async fn example(session: &ViewSession) -> joinery::error::Result<()> {
/// let orders = DatasetHandle::new("orders");
/// let customers = DatasetHandle::new("customers");
///
/// let query = session
///     .query(&orders)
///     .filter(Predicate::gt("total", 100))
///     .join(&customers, JoinOptions::on_columns("customer_id", "id").how(JoinType::Left))
///     .sort([SortKey::desc("total")])
///     .limit(20);
///
/// println!("{}", query.sql().await?);
/// let top = query.rows().await?;
/// let saved = query.run().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatasetQuery {
    context: Arc<QueryContext>,
    base: DatasetHandle,
    operations: Vec<Operation>,
}

impl DatasetQuery {
    pub fn new(context: Arc<QueryContext>, base: DatasetHandle) -> Self {
        Self {
            context,
            base,
            operations: Vec::new(),
        }
    }

    /// The dataset this query starts from.
    pub fn base(&self) -> &DatasetHandle {
        &self.base
    }

    /// Recorded operations in insertion order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    fn push(&self, operation: Operation) -> Self {
        let mut next = self.clone();
        next.operations.push(operation);
        next
    }

    /// Keeps rows matching `predicate`; filters accumulate and are ANDed.
    pub fn filter(&self, predicate: Predicate) -> Self {
        self.filter_all([predicate])
    }

    /// Keeps rows matching every predicate, recorded as one operation.
    pub fn filter_all(&self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.push(Operation::Filter {
            predicates: predicates.into_iter().collect(),
        })
    }

    /// Orders the result, replacing any earlier sort.
    pub fn sort(&self, orders: impl IntoIterator<Item = SortKey>) -> Self {
        self.push(Operation::Sort {
            orders: orders.into_iter().collect(),
        })
    }

    /// Groups by `columns` and computes `aggregations`.
    pub fn group_by<S: Into<String>>(
        &self,
        columns: impl IntoIterator<Item = S>,
        aggregations: impl IntoIterator<Item = Aggregation>,
    ) -> Self {
        self.push(Operation::Group {
            columns: columns.into_iter().map(Into::into).collect(),
            aggregations: aggregations.into_iter().collect(),
        })
    }

    /// Joins another dataset.
    pub fn join(&self, right: &DatasetHandle, options: JoinOptions) -> Self {
        self.push(Operation::Join {
            right: right.clone(),
            options,
        })
    }

    /// Joins another dataset using the session's default suffixes.
    pub fn join_on(&self, right: &DatasetHandle, on: impl Into<JoinOn>, how: JoinType) -> Self {
        let options = JoinOptions::new(on)
            .how(how)
            .suffixes(self.context.suffixes.clone());
        self.join(right, options)
    }

    /// Caps the number of rows; a later limit replaces an earlier one.
    pub fn limit(&self, count: u64) -> Self {
        self.push(Operation::Limit { count })
    }

    /// Skips rows; a later offset replaces an earlier one.
    pub fn offset(&self, count: u64) -> Self {
        self.push(Operation::Offset { count })
    }

    /// Projects explicit columns, replacing any earlier select.
    pub fn select<S: Into<String>>(&self, columns: impl IntoIterator<Item = S>) -> Self {
        self.push(Operation::Select {
            columns: columns.into_iter().map(Into::into).collect(),
        })
    }

    /// Loads the base table and every joined table, returning them as the
    /// compiler sees them.
    ///
    /// All loads run concurrently; a self-join shares a single load. A failed
    /// load does not abandon the others, which keep running for their waiters.
    async fn resolve_tables(&self) -> Result<(TableRef, Vec<TableRef>)> {
        let ctx = &self.context;
        let rights: Vec<&DatasetHandle> = self
            .operations
            .iter()
            .filter_map(|op| match op {
                Operation::Join { right, .. } => Some(right),
                _ => None,
            })
            .collect();

        let loads = std::iter::once(self.base.id.as_str())
            .chain(rights.iter().map(|handle| handle.id.as_str()))
            .map(|id| ctx.ensure_loaded(id));
        let mut table_ids = try_join_all(loads).await?.into_iter();

        let base_id = table_ids.next().ok_or_else(|| {
            JoineryError::invalid_operation("no table resolved for the base dataset")
        })?;
        if rights.is_empty() {
            return Ok((TableRef::new(base_id), Vec::new()));
        }

        let base = TableRef::new(&base_id).with_columns(ctx.table_columns(&base_id).await?);
        let mut joins = Vec::with_capacity(rights.len());
        for table_id in table_ids {
            let columns = ctx.table_columns(&table_id).await?;
            joins.push(TableRef::new(table_id).with_columns(columns));
        }
        Ok((base, joins))
    }

    fn log_sql(&self, kind: &str, sql: &str) {
        let config = &self.context.log_config;
        if config.log_compiled_sql {
            debug!(
                kind,
                sql = %truncate_field(sql, config.max_field_length),
                "Compiled query"
            );
        }
    }

    /// Compiles the query to SQL, materializing the tables it reads.
    ///
    /// Calling this twice on the same query yields the same text.
    ///
    /// # Errors
    ///
    /// Materialization failures, a malformed operation, or a join column
    /// missing from its table.
    #[instrument(skip(self), fields(dataset = %self.base.id, operations = self.operations.len()))]
    pub async fn sql(&self) -> Result<String> {
        let (base, joins) = self.resolve_tables().await?;
        let sql = SqlCompiler::new(&base, &self.operations, &joins)?.to_sql()?;
        self.log_sql("select", &sql);
        Ok(sql)
    }

    /// SQL counting the rows left after filters and joins.
    pub async fn count_sql(&self) -> Result<String> {
        let (base, joins) = self.resolve_tables().await?;
        let sql = SqlCompiler::new(&base, &self.operations, &joins)?.to_count_sql()?;
        self.log_sql("count", &sql);
        Ok(sql)
    }

    async fn execute(&self) -> Result<RowSet> {
        let sql = self.sql().await?;
        self.context.engine.execute(&sql).await
    }

    /// Executes the query and returns its rows.
    pub async fn rows(&self) -> Result<TabularDataset> {
        self.execute().await?.to_dataset()
    }

    /// Counts matching rows, ignoring sort, grouping, projection and paging.
    #[instrument(skip(self), fields(dataset = %self.base.id))]
    pub async fn count(&self) -> Result<u64> {
        let sql = self.count_sql().await?;
        let result = self.context.engine.execute(&sql).await?.to_dataset()?;
        match result.value(0, "count") {
            Scalar::Int(count) => u64::try_from(*count).map_err(|_| {
                JoineryError::engine_message(&sql, format!("negative row count {count}"))
            }),
            other => Err(JoineryError::engine_message(
                &sql,
                format!("expected an integer count, got {other:?}"),
            )),
        }
    }

    /// The first `n` rows, overriding any limit already set.
    pub async fn preview(&self, n: u64) -> Result<TabularDataset> {
        self.limit(n).rows().await
    }

    /// Executes the query and stores the result as a new dataset.
    ///
    /// The returned handle has a fresh id and no field lineage; it can be
    /// queried like any other dataset.
    #[instrument(skip(self), fields(dataset = %self.base.id))]
    pub async fn run(&self) -> Result<DatasetHandle> {
        let result = self.execute().await?;
        let bytes = result.to_ipc()?;

        let id = Uuid::new_v4().simple().to_string();
        let table_id = SqlSecurity::table_identifier(&id);
        self.context
            .store
            .store_bytes(&storage_key(&table_id), bytes)
            .await?;
        self.context.coordinator.invalidate(&id);

        info!(
            source = %self.base.id,
            result = %id,
            rows = result.num_rows(),
            "Stored query result as dataset"
        );
        Ok(DatasetHandle::new(id))
    }

    /// Executes the query and profiles the columns of its result.
    pub async fn profile(&self, hints: Option<&FieldHints>) -> Result<Vec<ColumnAnalysis>> {
        let rows = self.rows().await?;
        Ok(ColumnProfiler::new().profile_dataset(&rows, hints))
    }
}
