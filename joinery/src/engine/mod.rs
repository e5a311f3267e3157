//! The SQL execution engine seam.
//!
//! The query builder never talks to DataFusion directly; it goes through
//! [`QueryEngine`], which can execute SQL text against named tables and load
//! Arrow IPC bytes into a named table. [`DataFusionEngine`] is the bundled
//! implementation.

mod datafusion_engine;

pub use datafusion_engine::{DataFusionEngine, EngineConfig};

use std::fmt;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

use crate::core::{encode_ipc, TabularDataset};
use crate::error::Result;
use crate::security::SqlSecurity;

/// How [`QueryEngine::insert_columnar`] treats an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOptions {
    /// Create (or replace) the table instead of appending to it
    pub create: bool,
}

impl InsertOptions {
    pub fn create() -> Self {
        Self { create: true }
    }

    pub fn append() -> Self {
        Self { create: false }
    }
}

/// Result of a query: a schema and the record batches produced.
#[derive(Debug, Clone)]
pub struct RowSet {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl RowSet {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Converts the rows into an in-memory dataset.
    pub fn to_dataset(&self) -> Result<TabularDataset> {
        TabularDataset::from_record_batches(&self.schema, &self.batches)
    }

    /// Encodes the rows as Arrow IPC bytes, the format kept in storage.
    pub fn to_ipc(&self) -> Result<Vec<u8>> {
        encode_ipc(&self.schema, &self.batches)
    }
}

/// An engine executing SQL against named tables.
///
/// Both operations may suspend. Implementations report their own failures
/// as [`JoineryError::EngineExecution`](crate::error::JoineryError::EngineExecution)
/// carrying the statement that failed.
#[async_trait]
pub trait QueryEngine: Send + Sync + fmt::Debug {
    /// Executes a SQL statement and collects its result.
    async fn execute(&self, sql: &str) -> Result<RowSet>;

    /// Loads Arrow IPC stream bytes into table `table_id`.
    async fn insert_columnar(
        &self,
        table_id: &str,
        bytes: &[u8],
        options: InsertOptions,
    ) -> Result<()>;

    /// Drops `table_id` if it exists.
    async fn drop_table(&self, table_id: &str) -> Result<()> {
        let sql = format!(
            "DROP TABLE IF EXISTS {}",
            SqlSecurity::quote_identifier(table_id)?
        );
        self.execute(&sql).await.map(|_| ())
    }
}
