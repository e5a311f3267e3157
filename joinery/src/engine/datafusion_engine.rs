use std::sync::Arc;

use async_trait::async_trait;
use datafusion::common::TableReference;
use datafusion::datasource::MemTable;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{InsertOptions, QueryEngine, RowSet};
use crate::core::decode_ipc;
use crate::error::{JoineryError, Result};

/// Configuration for creating a [`DataFusionEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
    /// Memory fraction to use before spilling (0.0 to 1.0)
    pub memory_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
            memory_fraction: 0.9,
        }
    }
}

impl EngineConfig {
    /// Memory pool size: `max_memory` scaled by `memory_fraction`.
    pub fn pool_size(&self) -> usize {
        (self.max_memory as f64 * self.memory_fraction.clamp(0.0, 1.0)) as usize
    }
}

/// A [`QueryEngine`] backed by an in-process DataFusion [`SessionContext`].
///
/// Tables are in-memory [`MemTable`]s registered under their exact,
/// case-preserved identifier.
///
/// # Examples
///
/// ```rust,no_run
/// use joinery::engine::{DataFusionEngine, EngineConfig, QueryEngine};
///
/// # async fn example() -> joinery::error::Result<()> {
/// let engine = DataFusionEngine::with_config(EngineConfig {
///     batch_size: 16384,
///     ..Default::default()
/// })?;
/// let rows = engine.execute("SELECT 1 AS one").await?;
/// assert_eq!(rows.num_rows(), 1);
/// # Ok(())
/// # }
/// ```
pub struct DataFusionEngine {
    ctx: SessionContext,
    config: EngineConfig,
}

impl std::fmt::Debug for DataFusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DataFusionEngine {
    /// Creates an engine with default configuration.
    #[instrument]
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with custom configuration.
    #[instrument(skip(config))]
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions)
            .with_information_schema(true);

        let memory_pool = Arc::new(FairSpillPool::new(config.pool_size())) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        let ctx = SessionContext::new_with_config_rt(session_config, runtime_env);

        Ok(Self { ctx, config })
    }

    /// Returns the underlying DataFusion [`SessionContext`].
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Returns the configuration used to create this engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Checks if a table is registered.
    pub fn has_table(&self, table_id: &str) -> bool {
        self.ctx
            .table_exist(TableReference::bare(table_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl QueryEngine for DataFusionEngine {
    #[instrument(skip(self, sql))]
    async fn execute(&self, sql: &str) -> Result<RowSet> {
        let df = self
            .ctx
            .sql(sql)
            .await
            .map_err(|e| JoineryError::engine(sql, e))?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await.map_err(|e| JoineryError::engine(sql, e))?;

        debug!(rows = batches.iter().map(|b| b.num_rows()).sum::<usize>(), "Executed query");
        Ok(RowSet::new(schema, batches))
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn insert_columnar(
        &self,
        table_id: &str,
        bytes: &[u8],
        options: InsertOptions,
    ) -> Result<()> {
        let context = || format!("insert_columnar({table_id})");
        let table = TableReference::bare(table_id);
        let (schema, mut batches) = decode_ipc(bytes)?;

        let exists = self
            .ctx
            .table_exist(table.clone())
            .map_err(|e| JoineryError::engine(context(), e))?;

        let (schema, batches) = if !options.create && exists {
            let current = self
                .ctx
                .table(table.clone())
                .await
                .map_err(|e| JoineryError::engine(context(), e))?;
            let current_schema = current.schema().inner().clone();
            let mut combined = current
                .collect()
                .await
                .map_err(|e| JoineryError::engine(context(), e))?;
            combined.append(&mut batches);
            (current_schema, combined)
        } else {
            (schema, batches)
        };

        let provider =
            MemTable::try_new(schema, vec![batches]).map_err(|e| JoineryError::engine(context(), e))?;

        if exists {
            self.ctx
                .deregister_table(table.clone())
                .map_err(|e| JoineryError::engine(context(), e))?;
        }
        self.ctx
            .register_table(table, Arc::new(provider))
            .map_err(|e| JoineryError::engine(context(), e))?;

        debug!(table_id, create = options.create, "Inserted columnar data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{encode_ipc, Scalar, TabularDataset};

    fn ipc(ds: &TabularDataset) -> Vec<u8> {
        let batch = ds.to_record_batch().unwrap();
        encode_ipc(&batch.schema(), &[batch]).unwrap()
    }

    fn people() -> TabularDataset {
        TabularDataset::from_values(
            &["id", "Name"],
            vec![
                vec![Scalar::Int(1), Scalar::from("Ada")],
                vec![Scalar::Int(2), Scalar::from("Grace")],
            ],
        )
    }

    #[test]
    fn test_engine_config_pool_size() {
        let config = EngineConfig {
            max_memory: 1000,
            memory_fraction: 0.5,
            ..Default::default()
        };
        assert_eq!(config.pool_size(), 500);
    }

    #[tokio::test]
    async fn test_insert_and_query_case_preserved_table() {
        let engine = DataFusionEngine::new().unwrap();
        engine
            .insert_columnar("ds_People", &ipc(&people()), InsertOptions::create())
            .await
            .unwrap();
        assert!(engine.has_table("ds_People"));

        let rows = engine
            .execute(r#"SELECT "Name" FROM "ds_People" WHERE "id" = 2"#)
            .await
            .unwrap();
        let ds = rows.to_dataset().unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.value(0, "Name"), &Scalar::from("Grace"));
    }

    #[tokio::test]
    async fn test_create_replaces_and_append_extends() {
        let engine = DataFusionEngine::new().unwrap();
        let bytes = ipc(&people());

        engine
            .insert_columnar("t", &bytes, InsertOptions::create())
            .await
            .unwrap();
        engine
            .insert_columnar("t", &bytes, InsertOptions::create())
            .await
            .unwrap();
        assert_eq!(engine.execute(r#"SELECT * FROM "t""#).await.unwrap().num_rows(), 2);

        engine
            .insert_columnar("t", &bytes, InsertOptions::append())
            .await
            .unwrap();
        assert_eq!(engine.execute(r#"SELECT * FROM "t""#).await.unwrap().num_rows(), 4);
    }

    #[tokio::test]
    async fn test_drop_table() {
        let engine = DataFusionEngine::new().unwrap();
        engine
            .insert_columnar("gone", &ipc(&people()), InsertOptions::create())
            .await
            .unwrap();
        engine.drop_table("gone").await.unwrap();
        assert!(!engine.has_table("gone"));

        // dropping a missing table is not an error
        engine.drop_table("never_there").await.unwrap();
    }

    #[tokio::test]
    async fn test_execution_errors_carry_sql() {
        let engine = DataFusionEngine::new().unwrap();
        let err = engine.execute("SELECT * FROM missing_table").await.unwrap_err();
        match err {
            JoineryError::EngineExecution { sql, .. } => {
                assert_eq!(sql, "SELECT * FROM missing_table")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_bytes_are_rejected() {
        let engine = DataFusionEngine::new().unwrap();
        let result = engine
            .insert_columnar("bad", b"not arrow", InsertOptions::create())
            .await;
        assert!(result.is_err());
        assert!(!engine.has_table("bad"));
    }
}
