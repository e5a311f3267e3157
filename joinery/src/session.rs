//! Session wiring: one engine, one blob store and one materialization
//! coordinator shared by every query created from the session.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::{encode_ipc, DatasetHandle, TabularDataset};
use crate::engine::{DataFusionEngine, EngineConfig, QueryEngine};
use crate::error::Result;
use crate::join::Suffixes;
use crate::log_data_op;
use crate::logging::LogConfig;
use crate::query::{DatasetQuery, QueryContext, TableMaterializationCoordinator};
use crate::security::SqlSecurity;
use crate::storage::{storage_key, BlobStore, StorageBackend};

/// Configuration for a [`ViewSession`].
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub engine: EngineConfig,
    pub storage: StorageBackend,
    pub log: LogConfig,
    /// Suffixes for joins created with [`DatasetQuery::join_on`]
    pub suffixes: Suffixes,
}

impl SessionConfig {
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = suffixes;
        self
    }
}

/// Entry point for querying stored datasets.
///
/// # Examples
///
/// ```rust,no_run
/// use joinery::prelude::*;
/// use joinery::core::Scalar;
///
/// # async fn example() -> joinery::error::Result<()> {
/// let session = ViewSession::new()?;
/// let orders = TabularDataset::from_values(
///     &["id", "total"],
///     vec![vec![Scalar::Int(1), Scalar::Float(12.5)]],
/// );
/// let handle = session.register_dataset("orders", &orders).await?;
///
/// let count = session.query(&handle).count().await?;
/// assert_eq!(count, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ViewSession {
    context: Arc<QueryContext>,
}

impl ViewSession {
    /// Creates a session over an in-memory store with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Creates a session with a DataFusion engine and the configured storage backend.
    #[instrument(skip(config))]
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let engine = Arc::new(DataFusionEngine::with_config(config.engine.clone())?);
        let store = config.storage.build()?;
        info!(backend = store.backend(), "Created view session");
        Ok(Self::from_parts(engine, store, config))
    }

    /// Creates a session over caller-supplied collaborators.
    ///
    /// `config.engine` and `config.storage` are ignored.
    pub fn from_parts(
        engine: Arc<dyn QueryEngine>,
        store: Arc<dyn BlobStore>,
        config: SessionConfig,
    ) -> Self {
        let coordinator = Arc::new(TableMaterializationCoordinator::with_log_config(
            config.log.clone(),
        ));
        let context = QueryContext::new(engine, store)
            .with_coordinator(coordinator)
            .with_log_config(config.log)
            .with_suffixes(config.suffixes);
        Self {
            context: Arc::new(context),
        }
    }

    /// Starts a deferred query over `dataset`.
    pub fn query(&self, dataset: &DatasetHandle) -> DatasetQuery {
        DatasetQuery::new(Arc::clone(&self.context), dataset.clone())
    }

    pub fn engine(&self) -> &Arc<dyn QueryEngine> {
        &self.context.engine
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.context.store
    }

    pub fn coordinator(&self) -> &Arc<TableMaterializationCoordinator> {
        &self.context.coordinator
    }

    /// Stores `dataset` under `dataset_id`, replacing earlier contents.
    ///
    /// The next query touching the dataset reloads it into the engine.
    #[instrument(skip(self, dataset), fields(rows = dataset.len()))]
    pub async fn register_dataset(
        &self,
        dataset_id: &str,
        dataset: &TabularDataset,
    ) -> Result<DatasetHandle> {
        let batch = dataset.to_record_batch()?;
        let bytes = encode_ipc(&batch.schema(), &[batch])?;
        let table_id = SqlSecurity::table_identifier(dataset_id);

        self.context
            .store
            .store_bytes(&storage_key(&table_id), bytes)
            .await?;
        self.context.coordinator.invalidate(dataset_id);

        log_data_op!(
            self.context.log_config,
            dataset_id,
            table_id = %table_id,
            "Registered dataset"
        );
        Ok(DatasetHandle::new(dataset_id))
    }

    /// Deletes the stored bytes of a dataset and drops its engine table.
    #[instrument(skip(self))]
    pub async fn remove_dataset(&self, dataset_id: &str) -> Result<()> {
        let table_id = SqlSecurity::table_identifier(dataset_id);
        self.context.store.delete(&storage_key(&table_id)).await?;
        self.context.coordinator.invalidate(dataset_id);
        self.context.engine.drop_table(&table_id).await?;

        log_data_op!(self.context.log_config, dataset_id, "Removed dataset");
        Ok(())
    }

    /// Marks a dataset as stale after its stored bytes changed elsewhere.
    pub fn invalidate(&self, dataset_id: &str) -> bool {
        self.context.coordinator.invalidate(dataset_id)
    }

    /// Forgets every loaded table.
    pub fn clear_all(&self) {
        self.context.coordinator.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Scalar;

    fn people(names: &[&str]) -> TabularDataset {
        TabularDataset::from_values(
            &["id", "name"],
            names
                .iter()
                .enumerate()
                .map(|(i, name)| vec![Scalar::Int(i as i64 + 1), Scalar::from(*name)])
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_register_and_query() {
        let session = ViewSession::new().unwrap();
        let handle = session
            .register_dataset("people", &people(&["ada", "grace"]))
            .await
            .unwrap();

        assert_eq!(session.query(&handle).count().await.unwrap(), 2);
        assert!(session.coordinator().is_loaded("people"));
    }

    #[tokio::test]
    async fn test_reregistering_reloads() {
        let session = ViewSession::new().unwrap();
        let handle = session
            .register_dataset("people", &people(&["ada"]))
            .await
            .unwrap();
        assert_eq!(session.query(&handle).count().await.unwrap(), 1);

        session
            .register_dataset("people", &people(&["ada", "grace", "linus"]))
            .await
            .unwrap();
        assert!(!session.coordinator().is_loaded("people"));
        assert_eq!(session.query(&handle).count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_remove_dataset() {
        let session = ViewSession::new().unwrap();
        let handle = session
            .register_dataset("people", &people(&["ada"]))
            .await
            .unwrap();
        session.query(&handle).rows().await.unwrap();

        session.remove_dataset("people").await.unwrap();
        let err = session.query(&handle).rows().await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            crate::error::JoineryError::TableNotLoaded { .. }
        ));
    }
}
