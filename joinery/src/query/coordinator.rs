//! At-most-once loading of tables into the engine.
//!
//! [`TableMaterializationCoordinator`] tracks which tables are loaded and which
//! loads are in flight. For a given table identifier exactly one load (drop any
//! stale copy, read the bytes from storage, insert them) runs at a time; every
//! caller arriving while it runs waits for its outcome instead of issuing its
//! own drop/insert.
//!
//! The load runs on its own task, detached from the caller that started it.
//! Dropping that caller (a timeout, a failed sibling in a `try_join_all`) does
//! not abandon the load: it runs to completion or failure and every remaining
//! waiter sees the outcome. The in-flight entry is removed either way, so a
//! failed load leaves nothing behind and the next call starts a fresh attempt.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info_span, instrument, warn, Instrument};

use crate::engine::{InsertOptions, QueryEngine};
use crate::error::{JoineryError, Result};
use crate::log_data_op;
use crate::logging::LogConfig;
use crate::security::SqlSecurity;
use crate::storage::{storage_key, BlobStore};

/// Outcome published by a load task; `None` until the load finishes.
type LoadOutcome = Option<std::result::Result<String, Arc<JoineryError>>>;

#[derive(Debug, Default)]
struct State {
    loaded: HashSet<String>,
    in_flight: HashMap<String, watch::Receiver<LoadOutcome>>,
}

enum Role {
    Loaded,
    Wait(watch::Receiver<LoadOutcome>),
    Load(watch::Sender<LoadOutcome>, watch::Receiver<LoadOutcome>),
}

/// Session-scoped registry of loaded and loading tables.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use joinery::engine::{DataFusionEngine, QueryEngine};
/// use joinery::query::TableMaterializationCoordinator;
/// use joinery::storage::{BlobStore, InMemoryBlobStore};
///
/// # async fn example() -> joinery::error::Result<()> {
/// let engine: Arc<dyn QueryEngine> = Arc::new(DataFusionEngine::new()?);
/// let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
/// let coordinator = TableMaterializationCoordinator::new();
///
/// let table_id = coordinator.ensure_loaded(&engine, &store, "orders").await?;
/// assert!(coordinator.is_loaded("orders"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TableMaterializationCoordinator {
    state: Arc<Mutex<State>>,
    log_config: LogConfig,
}

impl TableMaterializationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_config(log_config: LogConfig) -> Self {
        Self {
            state: Arc::default(),
            log_config,
        }
    }

    /// Makes sure the table backing `dataset_id` is loaded and returns its identifier.
    ///
    /// Must be called from within a tokio runtime: the load itself is spawned
    /// so that it outlives the caller.
    ///
    /// # Errors
    ///
    /// Any failure of the load is returned as
    /// [`JoineryError::MaterializationFailed`], to every caller waiting on it
    /// alike. Nothing is retried here; calling again starts a new load.
    #[instrument(skip(self, engine, store))]
    pub async fn ensure_loaded(
        &self,
        engine: &Arc<dyn QueryEngine>,
        store: &Arc<dyn BlobStore>,
        dataset_id: &str,
    ) -> Result<String> {
        let table_id = SqlSecurity::table_identifier(dataset_id);

        let role = {
            let mut state = self.state.lock();
            if state.loaded.contains(&table_id) {
                Role::Loaded
            } else if let Some(receiver) = state.in_flight.get(&table_id) {
                Role::Wait(receiver.clone())
            } else {
                let (sender, receiver) = watch::channel(None);
                state.in_flight.insert(table_id.clone(), receiver.clone());
                Role::Load(sender, receiver)
            }
        };

        let receiver = match role {
            Role::Loaded => {
                debug!(table_id, "Table already loaded");
                return Ok(table_id);
            }
            Role::Wait(receiver) => {
                debug!(table_id, "Waiting for in-flight load");
                receiver
            }
            Role::Load(sender, receiver) => {
                let task = LoadTask {
                    entry: InFlightEntry {
                        state: Arc::clone(&self.state),
                        table_id: table_id.clone(),
                        receiver: receiver.clone(),
                    },
                    log_config: self.log_config.clone(),
                };
                let span = info_span!("materialize", table_id = %table_id);
                tokio::spawn(
                    task.run(Arc::clone(engine), Arc::clone(store), sender)
                        .instrument(span),
                );
                receiver
            }
        };

        wait_for_load(table_id, receiver).await
    }

    /// Forgets that a dataset's table is loaded, so the next use reloads it.
    ///
    /// Must be called whenever the stored bytes of the dataset change. An
    /// in-flight load is left alone.
    pub fn invalidate(&self, dataset_id: &str) -> bool {
        let table_id = SqlSecurity::table_identifier(dataset_id);
        let removed = self.state.lock().loaded.remove(&table_id);
        debug!(table_id, removed, "Invalidated table");
        removed
    }

    /// Forgets every loaded table and every in-flight load.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.loaded.clear();
        state.in_flight.clear();
        debug!("Cleared materialization state");
    }

    pub fn is_loaded(&self, dataset_id: &str) -> bool {
        let table_id = SqlSecurity::table_identifier(dataset_id);
        self.state.lock().loaded.contains(&table_id)
    }

    /// Identifiers of the loaded tables, sorted.
    pub fn loaded_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.state.lock().loaded.iter().cloned().collect();
        tables.sort();
        tables
    }

    /// Number of loads currently running.
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }
}

/// One detached drop/load/insert sequence.
struct LoadTask {
    entry: InFlightEntry,
    log_config: LogConfig,
}

impl LoadTask {
    async fn run(
        self,
        engine: Arc<dyn QueryEngine>,
        store: Arc<dyn BlobStore>,
        sender: watch::Sender<LoadOutcome>,
    ) {
        let table_id = self.entry.table_id.as_str();
        log_data_op!(self.log_config, table_id, "Materializing table");
        let result = materialize(engine.as_ref(), store.as_ref(), table_id).await;

        {
            let mut state = self.entry.state.lock();
            remove_if_same(&mut state, table_id, &self.entry.receiver);
            if result.is_ok() {
                state.loaded.insert(table_id.to_string());
            }
        }

        // a send error only means nobody is waiting any more
        match result {
            Ok(()) => {
                log_data_op!(self.log_config, table_id, "Table materialized");
                let _ = sender.send(Some(Ok(table_id.to_string())));
            }
            Err(err) => {
                warn!(table_id, error = %err, "Table materialization failed");
                let _ = sender.send(Some(Err(Arc::new(err))));
            }
        }
    }
}

async fn materialize(engine: &dyn QueryEngine, store: &dyn BlobStore, table_id: &str) -> Result<()> {
    engine.drop_table(table_id).await?;

    let key = storage_key(table_id);
    let bytes = store
        .load_bytes(&key)
        .await?
        .ok_or_else(|| JoineryError::TableNotLoaded {
            table_id: table_id.to_string(),
            key: key.clone(),
        })?;

    engine
        .insert_columnar(table_id, &bytes, InsertOptions::create())
        .await
}

async fn wait_for_load(table_id: String, mut receiver: watch::Receiver<LoadOutcome>) -> Result<String> {
    let outcome = match receiver.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => None,
    };

    let cause = match outcome {
        Some(Ok(loaded)) => return Ok(loaded),
        Some(Err(cause)) => cause,
        // the load task panicked or its runtime shut down
        None => Arc::new(JoineryError::engine_message(
            format!("materialize {table_id}"),
            "the loading task ended without an outcome",
        )),
    };
    Err(JoineryError::MaterializationFailed {
        table_id,
        source: cause,
    })
}

/// Removes the in-flight entry for `table_id` only if it is still ours.
fn remove_if_same(state: &mut State, table_id: &str, receiver: &watch::Receiver<LoadOutcome>) {
    if state
        .in_flight
        .get(table_id)
        .is_some_and(|current| current.same_channel(receiver))
    {
        state.in_flight.remove(table_id);
    }
}

/// A registered in-flight load; unregisters itself when dropped, so a
/// panicking load task still leaves no residue.
struct InFlightEntry {
    state: Arc<Mutex<State>>,
    table_id: String,
    receiver: watch::Receiver<LoadOutcome>,
}

impl Drop for InFlightEntry {
    fn drop(&mut self) {
        remove_if_same(&mut self.state.lock(), &self.table_id, &self.receiver);
    }
}
