//! Prelude for commonly used types and traits in joinery.

pub use crate::analyzers::{
    ColumnAnalysis, ColumnCategory, ColumnProfiler, Confidence, JoinSuggestion,
    JoinSuggestionEngine,
};
pub use crate::core::{DatasetHandle, FieldHint, FieldHints, TabularDataset};
pub use crate::engine::{DataFusionEngine, QueryEngine};
pub use crate::error::{JoineryError, Result};
pub use crate::join::{hash_join, JoinOn, JoinOptions, JoinType, Suffixes};
pub use crate::logging::LogConfig;
pub use crate::query::{
    AggregateFunction, Aggregation, DatasetQuery, Predicate, SortKey,
    TableMaterializationCoordinator, DEFAULT_PREVIEW_ROWS,
};
pub use crate::session::{SessionConfig, ViewSession};
pub use crate::storage::{BlobStore, StorageBackend};
