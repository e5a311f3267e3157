//! Core data types shared by every joinery component.
//!
//! - **[`Scalar`]**: a single cell value, with the coercion used for join equality
//! - **[`TabularDataset`]**: columns plus rows, the unit the profiler and hash join work on
//! - **[`DatasetHandle`]**: a reference to a dataset whose bytes live in blob storage,
//!   the unit the query builder works on
//!
//! Datasets convert to and from Arrow record batches (see `arrow_convert`),
//! which is also the byte format kept in storage.

pub mod arrow_convert;
pub mod dataset;
pub mod scalar;

pub use arrow_convert::{decode_ipc, encode_ipc};
pub use dataset::{
    ColumnSpec, ColumnType, DatasetHandle, FieldHint, FieldHints, FieldLineage, PrimaryKey, Row,
    TabularDataset,
};
pub use scalar::Scalar;
