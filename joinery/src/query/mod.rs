//! Deferred queries over stored datasets.
//!
//! A query is a base [`DatasetHandle`](crate::core::DatasetHandle) plus a list
//! of [`Operation`]s. Nothing reaches the engine until a terminal method runs;
//! at that point the tables involved are materialized through the
//! [`TableMaterializationCoordinator`] and the operations are compiled to SQL
//! by [`SqlCompiler`].

pub mod builder;
pub mod coordinator;
pub mod operation;
pub mod sql;

pub use builder::{DatasetQuery, QueryContext, DEFAULT_PREVIEW_ROWS};
pub use coordinator::TableMaterializationCoordinator;
pub use operation::{
    AggregateFunction, Aggregation, FilterOperator, Operation, Predicate, PredicateValue,
    SortDirection, SortKey,
};
pub use sql::{render_literal, SqlCompiler, TableRef};
