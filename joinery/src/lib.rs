//! # Joinery - Profiling, Join Discovery and Deferred Queries
//!
//! Joinery is the analysis and query-planning core behind interactive views
//! over tabular data. It profiles the columns of a dataset, proposes which
//! columns two datasets can be joined on, joins small in-memory datasets
//! directly, and builds SQL lazily against datasets loaded into an embedded
//! DataFusion engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use joinery::prelude::*;
//! use joinery::core::Scalar;
//!
//! # async fn example() -> joinery::error::Result<()> {
//! let session = ViewSession::new()?;
//!
//! let customers = TabularDataset::from_values(
//!     &["id", "name"],
//!     vec![
//!         vec![Scalar::Int(1), Scalar::from("Ada")],
//!         vec![Scalar::Int(2), Scalar::from("Grace")],
//!     ],
//! );
//! let orders = TabularDataset::from_values(
//!     &["order_no", "customer_id", "total"],
//!     vec![
//!         vec![Scalar::Int(10), Scalar::Int(1), Scalar::Float(25.0)],
//!         vec![Scalar::Int(11), Scalar::Int(2), Scalar::Float(40.0)],
//!     ],
//! );
//!
//! // Which columns line up?
//! let profiler = ColumnProfiler::new();
//! let suggestions = JoinSuggestionEngine::new().suggest(
//!     &profiler.profile_dataset(&orders, None),
//!     &profiler.profile_dataset(&customers, None),
//!     Some("orders"),
//!     Some("customers"),
//! );
//! let best = &suggestions[0];
//!
//! // Join them in the engine and keep the result as a new dataset
//! let orders = session.register_dataset("orders", &orders).await?;
//! let customers = session.register_dataset("customers", &customers).await?;
//! let joined = session
//!     .query(&orders)
//!     .join(
//!         &customers,
//!         JoinOptions::on_columns(&best.left_column, &best.right_column),
//!     )
//!     .run()
//!     .await?;
//!
//! let preview = session.query(&joined).preview(DEFAULT_PREVIEW_ROWS).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`analyzers`**: column profiler and join suggestion engine
//! - **`join`**: in-memory hash join with value coercion and suffix handling
//! - **`query`**: deferred query builder, SQL compiler and the table
//!   materialization coordinator
//! - **`engine`**: the [`QueryEngine`](engine::QueryEngine) seam and its
//!   DataFusion implementation
//! - **`storage`**: blob stores holding dataset bytes as Arrow IPC
//! - **`session`**: wires an engine, a store and a coordinator together
//! - **`core`**: scalar values, datasets and Arrow conversion
//!
//! ## Concurrency
//!
//! Queries created from one [`ViewSession`](session::ViewSession) share a
//! coordinator. However many tasks use the same dataset at once, its table
//! is loaded into the engine once; the other tasks wait for that load.

pub mod analyzers;
pub mod core;
pub mod engine;
pub mod error;
pub mod join;
pub mod logging;
pub mod prelude;
pub mod query;
pub mod security;
pub mod session;
pub mod storage;
