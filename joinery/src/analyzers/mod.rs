//! Column analysis: profiling and join key discovery.
//!
//! ## Available Analyzers
//!
//! - **Column Profiler** (`profiler`): per-column statistics and a semantic
//!   [`ColumnCategory`] resolved by a priority chain of hints, name heuristics
//!   and value shapes
//! - **Join Suggestion Engine** (`join_suggestions`): ranked join column pairs
//!   between two profiled tables
//! - **Patterns** (`patterns`): the value recognizers and name heuristics both
//!   of the above share
//!
//! Neither analyzer fails: degenerate input (no rows, no hints, no table
//! names) produces `unknown` categories or an empty suggestion list.
//!
//! ## Example Usage
//!
//! ```rust
//! use joinery::analyzers::{ColumnProfiler, JoinSuggestionEngine};
//! use joinery::core::{Scalar, TabularDataset};
//!
//! let left = TabularDataset::from_values(&["user_id"], vec![vec![Scalar::Int(1)]]);
//! let right = TabularDataset::from_values(&["user_id"], vec![vec![Scalar::Int(1)]]);
//!
//! let profiler = ColumnProfiler::new();
//! let suggestions = JoinSuggestionEngine::new().suggest(
//!     &profiler.profile_dataset(&left, None),
//!     &profiler.profile_dataset(&right, None),
//!     None,
//!     None,
//! );
//! assert_eq!(suggestions.len(), 1);
//! ```

pub mod join_suggestions;
pub mod patterns;
pub mod profiler;

pub use join_suggestions::{Confidence, JoinSuggestion, JoinSuggestionEngine, SuggestionConfig};
pub use patterns::ValuePattern;
pub use profiler::{
    ColumnAnalysis, ColumnCategory, ColumnProfiler, ColumnProfilerBuilder, ProfilerConfig,
};
