#![forbid(unsafe_code)]
//! strata-store: where analysis runs, recommendations, and execution records
//! live, plus a simulated database engine for tests and offline use.
//!
//! Design:
//! - `traits`: one narrow trait per record family so callers can swap backends
//! - `ledger`: the in-memory implementation, optionally backed by an
//!   append-only JSONL journal that is replayed on open
//! - `filter`: query filters, report ordering, per-strategy statistics
//! - `export`: CSV rendering of recommendation lists
//! - `memory_catalog`: `DatabasePort` over a JSON-describable object catalog

pub mod error;
pub mod export;
pub mod filter;
pub mod journal;
pub mod ledger;
pub mod memory_catalog;
pub mod traits;

pub use error::{Result, StoreError};
pub use export::write_recommendations_csv;
pub use filter::{CompressionStatistics, HistoryFilter, RecommendationFilter, StrategySavings};
pub use ledger::Ledger;
pub use memory_catalog::{CatalogObject, CatalogSnapshot, MemoryCatalog, StatementFault};
pub use traits::{ExecutionStore, RecommendationStore, RunStore, Store};
