//! walletlens-sources: read-only adapters over the source stores.
//!
//! Three independent stores feed the pipeline: the document store
//! (wallets, contracts, projects, social links, liquidations), the
//! column-family store (token transfer log, optional), and the
//! relational store (health surface only). Each adapter makes exactly
//! one connection attempt per process, never aborts the process, and
//! degrades to empty query results while unavailable.
//!
//! Raw store-shaped records are pinned down in [`records`] and
//! normalized into `walletlens_core` entities at this boundary; untyped
//! maps never flow past it.

pub mod column;
pub mod config;
pub mod document;
pub mod error;
pub mod records;
pub mod relational;

use serde::Serialize;

pub use column::ColumnStore;
pub use config::{ColumnConfig, DocumentConfig, RelationalConfig, SourcesConfig};
pub use document::DocumentStore;
pub use error::{Result, SourceError, StoreKind};
pub use relational::RelationalStore;

/// Availability snapshot for one store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub available: bool,
    /// Failure reason recorded at the single connect attempt, if any.
    pub reason: Option<String>,
}
