//! walletlens-core: shared domain types for the wallet graph pipeline.
//!
//! This crate provides the vocabulary used across all walletlens crates:
//! - Chain-scoped entity types (Wallet, Contract, Project, ...) read from
//!   the source stores and projected into the graph store
//! - The fixed nine-collection aggregated dataset
//! - Pipeline event envelope and the injected observability sink

pub mod events;
pub mod types;

pub use events::{EventPayload, EventSink, EventSource, PipelineEvent};
pub use types::{ChainScope, WalletDataset};
