//! Walletlens Graph - Neo4j client for the materialized wallet graph.
//!
//! The single mutation point for graph state. Every write is an
//! idempotent MERGE keyed on an entity identity key, and relationship
//! writes never invent endpoints: if a referenced node is missing the
//! write is skipped and reported as such.

pub mod client;
pub mod mutations;
pub mod queries;

pub use client::{GraphClient, GraphConfig, GraphError, WriteOutcome};
pub use mutations::lending_edge_label;
pub use queries::{GraphSummary, NodeRecord};
