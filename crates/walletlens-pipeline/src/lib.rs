//! walletlens-pipeline: aggregation and materialization for the wallet
//! graph.
//!
//! Pulls wallet-centric records from the source stores, assembles them
//! into a fixed-shape dataset, and projects the dataset into Neo4j as
//! an idempotent two-phase write. Batch runs page wallet addresses out
//! of a source collection and process them with bounded concurrency.

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod error;
pub mod materializer;
