//! Error types for the walletlens-pipeline crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source error: {0}")]
    Source(#[from] walletlens_sources::SourceError),

    #[error("Graph error: {0}")]
    Graph(#[from] walletlens_graph::GraphError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
