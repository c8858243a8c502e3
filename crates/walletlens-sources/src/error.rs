//! Error types for the walletlens-sources crate.

use thiserror::Error;

/// Which source store an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Document,
    Column,
    Relational,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreKind::Document => "document",
            StoreKind::Column => "column",
            StoreKind::Relational => "relational",
        })
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{store} store connection failed: {message}")]
    Connect { store: StoreKind, message: String },

    #[error("{store} store query failed: {message}")]
    Query { store: StoreKind, message: String },

    #[error("{store} store is unavailable")]
    Unavailable { store: StoreKind },
}

pub type Result<T> = std::result::Result<T, SourceError>;
