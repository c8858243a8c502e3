//! Column-family store adapter (ScyllaDB/Cassandra).
//!
//! Holds the high-volume token transfer log. The store is optional by
//! contract: a disabled or unreachable store degrades to empty results
//! and the aggregator skips the transfer step entirely.

use std::collections::HashSet;
use std::sync::Arc;

use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::prepared::PreparedStatement;
use scylla::statement::Consistency;
use tracing::{error, info, warn};

use walletlens_core::types::TokenTransfer;

use crate::config::ColumnConfig;
use crate::error::{Result, SourceError, StoreKind};
use crate::StoreStatus;

const TRANSFERS_FROM_CQL: &str = "SELECT block_number, from_address, to_address, value \
     FROM token_transfer WHERE from_address IN ? LIMIT ? ALLOW FILTERING";
const TRANSFERS_TO_CQL: &str = "SELECT block_number, from_address, to_address, value \
     FROM token_transfer WHERE to_address IN ? LIMIT ? ALLOW FILTERING";

/// Read-only adapter over the token transfer log.
#[derive(Clone)]
pub struct ColumnStore {
    inner: Option<Arc<Inner>>,
    reason: Option<String>,
}

struct Inner {
    session: Session,
    transfers_from: PreparedStatement,
    transfers_to: PreparedStatement,
}

impl ColumnStore {
    /// Connect and prepare statements. A failed attempt yields an
    /// unavailable adapter; it never aborts the process.
    pub async fn connect(cfg: &ColumnConfig) -> Self {
        if cfg.nodes.is_empty() {
            info!("Column store disabled (no contact points configured)");
            return Self::disabled();
        }

        match Self::try_connect(cfg).await {
            Ok(inner) => {
                info!(keyspace = %cfg.keyspace, "Column store connected");
                Self {
                    inner: Some(Arc::new(inner)),
                    reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Column store unavailable; token transfers will be skipped");
                Self {
                    inner: None,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    /// A deliberately-unavailable adapter, for deployments without a
    /// column store.
    pub fn disabled() -> Self {
        Self {
            inner: None,
            reason: Some("disabled".to_string()),
        }
    }

    async fn try_connect(cfg: &ColumnConfig) -> Result<Inner> {
        let connect_err = |e: String| SourceError::Connect {
            store: StoreKind::Column,
            message: e,
        };

        let mut builder = SessionBuilder::new();
        for node in &cfg.nodes {
            builder = builder.known_node(node);
        }
        if let (Some(user), Some(password)) = (&cfg.user, &cfg.password) {
            builder = builder.user(user, password);
        }

        let session = builder
            .use_keyspace(&cfg.keyspace, false)
            .build()
            .await
            .map_err(|e| connect_err(e.to_string()))?;

        let mut transfers_from = session
            .prepare(TRANSFERS_FROM_CQL)
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        transfers_from.set_consistency(Consistency::One);
        transfers_from.set_is_idempotent(true);

        let mut transfers_to = session
            .prepare(TRANSFERS_TO_CQL)
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        transfers_to.set_consistency(Consistency::One);
        transfers_to.set_is_idempotent(true);

        Ok(Inner {
            session,
            transfers_from,
            transfers_to,
        })
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            available: self.inner.is_some(),
            reason: self.reason.clone(),
        }
    }

    /// Transfers where any of the given wallets is sender or receiver,
    /// deduplicated by the full value tuple. Unavailable store: empty.
    pub async fn transfers_touching(
        &self,
        wallets: &[String],
        limit: usize,
    ) -> Result<Vec<TokenTransfer>> {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };
        if wallets.is_empty() {
            return Ok(Vec::new());
        }

        let query_err = |e: String| SourceError::Query {
            store: StoreKind::Column,
            message: e,
        };

        let addresses = wallets.to_vec();
        let limit = limit as i32;
        let mut transfers = Vec::new();

        for statement in [&inner.transfers_from, &inner.transfers_to] {
            let result = inner
                .session
                .execute_unpaged(statement, (&addresses, limit))
                .await
                .map_err(|e| query_err(e.to_string()))?;

            let rows = result
                .into_rows_result()
                .map_err(|e| query_err(e.to_string()))?;

            for row in rows
                .rows::<(i64, String, String, f64)>()
                .map_err(|e| query_err(e.to_string()))?
            {
                match row {
                    Ok((block_number, from_address, to_address, value)) => {
                        transfers.push(TokenTransfer {
                            from_address,
                            to_address,
                            value,
                            block_number,
                        });
                    }
                    Err(e) => error!(error = %e, "Skipping undecodable transfer row"),
                }
            }
        }

        Ok(dedup_transfers(transfers))
    }
}

/// Collapse duplicate tuples; a transfer matched by both the sender and
/// receiver query appears once.
fn dedup_transfers(transfers: Vec<TokenTransfer>) -> Vec<TokenTransfer> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(transfers.len());
    for t in transfers {
        let key = (
            t.block_number,
            t.from_address.clone(),
            t.to_address.clone(),
            t.value.to_bits(),
        );
        if seen.insert(key) {
            out.push(t);
        }
    }
    out
}
