//! Relational store adapter (PostgreSQL).
//!
//! The relational data plays no role in the wallet graph; the adapter
//! exists for the health surface and keeps the availability contract
//! uniform across stores.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::RelationalConfig;
use crate::error::{Result, SourceError, StoreKind};
use crate::StoreStatus;

/// Connection pool over the relational store.
#[derive(Clone)]
pub struct RelationalStore {
    pool: Option<PgPool>,
    reason: Option<String>,
}

impl RelationalStore {
    /// Connect the pool. A failed attempt yields an unavailable adapter;
    /// it never aborts the process.
    pub async fn connect(cfg: &RelationalConfig) -> Self {
        let attempt = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&cfg.url)
            .await;

        match attempt {
            Ok(pool) => {
                info!("Relational store connected");
                Self {
                    pool: Some(pool),
                    reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Relational store unavailable");
                Self {
                    pool: None,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    pub fn status(&self) -> StoreStatus {
        StoreStatus {
            available: self.pool.is_some(),
            reason: self.reason.clone(),
        }
    }

    /// Liveness probe.
    pub async fn ping(&self) -> Result<()> {
        let Some(pool) = &self.pool else {
            return Err(SourceError::Unavailable {
                store: StoreKind::Relational,
            });
        };

        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| SourceError::Query {
                store: StoreKind::Relational,
                message: e.to_string(),
            })?;

        Ok(())
    }
}
