//! Neo4j connection handling and low-level query execution.

use neo4rs::{ConfigBuilder, Graph, Query, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Outcome of a single idempotent graph write.
///
/// `Skipped` means an endpoint `MATCH` found nothing, so the write did
/// not happen. Relationship upserts report it when a referenced node
/// was never materialized; node upserts never produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "walletlens-dev".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Thin wrapper around a `neo4rs::Graph` connection pool.
///
/// Cheap to clone; all clones share the underlying pool.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        info!(uri = %config.uri, user = %config.user, "Connecting to Neo4j");

        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        info!("Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Run a query, discarding any result rows.
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Run a query and collect all result rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<Row>, GraphError> {
        let mut result = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        debug!(count = rows.len(), "Query returned rows");
        Ok(rows)
    }

    /// Run a query expected to return at most one row.
    pub async fn query_one(&self, query: Query) -> Result<Option<Row>, GraphError> {
        let mut result = self.graph.execute(query).await?;
        let row = result.next().await?;
        Ok(row)
    }

    /// Run a MERGE-based upsert that returns a `created` flag row.
    ///
    /// No row at all means an endpoint `MATCH` matched nothing and the
    /// write was skipped.
    pub(crate) async fn run_upsert(&self, query: Query) -> Result<WriteOutcome, GraphError> {
        match self.query_one(query).await? {
            Some(row) => {
                let created = row
                    .get::<bool>("created")
                    .map_err(|e| GraphError::Serialization(e.to_string()))?;
                if created {
                    Ok(WriteOutcome::Created)
                } else {
                    Ok(WriteOutcome::Updated)
                }
            }
            None => Ok(WriteOutcome::Skipped),
        }
    }

    /// Access the underlying graph handle for custom queries.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}
