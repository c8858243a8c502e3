//! Read operations used by the CLI and the integration tests.

use std::collections::BTreeMap;

use neo4rs::query;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::{GraphClient, GraphError};

/// A node read back from the graph, with the well-known property keys
/// extracted into a JSON map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub label: String,
    pub properties: Value,
}

/// Per-label node and per-type relationship counts for the whole graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: BTreeMap<String, i64>,
    pub relationships: BTreeMap<String, i64>,
}

impl GraphClient {
    /// Fetch a single node by label and identity key.
    pub async fn find_node(
        &self,
        label: &str,
        id: &str,
    ) -> Result<Option<NodeRecord>, GraphError> {
        let cypher = format!("MATCH (n:{label} {{id: $id}}) RETURN n");
        let row = self
            .query_one(query(&cypher).param("id", id.to_string()))
            .await?;

        match row {
            Some(row) => {
                let node = row
                    .get::<neo4rs::Node>("n")
                    .map_err(|e| GraphError::Serialization(e.to_string()))?;
                Ok(Some(node_to_record(&node, label)))
            }
            None => Ok(None),
        }
    }

    /// Count nodes carrying the given label.
    pub async fn count_nodes(&self, label: &str) -> Result<i64, GraphError> {
        let cypher = format!("MATCH (n:{label}) RETURN count(n) AS cnt");
        let row = self.query_one(query(&cypher)).await?;
        Ok(row.map(|r| r.get::<i64>("cnt").unwrap_or(0)).unwrap_or(0))
    }

    /// Count relationships of the given type.
    pub async fn count_relationships(&self, rel_type: &str) -> Result<i64, GraphError> {
        let cypher = format!("MATCH ()-[r:{rel_type}]->() RETURN count(r) AS cnt");
        let row = self.query_one(query(&cypher)).await?;
        Ok(row.map(|r| r.get::<i64>("cnt").unwrap_or(0)).unwrap_or(0))
    }

    /// Whole-graph census: node counts per label, relationship counts
    /// per type.
    pub async fn graph_summary(&self) -> Result<GraphSummary, GraphError> {
        let mut summary = GraphSummary::default();

        let rows = self
            .query_rows(query(
                "MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS cnt ORDER BY label",
            ))
            .await?;
        for row in rows {
            if let (Ok(label), Ok(cnt)) = (row.get::<String>("label"), row.get::<i64>("cnt")) {
                summary.nodes.insert(label, cnt);
            }
        }

        let rows = self
            .query_rows(query(
                "MATCH ()-[r]->() RETURN type(r) AS rel, count(*) AS cnt ORDER BY rel",
            ))
            .await?;
        for row in rows {
            if let (Ok(rel), Ok(cnt)) = (row.get::<String>("rel"), row.get::<i64>("cnt")) {
                summary.relationships.insert(rel, cnt);
            }
        }

        Ok(summary)
    }
}

/// Extract the well-known property keys from a Neo4j node. Properties
/// written as serialized blobs come back as plain strings.
fn node_to_record(node: &neo4rs::Node, label: &str) -> NodeRecord {
    let mut props = Map::new();

    for key in [
        "address",
        "chain_id",
        "name",
        "handle",
        "tag",
        "symbol",
        "category",
        "author_handle",
        "first_seen",
        "last_seen",
        "balance_change_logs",
        "contract_addresses",
    ] {
        if let Ok(value) = node.get::<String>(key) {
            props.insert(key.to_string(), json!(value));
        }
    }

    for key in [
        "followers",
        "likes",
        "retweets",
        "replies",
        "timestamp",
        "decimals",
        "liquidation_count",
        "daily_call_days",
        "daily_active_user_days",
    ] {
        if let Ok(value) = node.get::<i64>(key) {
            props.insert(key.to_string(), json!(value));
        }
    }

    for key in [
        "balance_usd",
        "deposit_usd",
        "borrow_usd",
        "liquidation_value_usd",
        "tvl_usd",
        "price_usd",
        "market_cap_usd",
        "trading_volume_usd",
    ] {
        if let Ok(value) = node.get::<f64>(key) {
            props.insert(key.to_string(), json!(value));
        }
    }

    if let Ok(verified) = node.get::<bool>("verified") {
        props.insert("verified".to_string(), json!(verified));
    }

    NodeRecord {
        id: node.get::<String>("id").unwrap_or_default(),
        label: label.to_string(),
        properties: Value::Object(props),
    }
}
