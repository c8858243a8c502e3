//! Core domain types for the walletlens wallet graph.
//!
//! These are the normalized entities the aggregator produces and the
//! materializer projects into the graph store. They are derived state:
//! the source stores remain the system of record, and the graph copy is
//! rebuildable at any time by re-running the pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Chain Scope ───────────────────────────────────────────────────

/// Blockchain network identifier, e.g. `0x1` for Ethereum mainnet.
///
/// Addresses are only unique within one chain, so every chain-scoped
/// identity key carries this value as a prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChainScope(pub String);

impl ChainScope {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity key for a chain-scoped address: `{chain}_{address}`.
    /// Address case is preserved; keys compare byte-for-byte.
    pub fn scoped_id(&self, address: &str) -> String {
        format!("{}_{}", self.0, address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChainScope {
    fn default() -> Self {
        Self("0x1".to_string())
    }
}

impl std::fmt::Display for ChainScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Entities ──────────────────────────────────────────────────────

/// A wallet with its lending-protocol aggregates.
///
/// The change-log fields are opaque time-series blobs; the pipeline
/// never interprets them, it only carries them into the graph store
/// as serialized strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub chain_id: String,
    pub balance_usd: f64,
    pub balance_change_logs: serde_json::Value,
    pub deposit_usd: f64,
    pub deposit_change_logs: serde_json::Value,
    pub borrow_usd: f64,
    pub borrow_change_logs: serde_json::Value,
    pub daily_all_transactions: serde_json::Value,
    pub daily_transaction_counts: serde_json::Value,
    pub daily_transaction_amounts: serde_json::Value,
    pub liquidation_count: i64,
    pub liquidation_value_usd: f64,
}

/// A smart contract and its activity counters.
///
/// The raw daily-activity maps are collapsed to distinct-day counts at
/// the aggregation boundary. Contracts whose tag set contains `token`
/// additionally carry the token facet and materialize as Token nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub address: String,
    pub chain_id: String,
    pub tags: Vec<String>,
    pub daily_call_days: i64,
    pub daily_active_user_days: i64,
    pub symbol: Option<String>,
    pub decimals: Option<i64>,
    pub price_usd: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub trading_volume_usd: Option<f64>,
    pub price_change_logs: Option<serde_json::Value>,
}

impl Contract {
    pub fn is_token(&self) -> bool {
        self.tags.iter().any(|t| t == "token")
    }
}

/// A protocol/project with its deployed contract and token address maps.
///
/// Map keys are `{chain}_{address}` identity keys; they are the sole
/// source of PART_OF edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub tvl_usd: Option<f64>,
    pub deployed_chains: Vec<String>,
    pub contract_addresses: BTreeMap<String, serde_json::Value>,
    pub token_addresses: BTreeMap<String, serde_json::Value>,
    pub twitter_id: Option<String>,
}

/// Link between a project and its twitter account handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSocial {
    pub project_id: String,
    pub twitter_handle: Option<String>,
}

/// A twitter account attached to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub handle: String,
    pub followers: i64,
    pub favourites: i64,
    pub friends: i64,
    pub statuses: i64,
    pub verified: bool,
}

/// A tweet authored by a tracked twitter account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub author_handle: String,
    pub timestamp: i64,
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
    pub hashtags: Vec<String>,
}

/// Lending protocol action kinds recognized by the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LendingEventKind {
    Deposit,
    Borrow,
    Repay,
    Withdraw,
}

impl LendingEventKind {
    /// Parse a raw `event_type` value. Unknown kinds yield `None` and
    /// are dropped at the aggregation boundary.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "DEPOSIT" => Some(Self::Deposit),
            "BORROW" => Some(Self::Borrow),
            "REPAY" => Some(Self::Repay),
            "WITHDRAW" => Some(Self::Withdraw),
            _ => None,
        }
    }
}

/// A lending action by a wallet against a protocol contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingEvent {
    pub id: String,
    pub wallet: String,
    pub contract_address: String,
    pub amount: f64,
    pub timestamp: i64,
    pub kind: LendingEventKind,
}

/// A token transfer between two wallets.
///
/// No durable source id exists for transfers; identity is the full
/// value tuple, so identical tuples collapse into one edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenTransfer {
    pub from_address: String,
    pub to_address: String,
    pub value: f64,
    pub block_number: i64,
}

/// A liquidation linking the liquidated wallet to the debt buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liquidation {
    pub id: String,
    pub liquidated_wallet: String,
    pub debt_buyer_wallet: String,
    pub liquidation_logs: serde_json::Value,
}

// ── Aggregated Dataset ────────────────────────────────────────────

/// Fixed-shape output of the wallet graph aggregator: nine named
/// collections, always present, possibly empty, never null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletDataset {
    pub wallets: Vec<Wallet>,
    pub lending_events: Vec<LendingEvent>,
    pub contracts: Vec<Contract>,
    pub projects: Vec<Project>,
    pub project_social: Vec<ProjectSocial>,
    pub twitter_users: Vec<TwitterUser>,
    pub tweets: Vec<Tweet>,
    pub token_transfers: Vec<TokenTransfer>,
    pub liquidations: Vec<Liquidation>,
}

impl WalletDataset {
    /// Total records across all nine collections.
    pub fn record_count(&self) -> usize {
        self.wallets.len()
            + self.lending_events.len()
            + self.contracts.len()
            + self.projects.len()
            + self.project_social.len()
            + self.twitter_users.len()
            + self.tweets.len()
            + self.token_transfers.len()
            + self.liquidations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}
