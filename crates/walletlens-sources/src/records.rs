//! Raw store-shaped records and their normalization into core entities.
//!
//! Source documents are loosely shaped; these types pin down exactly
//! the fields each query projects. A document that fails to decode is
//! logged and skipped at the cursor, so nothing untyped flows past the
//! aggregation boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

use walletlens_core::types::{
    ChainScope, Contract, LendingEvent, LendingEventKind, Liquidation, Project, ProjectSocial,
    Tweet, TwitterUser, Wallet,
};

/// Mongo `_id` values appear as ObjectIds in some collections and as
/// plain strings in others; both normalize to a string.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = bson::Bson::deserialize(deserializer)?;
    Ok(match value {
        bson::Bson::ObjectId(oid) => oid.to_hex(),
        bson::Bson::String(s) => s,
        other => other.to_string(),
    })
}

// ── Wallet ────────────────────────────────────────────────────────

/// Projected `wallets` document.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRecord {
    pub address: String,
    #[serde(rename = "chainId", default)]
    pub chain_id: Option<String>,
    #[serde(rename = "balanceInUSD", default)]
    pub balance_usd: f64,
    #[serde(rename = "balanceChangeLogs", default)]
    pub balance_change_logs: serde_json::Value,
    #[serde(rename = "depositInUSD", default)]
    pub deposit_usd: f64,
    #[serde(rename = "depositChangeLogs", default)]
    pub deposit_change_logs: serde_json::Value,
    #[serde(rename = "borrowInUSD", default)]
    pub borrow_usd: f64,
    #[serde(rename = "borrowChangeLogs", default)]
    pub borrow_change_logs: serde_json::Value,
    #[serde(rename = "dailyAllTransactions", default)]
    pub daily_all_transactions: serde_json::Value,
    #[serde(rename = "dailyNumberOfTransactions", default)]
    pub daily_transaction_counts: serde_json::Value,
    #[serde(rename = "dailyTransactionAmounts", default)]
    pub daily_transaction_amounts: serde_json::Value,
    #[serde(rename = "numberOfLiquidation", default)]
    pub liquidation_count: i64,
    #[serde(rename = "totalValueOfLiquidation", default)]
    pub liquidation_value_usd: f64,
}

impl WalletRecord {
    /// Normalize into the core entity. Records missing a chain id take
    /// the active chain scope of the run.
    pub fn into_wallet(self, chain: &ChainScope) -> Wallet {
        Wallet {
            address: self.address,
            chain_id: self.chain_id.unwrap_or_else(|| chain.as_str().to_string()),
            balance_usd: self.balance_usd,
            balance_change_logs: self.balance_change_logs,
            deposit_usd: self.deposit_usd,
            deposit_change_logs: self.deposit_change_logs,
            borrow_usd: self.borrow_usd,
            borrow_change_logs: self.borrow_change_logs,
            daily_all_transactions: self.daily_all_transactions,
            daily_transaction_counts: self.daily_transaction_counts,
            daily_transaction_amounts: self.daily_transaction_amounts,
            liquidation_count: self.liquidation_count,
            liquidation_value_usd: self.liquidation_value_usd,
        }
    }
}

// ── Lending Event ─────────────────────────────────────────────────

/// Projected `lending_events` document.
#[derive(Debug, Clone, Deserialize)]
pub struct LendingEventRecord {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    pub wallet: String,
    pub contract_address: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub block_timestamp: i64,
    #[serde(default)]
    pub event_type: String,
}

impl LendingEventRecord {
    /// Normalize into a typed event; unknown kinds yield `None` and are
    /// dropped by the caller.
    pub fn into_event(self) -> Option<LendingEvent> {
        let kind = LendingEventKind::parse(&self.event_type)?;
        Some(LendingEvent {
            id: self.id,
            wallet: self.wallet,
            contract_address: self.contract_address,
            amount: self.amount,
            timestamp: self.block_timestamp,
            kind,
        })
    }
}

// ── Contract ──────────────────────────────────────────────────────

/// Projected `smart_contracts` document. The raw daily-activity maps
/// collapse to distinct-day counts here; the time series itself never
/// leaves the adapter.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractRecord {
    pub address: String,
    #[serde(rename = "chainId", default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "numberOfDailyCalls", default)]
    pub daily_calls: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "numberOfDailyActiveUsers", default)]
    pub daily_active_users: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "marketCap", default)]
    pub market_cap: Option<f64>,
    #[serde(rename = "tradingVolume", default)]
    pub trading_volume: Option<f64>,
    #[serde(rename = "priceChangeLogs", default)]
    pub price_change_logs: Option<serde_json::Value>,
}

impl ContractRecord {
    pub fn into_contract(self, chain: &ChainScope) -> Contract {
        Contract {
            address: self.address,
            chain_id: self.chain_id.unwrap_or_else(|| chain.as_str().to_string()),
            tags: self.tags,
            daily_call_days: self.daily_calls.len() as i64,
            daily_active_user_days: self.daily_active_users.len() as i64,
            symbol: self.symbol,
            decimals: self.decimals,
            price_usd: self.price,
            market_cap_usd: self.market_cap,
            trading_volume_usd: self.trading_volume,
            price_change_logs: self.price_change_logs,
        }
    }
}

// ── Project ───────────────────────────────────────────────────────

/// Projected `projects` document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRecord {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tvl: Option<f64>,
    #[serde(rename = "deployedChains", default)]
    pub deployed_chains: Vec<String>,
    #[serde(rename = "contractAddresses", default)]
    pub contract_addresses: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "tokenAddresses", default)]
    pub token_addresses: BTreeMap<String, serde_json::Value>,
    #[serde(rename = "socialAccounts", default)]
    pub social_accounts: Option<SocialAccounts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SocialAccounts {
    #[serde(default)]
    pub twitter: Option<TwitterRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwitterRef {
    #[serde(default)]
    pub id: Option<String>,
}

impl From<ProjectRecord> for Project {
    fn from(r: ProjectRecord) -> Self {
        let twitter_id = r.social_accounts.and_then(|s| s.twitter).and_then(|t| t.id);
        Project {
            id: r.id,
            name: r.name.unwrap_or_default(),
            category: r.category,
            tvl_usd: r.tvl,
            deployed_chains: r.deployed_chains,
            contract_addresses: r.contract_addresses,
            token_addresses: r.token_addresses,
            twitter_id,
        }
    }
}

// ── Project Social ────────────────────────────────────────────────

/// Projected `projects_social_media` document.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSocialRecord {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub project_id: String,
    #[serde(default)]
    pub twitter: Option<TwitterRef>,
}

impl From<ProjectSocialRecord> for ProjectSocial {
    fn from(r: ProjectSocialRecord) -> Self {
        ProjectSocial {
            project_id: r.project_id,
            twitter_handle: r.twitter.and_then(|t| t.id),
        }
    }
}

// ── Twitter User ──────────────────────────────────────────────────

/// Projected `twitter_users` document.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterUserRecord {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "userName")]
    pub handle: String,
    #[serde(rename = "followersCount", default)]
    pub followers: i64,
    #[serde(rename = "favouritesCount", default)]
    pub favourites: i64,
    #[serde(rename = "friendsCount", default)]
    pub friends: i64,
    #[serde(rename = "statusesCount", default)]
    pub statuses: i64,
    #[serde(default)]
    pub verified: bool,
}

impl From<TwitterUserRecord> for TwitterUser {
    fn from(r: TwitterUserRecord) -> Self {
        TwitterUser {
            id: r.id,
            handle: r.handle,
            followers: r.followers,
            favourites: r.favourites,
            friends: r.friends,
            statuses: r.statuses,
            verified: r.verified,
        }
    }
}

// ── Tweet ─────────────────────────────────────────────────────────

/// Projected `tweets` document.
#[derive(Debug, Clone, Deserialize)]
pub struct TweetRecord {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "authorName")]
    pub author_handle: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(rename = "retweetCounts", default)]
    pub retweets: i64,
    #[serde(rename = "replyCounts", default)]
    pub replies: i64,
    #[serde(rename = "hashTags", default)]
    pub hashtags: Vec<String>,
}

impl From<TweetRecord> for Tweet {
    fn from(r: TweetRecord) -> Self {
        Tweet {
            id: r.id,
            author_handle: r.author_handle,
            timestamp: r.timestamp,
            likes: r.likes,
            retweets: r.retweets,
            replies: r.replies,
            hashtags: r.hashtags,
        }
    }
}

// ── Liquidation ───────────────────────────────────────────────────

/// Projected `liquidates` document.
#[derive(Debug, Clone, Deserialize)]
pub struct LiquidationRecord {
    #[serde(rename = "_id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "liquidatedWallet")]
    pub liquidated_wallet: String,
    #[serde(rename = "debtBuyerWallet")]
    pub debt_buyer_wallet: String,
    #[serde(rename = "liquidationLogs", default)]
    pub liquidation_logs: serde_json::Value,
}

impl From<LiquidationRecord> for Liquidation {
    fn from(r: LiquidationRecord) -> Self {
        Liquidation {
            id: r.id,
            liquidated_wallet: r.liquidated_wallet,
            debt_buyer_wallet: r.debt_buyer_wallet,
            liquidation_logs: r.liquidation_logs,
        }
    }
}

// ── Batch listing rows ────────────────────────────────────────────

/// Single-field rows for batch pagination.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletAddressRow {
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventWalletRow {
    pub wallet: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebtBuyerRow {
    #[serde(rename = "debtBuyerWallet")]
    pub debt_buyer_wallet: String,
}
