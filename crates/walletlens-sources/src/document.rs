//! Document store adapter (MongoDB).
//!
//! One client serving three logical databases: wallet/contract/project
//! state, the lending-event log, and the social/twitter data. Every
//! query carries an explicit projection and a record limit; documents
//! that fail to decode are logged and skipped at the cursor.

use bson::{doc, Bson, Document};
use futures::StreamExt;
use mongodb::Client;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::config::DocumentConfig;
use crate::error::{Result, SourceError, StoreKind};
use crate::records::{
    ContractRecord, DebtBuyerRow, EventWalletRow, LendingEventRecord, LiquidationRecord,
    ProjectRecord, ProjectSocialRecord, TweetRecord, TwitterUserRecord, WalletAddressRow,
    WalletRecord,
};
use crate::StoreStatus;

// Collection names as they exist in the source databases.
const WALLETS: &str = "wallets";
const LENDING_EVENTS: &str = "lending_events";
const SMART_CONTRACTS: &str = "smart_contracts";
const PROJECTS: &str = "projects";
const PROJECT_SOCIAL: &str = "projects_social_media";
const TWITTER_USERS: &str = "twitter_users";
const TWEETS: &str = "tweets";
const LIQUIDATIONS: &str = "liquidates";

/// Which logical database a collection lives in.
#[derive(Debug, Clone, Copy)]
enum LogicalDb {
    Graph,
    Etl,
    Social,
}

/// Read-only adapter over the document store.
///
/// One connection attempt per process: on failure the adapter records
/// the reason, stays unavailable, and every aggregation query returns
/// empty. Only the batch listing queries surface errors, because a
/// failed listing is the one fatal path in a batch run.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Option<Inner>,
    reason: Option<String>,
}

#[derive(Clone)]
struct Inner {
    client: Client,
    graph_db: String,
    etl_db: String,
    social_db: String,
}

impl Inner {
    fn db_name(&self, db: LogicalDb) -> &str {
        match db {
            LogicalDb::Graph => &self.graph_db,
            LogicalDb::Etl => &self.etl_db,
            LogicalDb::Social => &self.social_db,
        }
    }
}

impl DocumentStore {
    /// Connect and ping. A failed attempt yields an unavailable adapter
    /// and never aborts the process; reconnecting is out of scope.
    pub async fn connect(cfg: &DocumentConfig) -> Self {
        match Self::try_connect(cfg).await {
            Ok(inner) => {
                info!(graph_db = %cfg.graph_db, "Document store connected");
                Self {
                    inner: Some(inner),
                    reason: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Document store unavailable; its queries will return empty");
                Self {
                    inner: None,
                    reason: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_connect(cfg: &DocumentConfig) -> Result<Inner> {
        // serverSelectionTimeoutMS keeps an unreachable server from
        // hanging the connect.
        let uri = if cfg.uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", cfg.uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", cfg.uri)
        };

        let client = Client::with_uri_str(&uri).await.map_err(|e| SourceError::Connect {
            store: StoreKind::Document,
            message: e.to_string(),
        })?;

        client
            .database(&cfg.graph_db)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| SourceError::Connect {
                store: StoreKind::Document,
                message: e.to_string(),
            })?;

        Ok(Inner {
            client,
            graph_db: cfg.graph_db.clone(),
            etl_db: cfg.etl_db.clone(),
            social_db: cfg.social_db.clone(),
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

    /// Projected, limited find against one collection. Unavailable
    /// store: empty result, no error.
    async fn find<T>(
        &self,
        db: LogicalDb,
        collection: &str,
        filter: Document,
        projection: Document,
        limit: usize,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let Some(inner) = &self.inner else {
            return Ok(Vec::new());
        };

        let cursor = inner
            .client
            .database(inner.db_name(db))
            .collection::<T>(collection)
            .find(filter)
            .projection(projection)
            .limit(limit as i64)
            .await
            .map_err(|e| SourceError::Query {
                store: StoreKind::Document,
                message: format!("{collection}: {e}"),
            })?;

        let rows: Vec<T> = cursor
            .filter_map(|item| async move {
                match item {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!(collection, error = %e, "Skipping undecodable document");
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(rows)
    }

    // ── Aggregation queries ───────────────────────────────────────

    pub async fn wallets_by_address(&self, address: &str, limit: usize) -> Result<Vec<WalletRecord>> {
        self.find(
            LogicalDb::Graph,
            WALLETS,
            doc! { "address": address },
            wallet_projection(),
            limit,
        )
        .await
    }

    pub async fn wallets_by_chain(&self, chain: &str, limit: usize) -> Result<Vec<WalletRecord>> {
        self.find(
            LogicalDb::Graph,
            WALLETS,
            doc! { "chainId": chain },
            wallet_projection(),
            limit,
        )
        .await
    }

    pub async fn lending_events_for_wallets(
        &self,
        wallets: &[String],
        limit: usize,
    ) -> Result<Vec<LendingEventRecord>> {
        self.find(
            LogicalDb::Etl,
            LENDING_EVENTS,
            doc! { "wallet": { "$in": wallets } },
            doc! {
                "_id": 1,
                "wallet": 1,
                "contract_address": 1,
                "amount": 1,
                "block_timestamp": 1,
                "event_type": 1,
            },
            limit,
        )
        .await
    }

    pub async fn contracts_by_addresses(
        &self,
        addresses: &[String],
        limit: usize,
    ) -> Result<Vec<ContractRecord>> {
        self.find(
            LogicalDb::Graph,
            SMART_CONTRACTS,
            doc! { "address": { "$in": addresses } },
            doc! {
                "_id": 0,
                "address": 1,
                "chainId": 1,
                "tags": 1,
                "numberOfDailyCalls": 1,
                "numberOfDailyActiveUsers": 1,
                "symbol": 1,
                "decimals": 1,
                "price": 1,
                "marketCap": 1,
                "tradingVolume": 1,
                "priceChangeLogs": 1,
            },
            limit,
        )
        .await
    }

    /// Projects whose contract-address map contains any of the given
    /// `{chain}_{address}` keys.
    pub async fn projects_with_contract_keys(
        &self,
        keys: &[String],
        limit: usize,
    ) -> Result<Vec<ProjectRecord>> {
        let mut clauses = Vec::with_capacity(keys.len());
        for key in keys {
            let mut clause = Document::new();
            clause.insert(format!("contractAddresses.{key}"), doc! { "$exists": true });
            clauses.push(clause);
        }

        self.find(
            LogicalDb::Graph,
            PROJECTS,
            doc! { "$or": clauses },
            doc! {
                "_id": 1,
                "name": 1,
                "tvl": 1,
                "category": 1,
                "deployedChains": 1,
                "contractAddresses": 1,
                "tokenAddresses": 1,
                "socialAccounts.twitter.id": 1,
            },
            limit,
        )
        .await
    }

    pub async fn social_for_projects(
        &self,
        project_ids: &[String],
        limit: usize,
    ) -> Result<Vec<ProjectSocialRecord>> {
        self.find(
            LogicalDb::Social,
            PROJECT_SOCIAL,
            doc! { "_id": { "$in": id_membership(project_ids) } },
            doc! { "_id": 1, "twitter.id": 1 },
            limit,
        )
        .await
    }

    pub async fn twitter_users_by_handles(
        &self,
        handles: &[String],
        limit: usize,
    ) -> Result<Vec<TwitterUserRecord>> {
        self.find(
            LogicalDb::Social,
            TWITTER_USERS,
            doc! { "userName": { "$in": handles } },
            doc! {
                "_id": 1,
                "userName": 1,
                "followersCount": 1,
                "favouritesCount": 1,
                "friendsCount": 1,
                "statusesCount": 1,
                "verified": 1,
            },
            limit,
        )
        .await
    }

    pub async fn tweets_by_authors(
        &self,
        handles: &[String],
        limit: usize,
    ) -> Result<Vec<TweetRecord>> {
        self.find(
            LogicalDb::Social,
            TWEETS,
            doc! { "authorName": { "$in": handles } },
            doc! {
                "_id": 1,
                "authorName": 1,
                "timestamp": 1,
                "likes": 1,
                "retweetCounts": 1,
                "replyCounts": 1,
                "hashTags": 1,
            },
            limit,
        )
        .await
    }

    pub async fn liquidations_for_wallets(
        &self,
        wallets: &[String],
        limit: usize,
    ) -> Result<Vec<LiquidationRecord>> {
        self.find(
            LogicalDb::Graph,
            LIQUIDATIONS,
            doc! {
                "$or": [
                    { "liquidatedWallet": { "$in": wallets } },
                    { "debtBuyerWallet": { "$in": wallets } },
                ]
            },
            doc! {
                "_id": 1,
                "liquidatedWallet": 1,
                "debtBuyerWallet": 1,
                "liquidationLogs": 1,
            },
            limit,
        )
        .await
    }

    // ── Batch listing queries ─────────────────────────────────────

    pub async fn list_wallet_addresses(&self, offset: u64, limit: usize) -> Result<Vec<String>> {
        let rows: Vec<WalletAddressRow> = self
            .list(LogicalDb::Graph, WALLETS, doc! { "_id": 0, "address": 1 }, offset, limit)
            .await?;
        Ok(rows.into_iter().map(|r| r.address).collect())
    }

    pub async fn list_lending_event_wallets(&self, offset: u64, limit: usize) -> Result<Vec<String>> {
        let rows: Vec<EventWalletRow> = self
            .list(LogicalDb::Etl, LENDING_EVENTS, doc! { "_id": 0, "wallet": 1 }, offset, limit)
            .await?;
        Ok(rows.into_iter().map(|r| r.wallet).collect())
    }

    pub async fn list_liquidation_debt_buyers(
        &self,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<String>> {
        let rows: Vec<DebtBuyerRow> = self
            .list(
                LogicalDb::Graph,
                LIQUIDATIONS,
                doc! { "_id": 0, "debtBuyerWallet": 1 },
                offset,
                limit,
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.debt_buyer_wallet).collect())
    }

    /// Unfiltered page over one collection in natural order. Unlike the
    /// aggregation queries this errors when the store is unavailable.
    async fn list<T>(
        &self,
        db: LogicalDb,
        collection: &str,
        projection: Document,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let Some(inner) = &self.inner else {
            return Err(SourceError::Unavailable {
                store: StoreKind::Document,
            });
        };

        let cursor = inner
            .client
            .database(inner.db_name(db))
            .collection::<T>(collection)
            .find(Document::new())
            .projection(projection)
            .skip(offset)
            .limit(limit as i64)
            .await
            .map_err(|e| SourceError::Query {
                store: StoreKind::Document,
                message: format!("{collection}: {e}"),
            })?;

        let rows: Vec<T> = cursor
            .filter_map(|item| async move {
                match item {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!(collection, error = %e, "Skipping undecodable listing row");
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(rows)
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn wallet_projection() -> Document {
    doc! {
        "_id": 0,
        "address": 1,
        "chainId": 1,
        "balanceInUSD": 1,
        "balanceChangeLogs": 1,
        "depositInUSD": 1,
        "depositChangeLogs": 1,
        "borrowInUSD": 1,
        "borrowChangeLogs": 1,
        "dailyAllTransactions": 1,
        "dailyNumberOfTransactions": 1,
        "dailyTransactionAmounts": 1,
        "numberOfLiquidation": 1,
        "totalValueOfLiquidation": 1,
    }
}

/// Ids normalize to strings at the record boundary, but collections may
/// key them as ObjectIds. Membership filters carry both forms.
fn id_membership(ids: &[String]) -> Vec<Bson> {
    let mut forms = Vec::with_capacity(ids.len());
    for id in ids {
        if let Ok(oid) = bson::oid::ObjectId::parse_str(id) {
            forms.push(Bson::ObjectId(oid));
        }
        forms.push(Bson::String(id.clone()));
    }
    forms
}
