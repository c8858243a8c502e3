//! Write operations: idempotent node and relationship upserts.
//!
//! Every write is a `MERGE` keyed on the entity identity key, so
//! re-materializing the same dataset refreshes properties in place
//! instead of duplicating state. Each statement returns a `created`
//! flag derived from `first_seen`, letting callers count creates and
//! updates separately.
//!
//! Relationship upserts `MATCH` both endpoints before the `MERGE`; a
//! missing endpoint produces no row and the write reports `Skipped`
//! rather than conjuring a placeholder node.

use chrono::{DateTime, Utc};
use neo4rs::query;

use walletlens_core::types::{
    ChainScope, Contract, LendingEvent, LendingEventKind, Liquidation, Project, TokenTransfer,
    Tweet, TwitterUser, Wallet,
};

use crate::client::{GraphClient, GraphError, WriteOutcome};

// ── Node upserts ──────────────────────────────────────────────────

impl GraphClient {
    /// Upsert a Wallet node keyed by `{chain}_{address}`.
    pub async fn upsert_wallet(
        &self,
        wallet: &Wallet,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MERGE (n:Wallet {id: $id})
             ON CREATE SET n.first_seen = $now
             SET n.address = $address,
                 n.chain_id = $chain_id,
                 n.balance_usd = $balance_usd,
                 n.balance_change_logs = $balance_change_logs,
                 n.deposit_usd = $deposit_usd,
                 n.deposit_change_logs = $deposit_change_logs,
                 n.borrow_usd = $borrow_usd,
                 n.borrow_change_logs = $borrow_change_logs,
                 n.daily_all_transactions = $daily_all_transactions,
                 n.daily_transaction_counts = $daily_transaction_counts,
                 n.daily_transaction_amounts = $daily_transaction_amounts,
                 n.liquidation_count = $liquidation_count,
                 n.liquidation_value_usd = $liquidation_value_usd,
                 n.last_seen = $now
             RETURN n.first_seen = $now AS created",
        )
        .param("id", chain.scoped_id(&wallet.address))
        .param("address", wallet.address.clone())
        .param("chain_id", wallet.chain_id.clone())
        .param("balance_usd", wallet.balance_usd)
        .param("balance_change_logs", ser(&wallet.balance_change_logs))
        .param("deposit_usd", wallet.deposit_usd)
        .param("deposit_change_logs", ser(&wallet.deposit_change_logs))
        .param("borrow_usd", wallet.borrow_usd)
        .param("borrow_change_logs", ser(&wallet.borrow_change_logs))
        .param("daily_all_transactions", ser(&wallet.daily_all_transactions))
        .param("daily_transaction_counts", ser(&wallet.daily_transaction_counts))
        .param("daily_transaction_amounts", ser(&wallet.daily_transaction_amounts))
        .param("liquidation_count", wallet.liquidation_count)
        .param("liquidation_value_usd", wallet.liquidation_value_usd)
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a Contract node keyed by `{chain}_{address}`.
    pub async fn upsert_contract(
        &self,
        contract: &Contract,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        self.upsert_contract_like("Contract", contract, chain, now).await
    }

    /// Upsert a Token node for a token-tagged contract. Shares the
    /// Contract property set plus the token facet; the same address
    /// yields both a Contract and a Token node under distinct labels.
    pub async fn upsert_token(
        &self,
        contract: &Contract,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        self.upsert_contract_like("Token", contract, chain, now).await
    }

    async fn upsert_contract_like(
        &self,
        label: &str,
        contract: &Contract,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let cypher = format!(
            "MERGE (n:{label} {{id: $id}})
             ON CREATE SET n.first_seen = $now
             SET n.address = $address,
                 n.chain_id = $chain_id,
                 n.tags = $tags,
                 n.daily_call_days = $daily_call_days,
                 n.daily_active_user_days = $daily_active_user_days,
                 n.symbol = $symbol,
                 n.decimals = $decimals,
                 n.price_usd = $price_usd,
                 n.market_cap_usd = $market_cap_usd,
                 n.trading_volume_usd = $trading_volume_usd,
                 n.price_change_logs = $price_change_logs,
                 n.last_seen = $now
             RETURN n.first_seen = $now AS created"
        );

        let q = query(&cypher)
            .param("id", chain.scoped_id(&contract.address))
            .param("address", contract.address.clone())
            .param("chain_id", contract.chain_id.clone())
            .param("tags", contract.tags.clone())
            .param("daily_call_days", contract.daily_call_days)
            .param("daily_active_user_days", contract.daily_active_user_days)
            .param("symbol", opt_string(&contract.symbol))
            .param("decimals", contract.decimals.unwrap_or(0))
            .param("price_usd", contract.price_usd.unwrap_or(0.0))
            .param("market_cap_usd", contract.market_cap_usd.unwrap_or(0.0))
            .param("trading_volume_usd", contract.trading_volume_usd.unwrap_or(0.0))
            .param("price_change_logs", ser_opt(&contract.price_change_logs))
            .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a Project node keyed by its store-assigned id.
    pub async fn upsert_project(
        &self,
        project: &Project,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MERGE (n:Project {id: $id})
             ON CREATE SET n.first_seen = $now
             SET n.name = $name,
                 n.category = $category,
                 n.tvl_usd = $tvl_usd,
                 n.deployed_chains = $deployed_chains,
                 n.contract_addresses = $contract_addresses,
                 n.token_addresses = $token_addresses,
                 n.twitter_id = $twitter_id,
                 n.last_seen = $now
             RETURN n.first_seen = $now AS created",
        )
        .param("id", project.id.clone())
        .param("name", project.name.clone())
        .param("category", opt_string(&project.category))
        .param("tvl_usd", project.tvl_usd.unwrap_or(0.0))
        .param("deployed_chains", project.deployed_chains.clone())
        .param("contract_addresses", ser(&project.contract_addresses))
        .param("token_addresses", ser(&project.token_addresses))
        .param("twitter_id", opt_string(&project.twitter_id))
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a TwitterUser node keyed by its account id.
    pub async fn upsert_twitter_user(
        &self,
        user: &TwitterUser,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MERGE (n:TwitterUser {id: $id})
             ON CREATE SET n.first_seen = $now
             SET n.handle = $handle,
                 n.followers = $followers,
                 n.favourites = $favourites,
                 n.friends = $friends,
                 n.statuses = $statuses,
                 n.verified = $verified,
                 n.last_seen = $now
             RETURN n.first_seen = $now AS created",
        )
        .param("id", user.id.clone())
        .param("handle", user.handle.clone())
        .param("followers", user.followers)
        .param("favourites", user.favourites)
        .param("friends", user.friends)
        .param("statuses", user.statuses)
        .param("verified", user.verified)
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a Tweet node keyed by its tweet id.
    pub async fn upsert_tweet(
        &self,
        tweet: &Tweet,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MERGE (n:Tweet {id: $id})
             ON CREATE SET n.first_seen = $now
             SET n.author_handle = $author_handle,
                 n.timestamp = $timestamp,
                 n.likes = $likes,
                 n.retweets = $retweets,
                 n.replies = $replies,
                 n.hashtags = $hashtags,
                 n.last_seen = $now
             RETURN n.first_seen = $now AS created",
        )
        .param("id", tweet.id.clone())
        .param("author_handle", tweet.author_handle.clone())
        .param("timestamp", tweet.timestamp)
        .param("likes", tweet.likes)
        .param("retweets", tweet.retweets)
        .param("replies", tweet.replies)
        .param("hashtags", tweet.hashtags.clone())
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a Hashtag node keyed by the tag text itself.
    pub async fn upsert_hashtag(
        &self,
        tag: &str,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MERGE (n:Hashtag {tag: $tag})
             ON CREATE SET n.first_seen = $now
             SET n.last_seen = $now
             RETURN n.first_seen = $now AS created",
        )
        .param("tag", tag.to_string())
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }
}

// ── Relationship upserts ──────────────────────────────────────────

impl GraphClient {
    /// Upsert a lending edge from a wallet to a contract. The edge
    /// label derives from the event kind and the key is the durable
    /// event id, so replayed events collapse into one edge.
    pub async fn upsert_lending_edge(
        &self,
        event: &LendingEvent,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let label = lending_edge_label(event.kind);
        let cypher = format!(
            "MATCH (w:Wallet {{id: $wallet_id}})
             MATCH (c:Contract {{id: $contract_id}})
             MERGE (w)-[r:{label} {{id: $event_id}}]->(c)
             ON CREATE SET r.first_seen = $now
             SET r.amount = $amount,
                 r.timestamp = $timestamp,
                 r.last_seen = $now
             RETURN r.first_seen = $now AS created"
        );

        let q = query(&cypher)
            .param("wallet_id", chain.scoped_id(&event.wallet))
            .param("contract_id", chain.scoped_id(&event.contract_address))
            .param("event_id", event.id.clone())
            .param("amount", event.amount)
            .param("timestamp", event.timestamp)
            .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a TRANSFERRED_TO edge between two wallets. Transfers
    /// carry no durable id, so the merge key is the full value tuple.
    pub async fn upsert_transfer_edge(
        &self,
        transfer: &TokenTransfer,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MATCH (a:Wallet {id: $from_id})
             MATCH (b:Wallet {id: $to_id})
             MERGE (a)-[r:TRANSFERRED_TO {value: $value, block_number: $block_number}]->(b)
             ON CREATE SET r.first_seen = $now
             SET r.last_seen = $now
             RETURN r.first_seen = $now AS created",
        )
        .param("from_id", chain.scoped_id(&transfer.from_address))
        .param("to_id", chain.scoped_id(&transfer.to_address))
        .param("value", transfer.value)
        .param("block_number", transfer.block_number)
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a LIQUIDATED_BY edge from the liquidated wallet to the
    /// debt buyer, keyed by the liquidation record id.
    pub async fn upsert_liquidation_edge(
        &self,
        liquidation: &Liquidation,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MATCH (a:Wallet {id: $liquidated_id})
             MATCH (b:Wallet {id: $buyer_id})
             MERGE (a)-[r:LIQUIDATED_BY {id: $liquidation_id}]->(b)
             ON CREATE SET r.first_seen = $now
             SET r.liquidation_logs = $liquidation_logs,
                 r.last_seen = $now
             RETURN r.first_seen = $now AS created",
        )
        .param("liquidated_id", chain.scoped_id(&liquidation.liquidated_wallet))
        .param("buyer_id", chain.scoped_id(&liquidation.debt_buyer_wallet))
        .param("liquidation_id", liquidation.id.clone())
        .param("liquidation_logs", ser(&liquidation.liquidation_logs))
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a PART_OF edge from a Contract or Token node to the
    /// project that deployed it. `member_id` is the scoped address key
    /// of the member node.
    pub async fn upsert_part_of_edge(
        &self,
        member_label: &str,
        member_id: &str,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let cypher = format!(
            "MATCH (m:{member_label} {{id: $member_id}})
             MATCH (p:Project {{id: $project_id}})
             MERGE (m)-[r:PART_OF]->(p)
             ON CREATE SET r.first_seen = $now
             SET r.last_seen = $now
             RETURN r.first_seen = $now AS created"
        );

        let q = query(&cypher)
            .param("member_id", member_id.to_string())
            .param("project_id", project_id.to_string())
            .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a HAS_ACCOUNT edge from a project to its twitter user,
    /// matched by handle rather than account id because the social
    /// store links the two through the handle.
    pub async fn upsert_has_account_edge(
        &self,
        project_id: &str,
        handle: &str,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MATCH (p:Project {id: $project_id})
             MATCH (u:TwitterUser {handle: $handle})
             MERGE (p)-[r:HAS_ACCOUNT]->(u)
             ON CREATE SET r.first_seen = $now
             SET r.last_seen = $now
             RETURN r.first_seen = $now AS created",
        )
        .param("project_id", project_id.to_string())
        .param("handle", handle.to_string())
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a TWEETED edge from an author to a tweet, carrying the
    /// engagement counters as edge properties.
    pub async fn upsert_tweeted_edge(
        &self,
        author_id: &str,
        tweet: &Tweet,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MATCH (u:TwitterUser {id: $author_id})
             MATCH (t:Tweet {id: $tweet_id})
             MERGE (u)-[r:TWEETED]->(t)
             ON CREATE SET r.first_seen = $now
             SET r.timestamp = $timestamp,
                 r.likes = $likes,
                 r.retweets = $retweets,
                 r.replies = $replies,
                 r.last_seen = $now
             RETURN r.first_seen = $now AS created",
        )
        .param("author_id", author_id.to_string())
        .param("tweet_id", tweet.id.clone())
        .param("timestamp", tweet.timestamp)
        .param("likes", tweet.likes)
        .param("retweets", tweet.retweets)
        .param("replies", tweet.replies)
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }

    /// Upsert a MENTIONS edge from a tweet to one of its hashtags.
    pub async fn upsert_mentions_edge(
        &self,
        tweet_id: &str,
        tag: &str,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, GraphError> {
        let q = query(
            "MATCH (t:Tweet {id: $tweet_id})
             MATCH (h:Hashtag {tag: $tag})
             MERGE (t)-[r:MENTIONS]->(h)
             ON CREATE SET r.first_seen = $now
             SET r.last_seen = $now
             RETURN r.first_seen = $now AS created",
        )
        .param("tweet_id", tweet_id.to_string())
        .param("tag", tag.to_string())
        .param("now", now.to_rfc3339());

        self.run_upsert(q).await
    }
}

// ── Helpers ───────────────────────────────────────────────────────

/// Relationship label for a lending event kind.
pub fn lending_edge_label(kind: LendingEventKind) -> &'static str {
    match kind {
        LendingEventKind::Deposit => "DEPOSITED",
        LendingEventKind::Borrow => "BORROWED",
        LendingEventKind::Repay => "REPAID",
        LendingEventKind::Withdraw => "WITHDREW",
    }
}

fn opt_string(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn ser<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn ser_opt<T: serde::Serialize>(value: &Option<T>) -> String {
    value.as_ref().map(ser).unwrap_or_default()
}
