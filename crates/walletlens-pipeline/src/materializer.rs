//! Graph materialization.
//!
//! Projects an aggregated dataset into Neo4j in two phases: every node
//! upsert completes before the first relationship upsert starts, so an
//! edge can never race the nodes it references. Within a phase, writes
//! for all types fan out concurrently through one semaphore-bounded
//! pool. A failed write is counted and logged, never fatal; a skipped
//! relationship means an endpoint was absent from the graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use walletlens_core::events::{EventPayload, EventSink, EventSource, PipelineEvent};
use walletlens_core::types::{ChainScope, LendingEventKind, Project, Tweet, WalletDataset};
use walletlens_graph::{lending_edge_label, GraphClient, GraphError, WriteOutcome};

// ── Write accounting ──────────────────────────────────────────────

/// Created/updated/skipped/failed tallies for one node label or
/// relationship type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteCounts {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl WriteCounts {
    fn absorb(&mut self, result: &Result<WriteOutcome, GraphError>) {
        match result {
            Ok(WriteOutcome::Created) => self.created += 1,
            Ok(WriteOutcome::Updated) => self.updated += 1,
            Ok(WriteOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: WriteCounts) {
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Per-type write tallies for one materialization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializationStats {
    pub nodes: BTreeMap<String, WriteCounts>,
    pub relationships: BTreeMap<String, WriteCounts>,
    pub duration_ms: u64,
}

impl MaterializationStats {
    pub fn nodes_created(&self) -> u64 {
        self.nodes.values().map(|c| c.created).sum()
    }

    pub fn nodes_updated(&self) -> u64 {
        self.nodes.values().map(|c| c.updated).sum()
    }

    pub fn relationships_created(&self) -> u64 {
        self.relationships.values().map(|c| c.created).sum()
    }

    pub fn relationships_updated(&self) -> u64 {
        self.relationships.values().map(|c| c.updated).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.nodes.values().chain(self.relationships.values()).map(|c| c.skipped).sum()
    }

    pub fn failed(&self) -> u64 {
        self.nodes.values().chain(self.relationships.values()).map(|c| c.failed).sum()
    }
}

// ── Materializer ──────────────────────────────────────────────────

pub struct GraphMaterializer {
    graph: GraphClient,
    write_slots: Arc<Semaphore>,
    events: EventSink,
}

impl GraphMaterializer {
    pub fn new(graph: GraphClient, write_concurrency: usize, events: EventSink) -> Self {
        Self {
            graph,
            write_slots: Arc::new(Semaphore::new(write_concurrency.max(1))),
            events,
        }
    }

    /// Write the dataset into the graph and report per-type tallies.
    pub async fn materialize(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
    ) -> MaterializationStats {
        let started = Instant::now();
        let now = Utc::now();
        let mut stats = MaterializationStats::default();

        // Phase one: nodes. The join is the barrier between phases.
        let (wallets, contracts, tokens, projects, users, tweets, hashtags) = tokio::join!(
            self.upsert_wallets(dataset, chain, now),
            self.upsert_contracts(dataset, chain, now),
            self.upsert_tokens(dataset, chain, now),
            self.upsert_projects(dataset, now),
            self.upsert_twitter_users(dataset, now),
            self.upsert_tweets(dataset, now),
            self.upsert_hashtags(dataset, now),
        );
        stats.nodes.insert("Wallet".to_string(), wallets);
        stats.nodes.insert("Contract".to_string(), contracts);
        stats.nodes.insert("Token".to_string(), tokens);
        stats.nodes.insert("Project".to_string(), projects);
        stats.nodes.insert("TwitterUser".to_string(), users);
        stats.nodes.insert("Tweet".to_string(), tweets);
        stats.nodes.insert("Hashtag".to_string(), hashtags);

        // Phase two: relationships, now that every endpoint that can
        // exist does.
        let (lending, transfers, liquidations, part_of, has_account, tweeted, mentions) = tokio::join!(
            self.upsert_lending_edges(dataset, chain, now),
            self.upsert_transfer_edges(dataset, chain, now),
            self.upsert_liquidation_edges(dataset, chain, now),
            self.upsert_part_of_edges(dataset, chain, now),
            self.upsert_has_account_edges(dataset, now),
            self.upsert_tweeted_edges(dataset, now),
            self.upsert_mentions_edges(dataset, now),
        );
        stats.relationships.extend(lending);
        stats.relationships.insert("TRANSFERRED_TO".to_string(), transfers);
        stats.relationships.insert("LIQUIDATED_BY".to_string(), liquidations);
        stats.relationships.insert("PART_OF".to_string(), part_of);
        stats.relationships.insert("HAS_ACCOUNT".to_string(), has_account);
        stats.relationships.insert("TWEETED".to_string(), tweeted);
        stats.relationships.insert("MENTIONS".to_string(), mentions);

        stats.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            chain = %chain,
            nodes_created = stats.nodes_created(),
            nodes_updated = stats.nodes_updated(),
            relationships_created = stats.relationships_created(),
            relationships_updated = stats.relationships_updated(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            duration_ms = stats.duration_ms,
            "Materialization complete"
        );

        self.events.emit(PipelineEvent::new(
            EventSource::Materializer,
            EventPayload::MaterializeCompleted {
                chain: chain.to_string(),
                nodes_created: stats.nodes_created(),
                nodes_updated: stats.nodes_updated(),
                relationships_created: stats.relationships_created(),
                relationships_updated: stats.relationships_updated(),
                skipped: stats.skipped(),
                failed: stats.failed(),
                duration_ms: stats.duration_ms,
            },
        ));

        stats
    }

    /// Run a set of writes through the shared write pool, tallying the
    /// outcomes. Failures are logged here and absorbed.
    async fn drain<F>(&self, writes: Vec<F>, label: &str) -> WriteCounts
    where
        F: Future<Output = Result<WriteOutcome, GraphError>>,
    {
        let gated = writes.into_iter().map(|write| async {
            let _permit = self.write_slots.acquire().await.expect("write pool closed");
            write.await
        });

        let mut counts = WriteCounts::default();
        for result in future::join_all(gated).await {
            if let Err(e) = &result {
                warn!(label, error = %e, "Graph write failed");
            }
            counts.absorb(&result);
        }
        counts
    }

    // ── Phase one ─────────────────────────────────────────────────

    async fn upsert_wallets(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .wallets
            .iter()
            .map(|w| self.graph.upsert_wallet(w, chain, now))
            .collect();
        self.drain(writes, "Wallet").await
    }

    async fn upsert_contracts(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .contracts
            .iter()
            .map(|c| self.graph.upsert_contract(c, chain, now))
            .collect();
        self.drain(writes, "Contract").await
    }

    async fn upsert_tokens(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .contracts
            .iter()
            .filter(|c| c.is_token())
            .map(|c| self.graph.upsert_token(c, chain, now))
            .collect();
        self.drain(writes, "Token").await
    }

    async fn upsert_projects(&self, dataset: &WalletDataset, now: DateTime<Utc>) -> WriteCounts {
        let writes: Vec<_> = dataset
            .projects
            .iter()
            .map(|p| self.graph.upsert_project(p, now))
            .collect();
        self.drain(writes, "Project").await
    }

    async fn upsert_twitter_users(
        &self,
        dataset: &WalletDataset,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .twitter_users
            .iter()
            .map(|u| self.graph.upsert_twitter_user(u, now))
            .collect();
        self.drain(writes, "TwitterUser").await
    }

    async fn upsert_tweets(&self, dataset: &WalletDataset, now: DateTime<Utc>) -> WriteCounts {
        let writes: Vec<_> = dataset
            .tweets
            .iter()
            .map(|t| self.graph.upsert_tweet(t, now))
            .collect();
        self.drain(writes, "Tweet").await
    }

    async fn upsert_hashtags(&self, dataset: &WalletDataset, now: DateTime<Utc>) -> WriteCounts {
        let writes: Vec<_> = unique_hashtags(&dataset.tweets)
            .into_iter()
            .map(|tag| self.graph.upsert_hashtag(tag, now))
            .collect();
        self.drain(writes, "Hashtag").await
    }

    // ── Phase two ─────────────────────────────────────────────────

    async fn upsert_lending_edges(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> BTreeMap<String, WriteCounts> {
        let mut out = BTreeMap::new();
        for kind in [
            LendingEventKind::Deposit,
            LendingEventKind::Borrow,
            LendingEventKind::Repay,
            LendingEventKind::Withdraw,
        ] {
            let label = lending_edge_label(kind);
            let writes: Vec<_> = dataset
                .lending_events
                .iter()
                .filter(|e| e.kind == kind)
                .map(|e| self.graph.upsert_lending_edge(e, chain, now))
                .collect();
            out.insert(label.to_string(), self.drain(writes, label).await);
        }
        out
    }

    async fn upsert_transfer_edges(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .token_transfers
            .iter()
            .map(|t| self.graph.upsert_transfer_edge(t, chain, now))
            .collect();
        self.drain(writes, "TRANSFERRED_TO").await
    }

    async fn upsert_liquidation_edges(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .liquidations
            .iter()
            .map(|l| self.graph.upsert_liquidation_edge(l, chain, now))
            .collect();
        self.drain(writes, "LIQUIDATED_BY").await
    }

    async fn upsert_part_of_edges(
        &self,
        dataset: &WalletDataset,
        chain: &ChainScope,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let contract_set: HashSet<&str> =
            dataset.contracts.iter().map(|c| c.address.as_str()).collect();

        let mut writes = Vec::new();
        for project in &dataset.projects {
            for (label, member_id) in part_of_candidates(project, chain, &contract_set) {
                writes.push(self.graph.upsert_part_of_edge(label, member_id, &project.id, now));
            }
        }
        self.drain(writes, "PART_OF").await
    }

    async fn upsert_has_account_edges(
        &self,
        dataset: &WalletDataset,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let writes: Vec<_> = dataset
            .project_social
            .iter()
            .filter_map(|s| {
                s.twitter_handle
                    .as_deref()
                    .map(|handle| self.graph.upsert_has_account_edge(&s.project_id, handle, now))
            })
            .collect();
        self.drain(writes, "HAS_ACCOUNT").await
    }

    async fn upsert_tweeted_edges(
        &self,
        dataset: &WalletDataset,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let authors: HashMap<&str, &str> = dataset
            .twitter_users
            .iter()
            .map(|u| (u.handle.as_str(), u.id.as_str()))
            .collect();

        let mut counts = WriteCounts::default();
        let mut writes = Vec::new();
        for tweet in &dataset.tweets {
            match authors.get(tweet.author_handle.as_str()) {
                Some(author_id) => writes.push(self.graph.upsert_tweeted_edge(author_id, tweet, now)),
                // Author never resolved; no id to match against.
                None => counts.skipped += 1,
            }
        }
        counts.merge(self.drain(writes, "TWEETED").await);
        counts
    }

    async fn upsert_mentions_edges(
        &self,
        dataset: &WalletDataset,
        now: DateTime<Utc>,
    ) -> WriteCounts {
        let mut writes = Vec::new();
        for tweet in &dataset.tweets {
            for tag in &tweet.hashtags {
                writes.push(self.graph.upsert_mentions_edge(&tweet.id, tag, now));
            }
        }
        self.drain(writes, "MENTIONS").await
    }
}

// ── Plan helpers ──────────────────────────────────────────────────

/// Distinct hashtags across all tweets, each upserted once per run.
fn unique_hashtags(tweets: &[Tweet]) -> BTreeSet<&str> {
    tweets
        .iter()
        .flat_map(|t| t.hashtags.iter().map(String::as_str))
        .collect()
}

/// PART_OF edge candidates for one project. Contract members must be
/// on the active chain and present in the dataset's contract set;
/// token members only need the chain to match, and a token that never
/// materialized is skipped at the endpoint match.
fn part_of_candidates<'a>(
    project: &'a Project,
    chain: &ChainScope,
    contracts: &HashSet<&str>,
) -> Vec<(&'static str, &'a str)> {
    let mut members = Vec::new();

    for key in project.contract_addresses.keys() {
        if let Some((key_chain, address)) = key.split_once('_') {
            if key_chain == chain.as_str() && contracts.contains(address) {
                members.push(("Contract", key.as_str()));
            }
        }
    }

    for key in project.token_addresses.keys() {
        if let Some((key_chain, _)) = key.split_once('_') {
            if key_chain == chain.as_str() {
                members.push(("Token", key.as_str()));
            }
        }
    }

    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tweet(id: &str, hashtags: &[&str]) -> Tweet {
        Tweet {
            id: id.to_string(),
            author_handle: "a".to_string(),
            timestamp: 0,
            likes: 0,
            retweets: 0,
            replies: 0,
            hashtags: hashtags.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[test]
    fn hashtags_deduplicate_across_tweets() {
        let tweets = vec![tweet("1", &["defi", "eth"]), tweet("2", &["eth", "dao"])];
        let tags: Vec<&str> = unique_hashtags(&tweets).into_iter().collect();
        assert_eq!(tags, vec!["dao", "defi", "eth"]);
    }

    #[test]
    fn part_of_members_respect_chain_and_contract_set() {
        let project = Project {
            id: "uniswap".to_string(),
            name: "Uniswap".to_string(),
            category: None,
            tvl_usd: None,
            deployed_chains: vec!["0x1".to_string(), "0x38".to_string()],
            contract_addresses: [
                ("0x1_0xrouter".to_string(), json!(true)),
                ("0x1_0xfactory".to_string(), json!(true)),
                ("0x38_0xrouter".to_string(), json!(true)),
            ]
            .into_iter()
            .collect(),
            token_addresses: [
                ("0x1_0xuni".to_string(), json!(true)),
                ("0x38_0xuni".to_string(), json!(true)),
            ]
            .into_iter()
            .collect(),
            twitter_id: None,
        };

        let chain = ChainScope::new("0x1");
        let contracts: HashSet<&str> = ["0xrouter"].into_iter().collect();

        let members = part_of_candidates(&project, &chain, &contracts);

        // 0xfactory is filtered out (not in the dataset); the 0x38
        // entries are filtered out (wrong chain); the token passes on
        // the chain check alone.
        assert_eq!(members, vec![("Contract", "0x1_0xrouter"), ("Token", "0x1_0xuni")]);
    }

    #[test]
    fn write_counts_absorb_every_outcome() {
        let mut counts = WriteCounts::default();
        counts.absorb(&Ok(WriteOutcome::Created));
        counts.absorb(&Ok(WriteOutcome::Created));
        counts.absorb(&Ok(WriteOutcome::Updated));
        counts.absorb(&Ok(WriteOutcome::Skipped));
        counts.absorb(&Err(GraphError::Connection("boom".to_string())));

        assert_eq!(counts.created, 2);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.failed, 1);

        let mut total = WriteCounts::default();
        total.merge(counts);
        total.merge(counts);
        assert_eq!(total.created, 4);
        assert_eq!(total.failed, 2);
    }
}
