//! Integration tests against a live Neo4j instance.
//!
//! Every test namespaces its data with a unique marker prefix and
//! cleans up after itself, so a shared dev database stays usable.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use walletlens_core::types::{
    ChainScope, Contract, LendingEvent, LendingEventKind, Liquidation, Project, TokenTransfer,
    Tweet, TwitterUser, Wallet,
};
use walletlens_graph::{GraphClient, GraphConfig, WriteOutcome};

async fn connect_or_skip() -> Option<GraphClient> {
    match GraphClient::connect(&GraphConfig::default()).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("skipping: Neo4j not reachable: {e}");
            None
        }
    }
}

fn marker() -> String {
    format!("t{}", Uuid::new_v4().simple())
}

async fn cleanup(client: &GraphClient, marker: &str) {
    let q = neo4rs::query(
        "MATCH (n) WHERE n.id STARTS WITH $marker OR n.tag STARTS WITH $marker DETACH DELETE n",
    )
    .param("marker", marker.to_string());
    let _ = client.run(q).await;
}

async fn count_nodes_with_prefix(client: &GraphClient, label: &str, prefix: &str) -> i64 {
    let cypher = format!("MATCH (n:{label}) WHERE n.id STARTS WITH $prefix RETURN count(n) AS cnt");
    let row = client
        .query_one(neo4rs::query(&cypher).param("prefix", prefix.to_string()))
        .await
        .unwrap();
    row.map(|r| r.get::<i64>("cnt").unwrap_or(0)).unwrap_or(0)
}

async fn count_rels_with_prefix(client: &GraphClient, rel_type: &str, prefix: &str) -> i64 {
    let cypher = format!(
        "MATCH (a)-[r:{rel_type}]->() WHERE a.id STARTS WITH $prefix RETURN count(r) AS cnt"
    );
    let row = client
        .query_one(neo4rs::query(&cypher).param("prefix", prefix.to_string()))
        .await
        .unwrap();
    row.map(|r| r.get::<i64>("cnt").unwrap_or(0)).unwrap_or(0)
}

fn make_wallet(address: &str) -> Wallet {
    Wallet {
        address: address.to_string(),
        chain_id: "0x1".to_string(),
        balance_usd: 1250.5,
        balance_change_logs: json!({"2024-01-01": 1250.5}),
        deposit_usd: 500.0,
        deposit_change_logs: json!({}),
        borrow_usd: 120.0,
        borrow_change_logs: json!({}),
        daily_all_transactions: json!({}),
        daily_transaction_counts: json!({}),
        daily_transaction_amounts: json!({}),
        liquidation_count: 0,
        liquidation_value_usd: 0.0,
    }
}

fn make_contract(address: &str, tags: &[&str]) -> Contract {
    Contract {
        address: address.to_string(),
        chain_id: "0x1".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        daily_call_days: 5,
        daily_active_user_days: 3,
        symbol: Some("UNI".to_string()),
        decimals: Some(18),
        price_usd: Some(6.2),
        market_cap_usd: None,
        trading_volume_usd: None,
        price_change_logs: None,
    }
}

// ── Node upserts ──────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires live Neo4j: run with cargo test -p walletlens-graph --test integration -- --ignored"]
async fn wallet_upsert_roundtrip() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));

    let outcome = client
        .upsert_wallet(&make_wallet("0xabc"), &chain, Utc::now())
        .await
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Created);

    let record = client
        .find_node("Wallet", &chain.scoped_id("0xabc"))
        .await
        .unwrap()
        .expect("wallet node should exist");
    assert_eq!(record.properties["address"], "0xabc");
    assert_eq!(record.properties["balance_usd"], 1250.5);
    assert!(record.properties["balance_change_logs"].is_string());

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn wallet_upsert_is_idempotent() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));
    let wallet = make_wallet("0xabc");

    let first = Utc::now();
    let second = first + Duration::seconds(1);

    assert_eq!(
        client.upsert_wallet(&wallet, &chain, first).await.unwrap(),
        WriteOutcome::Created
    );
    assert_eq!(
        client.upsert_wallet(&wallet, &chain, second).await.unwrap(),
        WriteOutcome::Updated
    );
    assert_eq!(count_nodes_with_prefix(&client, "Wallet", &m).await, 1);

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn reupsert_replaces_properties() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));

    let mut wallet = make_wallet("0xabc");
    client.upsert_wallet(&wallet, &chain, Utc::now()).await.unwrap();

    wallet.balance_usd = 9000.0;
    client.upsert_wallet(&wallet, &chain, Utc::now()).await.unwrap();

    let record = client
        .find_node("Wallet", &chain.scoped_id("0xabc"))
        .await
        .unwrap()
        .expect("wallet node should exist");
    assert_eq!(record.properties["balance_usd"], 9000.0);

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn same_address_on_two_chains_yields_two_nodes() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let mainnet = ChainScope::new(format!("{m}x1"));
    let bsc = ChainScope::new(format!("{m}x38"));
    let wallet = make_wallet("0xabc");

    client.upsert_wallet(&wallet, &mainnet, Utc::now()).await.unwrap();
    client.upsert_wallet(&wallet, &bsc, Utc::now()).await.unwrap();

    assert_eq!(count_nodes_with_prefix(&client, "Wallet", &m).await, 2);

    cleanup(&client, &m).await;
}

// ── Relationship upserts ──────────────────────────────────────────

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn lending_edge_skipped_until_endpoints_exist() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));

    client
        .upsert_wallet(&make_wallet("0xabc"), &chain, Utc::now())
        .await
        .unwrap();

    let event = LendingEvent {
        id: format!("{m}-evt1"),
        wallet: "0xabc".to_string(),
        contract_address: "0xpool".to_string(),
        amount: 42.0,
        timestamp: 1_700_000_000,
        kind: LendingEventKind::Deposit,
    };

    // Contract endpoint missing: skipped, nothing written.
    let outcome = client.upsert_lending_edge(&event, &chain, Utc::now()).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Skipped);
    assert_eq!(count_rels_with_prefix(&client, "DEPOSITED", &m).await, 0);

    client
        .upsert_contract(&make_contract("0xpool", &["lending"]), &chain, Utc::now())
        .await
        .unwrap();

    let outcome = client.upsert_lending_edge(&event, &chain, Utc::now()).await.unwrap();
    assert_eq!(outcome, WriteOutcome::Created);
    assert_eq!(count_rels_with_prefix(&client, "DEPOSITED", &m).await, 1);

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn transfer_edges_collapse_on_value_tuple() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));

    client.upsert_wallet(&make_wallet("0xaaa"), &chain, Utc::now()).await.unwrap();
    client.upsert_wallet(&make_wallet("0xbbb"), &chain, Utc::now()).await.unwrap();

    let transfer = TokenTransfer {
        from_address: "0xaaa".to_string(),
        to_address: "0xbbb".to_string(),
        value: 10.5,
        block_number: 19_000_000,
    };

    assert_eq!(
        client.upsert_transfer_edge(&transfer, &chain, Utc::now()).await.unwrap(),
        WriteOutcome::Created
    );
    assert_eq!(
        client.upsert_transfer_edge(&transfer, &chain, Utc::now()).await.unwrap(),
        WriteOutcome::Updated
    );

    let later = TokenTransfer { block_number: 19_000_001, ..transfer };
    assert_eq!(
        client.upsert_transfer_edge(&later, &chain, Utc::now()).await.unwrap(),
        WriteOutcome::Created
    );

    assert_eq!(count_rels_with_prefix(&client, "TRANSFERRED_TO", &m).await, 2);

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn liquidation_edge_links_wallet_to_debt_buyer() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));

    client.upsert_wallet(&make_wallet("0xaaa"), &chain, Utc::now()).await.unwrap();
    client.upsert_wallet(&make_wallet("0xbbb"), &chain, Utc::now()).await.unwrap();

    let liquidation = Liquidation {
        id: format!("{m}-liq1"),
        liquidated_wallet: "0xaaa".to_string(),
        debt_buyer_wallet: "0xbbb".to_string(),
        liquidation_logs: json!([{"amount": 12.0}]),
    };

    assert_eq!(
        client.upsert_liquidation_edge(&liquidation, &chain, Utc::now()).await.unwrap(),
        WriteOutcome::Created
    );
    assert_eq!(count_rels_with_prefix(&client, "LIQUIDATED_BY", &m).await, 1);

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn social_edges_roundtrip() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let now = Utc::now();

    let project = Project {
        id: format!("{m}-proj"),
        name: "Uniswap".to_string(),
        category: Some("dex".to_string()),
        tvl_usd: Some(4_000_000_000.0),
        deployed_chains: vec!["0x1".to_string()],
        contract_addresses: Default::default(),
        token_addresses: Default::default(),
        twitter_id: Some(format!("{m}-tw")),
    };
    let user = TwitterUser {
        id: format!("{m}-tw"),
        handle: format!("{m}-handle"),
        followers: 100,
        favourites: 5,
        friends: 10,
        statuses: 200,
        verified: true,
    };
    let tweet = Tweet {
        id: format!("{m}-tweet"),
        author_handle: user.handle.clone(),
        timestamp: 1_700_000_000,
        likes: 3,
        retweets: 1,
        replies: 0,
        hashtags: vec![format!("{m}-defi")],
    };

    client.upsert_project(&project, now).await.unwrap();
    client.upsert_twitter_user(&user, now).await.unwrap();
    client.upsert_tweet(&tweet, now).await.unwrap();
    client.upsert_hashtag(&tweet.hashtags[0], now).await.unwrap();

    assert_eq!(
        client.upsert_has_account_edge(&project.id, &user.handle, now).await.unwrap(),
        WriteOutcome::Created
    );
    assert_eq!(
        client.upsert_tweeted_edge(&user.id, &tweet, now).await.unwrap(),
        WriteOutcome::Created
    );
    assert_eq!(
        client.upsert_mentions_edge(&tweet.id, &tweet.hashtags[0], now).await.unwrap(),
        WriteOutcome::Created
    );

    // Unknown hashtag endpoint: skipped.
    assert_eq!(
        client.upsert_mentions_edge(&tweet.id, &format!("{m}-missing"), now).await.unwrap(),
        WriteOutcome::Skipped
    );

    cleanup(&client, &m).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn graph_summary_includes_written_labels() {
    let Some(client) = connect_or_skip().await else { return };
    let m = marker();
    let chain = ChainScope::new(format!("{m}x1"));

    client.upsert_wallet(&make_wallet("0xabc"), &chain, Utc::now()).await.unwrap();

    let summary = client.graph_summary().await.unwrap();
    assert!(summary.nodes.get("Wallet").copied().unwrap_or(0) >= 1);

    cleanup(&client, &m).await;
}
