//! CLI entry point for the walletlens pipeline.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use walletlens_core::events::{EventPayload, EventSink, EventSource, PipelineEvent};
use walletlens_core::types::ChainScope;
use walletlens_graph::{GraphClient, GraphConfig};
use walletlens_sources::{ColumnStore, DocumentStore, RelationalStore, SourcesConfig, StoreStatus};

use walletlens_pipeline::aggregator::WalletAggregator;
use walletlens_pipeline::batch::{BatchOrchestrator, BatchRequest, BatchSource};
use walletlens_pipeline::config::PipelineConfig;
use walletlens_pipeline::materializer::GraphMaterializer;

#[derive(Parser)]
#[command(name = "walletlens")]
#[command(about = "Wallet graph materialization pipeline")]
struct Cli {
    /// Config file prefix (default: walletlens).
    #[arg(short, long, default_value = "walletlens")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report connectivity for every store.
    Health,

    /// Print node and relationship counts from the graph.
    Stats,

    /// Aggregate a dataset and print it without writing to the graph.
    Fetch {
        /// Wallet address; omit to aggregate a whole chain slice.
        #[arg(short, long)]
        wallet: Option<String>,

        /// Chain scope, e.g. 0x1 for mainnet.
        #[arg(long, default_value = "0x1")]
        chain: String,

        /// Per-collection record limit.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Aggregate one wallet (or chain slice) and materialize it.
    Build {
        /// Wallet address; omit to build a whole chain slice.
        #[arg(short, long)]
        wallet: Option<String>,

        /// Chain scope, e.g. 0x1 for mainnet.
        #[arg(long, default_value = "0x1")]
        chain: String,

        /// Per-collection record limit.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Materialize a page of wallets listed from a source collection.
    Batch {
        /// Listing source: wallets, lending_events, liquidations.
        #[arg(short, long, default_value = "wallets")]
        source: String,

        /// Chain scope, e.g. 0x1 for mainnet.
        #[arg(long, default_value = "0x1")]
        chain: String,

        /// Page size of the address listing.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,

        /// Offset into the address listing.
        #[arg(short, long, default_value_t = 0)]
        offset: u64,
    },
}

#[derive(Serialize)]
struct HealthReport {
    document: StoreStatus,
    column: StoreStatus,
    relational: StoreStatus,
    graph: StoreStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sources_config = load_sources_config(&cli.config)?;
    let pipeline_config = load_pipeline_config(&cli.config)?;
    let events = EventSink::default();

    match cli.command {
        Command::Health => {
            let documents = DocumentStore::connect(&sources_config.document).await;
            let columns = ColumnStore::connect(&sources_config.column).await;
            let relational = RelationalStore::connect(&sources_config.relational).await;

            let mut relational_status = relational.status();
            if relational_status.available {
                if let Err(e) = relational.ping().await {
                    relational_status = StoreStatus {
                        available: false,
                        reason: Some(e.to_string()),
                    };
                }
            }

            let graph_status = match GraphClient::connect(&load_graph_config(&cli.config)).await {
                Ok(_) => StoreStatus {
                    available: true,
                    reason: None,
                },
                Err(e) => StoreStatus {
                    available: false,
                    reason: Some(e.to_string()),
                },
            };

            let report = HealthReport {
                document: documents.status(),
                column: columns.status(),
                relational: relational_status,
                graph: graph_status,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Stats => {
            let graph = GraphClient::connect(&load_graph_config(&cli.config)).await?;
            let summary = graph.graph_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Fetch { wallet, chain, limit } => {
            let documents = DocumentStore::connect(&sources_config.document).await;
            let columns = ColumnStore::connect(&sources_config.column).await;
            emit_unavailable(&events, "document", &documents.status());
            emit_unavailable(&events, "column", &columns.status());

            let aggregator = WalletAggregator::new(documents, columns, events.clone());
            let dataset = aggregator
                .fetch(wallet.as_deref(), &ChainScope::new(chain), limit)
                .await;
            println!("{}", serde_json::to_string_pretty(&dataset)?);
        }

        Command::Build { wallet, chain, limit } => {
            let documents = DocumentStore::connect(&sources_config.document).await;
            let columns = ColumnStore::connect(&sources_config.column).await;
            emit_unavailable(&events, "document", &documents.status());
            emit_unavailable(&events, "column", &columns.status());

            let graph = GraphClient::connect(&load_graph_config(&cli.config)).await?;
            let chain = ChainScope::new(chain);

            let aggregator = WalletAggregator::new(documents, columns, events.clone());
            let materializer =
                GraphMaterializer::new(graph, pipeline_config.write_concurrency, events.clone());

            let dataset = aggregator.fetch(wallet.as_deref(), &chain, limit).await;
            let stats = materializer.materialize(&dataset, &chain).await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Batch { source, chain, limit, offset } => {
            let source = parse_source(&source)?;
            let documents = DocumentStore::connect(&sources_config.document).await;
            let columns = ColumnStore::connect(&sources_config.column).await;
            emit_unavailable(&events, "document", &documents.status());
            emit_unavailable(&events, "column", &columns.status());

            let graph = GraphClient::connect(&load_graph_config(&cli.config)).await?;

            let aggregator =
                WalletAggregator::new(documents.clone(), columns, events.clone());
            let materializer =
                GraphMaterializer::new(graph, pipeline_config.write_concurrency, events.clone());
            let orchestrator = BatchOrchestrator::new(
                documents,
                aggregator,
                materializer,
                pipeline_config,
                events.clone(),
            );

            let request = BatchRequest {
                source,
                chain: ChainScope::new(chain),
                limit,
                offset,
            };
            let report = orchestrator.run(&request).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn emit_unavailable(events: &EventSink, store: &str, status: &StoreStatus) {
    if !status.available {
        events.emit(PipelineEvent::new(
            EventSource::Stores,
            EventPayload::StoreUnavailable {
                store: store.to_string(),
                reason: status.reason.clone().unwrap_or_default(),
            },
        ));
    }
}

fn parse_source(s: &str) -> anyhow::Result<BatchSource> {
    match s.to_lowercase().as_str() {
        "wallets" => Ok(BatchSource::Wallets),
        "lending_events" => Ok(BatchSource::LendingEvents),
        "liquidations" => Ok(BatchSource::Liquidations),
        _ => anyhow::bail!("Invalid source: {s}. Choose: wallets, lending_events, liquidations"),
    }
}

fn load_sources_config(file_prefix: &str) -> anyhow::Result<SourcesConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("WALLETLENS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<SourcesConfig>("sources") {
        Ok(c) => Ok(c),
        Err(_) => Ok(SourcesConfig::default()),
    }
}

fn load_pipeline_config(file_prefix: &str) -> anyhow::Result<PipelineConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("WALLETLENS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<PipelineConfig>("pipeline") {
        Ok(c) => Ok(c),
        Err(_) => Ok(PipelineConfig::default()),
    }
}

fn load_graph_config(file_prefix: &str) -> GraphConfig {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("WALLETLENS")
                .separator("__")
                .try_parsing(true),
        )
        .build();

    match cfg {
        Ok(c) => GraphConfig {
            uri: c
                .get_string("graph.uri")
                .unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
            user: c
                .get_string("graph.user")
                .unwrap_or_else(|_| "neo4j".to_string()),
            password: c
                .get_string("graph.password")
                .unwrap_or_else(|_| "walletlens-dev".to_string()),
            ..Default::default()
        },
        Err(_) => GraphConfig::default(),
    }
}
