//! Batch orchestration.
//!
//! Pages wallet addresses out of a source collection and runs fetch
//! plus materialize for each, a bounded number of wallets at a time.
//! Individual wallet failures degrade the run to partial success; the
//! only hard failure is not being able to list addresses at all, and
//! even that is reported in-band as an error-status report.

use std::collections::HashSet;
use std::time::Instant;

use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use walletlens_core::events::{EventPayload, EventSink, EventSource, PipelineEvent};
use walletlens_core::types::ChainScope;
use walletlens_sources::DocumentStore;

use crate::aggregator::WalletAggregator;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::materializer::GraphMaterializer;

/// Upper bound on the page size of one batch run.
pub const MAX_BATCH_LIMIT: usize = 10_000_000;

/// Which collection the batch pages wallet addresses from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    Wallets,
    LendingEvents,
    Liquidations,
}

impl BatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchSource::Wallets => "wallets",
            BatchSource::LendingEvents => "lending_events",
            BatchSource::Liquidations => "liquidations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Success => "success",
            BatchStatus::PartialSuccess => "partial_success",
            BatchStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub source: BatchSource,
    pub chain: ChainScope,
    pub limit: usize,
    pub offset: u64,
}

/// Outcome of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub source: BatchSource,
    pub chain: String,
    pub total_processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

pub struct BatchOrchestrator {
    documents: DocumentStore,
    aggregator: WalletAggregator,
    materializer: GraphMaterializer,
    config: PipelineConfig,
    events: EventSink,
}

impl BatchOrchestrator {
    pub fn new(
        documents: DocumentStore,
        aggregator: WalletAggregator,
        materializer: GraphMaterializer,
        config: PipelineConfig,
        events: EventSink,
    ) -> Self {
        Self {
            documents,
            aggregator,
            materializer,
            config,
            events,
        }
    }

    /// Run one batch. Returns `Err` only for an invalid request; every
    /// runtime failure is folded into the report status.
    pub async fn run(&self, request: &BatchRequest) -> Result<BatchReport> {
        validate(request)?;

        let started = Instant::now();
        let batch_id = Uuid::new_v4();

        info!(
            batch_id = %batch_id,
            source = request.source.as_str(),
            chain = %request.chain,
            limit = request.limit,
            offset = request.offset,
            "Batch run started"
        );

        let addresses = match self.list_addresses(request).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(batch_id = %batch_id, error = %e, "Batch listing failed");
                return Ok(self.finish(BatchReport {
                    batch_id,
                    status: BatchStatus::Error,
                    source: request.source,
                    chain: request.chain.to_string(),
                    total_processed: 0,
                    succeeded: 0,
                    failed: 0,
                    errors: vec![e.to_string()],
                    duration_ms: started.elapsed().as_millis() as u64,
                }));
            }
        };

        let unique = dedup_addresses(addresses);
        let total = unique.len() as u32;

        let results: Vec<(String, std::result::Result<(), String>)> = stream::iter(unique)
            .map(|address| async move {
                let result = self.process_wallet(&address, &request.chain).await;
                (address, result)
            })
            .buffer_unordered(self.config.wallet_concurrency.max(1))
            .collect()
            .await;

        let mut errors = Vec::new();
        for (address, result) in results {
            if let Err(message) = result {
                self.events.emit(PipelineEvent::new(
                    EventSource::Batch,
                    EventPayload::WalletFailed {
                        address: address.clone(),
                        error: message.clone(),
                    },
                ));
                errors.push(format!("{address}: {message}"));
            }
        }

        let failed = errors.len() as u32;
        let succeeded = total - failed;
        let status = if failed == 0 {
            BatchStatus::Success
        } else {
            BatchStatus::PartialSuccess
        };

        Ok(self.finish(BatchReport {
            batch_id,
            status,
            source: request.source,
            chain: request.chain.to_string(),
            total_processed: total,
            succeeded,
            failed,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
        }))
    }

    async fn list_addresses(&self, request: &BatchRequest) -> Result<Vec<String>> {
        let addresses = match request.source {
            BatchSource::Wallets => {
                self.documents.list_wallet_addresses(request.offset, request.limit).await?
            }
            BatchSource::LendingEvents => {
                self.documents.list_lending_event_wallets(request.offset, request.limit).await?
            }
            BatchSource::Liquidations => {
                self.documents.list_liquidation_debt_buyers(request.offset, request.limit).await?
            }
        };
        Ok(addresses)
    }

    /// Fetch and materialize one wallet. The wallet fails only when at
    /// least one graph write failed.
    async fn process_wallet(
        &self,
        address: &str,
        chain: &ChainScope,
    ) -> std::result::Result<(), String> {
        let dataset = self
            .aggregator
            .fetch(Some(address), chain, self.config.per_wallet_limit)
            .await;

        if dataset.is_empty() {
            debug!(address, "Nothing aggregated; nothing to write");
            return Ok(());
        }

        let stats = self.materializer.materialize(&dataset, chain).await;
        let failed = stats.failed();
        if failed == 0 {
            Ok(())
        } else {
            Err(format!("{failed} graph writes failed"))
        }
    }

    /// Log the outcome, emit the completion event, and hand the report back.
    fn finish(&self, report: BatchReport) -> BatchReport {
        info!(
            batch_id = %report.batch_id,
            status = report.status.as_str(),
            total_processed = report.total_processed,
            succeeded = report.succeeded,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Batch run finished"
        );

        self.events.emit(PipelineEvent::new(
            EventSource::Batch,
            EventPayload::BatchCompleted {
                batch_id: report.batch_id,
                source: report.source.as_str().to_string(),
                status: report.status.as_str().to_string(),
                total_processed: report.total_processed,
                succeeded: report.succeeded,
                failed: report.failed,
                duration_ms: report.duration_ms,
            },
        ));

        report
    }
}

fn validate(request: &BatchRequest) -> Result<()> {
    if request.limit == 0 || request.limit > MAX_BATCH_LIMIT {
        return Err(PipelineError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_BATCH_LIMIT}, got {}",
            request.limit
        )));
    }
    Ok(())
}

/// Case-insensitive dedup keeping the first-seen spelling, in listing
/// order.
fn dedup_addresses(addresses: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for address in addresses {
        if seen.insert(address.to_lowercase()) {
            unique.push(address);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(limit: usize) -> BatchRequest {
        BatchRequest {
            source: BatchSource::Wallets,
            chain: ChainScope::default(),
            limit,
            offset: 0,
        }
    }

    #[test]
    fn dedup_is_case_insensitive_and_keeps_first_spelling() {
        let addresses = vec!["0xAA".to_string(), "0xaa".to_string(), "0xBB".to_string()];
        assert_eq!(dedup_addresses(addresses), vec!["0xAA", "0xBB"]);
    }

    #[test]
    fn dedup_preserves_listing_order() {
        let addresses = vec![
            "0xC".to_string(),
            "0xA".to_string(),
            "0xc".to_string(),
            "0xB".to_string(),
        ];
        assert_eq!(dedup_addresses(addresses), vec!["0xC", "0xA", "0xB"]);
    }

    #[test]
    fn limit_bounds_are_enforced() {
        assert!(matches!(
            validate(&request(0)),
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(matches!(
            validate(&request(MAX_BATCH_LIMIT + 1)),
            Err(PipelineError::InvalidRequest(_))
        ));
        assert!(validate(&request(1)).is_ok());
        assert!(validate(&request(MAX_BATCH_LIMIT)).is_ok());
    }

    #[test]
    fn source_and_status_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&BatchSource::LendingEvents).unwrap(),
            "\"lending_events\""
        );
        assert_eq!(
            serde_json::to_string(&BatchStatus::PartialSuccess).unwrap(),
            "\"partial_success\""
        );
        assert_eq!(BatchStatus::PartialSuccess.as_str(), "partial_success");
        assert_eq!(BatchSource::Liquidations.as_str(), "liquidations");
    }
}
