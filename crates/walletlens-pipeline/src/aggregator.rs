//! Wallet graph aggregation.
//!
//! Assembles the nine-collection dataset for one wallet or a whole
//! chain slice. Collection steps run in dependency order: each step
//! queries only with the output of the step it depends on, and an
//! empty prior step skips every dependent step without touching the
//! store. A failing step logs and returns the dataset as collected so
//! far; aggregation itself never fails.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use walletlens_core::events::{EventPayload, EventSink, EventSource, PipelineEvent};
use walletlens_core::types::{
    ChainScope, LendingEvent, Project, ProjectSocial, Tweet, TwitterUser, WalletDataset,
};
use walletlens_sources::records::LendingEventRecord;
use walletlens_sources::{ColumnStore, DocumentStore};

use crate::error::Result;

pub struct WalletAggregator {
    documents: DocumentStore,
    columns: ColumnStore,
    events: EventSink,
}

impl WalletAggregator {
    pub fn new(documents: DocumentStore, columns: ColumnStore, events: EventSink) -> Self {
        Self {
            documents,
            columns,
            events,
        }
    }

    /// Aggregate the dataset for one wallet, or for a chain slice when
    /// no address is given. Always returns a dataset: a step failure
    /// leaves the dependent collections empty.
    pub async fn fetch(
        &self,
        wallet_address: Option<&str>,
        chain: &ChainScope,
        limit: usize,
    ) -> WalletDataset {
        let started = Instant::now();
        let mut dataset = WalletDataset::default();

        if let Err(e) = self.fill(&mut dataset, wallet_address, chain, limit).await {
            warn!(
                wallet = wallet_address.unwrap_or("<chain slice>"),
                chain = %chain,
                error = %e,
                "Aggregation stopped early; returning partial dataset"
            );
        }

        self.events.emit(PipelineEvent::new(
            EventSource::Aggregator,
            EventPayload::FetchCompleted {
                wallet: wallet_address.map(str::to_string),
                chain: chain.to_string(),
                records: dataset.record_count() as u32,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        ));

        dataset
    }

    async fn fill(
        &self,
        out: &mut WalletDataset,
        wallet_address: Option<&str>,
        chain: &ChainScope,
        limit: usize,
    ) -> Result<()> {
        // Wallet universe first; everything else hangs off it.
        let raw_wallets = match wallet_address {
            Some(address) => self.documents.wallets_by_address(address, limit).await?,
            None => self.documents.wallets_by_chain(chain.as_str(), limit).await?,
        };
        out.wallets = raw_wallets.into_iter().map(|r| r.into_wallet(chain)).collect();

        if out.wallets.is_empty() {
            info!(
                wallet = wallet_address.unwrap_or("<chain slice>"),
                chain = %chain,
                "No wallets found; skipping dependent collections"
            );
            return Ok(());
        }

        let addresses: Vec<String> = out.wallets.iter().map(|w| w.address.clone()).collect();

        // Lending events, dropping records with unknown kinds.
        let raw_events = self.documents.lending_events_for_wallets(&addresses, limit).await?;
        let total = raw_events.len();
        out.lending_events = raw_events
            .into_iter()
            .filter_map(LendingEventRecord::into_event)
            .collect();
        if out.lending_events.len() < total {
            warn!(
                dropped = total - out.lending_events.len(),
                "Dropped lending events with unknown kinds"
            );
        }

        // Contract universe comes from the event log, and the project
        // and social chain hangs off the contracts.
        if !out.lending_events.is_empty() {
            let contract_addresses = unique_contract_addresses(&out.lending_events);
            out.contracts = self
                .documents
                .contracts_by_addresses(&contract_addresses, limit)
                .await?
                .into_iter()
                .map(|r| r.into_contract(chain))
                .collect();
        }

        if !out.contracts.is_empty() {
            let keys: Vec<String> = out
                .contracts
                .iter()
                .map(|c| chain.scoped_id(&c.address))
                .collect();
            out.projects = self
                .documents
                .projects_with_contract_keys(&keys, limit)
                .await?
                .into_iter()
                .map(Project::from)
                .collect();
        }

        if !out.projects.is_empty() {
            let project_ids: Vec<String> = out.projects.iter().map(|p| p.id.clone()).collect();
            out.project_social = self
                .documents
                .social_for_projects(&project_ids, limit)
                .await?
                .into_iter()
                .map(ProjectSocial::from)
                .collect();
        }

        let handles = social_handles(&out.project_social);
        if !handles.is_empty() {
            out.twitter_users = self
                .documents
                .twitter_users_by_handles(&handles, limit)
                .await?
                .into_iter()
                .map(TwitterUser::from)
                .collect();
        }

        // Tweets are authored by the users that actually resolved, not
        // by every handle the social links mention.
        if !out.twitter_users.is_empty() {
            let authors: Vec<String> =
                out.twitter_users.iter().map(|u| u.handle.clone()).collect();
            out.tweets = self
                .documents
                .tweets_by_authors(&authors, limit)
                .await?
                .into_iter()
                .map(Tweet::from)
                .collect();
        }

        // Liquidations and transfers depend only on the wallet set.
        out.liquidations = self
            .documents
            .liquidations_for_wallets(&addresses, limit)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        if self.columns.is_available() {
            out.token_transfers = self.columns.transfers_touching(&addresses, limit).await?;
        } else {
            debug!("Column store unavailable; token transfers stay empty");
        }

        Ok(())
    }
}

/// Distinct contract addresses referenced by the event log.
fn unique_contract_addresses(events: &[LendingEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.contract_address.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Twitter handles present on the project social links.
fn social_handles(social: &[ProjectSocial]) -> Vec<String> {
    social
        .iter()
        .filter_map(|s| s.twitter_handle.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletlens_core::types::LendingEventKind;

    fn event(id: &str, contract: &str) -> LendingEvent {
        LendingEvent {
            id: id.to_string(),
            wallet: "0xw".to_string(),
            contract_address: contract.to_string(),
            amount: 1.0,
            timestamp: 0,
            kind: LendingEventKind::Deposit,
        }
    }

    #[test]
    fn contract_addresses_deduplicate() {
        let events = vec![event("1", "0xpool"), event("2", "0xpool"), event("3", "0xvault")];
        assert_eq!(unique_contract_addresses(&events), vec!["0xpool", "0xvault"]);
    }

    #[test]
    fn handles_skip_projects_without_twitter() {
        let social = vec![
            ProjectSocial {
                project_id: "aave".to_string(),
                twitter_handle: Some("AaveAave".to_string()),
            },
            ProjectSocial {
                project_id: "ghost".to_string(),
                twitter_handle: None,
            },
        ];
        assert_eq!(social_handles(&social), vec!["AaveAave"]);
    }
}
