//! Pipeline observability events.
//!
//! Each component receives an [`EventSink`] at construction and emits
//! structured completion events through it instead of ad hoc prints.
//! The default sink renders events as tracing records; a broker-backed
//! sink can replace it once the pipeline gains downstream consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// An event emitted by a pipeline component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub payload: EventPayload,
}

impl PipelineEvent {
    pub fn new(source: EventSource, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            source,
            payload,
        }
    }
}

/// Which component emitted the event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Stores,
    Aggregator,
    Materializer,
    Batch,
}

/// The event payload, tagged by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// A source store failed to connect and stays unavailable for the
    /// process lifetime.
    StoreUnavailable { store: String, reason: String },

    /// One wallet (or chain-scope) aggregation finished.
    FetchCompleted {
        wallet: Option<String>,
        chain: String,
        records: u32,
        duration_ms: u64,
    },

    /// One aggregated dataset was written into the graph store.
    MaterializeCompleted {
        chain: String,
        nodes_created: u64,
        nodes_updated: u64,
        relationships_created: u64,
        relationships_updated: u64,
        skipped: u64,
        failed: u64,
        duration_ms: u64,
    },

    /// A wallet inside a batch recorded write failures.
    WalletFailed { address: String, error: String },

    /// A batch run finished.
    BatchCompleted {
        batch_id: Uuid,
        source: String,
        status: String,
        total_processed: u32,
        succeeded: u32,
        failed: u32,
        duration_ms: u64,
    },
}

// ── Event Sink ────────────────────────────────────────────────────

/// Destination for pipeline events, injected into each component at
/// construction.
#[derive(Debug, Clone, Default)]
pub struct EventSink;

impl EventSink {
    /// Render the event as a structured tracing record on the
    /// `walletlens::events` target.
    pub fn emit(&self, event: PipelineEvent) {
        match serde_json::to_string(&event.payload) {
            Ok(payload) => tracing::info!(
                target: "walletlens::events",
                event_id = %event.id.0,
                source = ?event.source,
                payload = %payload,
                "Pipeline event"
            ),
            Err(e) => tracing::warn!(
                target: "walletlens::events",
                error = %e,
                "Failed to serialize pipeline event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = PipelineEvent::new(
            EventSource::Aggregator,
            EventPayload::FetchCompleted {
                wallet: Some("0xabc".to_string()),
                chain: "0x1".to_string(),
                records: 42,
                duration_ms: 311,
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, deserialized.id);
    }

    #[test]
    fn event_payload_tags() {
        let payload = EventPayload::BatchCompleted {
            batch_id: Uuid::new_v4(),
            source: "wallets".to_string(),
            status: "partial_success".to_string(),
            total_processed: 10,
            succeeded: 8,
            failed: 2,
            duration_ms: 1500,
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"event_type\":\"BatchCompleted\""));
        assert!(json.contains("\"status\":\"partial_success\""));
    }

    #[test]
    fn event_source_serializes_snake_case() {
        let json = serde_json::to_string(&EventSource::Materializer).unwrap();
        assert_eq!(json, "\"materializer\"");
    }
}
