//! Pipeline tuning knobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-collection record cap when aggregating a single wallet.
    #[serde(default = "default_per_wallet_limit")]
    pub per_wallet_limit: usize,

    /// Wallets processed concurrently within one batch run.
    #[serde(default = "default_wallet_concurrency")]
    pub wallet_concurrency: usize,

    /// Concurrent graph writes within one materialization phase.
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,
}

fn default_per_wallet_limit() -> usize {
    100
}

fn default_wallet_concurrency() -> usize {
    4
}

fn default_write_concurrency() -> usize {
    8
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            per_wallet_limit: default_per_wallet_limit(),
            wallet_concurrency: default_wallet_concurrency(),
            write_concurrency: default_write_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.per_wallet_limit, 100);
        assert_eq!(config.wallet_concurrency, 4);
        assert_eq!(config.write_concurrency, 8);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"wallet_concurrency": 16}"#).unwrap();
        assert_eq!(config.wallet_concurrency, 16);
        assert_eq!(config.per_wallet_limit, 100);
        assert_eq!(config.write_concurrency, 8);
    }
}
