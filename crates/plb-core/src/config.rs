//! Configuration parsing for the PLB system.
//!
//! The runner reads its settings from a single JSON config file. The top-level
//! structure contains logging metadata and a `subscriptions` array where each
//! entry describes one price-level book instance and its replay source.
//!
//! # Example config
//!
//! ```json
//! {
//!   "plb": { "module_name": "plb-runner", "log_path": "/tmp/log" },
//!   "subscriptions": [{
//!     "symbol": "AAPL",
//!     "source": "ntv",
//!     "levels": 10,
//!     "replay": { "path": "data/aapl.jsonl", "batch_pause_ms": 0 }
//!   }]
//! }
//! ```

use serde::Deserialize;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(rename = "plb")]
    pub meta: Option<ModuleMeta>,

    /// Array of subscription configs — one per book instance.
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"plb-runner"`.
    pub fn module_name(&self) -> String {
        self.meta
            .as_ref()
            .and_then(|m| m.module_name.clone())
            .unwrap_or_else(|| "plb-runner".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.meta.as_ref().and_then(|m| m.log_path.clone())
    }
}

/// A single book subscription configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// Instrument symbol (e.g. `"AAPL"`).
    pub symbol: String,

    /// Market-data source identifier (e.g. `"ntv"`). Empty means "any".
    pub source: Option<String>,

    /// Number of visible price levels per side. `0` means unbounded.
    pub levels: Option<usize>,

    /// Replay source feeding this subscription.
    pub replay: ReplayConfig,
}

impl SubscriptionConfig {
    /// Returns the effective source identifier.
    pub fn effective_source(&self) -> String {
        self.source.clone().unwrap_or_default()
    }

    /// Returns the effective per-side level count (`0` = unbounded).
    pub fn effective_levels(&self) -> usize {
        self.levels.unwrap_or(0)
    }
}

/// Replay source configuration — a JSONL file of order batches.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayConfig {
    /// Path to the JSONL replay file.
    pub path: String,

    /// Pause between delivered batches in milliseconds (default: 0).
    pub batch_pause_ms: Option<u64>,
}

impl ReplayConfig {
    /// Returns the effective inter-batch pause.
    pub fn effective_batch_pause_ms(&self) -> u64 {
        self.batch_pause_ms.unwrap_or(0)
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "plb": { "module_name": "books", "log_path": "/tmp/log" },
            "subscriptions": [
                {
                    "symbol": "AAPL",
                    "source": "ntv",
                    "levels": 10,
                    "replay": { "path": "aapl.jsonl", "batch_pause_ms": 5 }
                },
                {
                    "symbol": "MSFT",
                    "replay": { "path": "msft.jsonl" }
                }
            ]
        }"#;

        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.module_name(), "books");
        assert_eq!(config.log_path().as_deref(), Some("/tmp/log"));
        assert_eq!(config.subscriptions.len(), 2);

        let first = &config.subscriptions[0];
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(first.effective_source(), "ntv");
        assert_eq!(first.effective_levels(), 10);
        assert_eq!(first.replay.effective_batch_pause_ms(), 5);

        let second = &config.subscriptions[1];
        assert_eq!(second.effective_source(), "");
        assert_eq!(second.effective_levels(), 0);
        assert_eq!(second.replay.effective_batch_pause_ms(), 0);
    }
}
