//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Blockchain RPC settings.
    pub blockchain: BlockchainConfig,

    /// Chain watcher (event source) settings.
    pub watcher: WatcherConfig,

    /// Defaults applied to resources that leave `watch`/`interval_ms` unset.
    pub defaults: BindDefaults,

    /// Resources kept in sync.
    pub resources: Vec<ResourceConfig>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Enable blockchain integration.
    pub enabled: bool,

    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Number of block confirmations required for finality.
    pub confirmation_blocks: u32,

    /// Gas price multiplier (1.0 = estimated, 1.2 = 20% buffer).
    pub gas_price_multiplier: f64,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            confirmation_blocks: 3,
            gas_price_multiplier: 1.2,
            max_gas_price_gwei: 500,
        }
    }
}

/// Chain watcher configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Block number polling interval in milliseconds.
    pub block_poll_ms: u64,

    /// Chain ID polling interval in milliseconds.
    pub chain_poll_ms: u64,

    /// Base delay for exponential backoff after RPC failures.
    pub backoff_base_ms: u64,

    /// Maximum backoff delay.
    pub backoff_max_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            block_poll_ms: 4000,
            chain_poll_ms: 30_000,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Defaults for resource bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BindDefaults {
    /// Keep resources fresh after the initial read.
    pub watch: bool,

    /// Polling interval in milliseconds.
    pub interval_ms: u64,
}

impl Default for BindDefaults {
    fn default() -> Self {
        Self {
            watch: false,
            interval_ms: 5000,
        }
    }
}

/// Which read a resource performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    BlockNumber,
    Balance,
    ChainId,
    Account,
    Transaction,
    TransactionStatus,
    BlockTimestamp,
    GasPrice,
    ContractRead,
    ContractReads,
    Allowance,
    Logs,
}

impl ResourceKind {
    /// Polling interval used when neither the resource nor `[defaults]`
    /// override it. Block-paced reads default to a typical block time.
    pub fn default_interval_ms(self) -> Option<u64> {
        match self {
            ResourceKind::BlockNumber | ResourceKind::BlockTimestamp => Some(12_000),
            _ => None,
        }
    }
}

/// A single `eth_call` in a batch read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CallConfig {
    /// Contract address.
    pub address: String,

    /// ABI-encoded calldata (hex, with selector).
    pub calldata: String,
}

/// One synchronized resource.
///
/// Which optional fields are required depends on `kind`; missing ones are
/// reported as missing parameters when the resource is bound.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Unique name for logs and snapshots.
    pub name: String,

    /// What to read.
    pub kind: ResourceKind,

    /// Override of `[defaults].watch`.
    #[serde(default)]
    pub watch: Option<bool>,

    /// Override of `[defaults].interval_ms`.
    #[serde(default)]
    pub interval_ms: Option<u64>,

    /// Account or contract address. Account-scoped kinds fall back to the
    /// session account when unset.
    #[serde(default)]
    pub address: Option<String>,

    /// Token owner (allowance). Falls back to the session account.
    #[serde(default)]
    pub owner: Option<String>,

    /// Approved spender (allowance).
    #[serde(default)]
    pub spender: Option<String>,

    /// Transaction hash.
    #[serde(default)]
    pub hash: Option<String>,

    /// Block number; unset means latest.
    #[serde(default)]
    pub block: Option<u64>,

    /// ABI-encoded calldata for a contract read.
    #[serde(default)]
    pub calldata: Option<String>,

    /// Calls for a batch contract read.
    #[serde(default)]
    pub calls: Vec<CallConfig>,

    /// Event signature hash (topic0) for log reads.
    #[serde(default)]
    pub event_signature: Option<String>,

    /// First block for log reads.
    #[serde(default)]
    pub from_block: Option<u64>,

    /// Confirmations override for transaction status.
    #[serde(default)]
    pub confirmations: Option<u32>,
}

impl ResourceConfig {
    /// A resource with only name and kind set.
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            watch: None,
            interval_ms: None,
            address: None,
            owner: None,
            spender: None,
            hash: None,
            block: None,
            calldata: None,
            calls: Vec::new(),
            event_signature: None,
            from_block: None,
            confirmations: None,
        }
    }

    /// Effective watch flag.
    pub fn watch_or(&self, defaults: &BindDefaults) -> bool {
        self.watch.unwrap_or(defaults.watch)
    }

    /// Effective polling interval in milliseconds.
    pub fn interval_or(&self, defaults: &BindDefaults) -> u64 {
        self.interval_ms
            .or_else(|| self.kind.default_interval_ms())
            .unwrap_or(defaults.interval_ms)
    }
}
