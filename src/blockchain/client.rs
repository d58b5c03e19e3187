//! Blockchain RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Connect to the configured JSON-RPC endpoints
//! - Query chain state for the read resources
//! - Handle timeouts and network errors gracefully
//! - Build a signing provider for write actions

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{
    BlockNumberOrTag, Filter, Log, Transaction, TransactionReceipt, TransactionRequest,
};
use alloy::transports::TransportResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainConfig, BlockchainError, BlockchainResult, ChainId};
use crate::blockchain::wallet::Wallet;
use crate::observability::metrics;

type DynProvider = Arc<dyn Provider + Send + Sync>;

fn http_provider(url: url::Url) -> DynProvider {
    Arc::new(ProviderBuilder::new().connect_http(url))
}

/// Read side of the chain. Every call is bounded by the configured timeout
/// and falls through to the failover endpoints in order.
#[derive(Clone)]
pub struct BlockchainClient {
    /// Primary first.
    providers: Vec<DynProvider>,
    config: BlockchainConfig,
    timeout_duration: Duration,
}

impl BlockchainClient {
    /// Connect to the primary and failover endpoints.
    ///
    /// An unreachable endpoint is not an error here; reads fail later and
    /// land in the state of whatever binding issued them.
    pub async fn new(config: BlockchainConfig) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(http_provider(primary_url));

        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => providers.push(http_provider(url)),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Blockchain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Blockchain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Run `call` against each provider in order until one succeeds.
    async fn first_ok<T, F, Fut>(&self, op: &'static str, call: F) -> BlockchainResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = TransportResult<T>>,
    {
        let mut all_timed_out = true;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(Arc::clone(provider))).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    all_timed_out = false;
                    tracing::warn!(
                        provider_idx = i,
                        op,
                        error = %e,
                        "RPC error, trying next provider"
                    );
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                }
            }
        }
        if all_timed_out {
            return Err(BlockchainError::Timeout(self.timeout_duration.as_secs()));
        }
        Err(BlockchainError::Rpc(format!("All RPC providers failed: {op}")))
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> BlockchainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        self.first_ok("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId)
    }

    /// Get the latest block number.
    pub async fn get_block_number(&self) -> BlockchainResult<u64> {
        self.first_ok("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    /// Get the balance of an address.
    pub async fn get_balance(&self, address: Address) -> BlockchainResult<U256> {
        self.first_ok("eth_getBalance", |p| async move { p.get_balance(address).await })
            .await
    }

    /// Get current gas price in wei.
    pub async fn get_gas_price(&self) -> BlockchainResult<u128> {
        self.first_ok("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Get a transaction by hash.
    pub async fn get_transaction(&self, tx_hash: TxHash) -> BlockchainResult<Option<Transaction>> {
        self.first_ok("eth_getTransactionByHash", |p| async move {
            p.get_transaction_by_hash(tx_hash).await
        })
        .await
    }

    /// Get a transaction receipt by hash.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> BlockchainResult<Option<TransactionReceipt>> {
        self.first_ok("eth_getTransactionReceipt", |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Get the timestamp (unix seconds) of a block.
    pub async fn get_block_timestamp(&self, block: BlockNumberOrTag) -> BlockchainResult<u64> {
        let found = self
            .first_ok("eth_getBlockByNumber", |p| async move {
                p.get_block_by_number(block).await
            })
            .await?;
        match found {
            Some(block) => Ok(block.header.timestamp),
            None => Err(BlockchainError::NotFound(format!("block {block}"))),
        }
    }

    /// Execute a read-only call.
    pub async fn call(&self, tx: TransactionRequest) -> BlockchainResult<Bytes> {
        self.first_ok("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    /// Estimate gas for a transaction.
    pub async fn estimate_gas(&self, tx: TransactionRequest) -> BlockchainResult<u64> {
        self.first_ok("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    /// Fetch logs matching `filter`.
    pub async fn get_logs(&self, filter: &Filter) -> BlockchainResult<Vec<Log>> {
        self.first_ok("eth_getLogs", |p| {
            let filter = filter.clone();
            async move { p.get_logs(&filter).await }
        })
        .await
    }

    /// Check if the blockchain is reachable and healthy.
    ///
    /// Returns true if we can query the block number.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(healthy);
        healthy
    }

    /// Provider on the primary endpoint that fills, signs and sends with
    /// `wallet`.
    pub fn signing_provider(&self, wallet: &Wallet) -> BlockchainResult<DynProvider> {
        let url: url::Url = self.config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", self.config.rpc_url, e))
        })?;
        let provider = ProviderBuilder::new()
            .wallet(wallet.ethereum_wallet())
            .connect_http(url);
        Ok(Arc::new(provider))
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Get the number of confirmation blocks required.
    pub fn confirmation_blocks(&self) -> u32 {
        self.config.confirmation_blocks
    }
}

impl std::fmt::Debug for BlockchainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockchainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("providers", &self.providers.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BlockchainConfig {
        BlockchainConfig {
            enabled: true,
            // Nothing listens on port 9; connections are refused quickly.
            rpc_url: "http://127.0.0.1:9".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 2,
            confirmation_blocks: 1,
            gas_price_multiplier: 1.0,
            max_gas_price_gwei: 100,
        }
    }

    #[tokio::test]
    async fn test_client_creation_tolerates_unreachable_rpc() {
        let result = BlockchainClient::new(test_config()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_primary_url_rejected() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        let err = BlockchainClient::new(config).await.unwrap_err();
        assert!(err.to_string().contains("Invalid RPC URL"));
    }

    #[tokio::test]
    async fn test_rpc_failover_exhausted() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:7".to_string());
        config.failover_urls.push("::garbage::".to_string());

        let client = BlockchainClient::new(config).await.unwrap();
        assert_eq!(client.providers.len(), 2);

        let result = client.get_chain_id().await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("All RPC providers failed"));
        assert!(!client.is_healthy().await);
    }
}
