//! Concrete read resources over the RPC client.
//!
//! Each resource is a [`Fetch`] implementation. Descriptors carry the chain
//! id they were built for, so a network switch produces a different
//! descriptor and the binding restarts.

use alloy::network::TransactionBuilder;
use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log, Transaction, TransactionRequest};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::types::ConfirmationStatus;
use crate::sync::{EventKind, Fetch, IdentitySource, SyncError, SyncResult};

sol! {
    /// Minimal ERC-20 surface used for allowance reads and approvals.
    #[derive(Debug)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Shared access to the optional RPC client.
#[derive(Debug, Clone, Default)]
pub struct ChainReader {
    client: Option<BlockchainClient>,
}

impl ChainReader {
    pub fn new(client: Option<BlockchainClient>) -> Self {
        Self { client }
    }

    pub(crate) fn client(&self) -> SyncResult<&BlockchainClient> {
        self.client.as_ref().ok_or_else(|| {
            SyncError::CollaboratorUnavailable("blockchain client not configured".to_string())
        })
    }
}

/// Chain-wide reads need nothing but the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainQuery {
    pub chain_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceQuery {
    pub chain_id: u64,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionQuery {
    pub chain_id: u64,
    pub hash: TxHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStatusQuery {
    pub chain_id: u64,
    pub hash: TxHash,
    pub confirmations: u32,
}

/// A block by number, or the latest block when `block` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockQuery {
    pub chain_id: u64,
    pub block: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallQuery {
    pub chain_id: u64,
    pub address: Address,
    pub calldata: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCallQuery {
    pub chain_id: u64,
    pub calls: Vec<(Address, Bytes)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceQuery {
    pub chain_id: u64,
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub chain_id: u64,
    pub address: Address,
    pub event_signature: Option<B256>,
    pub from_block: u64,
}

/// Native balance in wei with its ether rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub wei: U256,
    pub formatted: String,
}

impl Balance {
    pub fn from_wei(wei: U256) -> Self {
        Self {
            wei,
            formatted: format_ether(wei),
        }
    }
}

fn call_request(address: Address, calldata: Bytes) -> TransactionRequest {
    TransactionRequest::default()
        .with_to(address)
        .with_input(calldata)
}

fn block_tag(block: Option<u64>) -> BlockNumberOrTag {
    block.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number)
}

pub struct BlockNumber(pub ChainReader);

#[async_trait]
impl Fetch for BlockNumber {
    type Descriptor = ChainQuery;
    type Value = u64;

    fn name(&self) -> &'static str {
        "block_number"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, _query: &ChainQuery) -> SyncResult<u64> {
        Ok(self.0.client()?.get_block_number().await?)
    }
}

pub struct NativeBalance(pub ChainReader);

#[async_trait]
impl Fetch for NativeBalance {
    type Descriptor = BalanceQuery;
    type Value = Balance;

    fn name(&self) -> &'static str {
        "balance"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &BalanceQuery) -> SyncResult<Balance> {
        let wei = self.0.client()?.get_balance(query.address).await?;
        Ok(Balance::from_wei(wei))
    }
}

/// The chain id reported by the endpoint.
pub struct ChainInfo(pub ChainReader);

#[async_trait]
impl Fetch for ChainInfo {
    type Descriptor = ChainQuery;
    type Value = u64;

    fn name(&self) -> &'static str {
        "chain_id"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::ChainChanged)
    }

    async fn fetch(&self, _query: &ChainQuery) -> SyncResult<u64> {
        Ok(self.0.client()?.get_chain_id().await?.0)
    }
}

/// The active account from the session.
pub struct Account(pub Arc<dyn IdentitySource>);

#[async_trait]
impl Fetch for Account {
    type Descriptor = ChainQuery;
    type Value = Option<Address>;

    fn name(&self) -> &'static str {
        "account"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::AccountsChanged)
    }

    async fn fetch(&self, _query: &ChainQuery) -> SyncResult<Option<Address>> {
        Ok(self.0.current_identity().account)
    }
}

pub struct TransactionLookup(pub ChainReader);

#[async_trait]
impl Fetch for TransactionLookup {
    type Descriptor = TransactionQuery;
    type Value = Transaction;

    fn name(&self) -> &'static str {
        "transaction"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &TransactionQuery) -> SyncResult<Transaction> {
        self.0
            .client()?
            .get_transaction(query.hash)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("transaction {}", query.hash)))
    }
}

/// Confirmation depth of a transaction.
pub struct TransactionStatus(pub ChainReader);

#[async_trait]
impl Fetch for TransactionStatus {
    type Descriptor = TransactionStatusQuery;
    type Value = ConfirmationStatus;

    fn name(&self) -> &'static str {
        "transaction_status"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &TransactionStatusQuery) -> SyncResult<ConfirmationStatus> {
        let client = self.0.client()?;
        let Some(receipt) = client.get_transaction_receipt(query.hash).await? else {
            return Ok(ConfirmationStatus::Pending);
        };
        if !receipt.status() {
            return Ok(ConfirmationStatus::Failed {
                reason: "Transaction reverted".to_string(),
            });
        }
        let Some(tx_block) = receipt.block_number else {
            return Ok(ConfirmationStatus::Pending);
        };
        let head = client.get_block_number().await?;
        Ok(ConfirmationStatus::from_depth(
            tx_block,
            head,
            query.confirmations,
        ))
    }
}

pub struct BlockTimestamp(pub ChainReader);

#[async_trait]
impl Fetch for BlockTimestamp {
    type Descriptor = BlockQuery;
    type Value = u64;

    fn name(&self) -> &'static str {
        "block_timestamp"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &BlockQuery) -> SyncResult<u64> {
        Ok(self
            .0
            .client()?
            .get_block_timestamp(block_tag(query.block))
            .await?)
    }
}

pub struct GasPrice(pub ChainReader);

#[async_trait]
impl Fetch for GasPrice {
    type Descriptor = ChainQuery;
    type Value = u128;

    fn name(&self) -> &'static str {
        "gas_price"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, _query: &ChainQuery) -> SyncResult<u128> {
        Ok(self.0.client()?.get_gas_price().await?)
    }
}

/// Raw return data of one `eth_call`.
pub struct ContractRead(pub ChainReader);

#[async_trait]
impl Fetch for ContractRead {
    type Descriptor = CallQuery;
    type Value = Bytes;

    fn name(&self) -> &'static str {
        "contract_read"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &CallQuery) -> SyncResult<Bytes> {
        let request = call_request(query.address, query.calldata.clone());
        Ok(self.0.client()?.call(request).await?)
    }
}

/// Several calls issued concurrently. Any failure fails the whole read.
pub struct ContractReads(pub ChainReader);

#[async_trait]
impl Fetch for ContractReads {
    type Descriptor = BatchCallQuery;
    type Value = Vec<Bytes>;

    fn name(&self) -> &'static str {
        "contract_reads"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &BatchCallQuery) -> SyncResult<Vec<Bytes>> {
        let client = self.0.client()?;
        let calls = query
            .calls
            .iter()
            .map(|(address, calldata)| client.call(call_request(*address, calldata.clone())));
        Ok(try_join_all(calls).await?)
    }
}

/// ERC-20 allowance granted by `owner` to `spender`.
pub struct Allowance(pub ChainReader);

#[async_trait]
impl Fetch for Allowance {
    type Descriptor = AllowanceQuery;
    type Value = U256;

    fn name(&self) -> &'static str {
        "allowance"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &AllowanceQuery) -> SyncResult<U256> {
        let calldata = IERC20::allowanceCall {
            owner: query.owner,
            spender: query.spender,
        }
        .abi_encode();
        let raw = self
            .0
            .client()?
            .call(call_request(query.token, calldata.into()))
            .await?;
        U256::abi_decode(&raw)
            .map_err(|e| SyncError::RemoteFailure(format!("undecodable allowance: {e}")))
    }
}

/// Logs emitted by a contract since `from_block`.
pub struct ContractLogs(pub ChainReader);

#[async_trait]
impl Fetch for ContractLogs {
    type Descriptor = LogQuery;
    type Value = Vec<Log>;

    fn name(&self) -> &'static str {
        "logs"
    }

    fn invalidated_by(&self) -> Option<EventKind> {
        Some(EventKind::NewBlock)
    }

    async fn fetch(&self, query: &LogQuery) -> SyncResult<Vec<Log>> {
        let mut filter = Filter::new()
            .address(query.address)
            .from_block(query.from_block);
        if let Some(signature) = query.event_signature {
            filter = filter.event_signature(signature);
        }
        Ok(self.0.client()?.get_logs(&filter).await?)
    }
}
