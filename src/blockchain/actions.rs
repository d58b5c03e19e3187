//! Write actions: transactions, approvals, gas estimates and signatures.
//!
//! Each action is an [`Invoke`] implementation to be driven by an
//! [`ActionController`](crate::sync::ActionController).

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::Signature;
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::blockchain::client::BlockchainClient;
use crate::blockchain::resources::IERC20;
use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::blockchain::wallet::Wallet;
use crate::sync::{Invoke, SyncError, SyncResult};

/// Client and wallet pair needed by signing actions.
#[derive(Debug, Clone, Default)]
pub struct ChainWriter {
    client: Option<BlockchainClient>,
    wallet: Option<Wallet>,
}

impl ChainWriter {
    pub fn new(client: Option<BlockchainClient>, wallet: Option<Wallet>) -> Self {
        Self { client, wallet }
    }

    fn client(&self) -> SyncResult<&BlockchainClient> {
        self.client.as_ref().ok_or_else(|| {
            SyncError::CollaboratorUnavailable("blockchain client not configured".to_string())
        })
    }

    fn wallet(&self) -> SyncResult<&Wallet> {
        self.wallet
            .as_ref()
            .ok_or_else(|| SyncError::CollaboratorUnavailable("no wallet loaded".to_string()))
    }

    /// Price, sign and broadcast `tx`. Resolves once the node accepts it.
    async fn send(&self, tx: TransactionRequest) -> SyncResult<TxHash> {
        let client = self.client()?;
        let wallet = self.wallet()?;

        let mut tx = tx.with_from(wallet.address());
        if tx.gas_price.is_none() {
            tx.set_gas_price(priced_gas(client).await?);
        }

        let provider = client.signing_provider(wallet)?;
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| BlockchainError::Rpc(format!("Broadcast failed: {}", e)))?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(tx_hash = %tx_hash, from = %wallet.address(), "Transaction broadcast");
        Ok(tx_hash)
    }
}

/// Current gas price with the configured multiplier, refusing prices above
/// the configured ceiling.
async fn priced_gas(client: &BlockchainClient) -> BlockchainResult<u128> {
    let gas_price = client.get_gas_price().await?;
    let config = client.config();
    check_gas_ceiling(gas_price, config.max_gas_price_gwei)?;
    Ok((gas_price as f64 * config.gas_price_multiplier) as u128)
}

fn check_gas_ceiling(gas_price: u128, max_gwei: u64) -> BlockchainResult<()> {
    let gas_price_gwei = gas_price / 1_000_000_000;
    if gas_price_gwei > max_gwei as u128 {
        return Err(BlockchainError::GasPriceTooHigh {
            current_gwei: u64::try_from(gas_price_gwei).unwrap_or(u64::MAX),
            max_gwei,
        });
    }
    Ok(())
}

/// Send an arbitrary transaction request.
pub struct SendTransaction(pub ChainWriter);

#[async_trait]
impl Invoke for SendTransaction {
    type Args = TransactionRequest;
    type Output = TxHash;

    fn name(&self) -> &'static str {
        "send_transaction"
    }

    fn check(&self, tx: &TransactionRequest) -> SyncResult<()> {
        let has_input = tx.input.input().is_some_and(|input| !input.is_empty());
        if tx.to.is_none() && !has_input {
            return Err(SyncError::MissingParameters(
                "transaction needs a recipient or deployment code".to_string(),
            ));
        }
        Ok(())
    }

    async fn invoke(&self, tx: TransactionRequest) -> SyncResult<TxHash> {
        self.0.send(tx).await
    }
}

/// Call a state-changing function on a fixed contract.
pub struct ContractWrite {
    pub writer: ChainWriter,
    pub contract: Option<Address>,
}

#[async_trait]
impl Invoke for ContractWrite {
    /// ABI-encoded calldata.
    type Args = Bytes;
    type Output = TxHash;

    fn name(&self) -> &'static str {
        "contract_write"
    }

    fn check(&self, calldata: &Bytes) -> SyncResult<()> {
        if self.contract.is_none() {
            return Err(SyncError::MissingParameters("contract address".to_string()));
        }
        if calldata.len() < 4 {
            return Err(SyncError::MissingParameters("function selector".to_string()));
        }
        Ok(())
    }

    async fn invoke(&self, calldata: Bytes) -> SyncResult<TxHash> {
        let contract = self
            .contract
            .ok_or_else(|| SyncError::MissingParameters("contract address".to_string()))?;
        let tx = TransactionRequest::default()
            .with_to(contract)
            .with_input(calldata);
        self.writer.send(tx).await
    }
}

/// ERC-20 `approve(spender, amount)`.
pub struct TokenApprove {
    pub writer: ChainWriter,
    pub token: Option<Address>,
    pub spender: Option<Address>,
}

#[async_trait]
impl Invoke for TokenApprove {
    type Args = U256;
    type Output = TxHash;

    fn name(&self) -> &'static str {
        "token_approve"
    }

    fn check(&self, _amount: &U256) -> SyncResult<()> {
        match (self.token, self.spender) {
            (Some(_), Some(_)) => Ok(()),
            (None, _) => Err(SyncError::MissingParameters("token address".to_string())),
            (_, None) => Err(SyncError::MissingParameters("spender".to_string())),
        }
    }

    async fn invoke(&self, amount: U256) -> SyncResult<TxHash> {
        let (Some(token), Some(spender)) = (self.token, self.spender) else {
            return Err(SyncError::MissingParameters("token and spender".to_string()));
        };
        let calldata = IERC20::approveCall { spender, amount }.abi_encode();
        let tx = TransactionRequest::default()
            .with_to(token)
            .with_input(calldata);
        self.writer.send(tx).await
    }
}

/// Gas estimate for a request, from the wallet account when one is loaded.
pub struct EstimateGas(pub ChainWriter);

#[async_trait]
impl Invoke for EstimateGas {
    type Args = TransactionRequest;
    type Output = u64;

    fn name(&self) -> &'static str {
        "estimate_gas"
    }

    async fn invoke(&self, mut tx: TransactionRequest) -> SyncResult<u64> {
        let client = self.0.client()?;
        if tx.from.is_none() {
            if let Some(wallet) = &self.0.wallet {
                tx.set_from(wallet.address());
            }
        }
        Ok(client.estimate_gas(tx).await?)
    }
}

/// EIP-191 personal message signature.
pub struct SignMessage(pub ChainWriter);

#[async_trait]
impl Invoke for SignMessage {
    type Args = Vec<u8>;
    type Output = Signature;

    fn name(&self) -> &'static str {
        "sign_message"
    }

    fn check(&self, message: &Vec<u8>) -> SyncResult<()> {
        if message.is_empty() {
            return Err(SyncError::MissingParameters("message".to_string()));
        }
        Ok(())
    }

    async fn invoke(&self, message: Vec<u8>) -> SyncResult<Signature> {
        Ok(self.0.wallet()?.sign_message(&message).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ActionController, ErrorKind};
    use std::sync::Arc;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_missing_wallet_safe_and_raising() {
        let controller = ActionController::new(Arc::new(SignMessage(ChainWriter::default())));

        let result = controller.invoke_safe(b"hello".to_vec()).await;
        assert!(result.is_none());
        let state = controller.state();
        assert_eq!(
            state.error.as_ref().map(SyncError::kind),
            Some(ErrorKind::CollaboratorUnavailable)
        );
        assert!(!state.is_loading);

        let err = controller.invoke(b"hello".to_vec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);
    }

    #[tokio::test]
    async fn test_sign_message_with_wallet() {
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY, 1).unwrap();
        let address = wallet.address();
        let controller = ActionController::new(Arc::new(SignMessage(ChainWriter::new(
            None,
            Some(wallet),
        ))));

        let signature = controller.invoke(b"hello".to_vec()).await.unwrap();
        assert_eq!(
            signature.recover_address_from_msg(b"hello").unwrap(),
            address
        );
        assert_eq!(controller.state().data, Some(signature));
    }

    #[tokio::test]
    async fn test_approve_requires_spender() {
        let controller = ActionController::new(Arc::new(TokenApprove {
            writer: ChainWriter::default(),
            token: Some(Address::repeat_byte(1)),
            spender: None,
        }));
        let err = controller.invoke(U256::from(5)).await.unwrap_err();
        assert_eq!(err, SyncError::MissingParameters("spender".to_string()));
        assert_eq!(controller.state().error, Some(err));
    }

    #[tokio::test]
    async fn test_send_without_client() {
        let controller = ActionController::new(Arc::new(SendTransaction(ChainWriter::default())));
        let tx = TransactionRequest::default().with_to(Address::repeat_byte(2));
        let err = controller.invoke(tx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);

        let err = controller
            .invoke(TransactionRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingParameters);
    }

    #[test]
    fn test_gas_ceiling() {
        assert!(check_gas_ceiling(50_000_000_000, 100).is_ok());
        let err = check_gas_ceiling(600_000_000_000, 500).unwrap_err();
        assert!(matches!(
            err,
            BlockchainError::GasPriceTooHigh {
                current_gwei: 600,
                max_gwei: 500
            }
        ));
    }
}
