//! Local signer backing the session account and the write actions.
//!
//! The key comes from `CHAIN_SYNC_PRIVATE_KEY` and nowhere else. Only the
//! derived address ever reaches logs or output.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::{Signature, Signer};
use std::fmt;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

pub const PRIVATE_KEY_ENV_VAR: &str = "CHAIN_SYNC_PRIVATE_KEY";

#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl Wallet {
    /// Parse a hex key, `0x` prefix optional. The signer is pinned to
    /// `chain_id` so transactions carry EIP-155 protection.
    pub fn from_private_key(key: &str, chain_id: u64) -> BlockchainResult<Self> {
        let key = key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);

        let signer = key
            .parse::<PrivateKeySigner>()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key: {e}")))?
            .with_chain_id(Some(chain_id));

        tracing::info!(account = %signer.address(), chain_id, "Signer loaded");
        Ok(Self { signer, chain_id })
    }

    /// Load from [`PRIVATE_KEY_ENV_VAR`]. Unset and blank are both treated as
    /// "no wallet".
    pub fn from_env(chain_id: u64) -> BlockchainResult<Self> {
        match std::env::var(PRIVATE_KEY_ENV_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::from_private_key(&key, chain_id),
            _ => Err(BlockchainError::Wallet(format!(
                "{PRIVATE_KEY_ENV_VAR} is not set"
            ))),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Wallet handed to the signing provider.
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    /// EIP-191 personal signature over `message`.
    pub async fn sign_message(&self, message: &[u8]) -> BlockchainResult<Signature> {
        self.signer
            .sign_message(message)
            .await
            .map_err(|e| BlockchainError::Wallet(format!("Signing failed: {e}")))
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
