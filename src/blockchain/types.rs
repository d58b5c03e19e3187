//! Adapter error type, its mapping into the engine taxonomy, and chain
//! value types shared by the resources.

use serde::Serialize;
use thiserror::Error;

use crate::sync::SyncError;

pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// A block or transaction the caller referenced does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Blockchain client not initialized or disabled.
    #[error("Blockchain not available: {0}")]
    NotAvailable(String),
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

impl From<BlockchainError> for SyncError {
    fn from(err: BlockchainError) -> Self {
        match err {
            BlockchainError::NotAvailable(what) => SyncError::CollaboratorUnavailable(what),
            BlockchainError::NotFound(what) => SyncError::NotFound(what),
            other => SyncError::RemoteFailure(other.to_string()),
        }
    }
}

/// Transaction confirmation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfirmationStatus {
    /// Transaction is pending in mempool (or not yet visible).
    Pending,
    /// Transaction has been mined but not enough confirmations.
    Confirming { current: u32, required: u32 },
    /// Transaction is confirmed with required block depth.
    Confirmed { block_number: u64 },
    /// Transaction reverted.
    Failed { reason: String },
}

impl ConfirmationStatus {
    /// Status of a transaction mined in `tx_block` as seen at `head`.
    pub fn from_depth(tx_block: u64, head: u64, required: u32) -> Self {
        // The inclusion block counts as the first confirmation.
        let current = head.saturating_sub(tx_block).saturating_add(1);
        let current = u32::try_from(current).unwrap_or(u32::MAX);
        if current >= required {
            ConfirmationStatus::Confirmed {
                block_number: tx_block,
            }
        } else {
            ConfirmationStatus::Confirming { current, required }
        }
    }

    /// True for terminal states.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ConfirmationStatus::Confirmed { .. } | ConfirmationStatus::Failed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ErrorKind;

    #[test]
    fn test_gas_ceiling_message_names_both_prices() {
        let err = BlockchainError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        let message = err.to_string();
        assert!(message.contains("600") && message.contains("500"));
        assert_eq!(u64::from(ChainId::from(10u64)), 10);
    }

    #[test]
    fn test_error_mapping() {
        let err: SyncError = BlockchainError::NotAvailable("no wallet".into()).into();
        assert_eq!(err.kind(), ErrorKind::CollaboratorUnavailable);

        let err: SyncError = BlockchainError::NotFound("block 9".into()).into();
        assert_eq!(err, SyncError::NotFound("block 9".into()));

        let err: SyncError = BlockchainError::Timeout(3).into();
        assert_eq!(
            err,
            SyncError::RemoteFailure("RPC timeout after 3 seconds".into())
        );
    }

    #[test]
    fn test_confirmation_depth() {
        assert_eq!(
            ConfirmationStatus::from_depth(100, 100, 3),
            ConfirmationStatus::Confirming {
                current: 1,
                required: 3
            }
        );
        let status = ConfirmationStatus::from_depth(100, 102, 3);
        assert_eq!(status, ConfirmationStatus::Confirmed { block_number: 100 });
        assert!(status.is_final());
        assert!(!ConfirmationStatus::Pending.is_final());
    }
}
