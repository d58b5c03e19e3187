//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key) + [blockchain] config
//!     → wallet.rs (key loading, signing)
//!     → client.rs (RPC connection with timeouts and failover)
//!     → resources.rs (read resources for the sync engine)
//!     → actions.rs (write actions for the sync engine)
//!
//! events.rs: ChainWatcher polls the head/network and publishes on ChainEvents
//! session.rs: active account and chain, published on change
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod actions;
pub mod client;
pub mod events;
pub mod resources;
pub mod session;
pub mod types;
pub mod wallet;

pub use actions::{
    ChainWriter, ContractWrite, EstimateGas, SendTransaction, SignMessage, TokenApprove,
};
pub use client::BlockchainClient;
pub use events::{ChainEvents, ChainWatcher};
pub use resources::ChainReader;
pub use session::Session;
pub use types::{BlockchainConfig, BlockchainError, ChainId, ConfirmationStatus};
pub use wallet::Wallet;
