//! Descriptor builders: resource configuration plus current identity in,
//! typed descriptor out.

use alloy::primitives::{Address, Bytes, B256};
use std::str::FromStr;

use crate::blockchain::resources::{
    AllowanceQuery, BalanceQuery, BatchCallQuery, BlockQuery, CallQuery, ChainQuery, LogQuery,
    TransactionQuery, TransactionStatusQuery,
};
use crate::config::ResourceConfig;
use crate::sync::{SyncError, SyncResult};

/// Builds a descriptor for one resource kind.
pub type DescriptorBuilder<D> = fn(&ResourceConfig, &Scope) -> SyncResult<D>;

/// Identity-derived inputs shared by every descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub account: Option<Address>,
    pub chain_id: u64,
    /// Confirmations used when a resource does not set its own.
    pub confirmations: u32,
}

fn parsed<T: FromStr>(value: Option<&String>, field: &str) -> SyncResult<Option<T>> {
    value
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| SyncError::MissingParameters(format!("{field} is malformed")))
        })
        .transpose()
}

fn required<T>(value: Option<T>, field: &str) -> SyncResult<T> {
    value.ok_or_else(|| SyncError::MissingParameters(field.to_string()))
}

pub fn chain(_config: &ResourceConfig, scope: &Scope) -> SyncResult<ChainQuery> {
    Ok(ChainQuery {
        chain_id: scope.chain_id,
    })
}

/// Address from config, else the session account.
pub fn balance(config: &ResourceConfig, scope: &Scope) -> SyncResult<BalanceQuery> {
    let address = parsed::<Address>(config.address.as_ref(), "address")?.or(scope.account);
    Ok(BalanceQuery {
        chain_id: scope.chain_id,
        address: required(address, "address")?,
    })
}

pub fn transaction(config: &ResourceConfig, scope: &Scope) -> SyncResult<TransactionQuery> {
    Ok(TransactionQuery {
        chain_id: scope.chain_id,
        hash: required(parsed::<B256>(config.hash.as_ref(), "hash")?, "hash")?,
    })
}

pub fn transaction_status(
    config: &ResourceConfig,
    scope: &Scope,
) -> SyncResult<TransactionStatusQuery> {
    Ok(TransactionStatusQuery {
        chain_id: scope.chain_id,
        hash: required(parsed::<B256>(config.hash.as_ref(), "hash")?, "hash")?,
        confirmations: config.confirmations.unwrap_or(scope.confirmations),
    })
}

pub fn block(config: &ResourceConfig, scope: &Scope) -> SyncResult<BlockQuery> {
    Ok(BlockQuery {
        chain_id: scope.chain_id,
        block: config.block,
    })
}

pub fn call(config: &ResourceConfig, scope: &Scope) -> SyncResult<CallQuery> {
    Ok(CallQuery {
        chain_id: scope.chain_id,
        address: required(parsed(config.address.as_ref(), "address")?, "address")?,
        calldata: required(parsed(config.calldata.as_ref(), "calldata")?, "calldata")?,
    })
}

pub fn calls(config: &ResourceConfig, scope: &Scope) -> SyncResult<BatchCallQuery> {
    if config.calls.is_empty() {
        return Err(SyncError::MissingParameters("calls".to_string()));
    }
    let calls = config
        .calls
        .iter()
        .map(|call| {
            let address = parsed::<Address>(Some(&call.address), "calls.address")?;
            let calldata = parsed::<Bytes>(Some(&call.calldata), "calls.calldata")?;
            Ok((
                required(address, "calls.address")?,
                required(calldata, "calls.calldata")?,
            ))
        })
        .collect::<SyncResult<Vec<_>>>()?;
    Ok(BatchCallQuery {
        chain_id: scope.chain_id,
        calls,
    })
}

/// `address` is the token; the owner falls back to the session account.
pub fn allowance(config: &ResourceConfig, scope: &Scope) -> SyncResult<AllowanceQuery> {
    let owner = parsed::<Address>(config.owner.as_ref(), "owner")?.or(scope.account);
    Ok(AllowanceQuery {
        chain_id: scope.chain_id,
        token: required(parsed(config.address.as_ref(), "address")?, "address")?,
        owner: required(owner, "owner")?,
        spender: required(parsed(config.spender.as_ref(), "spender")?, "spender")?,
    })
}

pub fn logs(config: &ResourceConfig, scope: &Scope) -> SyncResult<LogQuery> {
    Ok(LogQuery {
        chain_id: scope.chain_id,
        address: required(parsed(config.address.as_ref(), "address")?, "address")?,
        event_signature: parsed(config.event_signature.as_ref(), "event_signature")?,
        from_block: required(config.from_block, "from_block")?,
    })
}
