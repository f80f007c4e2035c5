use alloy::primitives::{Address, U256};

/// A decoded ERC-20 `Approval` event from one transaction.
///
/// Only `token` drives the approval counters; the remaining fields are carried
/// along for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalEvent {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
    pub log_index: u64,
}
