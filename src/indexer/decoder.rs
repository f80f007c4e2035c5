use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

use super::types::ApprovalEvent;

// Generate the Approval event ABI using alloy's sol! macro.
// This gives us Approval::SIGNATURE and Approval::SIGNATURE_HASH.
sol! {
    event Approval(address indexed owner, address indexed spender, uint256 value);
}

/// Canonical signature of the ERC-20 `Approval` event.
pub const APPROVAL_SIGNATURE: &str = Approval::SIGNATURE;

/// Attempt to decode a log as an ERC-20 Approval event.
///
/// `position` is the log's offset within its transaction, used when the RPC
/// log carries no `log_index`.
///
/// Returns `Ok(None)` for logs that are not ERC-20 approvals, including the
/// ERC-721 form of `Approval` which indexes the token id as a fourth topic.
/// Returns an error for a log that carries the Approval topic but cannot be
/// decoded.
pub fn decode_approval_log(log: &Log, position: usize) -> eyre::Result<Option<ApprovalEvent>> {
    let inner = &log.inner;

    let topics = inner.data.topics();
    if topics.is_empty() || topics[0] != Approval::SIGNATURE_HASH {
        return Ok(None);
    }

    if topics.len() == 4 {
        tracing::trace!(token = %inner.address, "Skipping ERC-721 Approval log");
        return Ok(None);
    }

    // Signature + owner + spender, value in data
    if topics.len() != 3 {
        return Err(eyre::eyre!(
            "Malformed Approval log from {}: expected 3 topics, got {}",
            inner.address,
            topics.len()
        ));
    }

    let data = inner.data.data.as_ref();
    if data.len() < 32 {
        return Err(eyre::eyre!(
            "Malformed Approval log from {}: expected 32 bytes of data, got {}",
            inner.address,
            data.len()
        ));
    }

    Ok(Some(ApprovalEvent {
        token: inner.address,
        owner: Address::from_word(topics[1]),
        spender: Address::from_word(topics[2]),
        amount: U256::from_be_slice(&data[..32]),
        log_index: log.log_index.unwrap_or(position as u64),
    }))
}

#[cfg(test)]
pub(crate) mod test_logs {
    use alloy::primitives::{Address, Bytes, LogData, B256, U256};
    use alloy::rpc::types::Log;
    use alloy::sol_types::SolEvent;

    use super::Approval;

    pub fn raw_log(token: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: token,
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            ..Default::default()
        }
    }

    pub fn approval_log(token: Address, owner: Address, spender: Address, amount: u64) -> Log {
        raw_log(
            token,
            vec![Approval::SIGNATURE_HASH, owner.into_word(), spender.into_word()],
            U256::from(amount).to_be_bytes::<32>().to_vec(),
        )
    }
}
