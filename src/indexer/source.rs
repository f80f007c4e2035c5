use alloy::primitives::{Address, B256};
use alloy::rpc::types::Log;
use std::sync::Arc;

use crate::metrics::ProviderMetrics;

use super::decoder::{decode_approval_log, APPROVAL_SIGNATURE};
use super::types::ApprovalEvent;

/// Supplies the decoded approval events of a single transaction.
///
/// Implementations never fail: errors are reported out of band and surface to
/// the caller as an empty result.
pub trait ApprovalSource {
    fn filter_log(
        &self,
        event_signature: &str,
        contract_address: Option<Address>,
    ) -> Vec<ApprovalEvent>;
}

/// Event source backed by the receipt logs of one transaction.
pub struct TransactionLogs {
    tx_hash: B256,
    logs: Vec<Log>,
    metrics: Arc<ProviderMetrics>,
}

impl TransactionLogs {
    pub fn new(tx_hash: B256, logs: Vec<Log>, metrics: Arc<ProviderMetrics>) -> Self {
        Self {
            tx_hash,
            logs,
            metrics,
        }
    }

    fn try_filter_log(
        &self,
        event_signature: &str,
        contract_address: Option<Address>,
    ) -> eyre::Result<Vec<ApprovalEvent>> {
        if event_signature != APPROVAL_SIGNATURE {
            return Err(eyre::eyre!(
                "Unsupported event signature: {}",
                event_signature
            ));
        }

        let mut events = Vec::new();
        for (position, log) in self.logs.iter().enumerate() {
            if contract_address.is_some_and(|addr| addr != log.inner.address) {
                continue;
            }
            if let Some(event) = decode_approval_log(log, position)? {
                events.push(event);
            }
        }

        Ok(events)
    }
}

impl ApprovalSource for TransactionLogs {
    fn filter_log(
        &self,
        event_signature: &str,
        contract_address: Option<Address>,
    ) -> Vec<ApprovalEvent> {
        match self.try_filter_log(event_signature, contract_address) {
            Ok(events) => {
                self.metrics.add_approvals_observed(events.len() as u64);
                events
            }
            Err(e) => {
                tracing::error!(
                    tx = %self.tx_hash,
                    error = %e,
                    "Error filtering logs"
                );
                self.metrics.increment_provider_errors();
                Vec::new()
            }
        }
    }
}

/// Event source over a fixed set of already-decoded events.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    events: Vec<ApprovalEvent>,
}

impl FixtureSource {
    pub fn new(events: Vec<ApprovalEvent>) -> Self {
        Self { events }
    }
}

impl ApprovalSource for FixtureSource {
    fn filter_log(
        &self,
        event_signature: &str,
        contract_address: Option<Address>,
    ) -> Vec<ApprovalEvent> {
        if event_signature != APPROVAL_SIGNATURE {
            return Vec::new();
        }
        self.events
            .iter()
            .filter(|e| contract_address.is_none_or(|addr| addr == e.token))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::decoder::test_logs::{approval_log, raw_log};
    use crate::indexer::decoder::Approval;
    use alloy::primitives::{address, U256};
    use alloy::sol_types::SolEvent;
    use std::str::FromStr;

    const TOKEN_A: Address = address!("1000000000000000000000000000000000000001");
    const TOKEN_B: Address = address!("4000000000000000000000000000000000000004");
    const OWNER: Address = address!("2000000000000000000000000000000000000002");
    const SPENDER: Address = address!("3000000000000000000000000000000000000003");

    fn source(logs: Vec<Log>) -> (TransactionLogs, Arc<ProviderMetrics>) {
        let metrics = Arc::new(ProviderMetrics::new());
        (
            TransactionLogs::new(B256::ZERO, logs, metrics.clone()),
            metrics,
        )
    }

    #[test]
    fn test_filters_all_approvals_in_order() {
        let (src, metrics) = source(vec![
            approval_log(TOKEN_A, OWNER, SPENDER, 1),
            approval_log(TOKEN_B, OWNER, SPENDER, 2),
            approval_log(TOKEN_A, OWNER, SPENDER, 3),
        ]);

        let events = src.filter_log(APPROVAL_SIGNATURE, None);
        let tokens: Vec<_> = events.iter().map(|e| e.token).collect();
        assert_eq!(tokens, vec![TOKEN_A, TOKEN_B, TOKEN_A]);
        assert_eq!(events[2].amount, U256::from(3u64));
        assert_eq!(events[2].log_index, 2);
        assert_eq!(metrics.snapshot().approvals_observed, 3);
        assert_eq!(metrics.provider_errors(), 0);
    }

    #[test]
    fn test_contract_filter_is_case_insensitive() {
        let usdc = Address::from_str("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").unwrap();
        let (src, _) = source(vec![
            approval_log(TOKEN_A, OWNER, SPENDER, 1),
            approval_log(usdc, OWNER, SPENDER, 2),
        ]);

        let checksummed =
            Address::from_str("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        let events = src.filter_log(APPROVAL_SIGNATURE, Some(checksummed));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].token, usdc);
        assert_eq!(
            crate::anomaly::rules::normalize_address(&events[0].token),
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
        );
    }

    #[test]
    fn test_unsupported_signature_counts_error() {
        let (src, metrics) = source(vec![approval_log(TOKEN_A, OWNER, SPENDER, 1)]);

        let events = src.filter_log("InvalidSignature(address,uint256)", None);
        assert!(events.is_empty());
        assert_eq!(metrics.provider_errors(), 1);
    }

    #[test]
    fn test_malformed_log_fails_whole_transaction() {
        let (src, metrics) = source(vec![
            approval_log(TOKEN_A, OWNER, SPENDER, 1),
            raw_log(
                TOKEN_A,
                vec![Approval::SIGNATURE_HASH, OWNER.into_word(), SPENDER.into_word()],
                vec![],
            ),
        ]);

        assert!(src.filter_log(APPROVAL_SIGNATURE, None).is_empty());
        assert_eq!(metrics.provider_errors(), 1);
        assert_eq!(metrics.snapshot().approvals_observed, 0);
    }

    #[test]
    fn test_fixture_source_filters() {
        let event = |token| ApprovalEvent {
            token,
            owner: OWNER,
            spender: SPENDER,
            amount: U256::from(1u64),
            log_index: 0,
        };
        let src = FixtureSource::new(vec![event(TOKEN_A), event(TOKEN_B)]);

        assert_eq!(src.filter_log(APPROVAL_SIGNATURE, None).len(), 2);
        assert_eq!(src.filter_log(APPROVAL_SIGNATURE, Some(TOKEN_A)).len(), 1);
        assert!(src.filter_log("Transfer(address,address,uint256)", None).is_empty());
    }
}
