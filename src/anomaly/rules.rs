use alloy::primitives::Address;
use std::collections::BTreeMap;

use crate::config::ApprovalMonitorConfig;

use super::types::{Finding, FindingType, Severity, APPROVAL_ALERT_ID, APPROVAL_ALERT_NAME};

/// Count boundaries used to decide whether and how loudly to alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub emission: u64,
    pub medium: u64,
    pub high: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from(&ApprovalMonitorConfig::default())
    }
}

impl From<&ApprovalMonitorConfig> for Thresholds {
    fn from(config: &ApprovalMonitorConfig) -> Self {
        Self {
            emission: config.emission_threshold,
            medium: config.medium_severity_threshold,
            high: config.high_severity_threshold,
        }
    }
}

/// Map a cumulative approval count to a severity tier. Both bands are exclusive.
pub fn classify_severity(count: u64, thresholds: &Thresholds) -> Severity {
    if count > thresholds.high {
        Severity::High
    } else if count > thresholds.medium {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Check whether a token's updated approval count warrants a finding.
pub fn check_approval_frequency(
    token: &Address,
    count: u64,
    thresholds: &Thresholds,
) -> Option<Finding> {
    if count < thresholds.emission {
        return None;
    }
    Some(build_finding(token, count, classify_severity(count, thresholds)))
}

pub fn build_finding(token: &Address, count: u64, severity: Severity) -> Finding {
    let mut metadata = BTreeMap::new();
    metadata.insert("address".to_string(), normalize_address(token));
    metadata.insert("approvalCount".to_string(), count.to_string());

    Finding {
        name: APPROVAL_ALERT_NAME.to_string(),
        description: format!("High number of token approvals detected: {}", count),
        alert_id: APPROVAL_ALERT_ID.to_string(),
        finding_type: FindingType::Suspicious,
        severity,
        metadata,
    }
}

/// Lowercase `0x`-prefixed hex form of an address.
pub fn normalize_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
