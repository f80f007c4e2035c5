use serde::Serialize;
use std::collections::BTreeMap;

pub const APPROVAL_ALERT_ID: &str = "HIGH-FREQUENCY-TOKEN-APPROVALS";
pub const APPROVAL_ALERT_NAME: &str = "Suspicious amount of token approvals";

/// Severity tier of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Category tag carried by every finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingType {
    Suspicious,
}

/// A detected anomaly, ready to be handed to the alert sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub name: String,
    pub description: String,
    pub alert_id: String,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub severity: Severity,
    pub metadata: BTreeMap<String, String>,
}

impl Finding {
    /// Lowercase hex token address from the metadata.
    pub fn token_address(&self) -> Option<&str> {
        self.metadata.get("address").map(String::as_str)
    }

    pub fn approval_count(&self) -> Option<u64> {
        self.metadata.get("approvalCount")?.parse().ok()
    }
}
