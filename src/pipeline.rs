use alloy::primitives::B256;
use alloy::rpc::types::Log;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

use crate::anomaly::engine::ApprovalMonitor;
use crate::anomaly::types::Finding;
use crate::config::Config;
use crate::indexer::source::TransactionLogs;
use crate::metrics::ProviderMetrics;

/// Downstream consumer of findings.
pub trait AlertSink: Send + Sync {
    fn publish(&self, tx_hash: B256, finding: &Finding) -> eyre::Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishedFinding<'a> {
    tx_hash: B256,
    #[serde(flatten)]
    finding: &'a Finding,
}

/// Writes each finding as one JSON line to stdout.
#[derive(Debug, Default)]
pub struct StdoutAlertSink;

impl AlertSink for StdoutAlertSink {
    fn publish(&self, tx_hash: B256, finding: &Finding) -> eyre::Result<()> {
        let line = serde_json::to_string(&PublishedFinding { tx_hash, finding })?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(())
    }
}

/// Wires one transaction's logs through the approval monitor and hands the
/// resulting findings to the alert sink.
pub struct ApprovalPipeline {
    pub monitor: Arc<ApprovalMonitor>,
    pub metrics: Arc<ProviderMetrics>,
    sink: Box<dyn AlertSink>,
}

impl ApprovalPipeline {
    pub fn init(config: &Config, sink: Box<dyn AlertSink>) -> eyre::Result<Self> {
        let monitor = Arc::new(ApprovalMonitor::new(&config.approval_monitor)?);
        Ok(Self {
            monitor,
            metrics: Arc::new(ProviderMetrics::new()),
            sink,
        })
    }

    pub fn process_transaction(&self, tx_hash: B256, logs: Vec<Log>) -> Vec<Finding> {
        let source = TransactionLogs::new(tx_hash, logs, self.metrics.clone());
        let findings = self.monitor.handle_transaction(&source);
        self.metrics.increment_transactions_processed();

        for finding in &findings {
            tracing::warn!(
                tx = %tx_hash,
                alert_id = %finding.alert_id,
                severity = finding.severity.as_str(),
                token = finding.token_address().unwrap_or_default(),
                approval_count = finding.approval_count().unwrap_or_default(),
                "ANOMALY DETECTED"
            );
            if let Err(e) = self.sink.publish(tx_hash, finding) {
                tracing::error!(tx = %tx_hash, error = %e, "Failed to publish finding");
            }
        }
        self.metrics.add_findings_published(findings.len() as u64);

        findings
    }
}
