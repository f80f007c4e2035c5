//! Process counters for the approval monitor, renderable as Prometheus text.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters shared between the event-source adapter and the pipeline.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    /// Failed `filter_log` calls (decode errors, unsupported signatures).
    provider_errors: AtomicU64,
    transactions_processed: AtomicU64,
    approvals_observed: AtomicU64,
    findings_published: AtomicU64,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_provider_errors(&self) {
        self.provider_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transactions_processed(&self) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_approvals_observed(&self, count: u64) {
        self.approvals_observed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_findings_published(&self, count: u64) {
        self.findings_published.fetch_add(count, Ordering::Relaxed);
    }

    pub fn provider_errors(&self) -> u64 {
        self.provider_errors.load(Ordering::Relaxed)
    }

    /// Read all counters. Each field is individually accurate; the set is not
    /// read under a single fence.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            provider_errors: self.provider_errors.load(Ordering::Relaxed),
            transactions_processed: self.transactions_processed.load(Ordering::Relaxed),
            approvals_observed: self.approvals_observed.load(Ordering::Relaxed),
            findings_published: self.findings_published.load(Ordering::Relaxed),
        }
    }

    pub fn to_prometheus_text(&self) -> String {
        self.snapshot().to_prometheus_text()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub provider_errors: u64,
    pub transactions_processed: u64,
    pub approvals_observed: u64,
    pub findings_published: u64,
}

impl MetricsSnapshot {
    pub fn to_prometheus_text(&self) -> String {
        let mut out = String::with_capacity(512);

        write_counter(
            &mut out,
            "approval_monitor_provider_errors_total",
            "Total number of errors encountered while filtering transaction logs",
            self.provider_errors,
        );
        write_counter(
            &mut out,
            "approval_monitor_transactions_processed_total",
            "Transactions handed to the approval monitor",
            self.transactions_processed,
        );
        write_counter(
            &mut out,
            "approval_monitor_approvals_observed_total",
            "Decoded ERC-20 Approval events",
            self.approvals_observed,
        );
        write_counter(
            &mut out,
            "approval_monitor_findings_published_total",
            "Findings forwarded to the alert sink",
            self.findings_published,
        );

        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_zero_state_snapshot() {
        let metrics = ProviderMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increments() {
        let metrics = ProviderMetrics::new();
        metrics.increment_provider_errors();
        metrics.increment_provider_errors();
        metrics.increment_transactions_processed();
        metrics.add_approvals_observed(12);
        metrics.add_findings_published(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.provider_errors, 2);
        assert_eq!(snap.transactions_processed, 1);
        assert_eq!(snap.approvals_observed, 12);
        assert_eq!(snap.findings_published, 3);
        assert_eq!(metrics.provider_errors(), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(ProviderMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.increment_provider_errors();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.provider_errors(), 4000);
    }

    #[test]
    fn test_prometheus_text() {
        let metrics = ProviderMetrics::new();
        metrics.increment_provider_errors();
        let text = metrics.to_prometheus_text();

        assert!(text.contains("# TYPE approval_monitor_provider_errors_total counter"));
        assert!(text.contains("approval_monitor_provider_errors_total 1\n"));
        assert!(text.contains("approval_monitor_findings_published_total 0\n"));
    }
}
