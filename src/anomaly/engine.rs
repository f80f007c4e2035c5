use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{ApprovalMonitorConfig, QuotaScope};
use crate::indexer::decoder::APPROVAL_SIGNATURE;
use crate::indexer::source::ApprovalSource;
use crate::indexer::types::ApprovalEvent;

use super::rules::{self, Thresholds};
use super::types::Finding;

/// Approval counts accumulated since the last reset.
#[derive(Debug, Default)]
struct ApprovalCounterState {
    counts: HashMap<Address, u64>,
    findings_emitted: u64,
}

impl ApprovalCounterState {
    fn record_and_classify(&mut self, token: Address, thresholds: &Thresholds) -> Option<Finding> {
        let count = self.counts.entry(token).or_insert(0);
        *count += 1;
        rules::check_approval_frequency(&token, *count, thresholds)
    }
}

/// Counts ERC-20 approvals per token contract and raises findings for tokens
/// approved unusually often within the reset window.
///
/// All state sits behind one lock. A transaction is processed entirely under
/// that lock, so the periodic reset lands either before or after it, never
/// in the middle.
pub struct ApprovalMonitor {
    state: Mutex<ApprovalCounterState>,
    thresholds: Thresholds,
    max_findings: usize,
    quota_scope: QuotaScope,
    token_filter: Option<Address>,
    reset_interval: Duration,
}

impl ApprovalMonitor {
    pub fn new(config: &ApprovalMonitorConfig) -> eyre::Result<Self> {
        Ok(Self {
            state: Mutex::new(ApprovalCounterState::default()),
            thresholds: Thresholds::from(config),
            max_findings: config.max_findings,
            quota_scope: config.quota_scope,
            token_filter: config.token_filter_address()?,
            reset_interval: config.reset_interval(),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, ApprovalCounterState> {
        // Counts are plain integers, consistent between statements.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count every approval in one transaction and return the resulting findings.
    ///
    /// A token crossing the emission floor several times within the same
    /// transaction yields a single finding, placed where it first crossed and
    /// carrying its final count. At most `max_findings` are returned. Under
    /// [`QuotaScope::Cumulative`] the monitor goes quiet for good once
    /// `max_findings` have been emitted in total, without consulting the source.
    pub fn handle_transaction(&self, source: &dyn ApprovalSource) -> Vec<Finding> {
        let mut state = self.lock_state();

        if self.quota_scope == QuotaScope::Cumulative
            && state.findings_emitted >= self.max_findings as u64
        {
            tracing::debug!(
                emitted = state.findings_emitted,
                max_findings = self.max_findings,
                "Finding quota reached, skipping transaction"
            );
            return Vec::new();
        }

        let events = source.filter_log(APPROVAL_SIGNATURE, self.token_filter);

        let mut findings: Vec<Finding> = Vec::new();
        let mut slots: HashMap<Address, usize> = HashMap::new();

        for event in &events {
            let Some(finding) = state.record_and_classify(event.token, &self.thresholds) else {
                continue;
            };
            match slots.get(&event.token) {
                Some(&slot) => findings[slot] = finding,
                None => {
                    slots.insert(event.token, findings.len());
                    findings.push(finding);
                }
            }
        }

        if findings.len() > self.max_findings {
            tracing::debug!(
                candidates = findings.len(),
                max_findings = self.max_findings,
                "Truncating findings for transaction"
            );
            findings.truncate(self.max_findings);
        }

        state.findings_emitted += findings.len() as u64;
        findings
    }

    /// Count a single approval and classify the token's updated total.
    /// Does not draw on the finding quota.
    pub fn record_and_classify(&self, event: &ApprovalEvent) -> Option<Finding> {
        if self.token_filter.is_some_and(|token| token != event.token) {
            return None;
        }
        self.lock_state()
            .record_and_classify(event.token, &self.thresholds)
    }

    /// Clear every approval count. Returns how many tokens were being tracked.
    pub fn reset(&self) -> usize {
        let mut state = self.lock_state();
        let tracked = state.counts.len();
        state.counts.clear();
        tracked
    }

    pub fn approval_count(&self, token: &Address) -> u64 {
        self.lock_state().counts.get(token).copied().unwrap_or(0)
    }

    pub fn tracked_tokens(&self) -> usize {
        self.lock_state().counts.len()
    }

    pub fn findings_emitted(&self) -> u64 {
        self.lock_state().findings_emitted
    }

    /// Spawn the task that clears all counts every `reset_interval`.
    /// The first reset happens one full interval after spawning.
    pub fn spawn_reset_task(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let period = self.reset_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let tracked = monitor.reset();
                        tracing::info!(
                            tracked_tokens = tracked,
                            interval_secs = period.as_secs(),
                            "Approval counts reset"
                        );
                    }
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Shutdown received, stopping approval reset task");
                        break;
                    }
                }
            }
        })
    }
}

/// Wait for the reset task to stop. A panic inside it is logged rather than
/// dropped. Returns whether the task exited cleanly.
pub async fn join_reset_task(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Approval reset task failed");
            false
        }
    }
}
