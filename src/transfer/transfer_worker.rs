use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::TransferEntry;
use super::TransferLog;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::ClusterManager;
use crate::Result;
use crate::TRANSFER_APPLIED;
use crate::TRANSFER_LOG_PENDING;

/// Outcome of one [`TransferWorker::run_pass`]
#[derive(Debug, Default)]
pub struct TransferReport {
    /// Another pass was already running; nothing was attempted
    pub skipped: bool,
    /// Entries acknowledged by their targets, in replay order
    pub applied: Vec<TransferEntry>,
    /// Targets left with pending entries
    pub blocked: Vec<String>,
}

impl TransferReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Replays pending transfer entries. At most one pass runs at a time.
#[derive(Debug)]
pub struct TransferWorker {
    member: String,
    policy: BackoffPolicy,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl TransferWorker {
    pub fn new(
        member: impl Into<String>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            member: member.into(),
            policy,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Replays the log target by target. Unreachable targets are skipped;
    /// a target's replay stops at its first failing entry so per-target
    /// order is kept.
    pub async fn run_pass(
        &self,
        cluster: &dyn ClusterManager,
        log: &dyn TransferLog,
    ) -> Result<TransferReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[{}] transfer pass already running, skip", self.member);
            return Ok(TransferReport::skipped());
        }
        let _guard = RunningGuard(&self.running);

        let mut report = TransferReport::default();
        for target in log.targets()? {
            if !cluster.is_reachable(&target) {
                trace!("[{}] {} still unreachable, keep its entries", self.member, target);
                report.blocked.push(target);
                continue;
            }

            for (seq, entry) in log.entries_for(&target)? {
                let result = task_with_timeout_and_exponential_backoff(
                    || cluster.send(&target, entry.request.clone()),
                    self.policy,
                )
                .await;

                match result {
                    Ok(_) => {
                        log.remove(seq)?;
                        TRANSFER_APPLIED.with_label_values(&[&self.member, &target]).inc();
                        debug!(
                            "[{}] replayed #{} {} {} on {}",
                            self.member,
                            seq,
                            entry.request.request_type,
                            entry.request.args_doc(),
                            target
                        );
                        report.applied.push(entry);
                    }
                    Err(e) => {
                        warn!("[{}] replay of #{} on {} failed: {:?}", self.member, seq, target, e);
                        report.blocked.push(target.clone());
                        break;
                    }
                }
            }
        }

        TRANSFER_LOG_PENDING
            .with_label_values(&[&self.member])
            .set(log.len()? as i64);
        Ok(report)
    }
}
