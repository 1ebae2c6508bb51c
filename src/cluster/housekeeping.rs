//! Periodic repair of one member.
//!
//! A housekeeping pass replays the transfer log and then sweeps the
//! locations and roots this member wrote itself: a replica whose last
//! acknowledged version lags behind the local one, and which has nothing
//! pending in the transfer log, gets a repair entry. The entry is replayed
//! by the next pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::DataRequest;
use super::MemberNode;
use super::RequestType;
use crate::Location;
use crate::NetworkError;
use crate::Result;
use crate::TransferEntry;
use crate::TransferReport;
use crate::TransferSeq;
use crate::HOUSEKEEPING_RUNS;
use crate::REPAIR_ENQUEUED;

#[derive(Debug, Default)]
pub struct HousekeepingReport {
    pub transfer: TransferReport,
    /// Repair entries queued by the sweep
    pub repairs: usize,
}

impl MemberNode {
    /// One housekeeping pass: transfer replay followed by the consistency
    /// sweep.
    pub async fn housekeeping(&self) -> Result<HousekeepingReport> {
        let transfer = self.transfer_pass().await?;
        let repairs = self.consistency_sweep()?;
        HOUSEKEEPING_RUNS.with_label_values(&[&self.member.name]).inc();
        Ok(HousekeepingReport { transfer, repairs })
    }

    /// Replays pending transfers. Skipped if a pass is already running.
    pub async fn transfer_pass(&self) -> Result<TransferReport> {
        let report = self
            .transfer_worker
            .run_pass(self.cluster.as_ref(), self.transfer_log.as_ref())
            .await?;
        for entry in &report.applied {
            self.record_ack(&entry.target, &entry.request);
        }
        Ok(report)
    }

    pub(crate) fn consistency_sweep(&self) -> Result<usize> {
        let members = self.cluster.members();
        let pending = self.transfer_log.entries()?;
        let mut repairs = 0;

        let touched: Vec<(String, Location)> = self.touched.lock().iter().cloned().collect();
        for (store_name, loc) in touched {
            let store = self.store(&store_name);
            let local = store.translation(loc);
            let targets = self.distribution.members_for(&members, &store_name, loc);

            let mut converged = true;
            for target in targets.iter().filter(|m| m.name != self.member.name) {
                if has_pending_write(&pending, &target.name, &store_name, loc) {
                    converged = false;
                    continue;
                }
                let acked = self
                    .acked
                    .get(&(target.name.clone(), store_name.clone(), loc))
                    .map(|v| *v);

                let repair = match (local, acked) {
                    (Some(current), Some(version)) if version >= current.version => None,
                    (Some(current), _) => match store.storage.fetch(current.local) {
                        Ok(value) => Some(DataRequest::transfer_update(
                            &store_name,
                            loc,
                            current.version,
                            value,
                        )),
                        Err(e) => {
                            warn!("[{}] can not read {}/{} for repair: {:?}", self.member.name, store_name, loc, e);
                            converged = false;
                            None
                        }
                    },
                    (None, Some(_)) => Some(DataRequest::transfer_free(&store_name, loc)),
                    (None, None) => None,
                };

                if let Some(request) = repair {
                    debug!(
                        "[{}] repair {} {} for {}",
                        self.member.name,
                        request.request_type,
                        request.args_doc(),
                        target.name
                    );
                    self.enqueue(&target.name, request);
                    REPAIR_ENQUEUED
                        .with_label_values(&[&self.member.name, &target.name])
                        .inc();
                    repairs += 1;
                    converged = false;
                }
            }

            if converged {
                self.touched.lock().remove(&(store_name, loc));
            }
        }

        let touched_roots: Vec<(String, usize)> = self.touched_roots.lock().iter().cloned().collect();
        for (store_name, index) in touched_roots {
            let store = self.store(&store_name);
            let local = store.storage.root(index)?;

            let mut converged = true;
            for target in members.iter().filter(|m| m.name != self.member.name) {
                if has_pending_root(&pending, &target.name, &store_name, index) {
                    converged = false;
                    continue;
                }
                let acked = self
                    .acked_roots
                    .get(&(target.name.clone(), store_name.clone(), index))
                    .map(|v| *v);
                if acked != Some(local) {
                    self.enqueue(&target.name, DataRequest::transfer_set_root(&store_name, index, local));
                    REPAIR_ENQUEUED
                        .with_label_values(&[&self.member.name, &target.name])
                        .inc();
                    repairs += 1;
                    converged = false;
                }
            }

            if converged {
                self.touched_roots.lock().remove(&(store_name, index));
            }
        }

        Ok(repairs)
    }

    /// Starts the periodic worker with this member's housekeeping interval
    pub fn start_housekeeping(self: &Arc<Self>) -> HousekeepingHandle {
        HousekeepingWorker::new(
            self.clone(),
            Duration::from_millis(self.housekeeping_config.interval_ms),
        )
        .start()
    }
}

fn has_pending_write(
    pending: &[(TransferSeq, TransferEntry)],
    target: &str,
    store: &str,
    loc: Location,
) -> bool {
    pending.iter().any(|(_, entry)| {
        entry.target == target
            && entry.request.store_name() == store
            && entry.request.args.loc == Some(loc)
            && matches!(
                entry.request.request_type,
                RequestType::Insert | RequestType::Update | RequestType::Free
            )
    })
}

fn has_pending_root(
    pending: &[(TransferSeq, TransferEntry)],
    target: &str,
    store: &str,
    index: usize,
) -> bool {
    pending.iter().any(|(_, entry)| {
        entry.target == target
            && entry.request.store_name() == store
            && entry.request.request_type == RequestType::SetRoot
            && entry.request.args.root_index == Some(index)
    })
}

/// Runs [`MemberNode::housekeeping`] on a fixed interval
pub struct HousekeepingWorker {
    node: Arc<MemberNode>,
    interval: Duration,
}

impl HousekeepingWorker {
    pub fn new(
        node: Arc<MemberNode>,
        interval: Duration,
    ) -> Self {
        Self { node, interval }
    }

    pub fn start(self) -> HousekeepingHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let member = self.node.name().to_string();
        info!("[{}] start housekeeping every {:?}", member, self.interval);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("[{}] housekeeping received shutdown signal", member);
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.node.housekeeping().await {
                            error!("[{}] housekeeping failed: {:?}", member, e);
                        }
                    }
                }
            }
        });

        HousekeepingHandle {
            shutdown_tx,
            handle: Some(handle),
        }
    }
}

/// Stops the periodic worker. Dropping the handle aborts it.
pub struct HousekeepingHandle {
    shutdown_tx: watch::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl HousekeepingHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Lets a running pass complete, then waits for the worker to exit
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .map_err(|e| NetworkError::SignalSendFailed(format!("{:?}", e)))?;
        if let Some(handle) = self.handle.take() {
            handle.await.map_err(NetworkError::TaskFailed)?;
        }
        Ok(())
    }
}

impl Drop for HousekeepingHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
