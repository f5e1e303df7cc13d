//! Batch runner with per-record ordering.
//!
//! The synchronizer does not guard against two notifications for the same
//! record racing each other. This runner does: notifications are grouped by
//! record, each group runs in delivery order inside a single task, and
//! groups for distinct records run concurrently on a `JoinSet`.
//!
//! ```ignore
//! let report = run_batch(Arc::new(sync), notifications, 4).await;
//! for entry in &report.entries { /* ... */ }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use teamsync_core::error::SyncResult;
use teamsync_core::{RecordId, StateChangeNotification};
use teamsync_directory::RecordStateStore;

use crate::synchronizer::{AccessSynchronizer, SyncOutcome};

/// Default number of records processed at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Result for one notification, tagged with its position in the input.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub notification: StateChangeNotification,
    pub result: SyncResult<SyncOutcome>,
}

/// All results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    /// Record groups whose task panicked; their entries are missing.
    pub panicked: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_err()).count()
    }
}

/// Runs `notifications` with at most `max_concurrent` records in flight.
pub async fn run_batch(
    sync: Arc<AccessSynchronizer>,
    notifications: Vec<StateChangeNotification>,
    max_concurrent: usize,
) -> BatchReport {
    run(sync, None, notifications, max_concurrent).await
}

/// Like [`run_batch`], but first writes each notification's `new_state` to
/// `store`, the way the host does before it notifies.
pub async fn run_batch_with_store(
    sync: Arc<AccessSynchronizer>,
    store: Arc<dyn RecordStateStore>,
    notifications: Vec<StateChangeNotification>,
    max_concurrent: usize,
) -> BatchReport {
    run(sync, Some(store), notifications, max_concurrent).await
}

async fn run(
    sync: Arc<AccessSynchronizer>,
    store: Option<Arc<dyn RecordStateStore>>,
    notifications: Vec<StateChangeNotification>,
    max_concurrent: usize,
) -> BatchReport {
    let max_concurrent = max_concurrent.max(1);
    let groups = group_by_record(notifications);

    tracing::info!(
        records = groups.len(),
        concurrency = max_concurrent,
        "running batch"
    );

    let mut report = BatchReport::default();
    let mut tasks = tokio::task::JoinSet::new();

    for (record_id, group) in groups {
        if tasks.len() >= max_concurrent {
            if let Some(joined) = tasks.join_next().await {
                collect(&mut report, joined);
            }
        }

        let sync = sync.clone();
        let store = store.clone();
        tasks.spawn(async move {
            let mut entries = Vec::with_capacity(group.len());
            for (index, notification) in group {
                if let Some(store) = &store {
                    if store
                        .set_record_state(record_id, notification.new_state)
                        .await
                        .is_none()
                    {
                        tracing::warn!(%record_id, index, "record not present in store");
                    }
                }
                let result = sync.on_state_change(notification).await;
                if let Err(e) = &result {
                    tracing::warn!(%record_id, index, error = %e, "notification failed");
                }
                entries.push(BatchEntry {
                    index,
                    notification,
                    result,
                });
            }
            entries
        });
    }

    while let Some(joined) = tasks.join_next().await {
        collect(&mut report, joined);
    }

    report.entries.sort_by_key(|e| e.index);
    tracing::info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        panicked = report.panicked,
        "batch done"
    );
    report
}

fn collect(report: &mut BatchReport, joined: Result<Vec<BatchEntry>, tokio::task::JoinError>) {
    match joined {
        Ok(entries) => report.entries.extend(entries),
        Err(e) => {
            tracing::warn!(error = %e, "record task panicked");
            report.panicked += 1;
        }
    }
}

/// Groups by record, keeping delivery order inside each group and ordering
/// groups by first appearance.
fn group_by_record(
    notifications: Vec<StateChangeNotification>,
) -> Vec<(RecordId, Vec<(usize, StateChangeNotification)>)> {
    let mut slot: HashMap<RecordId, usize> = HashMap::new();
    let mut groups: Vec<(RecordId, Vec<(usize, StateChangeNotification)>)> = Vec::new();

    for (index, n) in notifications.into_iter().enumerate() {
        let pos = *slot.entry(n.record_id).or_insert_with(|| {
            groups.push((n.record_id, Vec::new()));
            groups.len() - 1
        });
        groups[pos].1.push((index, n));
    }
    groups
}
