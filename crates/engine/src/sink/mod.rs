//! Audit rows for applied access changes.
//!
//! Two row schemas:
//! - [`SyncSummaryRow`]: one per processed notification
//! - [`GrantChangeRow`]: one per grant added or removed (denormalized)
//!
//! Backend: NDJSON stream to any `Write` impl.

pub mod json_stream;

use serde::Serialize;

use crate::reporter::SyncReport;
use crate::synchronizer::SyncAction;
use teamsync_core::PrincipalId;

// ---------------------------------------------------------------------------
// Serializable row types
// ---------------------------------------------------------------------------

/// One row per notification.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummaryRow {
    pub record_id: String,
    pub new_state: String,
    pub action: SyncAction,
    pub granted: u64,
    pub revoked: u64,
    pub owner_retained: bool,
    pub elapsed_ms: u64,
    pub created_at: String,
}

/// Direction of a single grant change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Grant,
    Revoke,
}

/// One row per applied grant or revoke. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct GrantChangeRow {
    pub record_id: String,
    pub template_id: String,
    pub principal_id: String,
    pub change: ChangeKind,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Builder: Report -> Rows
// ---------------------------------------------------------------------------

impl SyncReport {
    /// Flatten the report into sink-ready rows.
    pub fn to_rows(&self) -> (SyncSummaryRow, Vec<GrantChangeRow>) {
        let now = chrono::Utc::now().to_rfc3339();

        let summary = SyncSummaryRow {
            record_id: self.record_id.to_string(),
            new_state: self.new_state.to_string(),
            action: self.action,
            granted: saturating_u64(self.granted()),
            revoked: saturating_u64(self.revoked()),
            owner_retained: self.owner_retained(),
            elapsed_ms: saturating_u64(self.elapsed.as_millis()),
            created_at: now.clone(),
        };

        let changes = match &self.delta {
            Some(delta) => {
                let row = |principal: &PrincipalId, change: ChangeKind| GrantChangeRow {
                    record_id: delta.record_id.to_string(),
                    template_id: delta.template_id.to_string(),
                    principal_id: principal.to_string(),
                    change,
                    created_at: now.clone(),
                };
                delta
                    .grants
                    .iter()
                    .map(|p| row(p, ChangeKind::Grant))
                    .chain(delta.revocations.iter().map(|p| row(p, ChangeKind::Revoke)))
                    .collect()
            }
            None => Vec::new(),
        };

        (summary, changes)
    }
}

fn saturating_u64<T: TryInto<u64>>(n: T) -> u64 {
    n.try_into().unwrap_or(u64::MAX)
}
