//! In-process directory backed by a [`DirectorySnapshot`].
//!
//! Implements the full [`DirectoryGateway`] contract and keeps per-operation
//! call counts, so callers can check that a run made no mutations. Any
//! operation can be made to fail with [`MemoryDirectory::fail_on`].
//!
//! ```ignore
//! let dir = Arc::new(MemoryDirectory::new());
//! let template = dir.add_template("Security team template").await;
//! let team = dir.add_team("Secret Team").await;
//! dir.add_member(team, PrincipalId::new()).await;
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use teamsync_core::error::{GatewayError, GatewayResult};
use teamsync_core::{
    AccessTemplate, Membership, PrincipalId, Record, RecordAccessGrant, RecordId, RecordState,
    Team, TeamId, TemplateId,
};
use tokio::sync::RwLock;

use crate::snapshot::DirectorySnapshot;
use crate::{DirectoryGateway, GatewayOp, RecordStateStore};

/// Call counts observed by a [`MemoryDirectory`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub by_op: BTreeMap<GatewayOp, u64>,
}

impl GatewayStats {
    pub fn count(&self, op: GatewayOp) -> u64 {
        self.by_op.get(&op).copied().unwrap_or(0)
    }

    pub fn mutations(&self) -> u64 {
        self.by_op
            .iter()
            .filter(|(op, _)| op.is_mutation())
            .map(|(_, n)| n)
            .sum()
    }

    pub fn total(&self) -> u64 {
        self.by_op.values().sum()
    }
}

#[derive(Debug, Default)]
struct Inner {
    templates: Vec<AccessTemplate>,
    teams: Vec<Team>,
    records: HashMap<RecordId, Record>,
    memberships: BTreeSet<Membership>,
    grants: BTreeSet<RecordAccessGrant>,
    stats: GatewayStats,
    faults: HashSet<GatewayOp>,
}

impl Inner {
    /// Counts the call, then fails it if a fault is armed for `op`.
    fn enter(&mut self, op: GatewayOp) -> GatewayResult<()> {
        *self.stats.by_op.entry(op).or_default() += 1;
        if self.faults.contains(&op) {
            return Err(GatewayError::Unavailable(format!("injected fault on {op}")));
        }
        Ok(())
    }
}

/// Thread-safe in-memory directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    inner: RwLock<Inner>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: DirectorySnapshot) -> Self {
        let inner = Inner {
            templates: snapshot.templates,
            teams: snapshot.teams,
            records: snapshot.records.into_iter().map(|r| (r.id, r)).collect(),
            memberships: snapshot.memberships.into_iter().collect(),
            grants: snapshot.grants.into_iter().collect(),
            ..Inner::default()
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Current contents, records sorted by id.
    pub async fn snapshot(&self) -> DirectorySnapshot {
        let inner = self.inner.read().await;
        let mut records: Vec<Record> = inner.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        DirectorySnapshot {
            templates: inner.templates.clone(),
            teams: inner.teams.clone(),
            records,
            memberships: inner.memberships.iter().copied().collect(),
            grants: inner.grants.iter().copied().collect(),
        }
    }

    // -- Fixture setup ------------------------------------------------------

    pub async fn add_template(&self, name: &str) -> TemplateId {
        let id = TemplateId::new();
        self.inner.write().await.templates.push(AccessTemplate {
            id,
            name: name.to_string(),
        });
        id
    }

    pub async fn add_team(&self, name: &str) -> TeamId {
        let id = TeamId::new();
        self.inner.write().await.teams.push(Team {
            id,
            name: name.to_string(),
        });
        id
    }

    pub async fn add_member(&self, team_id: TeamId, principal_id: PrincipalId) {
        self.inner.write().await.memberships.insert(Membership {
            team_id,
            principal_id,
        });
    }

    pub async fn add_record(&self, owner_id: PrincipalId, state: RecordState) -> RecordId {
        let id = RecordId::new();
        self.inner.write().await.records.insert(
            id,
            Record {
                id,
                state,
                owner_id,
            },
        );
        id
    }

    /// Flips a record's state the way the host does before notifying.
    /// Returns the previous state, or `None` for an unknown record.
    pub async fn set_record_state(
        &self,
        record_id: RecordId,
        state: RecordState,
    ) -> Option<RecordState> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&record_id)?;
        Some(std::mem::replace(&mut record.state, state))
    }

    pub async fn record(&self, record_id: RecordId) -> Option<Record> {
        self.inner.read().await.records.get(&record_id).cloned()
    }

    /// Seeds a grant without counting it as a gateway mutation.
    pub async fn insert_grant(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
        principal_id: PrincipalId,
    ) {
        self.inner.write().await.grants.insert(RecordAccessGrant {
            record_id,
            template_id,
            principal_id,
        });
    }

    /// Grant holders without touching the call counters.
    pub async fn holders(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
    ) -> BTreeSet<PrincipalId> {
        holders_of(&self.inner.read().await.grants, record_id, template_id)
    }

    pub async fn grant_count(&self) -> usize {
        self.inner.read().await.grants.len()
    }

    // -- Accounting and faults ---------------------------------------------

    pub async fn stats(&self) -> GatewayStats {
        self.inner.read().await.stats.clone()
    }

    pub async fn reset_stats(&self) {
        self.inner.write().await.stats = GatewayStats::default();
    }

    /// Makes every subsequent call of `op` fail with `GatewayError::Unavailable`.
    pub async fn fail_on(&self, op: GatewayOp) {
        self.inner.write().await.faults.insert(op);
    }

    pub async fn clear_faults(&self) {
        self.inner.write().await.faults.clear();
    }
}

fn holders_of(
    grants: &BTreeSet<RecordAccessGrant>,
    record_id: RecordId,
    template_id: TemplateId,
) -> BTreeSet<PrincipalId> {
    grants
        .iter()
        .filter(|g| g.record_id == record_id && g.template_id == template_id)
        .map(|g| g.principal_id)
        .collect()
}

#[async_trait]
impl DirectoryGateway for MemoryDirectory {
    async fn find_template_by_name(&self, name: &str) -> GatewayResult<Option<TemplateId>> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::FindTemplateByName)?;
        Ok(inner.templates.iter().find(|t| t.name == name).map(|t| t.id))
    }

    async fn find_team_by_name(&self, name: &str) -> GatewayResult<Option<TeamId>> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::FindTeamByName)?;
        Ok(inner.teams.iter().find(|t| t.name == name).map(|t| t.id))
    }

    async fn get_team_members(&self, team_id: TeamId) -> GatewayResult<BTreeSet<PrincipalId>> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::GetTeamMembers)?;
        Ok(inner
            .memberships
            .iter()
            .filter(|m| m.team_id == team_id)
            .map(|m| m.principal_id)
            .collect())
    }

    async fn get_record_owner(&self, record_id: RecordId) -> GatewayResult<Option<PrincipalId>> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::GetRecordOwner)?;
        Ok(inner.records.get(&record_id).map(|r| r.owner_id))
    }

    async fn get_record_grant_holders(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
    ) -> GatewayResult<BTreeSet<PrincipalId>> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::GetRecordGrantHolders)?;
        Ok(holders_of(&inner.grants, record_id, template_id))
    }

    async fn grant_access(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
        principal_id: PrincipalId,
    ) -> GatewayResult<()> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::GrantAccess)?;
        if !inner.records.contains_key(&record_id) {
            return Err(GatewayError::Rejected(format!("unknown record {record_id}")));
        }
        let inserted = inner.grants.insert(RecordAccessGrant {
            record_id,
            template_id,
            principal_id,
        });
        tracing::trace!(%record_id, %principal_id, inserted, "grant_access");
        Ok(())
    }

    async fn revoke_access(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
        principal_id: PrincipalId,
    ) -> GatewayResult<()> {
        let mut inner = self.inner.write().await;
        inner.enter(GatewayOp::RevokeAccess)?;
        let removed = inner.grants.remove(&RecordAccessGrant {
            record_id,
            template_id,
            principal_id,
        });
        tracing::trace!(%record_id, %principal_id, removed, "revoke_access");
        Ok(())
    }
}

#[async_trait]
impl RecordStateStore for MemoryDirectory {
    async fn set_record_state(
        &self,
        record_id: RecordId,
        state: RecordState,
    ) -> Option<RecordState> {
        MemoryDirectory::set_record_state(self, record_id, state).await
    }
}
