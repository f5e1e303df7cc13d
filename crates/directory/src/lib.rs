//! Directory gateway abstraction and an in-memory directory for teamsync.
//!
//! The gateway exposes named lookups and mutations only; whatever query
//! language a real directory speaks stays behind this boundary.

pub mod memory;
pub mod snapshot;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use teamsync_core::error::GatewayResult;
use teamsync_core::{PrincipalId, RecordId, RecordState, TeamId, TemplateId};

pub use memory::{GatewayStats, MemoryDirectory};
pub use snapshot::{DirectorySnapshot, SnapshotError};

/// Lookups and mutations over teams, templates, memberships, and grants.
#[async_trait]
pub trait DirectoryGateway: Send + Sync {
    async fn find_template_by_name(&self, name: &str) -> GatewayResult<Option<TemplateId>>;
    async fn find_team_by_name(&self, name: &str) -> GatewayResult<Option<TeamId>>;
    async fn get_team_members(&self, team_id: TeamId) -> GatewayResult<BTreeSet<PrincipalId>>;
    async fn get_record_owner(&self, record_id: RecordId) -> GatewayResult<Option<PrincipalId>>;

    /// Principals currently holding a grant on `record_id` under `template_id`.
    async fn get_record_grant_holders(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
    ) -> GatewayResult<BTreeSet<PrincipalId>>;

    /// Idempotent: granting an existing grant is a no-op.
    async fn grant_access(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
        principal_id: PrincipalId,
    ) -> GatewayResult<()>;

    /// Idempotent: revoking an absent grant is a no-op.
    async fn revoke_access(
        &self,
        record_id: RecordId,
        template_id: TemplateId,
        principal_id: PrincipalId,
    ) -> GatewayResult<()>;
}

/// Answers "who owns this record".
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    async fn resolve_owner(&self, record_id: RecordId) -> GatewayResult<Option<PrincipalId>>;
}

/// Resolves owners through a gateway's `get_record_owner`.
#[derive(Clone)]
pub struct GatewayOwnerResolver {
    gateway: Arc<dyn DirectoryGateway>,
}

impl GatewayOwnerResolver {
    pub fn new(gateway: Arc<dyn DirectoryGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl OwnerResolver for GatewayOwnerResolver {
    async fn resolve_owner(&self, record_id: RecordId) -> GatewayResult<Option<PrincipalId>> {
        self.gateway.get_record_owner(record_id).await
    }
}

/// Host-side record store. The host writes the new state here before it
/// delivers the notification.
#[async_trait]
pub trait RecordStateStore: Send + Sync {
    /// Returns the state it replaced, or `None` for an unknown record.
    async fn set_record_state(&self, record_id: RecordId, state: RecordState)
        -> Option<RecordState>;
}

/// Gateway operation names, used for call accounting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GatewayOp {
    FindTemplateByName,
    FindTeamByName,
    GetTeamMembers,
    GetRecordOwner,
    GetRecordGrantHolders,
    GrantAccess,
    RevokeAccess,
}

impl GatewayOp {
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::GrantAccess | Self::RevokeAccess)
    }
}

impl fmt::Display for GatewayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FindTemplateByName => "find_template_by_name",
            Self::FindTeamByName => "find_team_by_name",
            Self::GetTeamMembers => "get_team_members",
            Self::GetRecordOwner => "get_record_owner",
            Self::GetRecordGrantHolders => "get_record_grant_holders",
            Self::GrantAccess => "grant_access",
            Self::RevokeAccess => "revoke_access",
        })
    }
}
