//! Access synchronizer.
//!
//! Reacts to one record state change at a time: deactivation grants the
//! well-known team access to the record, activation revokes everyone but the
//! owner. Every directory call is awaited in order; nothing is cached between
//! invocations.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use teamsync_core::error::{GatewayError, SyncError, SyncPhase, SyncResult};
use teamsync_core::{
    ConfigItem, PrincipalId, RecordId, RecordState, StateChangeNotification, SyncConfig,
    TemplateId,
};
use teamsync_directory::{DirectoryGateway, GatewayOwnerResolver, OwnerResolver};

use crate::plan::{plan_grant, plan_revoke, MembershipDelta};

/// What a notification resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// Team members were granted access (record deactivated).
    Granted,
    /// Non-owner grants were removed (record activated).
    Revoked,
    /// The host reported no transition; nothing was touched.
    Unchanged,
}

/// Result of one successful `on_state_change`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub record_id: RecordId,
    pub new_state: RecordState,
    pub action: SyncAction,
    /// Applied delta; `None` for [`SyncAction::Unchanged`].
    pub delta: Option<MembershipDelta>,
}

/// Keeps a record's access team in line with its lifecycle state.
///
/// ```ignore
/// let sync = AccessSynchronizer::new(gateway, SyncConfig::default());
/// let outcome = sync.on_state_change(notification).await?;
/// ```
pub struct AccessSynchronizer {
    gateway: Arc<dyn DirectoryGateway>,
    owners: Arc<dyn OwnerResolver>,
    config: SyncConfig,
}

impl AccessSynchronizer {
    /// Owners are resolved through the same gateway.
    pub fn new(gateway: Arc<dyn DirectoryGateway>, config: SyncConfig) -> Self {
        let owners = Arc::new(GatewayOwnerResolver::new(gateway.clone()));
        Self {
            gateway,
            owners,
            config,
        }
    }

    /// Replace the owner resolver.
    pub fn with_owner_resolver(mut self, owners: Arc<dyn OwnerResolver>) -> Self {
        self.owners = owners;
        self
    }

    /// Applies the access policy for one state change.
    ///
    /// Errors abort the invocation. Configuration errors are raised before
    /// any mutation; a gateway failure while applying leaves earlier
    /// mutations in place.
    pub async fn on_state_change(
        &self,
        notification: StateChangeNotification,
    ) -> SyncResult<SyncOutcome> {
        let record_id = notification.record_id;
        let new_state = notification.new_state;

        if notification.is_unchanged() {
            tracing::debug!(%record_id, state = %new_state, "state unchanged, skipping");
            return Ok(SyncOutcome {
                record_id,
                new_state,
                action: SyncAction::Unchanged,
                delta: None,
            });
        }

        let (action, delta) = match new_state {
            RecordState::Active => (SyncAction::Revoked, self.revoke(record_id).await?),
            RecordState::Inactive => (SyncAction::Granted, self.grant(record_id).await?),
        };

        tracing::info!(
            %record_id,
            state = %new_state,
            granted = delta.grants.len(),
            revoked = delta.revocations.len(),
            owner_retained = delta.retained_owner.is_some(),
            "access synchronized"
        );

        Ok(SyncOutcome {
            record_id,
            new_state,
            action,
            delta: Some(delta),
        })
    }

    /// Deactivated: every team member gets a grant on the record.
    async fn grant(&self, record_id: RecordId) -> SyncResult<MembershipDelta> {
        let template_id = self.resolve_template(record_id).await?;

        let team_name = &self.config.team_name;
        let team_id = self
            .gateway
            .find_team_by_name(team_name)
            .await
            .map_err(gateway_err(SyncPhase::ResolveTeam, record_id))?
            .ok_or_else(|| SyncError::Configuration {
                phase: SyncPhase::ResolveTeam,
                record_id,
                item: ConfigItem::Team,
                name: team_name.clone(),
            })?;

        let members = self
            .gateway
            .get_team_members(team_id)
            .await
            .map_err(gateway_err(SyncPhase::ResolveMembers, record_id))?;

        if members.is_empty() {
            tracing::info!(%record_id, team = %team_name, "team has no members, nothing to grant");
        }

        let delta = plan_grant(record_id, template_id, &members);
        for &principal_id in &delta.grants {
            tracing::debug!(%record_id, %principal_id, "granting access");
            self.gateway
                .grant_access(record_id, template_id, principal_id)
                .await
                .map_err(gateway_err(SyncPhase::Grant, record_id))?;
        }
        Ok(delta)
    }

    /// Activated: every holder except the owner loses its grant.
    async fn revoke(&self, record_id: RecordId) -> SyncResult<MembershipDelta> {
        let template_id = self.resolve_template(record_id).await?;
        let owner_id = self.resolve_owner(record_id).await?;

        let holders: BTreeSet<PrincipalId> = self
            .gateway
            .get_record_grant_holders(record_id, template_id)
            .await
            .map_err(gateway_err(SyncPhase::ResolveGrantHolders, record_id))?;

        // An access team with nobody in it was never provisioned.
        if holders.is_empty() {
            return Err(SyncError::NotFound {
                phase: SyncPhase::ResolveGrantHolders,
                record_id,
                what: "no users found to revoke".into(),
            });
        }

        let delta = plan_revoke(record_id, template_id, &holders, owner_id);
        for &principal_id in &delta.revocations {
            tracing::debug!(%record_id, %principal_id, "revoking access");
            self.gateway
                .revoke_access(record_id, template_id, principal_id)
                .await
                .map_err(gateway_err(SyncPhase::Revoke, record_id))?;
        }
        Ok(delta)
    }

    async fn resolve_template(&self, record_id: RecordId) -> SyncResult<TemplateId> {
        let name = &self.config.template_name;
        self.gateway
            .find_template_by_name(name)
            .await
            .map_err(gateway_err(SyncPhase::ResolveTemplate, record_id))?
            .ok_or_else(|| SyncError::Configuration {
                phase: SyncPhase::ResolveTemplate,
                record_id,
                item: ConfigItem::Template,
                name: name.clone(),
            })
    }

    async fn resolve_owner(&self, record_id: RecordId) -> SyncResult<PrincipalId> {
        self.owners
            .resolve_owner(record_id)
            .await
            .map_err(gateway_err(SyncPhase::ResolveOwner, record_id))?
            .ok_or_else(|| SyncError::NotFound {
                phase: SyncPhase::ResolveOwner,
                record_id,
                what: "record not found".into(),
            })
    }
}

fn gateway_err(phase: SyncPhase, record_id: RecordId) -> impl FnOnce(GatewayError) -> SyncError {
    move |source| SyncError::Gateway {
        phase,
        record_id,
        source,
    }
}
