//! Membership delta planning.
//!
//! Pure functions: given what the directory reported, decide which grants
//! to add or remove. Principals come out sorted because the inputs are
//! `BTreeSet`s, so applying a delta touches the gateway in a stable order.

use serde::Serialize;
use std::collections::BTreeSet;
use teamsync_core::{PrincipalId, RecordId, TemplateId};

/// Grants to add and remove for one record's access team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipDelta {
    pub record_id: RecordId,
    pub template_id: TemplateId,
    pub grants: Vec<PrincipalId>,
    pub revocations: Vec<PrincipalId>,
    /// Owner found among the holders and deliberately kept.
    pub retained_owner: Option<PrincipalId>,
}

impl MembershipDelta {
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.revocations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grants.len() + self.revocations.len()
    }
}

/// Every team member gets a grant. Existing grants are re-asserted; the
/// gateway treats them as no-ops.
pub fn plan_grant(
    record_id: RecordId,
    template_id: TemplateId,
    members: &BTreeSet<PrincipalId>,
) -> MembershipDelta {
    MembershipDelta {
        record_id,
        template_id,
        grants: members.iter().copied().collect(),
        revocations: Vec::new(),
        retained_owner: None,
    }
}

/// Every holder except the owner loses its grant.
pub fn plan_revoke(
    record_id: RecordId,
    template_id: TemplateId,
    holders: &BTreeSet<PrincipalId>,
    owner_id: PrincipalId,
) -> MembershipDelta {
    MembershipDelta {
        record_id,
        template_id,
        grants: Vec::new(),
        revocations: holders.iter().copied().filter(|p| *p != owner_id).collect(),
        retained_owner: holders.contains(&owner_id).then_some(owner_id),
    }
}
