//! End-to-end synchronizer scenarios against the in-memory directory.
//!
//! Run: `cargo test -p teamsync-engine --test scenarios`

use std::collections::BTreeSet;
use std::sync::Arc;

use teamsync_core::error::GatewayError;
use teamsync_core::{
    PrincipalId, RecordId, RecordState, StateChangeNotification, SyncConfig, SyncError,
    SyncPhase, TeamId, TemplateId,
};
use teamsync_directory::{GatewayOp, MemoryDirectory};
use teamsync_engine::{AccessSynchronizer, SyncAction};

struct Fixture {
    dir: Arc<MemoryDirectory>,
    sync: AccessSynchronizer,
    template: TemplateId,
    team: TeamId,
}

impl Fixture {
    async fn new() -> Self {
        let dir = Arc::new(MemoryDirectory::new());
        let template = dir.add_template("Security team template").await;
        let team = dir.add_team("Secret Team").await;
        let sync = AccessSynchronizer::new(dir.clone(), SyncConfig::default());
        Self {
            dir,
            sync,
            template,
            team,
        }
    }

    async fn team_of(&self, members: &[PrincipalId]) {
        for &m in members {
            self.dir.add_member(self.team, m).await;
        }
    }

    async fn holders(&self, record: RecordId) -> BTreeSet<PrincipalId> {
        self.dir.holders(record, self.template).await
    }

    async fn deactivate(&self, record: RecordId) -> Result<teamsync_engine::SyncOutcome, SyncError> {
        self.dir.set_record_state(record, RecordState::Inactive).await;
        self.sync
            .on_state_change(StateChangeNotification::new(record, RecordState::Inactive))
            .await
    }

    async fn activate(&self, record: RecordId) -> Result<teamsync_engine::SyncOutcome, SyncError> {
        self.dir.set_record_state(record, RecordState::Active).await;
        self.sync
            .on_state_change(StateChangeNotification::new(record, RecordState::Active))
            .await
    }
}

fn users(n: usize) -> Vec<PrincipalId> {
    (1..=n as u128).map(PrincipalId::from_u128).collect()
}

#[tokio::test]
async fn scenario_a_deactivation_grants_whole_team() {
    let fx = Fixture::new().await;
    let u = users(3);
    fx.team_of(&u).await;
    let record = fx.dir.add_record(PrincipalId::from_u128(99), RecordState::Active).await;

    let outcome = fx.deactivate(record).await.unwrap();

    assert_eq!(outcome.action, SyncAction::Granted);
    assert_eq!(fx.holders(record).await, u.iter().copied().collect());
}

#[tokio::test]
async fn scenario_b_activation_keeps_only_owner() {
    let fx = Fixture::new().await;
    let u = users(3);
    let record = fx.dir.add_record(u[1], RecordState::Inactive).await;
    for &p in &u {
        fx.dir.insert_grant(record, fx.template, p).await;
    }

    let outcome = fx.activate(record).await.unwrap();

    assert_eq!(outcome.action, SyncAction::Revoked);
    assert_eq!(fx.holders(record).await, BTreeSet::from([u[1]]));
    let delta = outcome.delta.unwrap();
    assert_eq!(delta.revocations, vec![u[0], u[2]]);
    assert_eq!(delta.retained_owner, Some(u[1]));
}

#[tokio::test]
async fn scenario_c_missing_template_makes_no_mutations() {
    let dir = Arc::new(MemoryDirectory::new());
    let team = dir.add_team("Secret Team").await;
    dir.add_member(team, PrincipalId::new()).await;
    let record = dir.add_record(PrincipalId::new(), RecordState::Inactive).await;
    let sync = AccessSynchronizer::new(dir.clone(), SyncConfig::default());

    for state in [RecordState::Inactive, RecordState::Active] {
        let err = sync
            .on_state_change(StateChangeNotification::new(record, state))
            .await
            .unwrap_err();
        assert!(err.is_fatal_configuration());
        assert_eq!(err.phase(), Some(SyncPhase::ResolveTemplate));
        assert_eq!(err.record_id(), Some(record));
    }

    assert_eq!(dir.stats().await.mutations(), 0);
    assert_eq!(dir.grant_count().await, 0);
}

#[tokio::test]
async fn scenario_d_empty_team_is_a_no_op() {
    let fx = Fixture::new().await;
    let owner = PrincipalId::from_u128(7);
    let record = fx.dir.add_record(owner, RecordState::Active).await;
    fx.dir.insert_grant(record, fx.template, owner).await;

    let outcome = fx.deactivate(record).await.unwrap();

    assert_eq!(outcome.action, SyncAction::Granted);
    assert!(outcome.delta.unwrap().is_empty());
    assert_eq!(fx.holders(record).await, BTreeSet::from([owner]));
    assert_eq!(fx.dir.stats().await.mutations(), 0);
}

#[tokio::test]
async fn scenario_e_revoke_with_no_holders_is_not_found() {
    let fx = Fixture::new().await;
    let record = fx.dir.add_record(PrincipalId::new(), RecordState::Inactive).await;

    let err = fx.activate(record).await.unwrap_err();

    match err {
        SyncError::NotFound { phase, what, .. } => {
            assert_eq!(phase, SyncPhase::ResolveGrantHolders);
            assert_eq!(what, "no users found to revoke");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.dir.stats().await.mutations(), 0);
}

#[tokio::test]
async fn grant_twice_converges() {
    let fx = Fixture::new().await;
    let u = users(4);
    fx.team_of(&u).await;
    let record = fx.dir.add_record(u[0], RecordState::Active).await;

    fx.deactivate(record).await.unwrap();
    let after_first = fx.holders(record).await;
    fx.deactivate(record).await.unwrap();

    assert_eq!(fx.holders(record).await, after_first);
    assert_eq!(fx.dir.grant_count().await, 4);
}

#[tokio::test]
async fn revoke_twice_converges_when_owner_holds_a_grant() {
    let fx = Fixture::new().await;
    let u = users(3);
    fx.team_of(&u).await;
    let record = fx.dir.add_record(u[2], RecordState::Active).await;
    fx.deactivate(record).await.unwrap();

    fx.activate(record).await.unwrap();
    let after_first = fx.holders(record).await;
    fx.dir.reset_stats().await;

    let second = fx.activate(record).await.unwrap();

    assert_eq!(fx.holders(record).await, after_first);
    assert_eq!(after_first, BTreeSet::from([u[2]]));
    assert!(second.delta.unwrap().revocations.is_empty());
    assert_eq!(fx.dir.stats().await.count(GatewayOp::RevokeAccess), 0);
}

#[tokio::test]
async fn second_revoke_is_not_found_when_owner_never_held_a_grant() {
    let fx = Fixture::new().await;
    let u = users(3);
    let record = fx.dir.add_record(u[1], RecordState::Inactive).await;
    fx.dir.insert_grant(record, fx.template, u[0]).await;
    fx.dir.insert_grant(record, fx.template, u[2]).await;

    let first = fx.activate(record).await.unwrap();
    assert_eq!(first.delta.unwrap().revocations, vec![u[0], u[2]]);
    assert!(fx.holders(record).await.is_empty());
    fx.dir.reset_stats().await;

    let err = fx.activate(record).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::NotFound {
            phase: SyncPhase::ResolveGrantHolders,
            ..
        }
    ));
    assert_eq!(err.record_id(), Some(record));
    assert_eq!(fx.dir.stats().await.count(GatewayOp::RevokeAccess), 0);
}

#[tokio::test]
async fn owner_outside_team_loses_nothing_and_members_are_removed() {
    let fx = Fixture::new().await;
    let u = users(2);
    fx.team_of(&u).await;
    let owner = PrincipalId::from_u128(50);
    let record = fx.dir.add_record(owner, RecordState::Active).await;
    fx.dir.insert_grant(record, fx.template, owner).await;

    fx.deactivate(record).await.unwrap();
    assert_eq!(fx.holders(record).await, BTreeSet::from([u[0], u[1], owner]));

    fx.activate(record).await.unwrap();
    assert_eq!(fx.holders(record).await, BTreeSet::from([owner]));
}

#[tokio::test]
async fn other_records_are_untouched() {
    let fx = Fixture::new().await;
    let u = users(2);
    fx.team_of(&u).await;
    let target = fx.dir.add_record(u[0], RecordState::Active).await;
    let bystander = fx.dir.add_record(u[0], RecordState::Inactive).await;
    fx.deactivate(bystander).await.unwrap();

    fx.deactivate(target).await.unwrap();
    fx.activate(target).await.unwrap();

    assert_eq!(fx.holders(target).await, BTreeSet::from([u[0]]));
    assert_eq!(fx.holders(bystander).await, u.iter().copied().collect());
}

#[tokio::test]
async fn membership_changes_are_picked_up_on_next_notification() {
    let fx = Fixture::new().await;
    let u = users(3);
    fx.team_of(&u[..2]).await;
    let record = fx.dir.add_record(u[0], RecordState::Active).await;

    fx.deactivate(record).await.unwrap();
    fx.dir.add_member(fx.team, u[2]).await;
    fx.deactivate(record).await.unwrap();

    assert_eq!(fx.holders(record).await, u.iter().copied().collect());
}

#[tokio::test]
async fn gateway_failure_during_grant_aborts() {
    let fx = Fixture::new().await;
    fx.team_of(&users(2)).await;
    let record = fx.dir.add_record(PrincipalId::new(), RecordState::Active).await;
    fx.dir.fail_on(GatewayOp::GrantAccess).await;

    let err = fx.deactivate(record).await.unwrap_err();

    match err {
        SyncError::Gateway { phase, record_id, source } => {
            assert_eq!(phase, SyncPhase::Grant);
            assert_eq!(record_id, record);
            assert!(matches!(source, GatewayError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Aborted on the first grant; no retry.
    assert_eq!(fx.dir.stats().await.count(GatewayOp::GrantAccess), 1);
}

#[tokio::test]
async fn gateway_failure_on_lookup_names_the_phase() {
    let fx = Fixture::new().await;
    let record = fx.dir.add_record(PrincipalId::new(), RecordState::Inactive).await;
    fx.dir.fail_on(GatewayOp::GetRecordGrantHolders).await;

    let err = fx.activate(record).await.unwrap_err();

    assert_eq!(err.phase(), Some(SyncPhase::ResolveGrantHolders));
    assert!(!err.is_fatal_configuration());
}

#[tokio::test]
async fn raw_state_codes_drive_the_same_paths() {
    let fx = Fixture::new().await;
    let u = users(2);
    fx.team_of(&u).await;
    let record = fx.dir.add_record(u[1], RecordState::Active).await;

    let deactivate = StateChangeNotification::from_code(record, 1).unwrap();
    fx.sync.on_state_change(deactivate).await.unwrap();
    assert_eq!(fx.holders(record).await, u.iter().copied().collect());

    let activate = StateChangeNotification::from_code(record, 0).unwrap();
    fx.sync.on_state_change(activate).await.unwrap();
    assert_eq!(fx.holders(record).await, BTreeSet::from([u[1]]));

    assert!(StateChangeNotification::from_code(record, 2).is_err());
}
