//! Human-readable synchronization report.

use std::time::Duration;

use teamsync_core::{RecordId, RecordState};

use crate::plan::MembershipDelta;
use crate::synchronizer::{SyncAction, SyncOutcome};

/// Summary of one processed notification.
#[derive(Debug)]
pub struct SyncReport {
    pub record_id: RecordId,
    pub new_state: RecordState,
    pub action: SyncAction,
    pub delta: Option<MembershipDelta>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn build(outcome: &SyncOutcome, elapsed: Duration) -> Self {
        SyncReport {
            record_id: outcome.record_id,
            new_state: outcome.new_state,
            action: outcome.action,
            delta: outcome.delta.clone(),
            elapsed,
        }
    }

    pub fn granted(&self) -> usize {
        self.delta.as_ref().map_or(0, |d| d.grants.len())
    }

    pub fn revoked(&self) -> usize {
        self.delta.as_ref().map_or(0, |d| d.revocations.len())
    }

    pub fn owner_retained(&self) -> bool {
        self.delta
            .as_ref()
            .is_some_and(|d| d.retained_owner.is_some())
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push('\n');
        out.push_str("╔══════════════════════════════════════════════════════════════╗\n");
        out.push_str("║                  TEAMSYNC ACCESS REPORT                      ║\n");
        out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        out.push_str(&format!("║  Record:     {:>47} ║\n", self.record_id.to_string()));
        out.push_str(&format!("║  New state:  {:>47} ║\n", self.new_state.to_string()));
        out.push_str(&format!("║  Action:     {:>47} ║\n", action_label(self.action)));
        out.push_str(&format!("║  Granted:    {:>47} ║\n", self.granted()));
        out.push_str(&format!("║  Revoked:    {:>47} ║\n", self.revoked()));
        out.push_str(&format!(
            "║  Owner kept: {:>47} ║\n",
            if self.owner_retained() { "yes" } else { "no" }
        ));
        out.push_str(&format!("║  Elapsed:    {:>47} ║\n", format!("{:?}", self.elapsed)));

        if let Some(delta) = self.delta.as_ref().filter(|d| !d.is_empty()) {
            out.push_str("╠══════════════════════════════════════════════════════════════╣\n");
            for p in &delta.grants {
                out.push_str(&format!("║  + {:<57} ║\n", p.to_string()));
            }
            for p in &delta.revocations {
                out.push_str(&format!("║  - {:<57} ║\n", p.to_string()));
            }
        }

        out.push_str("╚══════════════════════════════════════════════════════════════╝\n");
        out
    }
}

fn action_label(action: SyncAction) -> &'static str {
    match action {
        SyncAction::Granted => "granted team access",
        SyncAction::Revoked => "revoked non-owner access",
        SyncAction::Unchanged => "unchanged",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamsync_core::{PrincipalId, TemplateId};

    #[test]
    fn render_lists_changes() {
        let outcome = SyncOutcome {
            record_id: RecordId::from_u128(1),
            new_state: RecordState::Active,
            action: SyncAction::Revoked,
            delta: Some(MembershipDelta {
                record_id: RecordId::from_u128(1),
                template_id: TemplateId::from_u128(2),
                grants: vec![],
                revocations: vec![PrincipalId::from_u128(3)],
                retained_owner: Some(PrincipalId::from_u128(4)),
            }),
        };
        let report = SyncReport::build(&outcome, Duration::from_millis(5));
        let text = report.render();

        assert_eq!(report.revoked(), 1);
        assert!(report.owner_retained());
        assert!(text.contains("revoked non-owner access"));
        assert!(text.contains("- 00000000-0000-0000-0000-000000000003"));
    }

    #[test]
    fn unchanged_report_has_no_change_lines() {
        let outcome = SyncOutcome {
            record_id: RecordId::from_u128(1),
            new_state: RecordState::Inactive,
            action: SyncAction::Unchanged,
            delta: None,
        };
        let text = SyncReport::build(&outcome, Duration::ZERO).render();
        assert!(text.contains("unchanged"));
        assert!(!text.contains("║  + "));
    }
}
