//! Domain types for the access synchronizer.

use crate::error::SyncError;
use crate::ids::{PrincipalId, RecordId, TeamId, TemplateId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Template name used when none is configured.
pub const DEFAULT_TEMPLATE_NAME: &str = "Security team template";

/// Team name used when none is configured.
pub const DEFAULT_TEAM_NAME: &str = "Secret Team";

// ---------------------------------------------------------------------------
// Record lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a protected record.
///
/// Host payloads encode it as a numeric state code: `0` = Active,
/// `1` = Inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Active,
    Inactive,
}

impl RecordState {
    /// Decodes a host state code. Any other code is not a recognized transition.
    pub fn from_code(code: i32) -> Result<Self, SyncError> {
        match code {
            0 => Ok(Self::Active),
            1 => Ok(Self::Inactive),
            other => Err(SyncError::InvalidInput(format!(
                "unrecognized state code {other}"
            ))),
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::Active => 0,
            Self::Inactive => 1,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.pad("active"),
            Self::Inactive => f.pad("inactive"),
        }
    }
}

impl FromStr for RecordState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" | "0" => Ok(Self::Active),
            "inactive" | "1" => Ok(Self::Inactive),
            other => Err(SyncError::InvalidInput(format!(
                "unrecognized state '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory entities
// ---------------------------------------------------------------------------

/// The protected business object. Observed only; never re-owned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub state: RecordState,
    pub owner_id: PrincipalId,
}

/// Named template describing a per-record access team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTemplate {
    pub id: TemplateId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// `(team, principal)` membership row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub team_id: TeamId,
    pub principal_id: PrincipalId,
}

/// One principal's access to one record under one template.
///
/// Unique per triple; the directory treats duplicates as the same grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordAccessGrant {
    pub record_id: RecordId,
    pub template_id: TemplateId,
    pub principal_id: PrincipalId,
}

// ---------------------------------------------------------------------------
// Notifications and configuration
// ---------------------------------------------------------------------------

/// "Record changed" notification delivered by the host pipeline.
///
/// `previous_state` is the pre-image state when the host has one. When it
/// equals `new_state` the notification is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeNotification {
    pub record_id: RecordId,
    pub new_state: RecordState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<RecordState>,
}

impl StateChangeNotification {
    pub fn new(record_id: RecordId, new_state: RecordState) -> Self {
        Self {
            record_id,
            new_state,
            previous_state: None,
        }
    }

    pub fn with_previous(mut self, previous: RecordState) -> Self {
        self.previous_state = Some(previous);
        self
    }

    /// Builds a notification from a raw host state code.
    pub fn from_code(record_id: RecordId, code: i32) -> Result<Self, SyncError> {
        Ok(Self::new(record_id, RecordState::from_code(code)?))
    }

    /// True when the host reported no actual transition.
    pub fn is_unchanged(&self) -> bool {
        self.previous_state == Some(self.new_state)
    }
}

/// Which well-known name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigItem {
    Template,
    Team,
}

impl fmt::Display for ConfigItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template => f.write_str("access team template"),
            Self::Team => f.write_str("team"),
        }
    }
}

/// Deployment-time names consumed by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub template_name: String,
    pub team_name: String,
}

impl SyncConfig {
    pub fn new(template_name: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            template_name: template_name.into(),
            team_name: team_name.into(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_NAME, DEFAULT_TEAM_NAME)
    }
}
