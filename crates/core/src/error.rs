//! Centralized error types for the teamsync workspace.

use crate::ids::RecordId;
use crate::types::ConfigItem;
use std::fmt;
use thiserror::Error;

/// Failure of a single directory gateway call.
///
/// "Not found" is never a gateway error; lookups return `Option`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("directory rejected request: {0}")]
    Rejected(String),
}

/// Step of a synchronization run, attached to every [`SyncError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    ResolveTemplate,
    ResolveTeam,
    ResolveMembers,
    ResolveOwner,
    ResolveGrantHolders,
    Grant,
    Revoke,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ResolveTemplate => "resolve-template",
            Self::ResolveTeam => "resolve-team",
            Self::ResolveMembers => "resolve-members",
            Self::ResolveOwner => "resolve-owner",
            Self::ResolveGrantHolders => "resolve-grant-holders",
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        })
    }
}

/// Top-level error enum for one `on_state_change` invocation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// A well-known template or team is missing. Raised before any mutation.
    #[error("{phase} for record {record_id}: {item} '{name}' not found")]
    Configuration {
        phase: SyncPhase,
        record_id: RecordId,
        item: ConfigItem,
        name: String,
    },

    #[error("{phase} for record {record_id}: {what}")]
    NotFound {
        phase: SyncPhase,
        record_id: RecordId,
        what: String,
    },

    #[error("{phase} for record {record_id} failed: {source}")]
    Gateway {
        phase: SyncPhase,
        record_id: RecordId,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    /// Misconfiguration that will fail every record, not just this one.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn phase(&self) -> Option<SyncPhase> {
        match self {
            Self::Configuration { phase, .. }
            | Self::NotFound { phase, .. }
            | Self::Gateway { phase, .. } => Some(*phase),
            Self::InvalidInput(_) => None,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Self::Configuration { record_id, .. }
            | Self::NotFound { record_id, .. }
            | Self::Gateway { record_id, .. } => Some(*record_id),
            Self::InvalidInput(_) => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
pub type SyncResult<T> = Result<T, SyncError>;
