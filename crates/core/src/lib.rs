//! Domain models, shared types, and error definitions.
//!
//! Foundation crate -- no async or I/O dependencies.

pub mod error;
pub mod ids;
pub mod types;

pub use error::{GatewayError, SyncError, SyncPhase};
pub use ids::{PrincipalId, RecordId, TeamId, TemplateId};
pub use types::{
    AccessTemplate, ConfigItem, Membership, Record, RecordAccessGrant, RecordState,
    StateChangeNotification, SyncConfig, Team,
};
