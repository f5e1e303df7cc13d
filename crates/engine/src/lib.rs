//! Access synchronizer, membership delta planner, batch runner, report
//! generator, and data sinks.

pub mod batch;
pub mod plan;
pub mod reporter;
pub mod sink;
pub mod synchronizer;

pub use batch::{run_batch, run_batch_with_store, BatchEntry, BatchReport};
pub use plan::MembershipDelta;
pub use synchronizer::{AccessSynchronizer, SyncAction, SyncOutcome};
