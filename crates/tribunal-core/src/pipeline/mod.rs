//! Pipeline: state machine, bounded dispatch, checkpoints and the controller.

pub mod checkpoint;
pub mod controller;
pub mod dispatch;
pub mod state;

pub use checkpoint::RunCheckpoint;
pub use controller::{AuditOutcome, PipelineController};
pub use dispatch::{fan_out, DispatchLimits, SlotOutcome};
pub use state::{route_after_aggregate, PipelineState};
