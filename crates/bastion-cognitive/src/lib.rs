//! # bastion-cognitive
//!
//! The planning side of the pipeline:
//! - [`DeterministicPlanner`] maps desired state to plans and detects
//!   nondeterminism, including an N-run replay.
//! - [`SyncMetrics`] keeps the short-horizon observation window.
//! - [`SelfModificationBoundary`] enforces the kernel/peripheral split and
//!   produces the long-horizon fixation snapshots.
//!
//! All in-memory history lives in fixed-capacity [`RollingWindow`]s.

pub mod boundary;
pub mod metrics;
pub mod planner;
pub mod window;

pub use boundary::{
    ComponentScope, EpochOutcome, MutationDecision, PeripheralMutation, SelfModEpoch,
    SelfModificationBoundary, HALTED_MARKER,
};
pub use metrics::{SyncMetrics, SyncObservation};
pub use planner::{DesiredState, DeterministicPlanner, PlanOutcome, ReplayReport};
pub use window::RollingWindow;
