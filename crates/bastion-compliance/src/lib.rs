//! # bastion-compliance
//!
//! Compliance control coverage and the pre-flight telemetry checklist.
//!
//! [`controls::ControlRegistry`] tracks which controls are satisfied and
//! whether coverage has regressed since the guard was enabled; the
//! regression flag feeds the fixation gate. [`telemetry::TelemetryChecklist`]
//! decides whether autonomy is enabled at all.

pub mod controls;
pub mod telemetry;

pub use controls::{ComplianceControl, ControlRegistry, Phase};
pub use telemetry::{
    AutonomyStatus, CheckRecord, CheckStatus, TelemetryCheck, TelemetryChecklist,
    TelemetrySummary,
};
