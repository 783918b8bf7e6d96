//! Runs all six gates in order and aggregates the outcome.

use tracing::info;

use bastion_contracts::{
    error::BastionResult,
    gate::{gate_results_hash, GateRun},
};

use crate::context::GateContext;
use crate::gate::Gate;

/// Every gate runs, even after an earlier one fails, so the run records
/// the full picture. Only a hashing fault is an error.
pub fn run_gates(ctx: &GateContext<'_>) -> BastionResult<GateRun> {
    let results: Vec<_> = Gate::ALL.iter().map(|gate| gate.run(ctx)).collect();
    let all_pass = results.iter().all(|r| r.passed());
    let gate_results_hash = gate_results_hash(&results)?;

    info!(
        plan_id = %ctx.plan.plan_id,
        all_pass,
        gate_results_hash = %gate_results_hash,
        "gate run complete"
    );
    Ok(GateRun {
        all_pass,
        gate_results_hash,
        results,
    })
}
