//! The discount-approval gate in front of a booking's inventory effect.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating the gate for a set of requested discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateDecision {
    /// No line carries a discount: reserve everything now.
    Clear,
    /// At least one line needs discount approval: reserve nothing yet.
    AwaitingApproval,
}

/// Decide whether a booking may touch inventory at creation time.
///
/// The gate is clear only when every line's discount is zero.
pub fn evaluate_gate<I>(discounts: I) -> GateDecision
where
    I: IntoIterator<Item = i64>,
{
    if discounts.into_iter().all(|d| d == 0) {
        GateDecision::Clear
    } else {
        GateDecision::AwaitingApproval
    }
}
