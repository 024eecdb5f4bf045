//! Trigger decision logic: score smoothing and the debounced decider.

pub mod smoother;
pub mod trigger;

pub use smoother::ScoreSmoother;
pub use trigger::TriggerDecider;

use serde::{Deserialize, Serialize};

/// How the smoothed score is compared against the detection threshold.
///
/// Both policies exist in the wild; they trade re-fire behaviour for
/// simplicity, so the choice is configuration rather than a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionPolicy {
    /// Fire once per upward crossing: `prev_avg < threshold ≤ curr_avg`.
    /// Does not re-fire while the score lingers above threshold.
    RisingEdge,
    /// Fire whenever `curr_avg ≥ threshold` and cooldown allows.
    /// Simpler and chattier; cooldown is the only debounce.
    LevelCrossing,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy::RisingEdge
    }
}
