//! Debounced trigger decision state machine.
//!
//! ## States
//!
//! ```text
//! Idle ──(warmup elapsed ∧ ring full)──► Armed
//! Armed ──(predicate ∧ cooldown elapsed)──► fire, record last_trigger
//! ```
//!
//! Cooldown is not a separate state or timer thread: it is a time
//! condition checked inline at each decision, ending automatically when
//! the clock catches up. There is no terminal state — the machine is
//! torn down with the session, never transitioned out.
//!
//! All methods take `now` explicitly so tests drive the clock instead
//! of sleeping.

use std::time::{Duration, Instant};

use tracing::debug;

use super::DecisionPolicy;

/// Stateful warmup/cooldown trigger decider.
#[derive(Debug)]
pub struct TriggerDecider {
    policy: DecisionPolicy,
    threshold: f32,
    warmup: Duration,
    cooldown: Duration,
    started_at: Instant,
    /// Latched once warmup has elapsed with a full analysis ring.
    armed: bool,
    last_trigger: Option<Instant>,
}

impl TriggerDecider {
    pub fn new(
        policy: DecisionPolicy,
        threshold: f32,
        warmup: Duration,
        cooldown: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            policy,
            threshold,
            warmup,
            cooldown,
            started_at,
            armed: false,
            last_trigger: None,
        }
    }

    /// Idle → Armed check, latched. Returns `true` once the warmup
    /// grace period has elapsed *and* the ring holds a full window.
    ///
    /// While this returns `false` the pipeline skips all per-window
    /// work — extraction, gating, classification, smoothing.
    pub fn is_armed(&mut self, ring_full: bool, now: Instant) -> bool {
        if !self.armed && ring_full && now.duration_since(self.started_at) >= self.warmup {
            self.armed = true;
            debug!(
                warmup_ms = self.warmup.as_millis() as u64,
                "decider armed"
            );
        }
        self.armed
    }

    /// Evaluate one accepted (non-gated) window's smoothed averages.
    ///
    /// Returns `true` when a trigger fires; `last_trigger` is recorded
    /// and the cooldown window begins. Must only be called while armed.
    pub fn evaluate(&mut self, prev_avg: f32, curr_avg: f32, now: Instant) -> bool {
        debug_assert!(self.armed, "evaluate called before the decider armed");

        let predicate = match self.policy {
            DecisionPolicy::RisingEdge => prev_avg < self.threshold && curr_avg >= self.threshold,
            DecisionPolicy::LevelCrossing => curr_avg >= self.threshold,
        };
        if !predicate {
            return false;
        }

        if let Some(last) = self.last_trigger {
            if now.duration_since(last) < self.cooldown {
                debug!(
                    remaining_ms =
                        (self.cooldown - now.duration_since(last)).as_millis() as u64,
                    "trigger suppressed by cooldown"
                );
                return false;
            }
        }

        self.last_trigger = Some(now);
        true
    }

    /// Time of the most recent fired trigger, if any.
    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }
}
