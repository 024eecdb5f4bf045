//! Voice activity gating.
//!
//! The `VoiceGate` trait is the extensibility point: swap in
//! `EnergyGate` (default) or any future neural VAD without touching the
//! pipeline. The gate's verdict is a hard short-circuit — a rejected
//! window produces no classifier call, no smoother update, and no
//! trigger evaluation, not merely a zero score.

pub mod energy;

pub use energy::EnergyGate;

/// Trait for all voice-gate implementations.
pub trait VoiceGate: Send + 'static {
    /// Returns `true` when the window plausibly contains voice energy
    /// and is worth classifying. The window is mono f32 in [-1.0, 1.0].
    fn is_voice(&mut self, window: &[f32]) -> bool;

    /// Reset any internal state between sessions.
    fn reset(&mut self);
}
