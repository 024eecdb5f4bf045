//! Energy-based gate using an RMS threshold.
//!
//! Silence costs almost nothing to reject here, while running the
//! classifier on it both wastes compute and can produce spurious
//! near-threshold scores from numerical noise. The gate is stateless:
//! each one-second window already spans far more context than a
//! per-frame hangover would add.

use super::VoiceGate;

/// A simple RMS-threshold voice gate.
#[derive(Debug, Clone)]
pub struct EnergyGate {
    /// RMS amplitude threshold. Windows at or above this pass through.
    /// Typical range: 0.005–0.05 for a quiet microphone.
    threshold: f32,
}

impl EnergyGate {
    /// Create a new `EnergyGate`. Default threshold: `0.01`.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Compute the root-mean-square of a sample slice.
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }
}

impl Default for EnergyGate {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl VoiceGate for EnergyGate {
    fn is_voice(&mut self, window: &[f32]) -> bool {
        Self::rms(window) >= self.threshold
    }

    fn reset(&mut self) {}
}
