//! `StubClassifier` — deterministic placeholder backend.
//!
//! Scores a window by its energy envelope so the full capture → gate →
//! smooth → trigger path can be exercised end-to-end without model
//! assets. Loud sustained input ramps the score toward 1.0; quiet input
//! scores near zero.

use tracing::debug;

use crate::classifier::WakeClassifier;
use crate::error::Result;

/// Energy-envelope stub classifier.
pub struct StubClassifier {
    window_len: usize,
    /// RMS at which the stub saturates to score 1.0.
    saturation_rms: f32,
    inference_count: u64,
}

impl StubClassifier {
    /// `window_len` must match the pipeline's analysis window (16 000
    /// for one second at 16 kHz).
    pub fn new(window_len: usize) -> Self {
        Self {
            window_len,
            saturation_rms: 0.25,
            inference_count: 0,
        }
    }
}

impl WakeClassifier for StubClassifier {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubClassifier::warm_up — no-op");
        Ok(())
    }

    fn infer(&mut self, window: &[f32]) -> Result<f32> {
        self.inference_count += 1;

        let sum_sq: f32 = window.iter().map(|s| s * s).sum();
        let rms = (sum_sq / window.len().max(1) as f32).sqrt();
        let score = (rms / self.saturation_rms).clamp(0.0, 1.0);

        debug!(
            inference = self.inference_count,
            rms = format_args!("{rms:.4}"),
            score = format_args!("{score:.3}"),
            "stub inference"
        );
        Ok(score)
    }

    fn window_len(&self) -> usize {
        self.window_len
    }

    fn reset(&mut self) {
        debug!("StubClassifier::reset");
    }
}
