//! Sliding one-second analysis window.
//!
//! [`AnalysisRing`] keeps the most recent `capacity` samples in a plain
//! circular buffer with an overwriting write cursor. Unlike the SPSC
//! transport ring in [`super`], it is owned exclusively by the worker
//! thread and needs no synchronization: writes never fail, and
//! `snapshot` re-linearizes the window in chronological order without
//! the caller knowing where the cursor sits.

/// Full-scale magnitude of a signed 16-bit sample.
const I16_FULL_SCALE: f32 = 32768.0;

/// Fixed-capacity overwriting circular store of the newest samples.
#[derive(Debug)]
pub struct AnalysisRing {
    buf: Vec<i16>,
    /// Next write position.
    cursor: usize,
    /// Number of valid samples, saturating at `buf.len()`.
    filled: usize,
}

impl AnalysisRing {
    /// Create a ring holding `capacity` samples. At 16 kHz a one-second
    /// window is 16 000.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            cursor: 0,
            filled: 0,
        }
    }

    /// Append `samples`, wrapping at capacity and overwriting the oldest
    /// data. Accepts any length, including zero and more than capacity.
    pub fn write(&mut self, samples: &[i16]) {
        let capacity = self.buf.len();
        if capacity == 0 || samples.is_empty() {
            return;
        }

        // Only the trailing `capacity` samples can survive anyway.
        let src = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let first = (capacity - self.cursor).min(src.len());
        self.buf[self.cursor..self.cursor + first].copy_from_slice(&src[..first]);
        let rest = src.len() - first;
        if rest > 0 {
            self.buf[..rest].copy_from_slice(&src[first..]);
        }

        self.cursor = (self.cursor + src.len()) % capacity;
        self.filled = (self.filled + samples.len()).min(capacity);
    }

    /// Number of valid samples currently stored (≤ capacity).
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// `true` once a full window of samples has been written.
    pub fn is_full(&self) -> bool {
        self.filled == self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Copy the full window into `out` in oldest-to-newest order.
    ///
    /// Only meaningful once [`is_full`](Self::is_full) — the pipeline
    /// never extracts a window before then.
    pub fn snapshot(&self, out: &mut Vec<i16>) {
        out.clear();
        out.extend_from_slice(&self.buf[self.cursor..]);
        out.extend_from_slice(&self.buf[..self.cursor]);
    }
}

/// Convert a raw PCM16 window to f32 in [-1.0, 1.0], preserving order.
pub fn normalize_window(raw: &[i16], out: &mut Vec<f32>) {
    out.clear();
    out.extend(raw.iter().map(|&s| s as f32 / I16_FULL_SCALE));
}
