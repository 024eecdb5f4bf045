//! Wake-word classifier abstraction.
//!
//! The `WakeClassifier` trait decouples the pipeline from any specific
//! backend (stub, ONNX keyword model, vendored SDK, etc.). Its input
//! shape is a hard contract: exactly [`window_len`](WakeClassifier::window_len)
//! mono f32 samples. The pipeline asserts the length before every call
//! rather than truncating or padding silently.
//!
//! `&mut self` on `infer` intentionally expresses that backends may be
//! stateful (RNN hidden state, streaming feature caches). All mutation
//! is serialised through `ClassifierHandle`'s `parking_lot::Mutex`, so
//! at most one inference is ever in flight.

pub mod stub;

pub use stub::StubClassifier;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Contract for wake-word scoring backends.
pub trait WakeClassifier: Send + 'static {
    /// One-time warm-up: load weights, run a dummy inference to populate
    /// caches. Called once at engine startup, before capture opens.
    ///
    /// # Errors
    /// Returns an error if model assets are missing or corrupt; this is
    /// fatal and prevents the pipeline from starting.
    fn warm_up(&mut self) -> Result<()>;

    /// Score one analysis window for wake-word presence.
    ///
    /// `window` is exactly [`window_len`](Self::window_len) mono f32
    /// samples in [-1.0, 1.0], oldest first. Must be deterministic for
    /// identical input. Returns a confidence in [0.0, 1.0].
    fn infer(&mut self, window: &[f32]) -> Result<f32>;

    /// Expected window length in samples (one second at the pipeline
    /// rate, e.g. 16 000).
    fn window_len(&self) -> usize;

    /// Reset all internal state (e.g. between sessions).
    fn reset(&mut self);
}

/// Thread-safe reference-counted handle to any `WakeClassifier`.
///
/// Uses `parking_lot::Mutex` for non-poisoning on panic and a cheaper
/// uncontended lock than `std::sync::Mutex`.
#[derive(Clone)]
pub struct ClassifierHandle(pub Arc<Mutex<dyn WakeClassifier>>);

impl ClassifierHandle {
    /// Wrap any `WakeClassifier` in a `ClassifierHandle`.
    pub fn new<C: WakeClassifier>(classifier: C) -> Self {
        Self(Arc::new(Mutex::new(classifier)))
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle").finish_non_exhaustive()
    }
}
