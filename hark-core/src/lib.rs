//! # hark-core
//!
//! Continuous, low-latency wake-word spotting over a live microphone.
//!
//! ```text
//!  cpal callback (audio thread)
//!        │ push PCM16 mono
//!        ▼
//!  lock-free SPSC ring
//!        │ blocking frame reads (80 ms)
//!        ▼
//!  pipeline worker (dedicated thread)
//!    ├─ AnalysisRing      — sliding 1 s window, overwrite-oldest
//!    ├─ EnergyGate        — RMS gate, silence never reaches the model
//!    ├─ WakeClassifier    — pluggable scoring backend
//!    ├─ ScoreSmoother     — rolling mean of the last K scores
//!    └─ TriggerDecider    — warmup, rising edge, cooldown debounce
//!        │
//!        ▼
//!  broadcast channels → WakeEvent / AudioActivityEvent / EngineStatusEvent
//! ```
//!
//! [`WakeEngine`] is the entry point: construct it with an
//! [`EngineConfig`] and a [`ClassifierHandle`], call `warm_up`, then
//! `start`, and subscribe to the event streams.
//!
//! ```no_run
//! use hark_core::{ClassifierHandle, EngineConfig, StubClassifier, WakeEngine};
//!
//! # fn main() -> hark_core::Result<()> {
//! let config = EngineConfig::default();
//! let classifier = ClassifierHandle::new(StubClassifier::new(config.window_samples()));
//! let mut engine = WakeEngine::new(config, classifier)?;
//! engine.warm_up()?;
//!
//! let mut wakes = engine.subscribe_wake();
//! engine.start()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod classifier;
pub mod decision;
pub mod engine;
pub mod error;
pub mod events;
pub mod vad;

pub use audio::{AudioSource, DeviceInfo, SourcePreference};
pub use classifier::{ClassifierHandle, StubClassifier, WakeClassifier};
pub use decision::DecisionPolicy;
pub use engine::{DiagnosticsSnapshot, EngineConfig, WakeEngine};
pub use error::{HarkError, Result};
pub use events::{AudioActivityEvent, EngineStatus, EngineStatusEvent, WakeEvent};
pub use vad::{EnergyGate, VoiceGate};
