//! Event types broadcast by the engine.
//!
//! Three independent streams, each with its own channel:
//!
//! | Event | Cadence |
//! |-------|---------|
//! | [`WakeEvent`] | once per fired trigger (debounced) |
//! | [`AudioActivityEvent`] | once per evaluated analysis window |
//! | [`EngineStatusEvent`] | on lifecycle/status transitions |
//!
//! Consumers subscribe via `WakeEngine::subscribe_*`. Sends from the
//! worker never block; a slow consumer lags and drops, it cannot stall
//! the capture loop.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wake events
// ---------------------------------------------------------------------------

/// Emitted once per qualifying trigger decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WakeEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Smoothed confidence (rolling average) at the moment of the trigger.
    pub confidence: f32,
    /// Raw classifier score of the window that completed the trigger.
    pub raw_score: f32,
    /// Milliseconds since the pipeline session started.
    pub session_offset_ms: u64,
}

// ---------------------------------------------------------------------------
// Audio activity events
// ---------------------------------------------------------------------------

/// Emitted for each fully-evaluated analysis window (armed state only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Root-mean-square level of the window in [0.0, 1.0].
    pub rms: f32,
    /// `true` when the energy gate rejected the window (no inference ran).
    pub gated: bool,
}

// ---------------------------------------------------------------------------
// Engine status events
// ---------------------------------------------------------------------------

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the hark engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Warming up the classifier (loading weights, dummy inference).
    WarmingUp,
    /// Actively capturing audio and spotting.
    Listening,
    /// Still listening, but inference has failed repeatedly — detection
    /// may be silently disabled until the classifier recovers.
    Degraded,
    /// Capture stopped; engine may be restarted.
    Stopped,
    /// Unrecoverable error — restart required.
    Error,
}
