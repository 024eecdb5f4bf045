//! Engine lifecycle: configuration, worker management, event fan-out.
//!
//! [`WakeEngine`] owns everything that outlives a single capture
//! session — the classifier handle, the broadcast channels, the
//! diagnostics counters — and spins the per-session pipeline up and
//! down on a dedicated worker thread. The capture stream itself is
//! opened *inside* that thread because `cpal::Stream` is not `Send`.

pub mod pipeline;

pub use pipeline::{DiagnosticsSnapshot, PipelineContext, PipelineDiagnostics};

#[cfg(feature = "audio-cpal")]
use std::sync::mpsc;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

#[cfg(feature = "audio-cpal")]
use crate::vad::EnergyGate;
use crate::{
    audio::SourcePreference,
    classifier::ClassifierHandle,
    decision::DecisionPolicy,
    error::{HarkError, Result},
    events::{AudioActivityEvent, EngineStatus, EngineStatusEvent, WakeEvent},
};

/// Broadcast channel depth. Slow subscribers lag rather than block the
/// pipeline; wake events are rare, activity events are ~12 Hz.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `stop` waits for the worker to observe the stop flag and
/// finish its teardown before detaching it.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Engine configuration. All defaults target continuous wake-word
/// spotting on a 16 kHz mono microphone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Capture and analysis sample rate in Hz.
    pub sample_rate: u32,
    /// Ingest frame duration in milliseconds.
    pub frame_duration_ms: u64,
    /// Sliding analysis window duration in milliseconds. Must match the
    /// classifier's expected input length.
    pub window_duration_ms: u64,
    /// RMS threshold below which a window is gated (no inference).
    pub vad_rms_threshold: f32,
    /// Smoothed-score threshold at or above which a trigger may fire.
    pub detection_threshold: f32,
    /// Number of raw scores averaged by the smoother (K).
    pub smoothing_window: usize,
    /// Minimum gap between consecutive triggers.
    pub cooldown_ms: u64,
    /// Grace period after start during which nothing is evaluated.
    pub warmup_ms: u64,
    /// Rising-edge (default) or level-crossing trigger predicate.
    pub decision_policy: DecisionPolicy,
    /// Ordered capture-source fallback list.
    pub source_preferences: Vec<SourcePreference>,
    /// Consecutive zero-length reads before a stall is logged.
    pub stall_streak_threshold: usize,
    /// Consecutive inference failures before `Degraded` is signalled.
    pub degraded_failure_streak: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_duration_ms: 80,
            window_duration_ms: 1_000,
            vad_rms_threshold: 0.01,
            detection_threshold: 0.5,
            smoothing_window: 8,
            cooldown_ms: 2_500,
            warmup_ms: 1_500,
            decision_policy: DecisionPolicy::RisingEdge,
            source_preferences: vec![
                SourcePreference::VoiceOptimized,
                SourcePreference::GenericMicrophone,
            ],
            stall_streak_threshold: 10,
            degraded_failure_streak: 5,
        }
    }
}

impl EngineConfig {
    /// Samples per ingest frame.
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms / 1_000) as usize
    }

    /// Samples per analysis window (the ring capacity).
    pub fn window_samples(&self) -> usize {
        (self.sample_rate as u64 * self.window_duration_ms / 1_000) as usize
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Validate invariants that the pipeline assumes.
    ///
    /// # Errors
    /// `HarkError::InvalidConfig` naming the first violated field.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(HarkError::InvalidConfig("sampleRate must be > 0".into()));
        }
        if self.frame_samples() == 0 {
            return Err(HarkError::InvalidConfig(
                "frameDurationMs too short for the sample rate".into(),
            ));
        }
        if self.window_samples() < self.frame_samples() {
            return Err(HarkError::InvalidConfig(
                "windowDurationMs must be at least one frame".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            return Err(HarkError::InvalidConfig(
                "detectionThreshold must be in [0, 1]".into(),
            ));
        }
        if self.vad_rms_threshold < 0.0 {
            return Err(HarkError::InvalidConfig(
                "vadRmsThreshold must be >= 0".into(),
            ));
        }
        if self.smoothing_window == 0 {
            return Err(HarkError::InvalidConfig(
                "smoothingWindow must be >= 1".into(),
            ));
        }
        if self.source_preferences.is_empty() {
            return Err(HarkError::InvalidConfig(
                "sourcePreferences must not be empty".into(),
            ));
        }
        if self.degraded_failure_streak == 0 {
            return Err(HarkError::InvalidConfig(
                "degradedFailureStreak must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Continuous wake-word spotting engine.
///
/// One engine owns one classifier and at most one live capture session.
/// Events fan out over broadcast channels; any number of subscribers
/// may come and go while the engine runs.
pub struct WakeEngine {
    config: EngineConfig,
    classifier: ClassifierHandle,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    wake_tx: broadcast::Sender<WakeEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    activity_tx: broadcast::Sender<AudioActivityEvent>,
    status: Arc<Mutex<EngineStatus>>,
    seq: Arc<AtomicU64>,
    diagnostics: Arc<PipelineDiagnostics>,
}

impl WakeEngine {
    /// Create an engine with a validated configuration.
    ///
    /// # Errors
    /// `HarkError::InvalidConfig` if `config` violates an invariant.
    pub fn new(config: EngineConfig, classifier: ClassifierHandle) -> Result<Self> {
        config.validate()?;
        let (wake_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (activity_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            classifier,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            wake_tx,
            status_tx,
            activity_tx,
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        })
    }

    /// Warm up the classifier (load weights, prime caches) before the
    /// first session. Blocking; call off the UI thread.
    ///
    /// # Errors
    /// `HarkError::ClassifierLoad` when the backend fails to initialize.
    pub fn warm_up(&self) -> Result<()> {
        self.set_status(EngineStatus::WarmingUp, None);
        let result = self.classifier.0.lock().warm_up();
        match result {
            Ok(()) => {
                self.set_status(EngineStatus::Idle, None);
                info!("classifier warmed up");
                Ok(())
            }
            Err(e) => {
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(HarkError::ClassifierLoad(e.to_string()))
            }
        }
    }

    /// Open the microphone and start the spotting session.
    ///
    /// Returns once capture is confirmed open; the pipeline then runs on
    /// its worker thread until [`stop`](Self::stop) or a fatal error.
    ///
    /// # Errors
    /// `HarkError::AlreadyRunning` if a session is active, or the
    /// capture-open failure when no preference yields a device.
    #[cfg(feature = "audio-cpal")]
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(HarkError::AlreadyRunning);
        }
        self.reap_worker();

        self.diagnostics.reset();
        self.running.store(true, Ordering::SeqCst);

        let ctx = PipelineContext {
            config: self.config.clone(),
            classifier: self.classifier.clone(),
            gate: Box::new(EnergyGate::new(self.config.vad_rms_threshold)),
            running: Arc::clone(&self.running),
            wake_tx: self.wake_tx.clone(),
            status_tx: self.status_tx.clone(),
            activity_tx: self.activity_tx.clone(),
            status: Arc::clone(&self.status),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        let sample_rate = self.config.sample_rate;
        let read_timeout = crate::audio::read_timeout_for_frame(self.config.frame_duration_ms);
        let preferences = self.config.source_preferences.clone();

        // The capture stream must live entirely on the worker thread; the
        // open result is reported back through a one-shot channel so a
        // missing microphone surfaces as a `start` error, not a log line.
        let (open_tx, open_rx) = mpsc::channel::<Result<()>>();

        let handle = thread::Builder::new()
            .name("hark-pipeline".into())
            .spawn(move || {
                let mut capture =
                    match crate::audio::MicCapture::open(sample_rate, read_timeout, &preferences)
                    {
                        Ok(capture) => {
                            let _ = open_tx.send(Ok(()));
                            capture
                        }
                        Err(e) => {
                            let _ = open_tx.send(Err(e));
                            return;
                        }
                    };
                pipeline::run(ctx, &mut capture);
            })
            .map_err(|e| HarkError::Other(anyhow::anyhow!("failed to spawn worker: {e}")))?;

        match open_rx.recv() {
            Ok(Ok(())) => {
                self.worker = Some(handle);
                self.set_status(EngineStatus::Listening, None);
                info!("wake engine started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                // Worker died before reporting; treat as an open failure.
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                let e = HarkError::CaptureOpen("worker exited before opening capture".into());
                self.set_status(EngineStatus::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Request an orderly stop and wait (bounded) for the worker.
    ///
    /// # Errors
    /// `HarkError::NotRunning` when no session is active.
    pub fn stop(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(HarkError::NotRunning)?;
        self.running.store(false, Ordering::SeqCst);

        let deadline = std::time::Instant::now() + STOP_JOIN_TIMEOUT;
        while !worker.is_finished() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if worker.is_finished() {
            if worker.join().is_err() {
                warn!("pipeline worker panicked during shutdown");
            }
            info!("wake engine stopped");
        } else {
            // Detach rather than hang the caller; the worker exits as
            // soon as its current blocking read returns.
            warn!("pipeline worker did not exit within the stop timeout; detaching");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current engine status as last set by the controller or pipeline.
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe_wake(&self) -> broadcast::Receiver<WakeEvent> {
        self.wake_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<AudioActivityEvent> {
        self.activity_tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn set_status(&self, status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = status;
        let _ = self.status_tx.send(EngineStatusEvent { status, detail });
    }

    /// Join a finished worker left over from a session that terminated
    /// on its own (fatal pipeline error).
    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                self.worker = Some(handle);
            }
        }
    }
}

impl Drop for WakeEngine {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.stop();
        }
    }
}
