//! Blocking frame-ingest loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Poll stop flag
//! 2. source.read → one fixed-duration PCM16 frame (bounded blocking)
//! 3. AnalysisRing.write (overwrite-oldest sliding window)
//! 4. Skip everything below until warmup elapsed ∧ ring full
//! 5. snapshot + normalize → f32 analysis window
//! 6. Energy gate — rejected windows stop here (no inference, no smoothing)
//! 7. Classifier infer → raw score
//! 8. ScoreSmoother push → rolling average
//! 9. TriggerDecider.evaluate → maybe emit WakeEvent
//! ```
//!
//! The whole loop runs on one dedicated worker thread. All mutable
//! pipeline state (ring, smoother, decider) lives in this function's
//! locals; the only cross-thread traffic is the stop flag and the
//! outbound broadcast sends, which never block.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    audio::AudioSource,
    buffering::window::{normalize_window, AnalysisRing},
    classifier::ClassifierHandle,
    decision::{ScoreSmoother, TriggerDecider},
    engine::EngineConfig,
    error::HarkError,
    events::{AudioActivityEvent, EngineStatus, EngineStatusEvent, WakeEvent},
    vad::{EnergyGate, VoiceGate},
};

/// Consecutive explicit read failures tolerated before the worker gives up.
/// A single failure is a transient; a run of them means the device is gone.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 5;

pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub windows_evaluated: AtomicUsize,
    pub windows_gated: AtomicUsize,
    pub inference_calls: AtomicUsize,
    pub inference_errors: AtomicUsize,
    pub triggers: AtomicUsize,
    pub stalls: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            samples_in: AtomicUsize::new(0),
            windows_evaluated: AtomicUsize::new(0),
            windows_gated: AtomicUsize::new(0),
            inference_calls: AtomicUsize::new(0),
            inference_errors: AtomicUsize::new(0),
            triggers: AtomicUsize::new(0),
            stalls: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.windows_evaluated.store(0, Ordering::Relaxed);
        self.windows_gated.store(0, Ordering::Relaxed);
        self.inference_calls.store(0, Ordering::Relaxed);
        self.inference_errors.store(0, Ordering::Relaxed);
        self.triggers.store(0, Ordering::Relaxed);
        self.stalls.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            windows_evaluated: self.windows_evaluated.load(Ordering::Relaxed),
            windows_gated: self.windows_gated.load(Ordering::Relaxed),
            inference_calls: self.inference_calls.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub windows_evaluated: usize,
    pub windows_gated: usize,
    pub inference_calls: usize,
    pub inference_errors: usize,
    pub triggers: usize,
    pub stalls: usize,
}

/// All context the worker needs, passed as one struct so the spawn
/// closure stays tidy. The capture source is *not* part of this struct:
/// it may be `!Send` (cpal) and must be created on the worker thread.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub classifier: ClassifierHandle,
    pub gate: Box<dyn VoiceGate>,
    pub running: Arc<AtomicBool>,
    pub wake_tx: broadcast::Sender<WakeEvent>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub activity_tx: broadcast::Sender<AudioActivityEvent>,
    pub status: Arc<Mutex<EngineStatus>>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Run the blocking frame-ingest loop until `ctx.running` becomes false
/// or a fatal condition terminates the session.
///
/// Emits exactly one terminal status event on exit: `Stopped` for an
/// orderly stop, `Error` with detail for a fatal condition.
pub fn run(mut ctx: PipelineContext, source: &mut dyn AudioSource) {
    info!(
        sample_rate = ctx.config.sample_rate,
        frame_samples = ctx.config.frame_samples(),
        window_samples = ctx.config.window_samples(),
        policy = ?ctx.config.decision_policy,
        "pipeline started"
    );

    let terminal = ingest_loop(&mut ctx, source);

    // Orderly teardown on the worker thread, fatal or not: the capture
    // stream and the classifier's session state are released here even
    // when the loop exited early.
    source.stop();
    ctx.classifier.0.lock().reset();
    ctx.gate.reset();

    let snap = ctx.diagnostics.snapshot();
    info!(
        samples_in = snap.samples_in,
        windows_evaluated = snap.windows_evaluated,
        windows_gated = snap.windows_gated,
        inference_calls = snap.inference_calls,
        inference_errors = snap.inference_errors,
        triggers = snap.triggers,
        stalls = snap.stalls,
        "pipeline stopped — diagnostics"
    );

    match terminal {
        Ok(()) => set_status(&ctx, EngineStatus::Stopped, None),
        Err(e) => {
            error!("pipeline terminated: {e}");
            ctx.running.store(false, Ordering::SeqCst);
            set_status(&ctx, EngineStatus::Error, Some(e.to_string()));
        }
    }
}

fn ingest_loop(
    ctx: &mut PipelineContext,
    source: &mut dyn AudioSource,
) -> Result<(), HarkError> {
    let started_at = Instant::now();

    // Per-session state, owned by this thread for the session's lifetime.
    let mut ring = AnalysisRing::new(ctx.config.window_samples());
    let mut smoother = ScoreSmoother::new(ctx.config.smoothing_window);
    let mut decider = TriggerDecider::new(
        ctx.config.decision_policy,
        ctx.config.detection_threshold,
        ctx.config.warmup(),
        ctx.config.cooldown(),
        started_at,
    );

    // Scratch buffers reused every iteration.
    let mut frame = vec![0i16; ctx.config.frame_samples()];
    let mut raw_window: Vec<i16> = Vec::with_capacity(ctx.config.window_samples());
    let mut window: Vec<f32> = Vec::with_capacity(ctx.config.window_samples());

    let expected_len = ctx.classifier.0.lock().window_len();

    let mut zero_read_streak = 0usize;
    let mut read_error_streak = 0u32;
    let mut inference_failure_streak = 0usize;
    let mut degraded = false;
    let mut activity_seq = 0u64;

    loop {
        // ── 0. Cooperative stop check ─────────────────────────────────────
        if !ctx.running.load(Ordering::Relaxed) {
            return Ok(());
        }

        // ── 1. Pull one frame (bounded blocking read) ─────────────────────
        let n = match source.read(&mut frame) {
            Ok(n) => {
                read_error_streak = 0;
                n
            }
            Err(e) => {
                read_error_streak += 1;
                if read_error_streak >= MAX_CONSECUTIVE_READ_ERRORS {
                    return Err(HarkError::CaptureRead(format!(
                        "{read_error_streak} consecutive read failures, last: {e}"
                    )));
                }
                warn!(read_error_streak, "transient capture read failure: {e}");
                continue;
            }
        };

        if n == 0 {
            zero_read_streak += 1;
            if zero_read_streak == ctx.config.stall_streak_threshold {
                ctx.diagnostics.stalls.fetch_add(1, Ordering::Relaxed);
                warn!(
                    streak = zero_read_streak,
                    "capture stall: sustained zero-length reads"
                );
            }
            continue;
        }
        if zero_read_streak > 0 {
            debug!(streak = zero_read_streak, "capture recovered after under-run");
            zero_read_streak = 0;
        }

        // ── 2. Slide the analysis window ──────────────────────────────────
        ring.write(&frame[..n]);
        ctx.diagnostics.samples_in.fetch_add(n, Ordering::Relaxed);

        // ── 3. Warmup / fill gate ─────────────────────────────────────────
        let now = Instant::now();
        if !decider.is_armed(ring.is_full(), now) {
            continue;
        }

        // ── 4. Extract the normalized window ──────────────────────────────
        ring.snapshot(&mut raw_window);
        normalize_window(&raw_window, &mut window);
        ctx.diagnostics
            .windows_evaluated
            .fetch_add(1, Ordering::Relaxed);

        // ── 5. Energy gate ────────────────────────────────────────────────
        let rms = EnergyGate::rms(&window);
        let is_voice = ctx.gate.is_voice(&window);
        let _ = ctx.activity_tx.send(AudioActivityEvent {
            seq: activity_seq,
            rms,
            gated: !is_voice,
        });
        activity_seq = activity_seq.saturating_add(1);

        if !is_voice {
            // Hard short-circuit: no inference, no smoother update, no
            // trigger evaluation on near-silence.
            ctx.diagnostics.windows_gated.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        // ── 6. Classify ───────────────────────────────────────────────────
        if window.len() != expected_len {
            return Err(HarkError::WindowShape {
                expected: expected_len,
                actual: window.len(),
            });
        }

        ctx.diagnostics
            .inference_calls
            .fetch_add(1, Ordering::Relaxed);
        let raw_score = {
            let mut classifier = ctx.classifier.0.lock();
            match classifier.infer(&window) {
                Ok(score) => score.clamp(0.0, 1.0),
                Err(e) => {
                    ctx.diagnostics
                        .inference_errors
                        .fetch_add(1, Ordering::Relaxed);
                    inference_failure_streak += 1;
                    warn!(inference_failure_streak, "inference failed: {e}");
                    if inference_failure_streak == ctx.config.degraded_failure_streak && !degraded
                    {
                        degraded = true;
                        set_status(
                            ctx,
                            EngineStatus::Degraded,
                            Some(format!(
                                "{inference_failure_streak} consecutive inference failures"
                            )),
                        );
                    }
                    // The window's score is skipped entirely — not zero.
                    continue;
                }
            }
        };

        if degraded {
            degraded = false;
            inference_failure_streak = 0;
            set_status(ctx, EngineStatus::Listening, None);
        } else {
            inference_failure_streak = 0;
        }

        // ── 7. Smooth ─────────────────────────────────────────────────────
        smoother.push(raw_score);
        let prev_avg = smoother.previous_average();
        let curr_avg = smoother.average();

        // ── 8. Decide ─────────────────────────────────────────────────────
        if decider.evaluate(prev_avg, curr_avg, Instant::now()) {
            let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
            let event = WakeEvent {
                seq,
                confidence: curr_avg,
                raw_score,
                session_offset_ms: started_at.elapsed().as_millis() as u64,
            };
            ctx.diagnostics.triggers.fetch_add(1, Ordering::Relaxed);
            let emitted = ctx.wake_tx.send(event).is_ok();
            info!(
                seq,
                confidence = format_args!("{curr_avg:.3}"),
                raw_score = format_args!("{raw_score:.3}"),
                emitted,
                "wake word detected"
            );
        }
    }
}

fn set_status(ctx: &PipelineContext, new_status: EngineStatus, detail: Option<String>) {
    *ctx.status.lock() = new_status;
    let _ = ctx.status_tx.send(EngineStatusEvent {
        status: new_status,
        detail,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    use tokio::sync::broadcast::error::TryRecvError;

    use crate::classifier::WakeClassifier;
    use crate::error::Result;
    use crate::vad::EnergyGate;

    /// Scripted source: hands out pre-baked frames, then a configurable
    /// tail behaviour (under-run or explicit errors).
    struct ScriptedSource {
        frames: VecDeque<Vec<i16>>,
        tail: Tail,
    }

    enum Tail {
        Underrun,
        Errors,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Vec<i16>>, tail: Tail) -> Self {
            Self {
                frames: frames.into(),
                tail,
            }
        }
    }

    impl AudioSource for ScriptedSource {
        fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
            match self.frames.pop_front() {
                Some(frame) => {
                    let n = frame.len().min(buf.len());
                    buf[..n].copy_from_slice(&frame[..n]);
                    Ok(n)
                }
                None => {
                    // Emulate the bounded blocking read of a real source.
                    thread::sleep(Duration::from_millis(1));
                    match self.tail {
                        Tail::Underrun => Ok(0),
                        Tail::Errors => Err(HarkError::CaptureRead("device unplugged".into())),
                    }
                }
            }
        }

        fn stop(&mut self) {}
    }

    /// Classifier that replays a scripted score sequence and counts calls.
    struct ScriptedClassifier {
        scores: VecDeque<f32>,
        last: f32,
        window_len: usize,
        calls: Arc<AtomicUsize>,
        fail_always: bool,
    }

    impl ScriptedClassifier {
        fn new(scores: Vec<f32>, window_len: usize, calls: Arc<AtomicUsize>) -> Self {
            Self {
                scores: scores.into(),
                last: 0.0,
                window_len,
                calls,
                fail_always: false,
            }
        }

        fn failing(window_len: usize, calls: Arc<AtomicUsize>) -> Self {
            Self {
                scores: VecDeque::new(),
                last: 0.0,
                window_len,
                calls,
                fail_always: true,
            }
        }
    }

    impl WakeClassifier for ScriptedClassifier {
        fn warm_up(&mut self) -> Result<()> {
            Ok(())
        }

        fn infer(&mut self, _window: &[f32]) -> Result<f32> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_always {
                return Err(HarkError::Inference("intentional test failure".into()));
            }
            if let Some(score) = self.scores.pop_front() {
                self.last = score;
            }
            Ok(self.last)
        }

        fn window_len(&self) -> usize {
            self.window_len
        }

        fn reset(&mut self) {}
    }

    const TEST_SAMPLE_RATE: u32 = 16_000;
    const TEST_FRAME_MS: u64 = 80;
    const TEST_FRAME: usize = 1_280;
    const TEST_WINDOW: usize = 16_000;

    fn base_config() -> EngineConfig {
        EngineConfig {
            sample_rate: TEST_SAMPLE_RATE,
            frame_duration_ms: TEST_FRAME_MS,
            warmup_ms: 0,
            ..EngineConfig::default()
        }
    }

    /// Sender clones held by the test so the broadcast channels stay open
    /// after the worker drops its `PipelineContext`; otherwise `try_recv`
    /// on an empty receiver reports `Closed` instead of `Empty`.
    struct ChannelGuard {
        _wake_tx: broadcast::Sender<WakeEvent>,
        _status_tx: broadcast::Sender<EngineStatusEvent>,
    }

    fn make_ctx(
        config: EngineConfig,
        classifier: ScriptedClassifier,
    ) -> (
        PipelineContext,
        Arc<AtomicBool>,
        broadcast::Receiver<WakeEvent>,
        broadcast::Receiver<EngineStatusEvent>,
        ChannelGuard,
    ) {
        let (wake_tx, wake_rx) = broadcast::channel(16);
        let (status_tx, status_rx) = broadcast::channel(16);
        let guard = ChannelGuard {
            _wake_tx: wake_tx.clone(),
            _status_tx: status_tx.clone(),
        };
        let (activity_tx, _) = broadcast::channel(64);
        let running = Arc::new(AtomicBool::new(true));
        let threshold = config.vad_rms_threshold;

        let ctx = PipelineContext {
            config,
            classifier: ClassifierHandle::new(classifier),
            gate: Box::new(EnergyGate::new(threshold)),
            running: Arc::clone(&running),
            wake_tx,
            status_tx,
            activity_tx,
            status: Arc::new(Mutex::new(EngineStatus::Listening)),
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        };
        (ctx, running, wake_rx, status_rx, guard)
    }

    fn loud_frames(count: usize) -> Vec<Vec<i16>> {
        // Amplitude 3000 ≈ 0.09 normalized RMS, well above the 0.01 gate.
        (0..count).map(|_| vec![3_000i16; TEST_FRAME]).collect()
    }

    fn silent_frames(count: usize) -> Vec<Vec<i16>> {
        (0..count).map(|_| vec![0i16; TEST_FRAME]).collect()
    }

    /// Frames needed to fill the one-second analysis ring.
    fn fill_frames() -> usize {
        TEST_WINDOW.div_ceil(TEST_FRAME)
    }

    fn recv_wake_with_timeout(
        rx: &mut broadcast::Receiver<WakeEvent>,
        timeout: Duration,
    ) -> WakeEvent {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return ev,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for wake event");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("wake channel closed unexpectedly"),
            }
        }
    }

    fn recv_status_with_timeout(
        rx: &mut broadcast::Receiver<EngineStatusEvent>,
        want: EngineStatus,
        timeout: Duration,
    ) -> EngineStatusEvent {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) if ev.status == want => return ev,
                Ok(_) => continue,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for status {want:?}");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("status channel closed unexpectedly"),
            }
        }
    }

    #[test]
    fn silence_produces_no_inference_and_no_triggers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::new(vec![], TEST_WINDOW, Arc::clone(&calls));
        let (ctx, running, mut wake_rx, _status_rx, _guard) = make_ctx(base_config(), classifier);
        let diagnostics = Arc::clone(&ctx.diagnostics);

        // Well over one second of pure silence.
        let mut source = ScriptedSource::new(silent_frames(fill_frames() + 6), Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        thread::sleep(Duration::from_millis(80));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        let snap = diagnostics.snapshot();
        assert_eq!(calls.load(Ordering::Relaxed), 0, "classifier ran on silence");
        assert_eq!(snap.inference_calls, 0);
        assert_eq!(snap.triggers, 0);
        assert!(snap.windows_gated > 0, "expected gated windows");
        assert!(matches!(wake_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn no_classifier_call_before_warmup_even_with_full_ring() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::new(vec![0.9], TEST_WINDOW, Arc::clone(&calls));
        let mut config = base_config();
        config.warmup_ms = 60_000;
        let (ctx, running, _wake_rx, _status_rx, _guard) = make_ctx(config, classifier);
        let diagnostics = Arc::clone(&ctx.diagnostics);

        // Loud audio fills the ring almost immediately, but warmup has
        // not elapsed, so nothing past the ring write may run.
        let mut source = ScriptedSource::new(loud_frames(fill_frames() + 8), Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        thread::sleep(Duration::from_millis(80));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        let snap = diagnostics.snapshot();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(snap.windows_evaluated, 0);
        assert!(snap.samples_in > 0);
    }

    #[test]
    fn score_ramp_triggers_exactly_once() {
        // Rolling average over a growing history crosses 0.5 at the
        // eighth evaluated window: avg(0.1..0.95) = 0.52.
        let ramp = vec![0.1, 0.22, 0.34, 0.46, 0.58, 0.70, 0.82, 0.95];
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::new(ramp, TEST_WINDOW, Arc::clone(&calls));
        let (ctx, running, mut wake_rx, _status_rx, _guard) = make_ctx(base_config(), classifier);
        let diagnostics = Arc::clone(&ctx.diagnostics);

        // Fill the ring, then enough frames for the ramp plus a tail of
        // high scores that must not re-fire under rising-edge policy.
        let mut source =
            ScriptedSource::new(loud_frames(fill_frames() + 14), Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        let event = recv_wake_with_timeout(&mut wake_rx, Duration::from_secs(2));
        // Let the remaining frames drain so a double-fire would show up.
        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert_eq!(event.seq, 0);
        assert!(event.confidence >= 0.5, "confidence={}", event.confidence);
        assert!((event.raw_score - 0.95).abs() < 1e-6);
        assert_eq!(diagnostics.snapshot().triggers, 1);
        assert!(matches!(wake_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn repeated_inference_failures_surface_degraded_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::failing(TEST_WINDOW, Arc::clone(&calls));
        let mut config = base_config();
        config.degraded_failure_streak = 3;
        let (ctx, running, mut wake_rx, mut status_rx, _guard) = make_ctx(config, classifier);
        let diagnostics = Arc::clone(&ctx.diagnostics);

        let mut source = ScriptedSource::new(loud_frames(fill_frames() + 8), Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        let degraded =
            recv_status_with_timeout(&mut status_rx, EngineStatus::Degraded, Duration::from_secs(2));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert!(degraded
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("consecutive inference failures"));
        let snap = diagnostics.snapshot();
        assert!(snap.inference_errors >= 3);
        assert_eq!(snap.triggers, 0, "failed inference must never score");
        assert!(matches!(wake_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn window_length_mismatch_is_fatal_before_any_inference() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Classifier expects half the configured window: the shape check
        // must trip on the first accepted window, before infer runs.
        let classifier =
            ScriptedClassifier::new(vec![0.9], TEST_WINDOW / 2, Arc::clone(&calls));
        let (ctx, running, _wake_rx, mut status_rx, _guard) = make_ctx(base_config(), classifier);

        let mut source = ScriptedSource::new(loud_frames(fill_frames() + 2), Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        // The worker must terminate on its own.
        handle.join().expect("pipeline thread panicked");
        assert!(!running.load(Ordering::SeqCst));

        let terminal = recv_status_with_timeout(
            &mut status_rx,
            EngineStatus::Error,
            Duration::from_millis(200),
        );
        assert!(terminal
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("length mismatch"));
        assert_eq!(calls.load(Ordering::Relaxed), 0, "infer must never run");
    }

    #[test]
    fn read_error_streak_is_fatal_with_terminal_error_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::new(vec![], TEST_WINDOW, Arc::clone(&calls));
        let (ctx, running, _wake_rx, mut status_rx, _guard) = make_ctx(base_config(), classifier);

        let mut source = ScriptedSource::new(vec![], Tail::Errors);
        let handle = thread::spawn(move || run(ctx, &mut source));

        // The worker must terminate on its own, without a stop request.
        handle.join().expect("pipeline thread panicked");
        assert!(!running.load(Ordering::SeqCst));

        let terminal =
            recv_status_with_timeout(&mut status_rx, EngineStatus::Error, Duration::from_millis(200));
        assert!(terminal
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("consecutive read failures"));
    }

    #[test]
    fn orderly_stop_emits_single_stopped_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::new(vec![], TEST_WINDOW, Arc::clone(&calls));
        let (ctx, running, _wake_rx, mut status_rx, _guard) = make_ctx(base_config(), classifier);

        let mut source = ScriptedSource::new(silent_frames(4), Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        thread::sleep(Duration::from_millis(30));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        recv_status_with_timeout(&mut status_rx, EngineStatus::Stopped, Duration::from_millis(200));
        // No further status events after the terminal one.
        assert!(matches!(status_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn zero_read_streak_logs_stall_but_keeps_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = ScriptedClassifier::new(vec![], TEST_WINDOW, Arc::clone(&calls));
        let mut config = base_config();
        config.stall_streak_threshold = 5;
        let (ctx, running, _wake_rx, _status_rx, _guard) = make_ctx(config, classifier);
        let diagnostics = Arc::clone(&ctx.diagnostics);

        // Nothing but under-runs: diagnostic only, never fatal.
        let mut source = ScriptedSource::new(vec![], Tail::Underrun);
        let handle = thread::spawn(move || run(ctx, &mut source));

        thread::sleep(Duration::from_millis(60));
        assert!(running.load(Ordering::SeqCst), "stall must not stop the loop");
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert_eq!(diagnostics.snapshot().stalls, 1);
    }
}
