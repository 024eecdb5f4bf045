//! Hark command-line wake-word listener.
//!
//! Opens the default (or preferred) microphone, runs the spotting
//! pipeline with the stub classifier, and prints wake and status events
//! until Ctrl+C. Useful for checking levels, gate thresholds, and
//! trigger tuning without a UI.

mod settings;

use anyhow::Context;
use hark_core::{ClassifierHandle, EngineStatus, StubClassifier, WakeEngine};
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hark=info,hark_core=info".parse().unwrap()),
        )
        .init();

    let config = settings::load_config()?;
    info!(
        sample_rate = config.sample_rate,
        detection_threshold = config.detection_threshold,
        policy = ?config.decision_policy,
        "starting hark"
    );

    let classifier = ClassifierHandle::new(StubClassifier::new(config.window_samples()));
    let mut engine = WakeEngine::new(config, classifier)?;
    engine.warm_up().context("classifier warm-up failed")?;

    let mut wakes = engine.subscribe_wake();
    let mut statuses = engine.subscribe_status();
    engine.start().context("failed to start capture")?;

    println!("listening — Ctrl+C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nshutting down");
                break;
            }
            event = wakes.recv() => match event {
                Ok(ev) => println!(
                    "wake #{:<3} confidence={:.3} raw={:.3} at +{}ms",
                    ev.seq, ev.confidence, ev.raw_score, ev.session_offset_ms
                ),
                Err(RecvError::Lagged(skipped)) => {
                    info!(skipped, "wake subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            event = statuses.recv() => match event {
                Ok(ev) => {
                    if let Some(detail) = &ev.detail {
                        println!("status: {:?} ({detail})", ev.status);
                    } else {
                        println!("status: {:?}", ev.status);
                    }
                    if ev.status == EngineStatus::Error {
                        anyhow::bail!("engine terminated with an error");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.stop().context("failed to stop engine")?;
    Ok(())
}
