//! Audio capture.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated
//! priority. It must not allocate after warm-up, block on a lock, or
//! perform I/O. The callback therefore only converts samples to PCM16
//! mono and pushes them into a lock-free SPSC ring; the worker thread
//! pulls fixed-duration frames back out through the blocking
//! [`AudioSource::read`].
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows,
//! CoreAudio on macOS). [`MicCapture`] must be created and dropped on
//! the same thread; the engine opens it inside the worker thread for
//! exactly this reason.

pub mod device;

pub use device::{DeviceInfo, SourcePreference};

use std::time::Duration;

use crate::error::Result;

/// Blocking pull-model audio source consumed by the pipeline worker.
///
/// `read` fills `buf` with as many mono PCM16 samples as arrive within
/// an implementation-defined bound and returns the count — possibly 0,
/// which the caller treats as a transient under-run, never an error.
pub trait AudioSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize>;

    /// Stop delivering samples. Dropping the source releases the device.
    fn stop(&mut self);
}

#[cfg(feature = "audio-cpal")]
pub use cpal_capture::MicCapture;

#[cfg(feature = "audio-cpal")]
mod cpal_capture {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use std::time::{Duration, Instant};

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        Device, SampleFormat, SampleRate, Stream, StreamConfig,
    };
    use tracing::{error, info, warn};

    use super::device::{voice_preference_score, SourcePreference};
    use super::AudioSource;
    use crate::buffering::{create_capture_ring, CaptureConsumer, Consumer, Producer};
    use crate::error::{HarkError, Result};

    /// How long `read` polls the ring before giving up and reporting a
    /// short (possibly zero-length) read.
    const READ_POLL_INTERVAL: Duration = Duration::from_millis(2);

    /// Live microphone capture stream.
    ///
    /// **Not `Send`** — holds a `cpal::Stream` bound to its creation
    /// thread. Create, use, and drop on the worker thread.
    pub struct MicCapture {
        /// Kept alive so the stream is not dropped prematurely.
        _stream: Stream,
        consumer: CaptureConsumer,
        /// Shared flag — set to `false` to make the callback a no-op.
        active: Arc<AtomicBool>,
        read_timeout: Duration,
        pub device_name: String,
    }

    impl MicCapture {
        /// Open the first capture source in `preferences` that
        /// initializes successfully at `sample_rate` Hz mono PCM16.
        ///
        /// # Errors
        /// `HarkError::NoCaptureSource` when every preference fails;
        /// individual failures are logged and skipped.
        pub fn open(
            sample_rate: u32,
            read_timeout: Duration,
            preferences: &[SourcePreference],
        ) -> Result<Self> {
            for &pref in preferences {
                match Self::open_preference(pref, sample_rate, read_timeout) {
                    Ok(capture) => {
                        info!(
                            device = capture.device_name.as_str(),
                            ?pref,
                            sample_rate,
                            "capture source opened"
                        );
                        return Ok(capture);
                    }
                    Err(e) => {
                        warn!(?pref, "capture preference failed: {e}");
                    }
                }
            }
            Err(HarkError::NoCaptureSource {
                tried: preferences.len(),
            })
        }

        fn open_preference(
            pref: SourcePreference,
            sample_rate: u32,
            read_timeout: Duration,
        ) -> Result<Self> {
            let host = cpal::default_host();

            let device = match pref {
                SourcePreference::VoiceOptimized => {
                    let devices = host
                        .input_devices()
                        .map_err(|e| HarkError::CaptureOpen(e.to_string()))?;
                    devices
                        .filter_map(|d| {
                            d.name().ok().map(|n| (d, voice_preference_score(&n)))
                        })
                        .filter(|&(_, score)| score > 0)
                        .max_by_key(|&(_, score)| score)
                        .map(|(d, _)| d)
                        .ok_or_else(|| {
                            HarkError::CaptureOpen("no voice-optimized input device".into())
                        })?
                }
                SourcePreference::GenericMicrophone => host.default_input_device().ok_or_else(
                    || HarkError::CaptureOpen("no default input device".into()),
                )?,
            };

            Self::open_stream(&device, sample_rate, read_timeout)
        }

        fn open_stream(
            device: &Device,
            sample_rate: u32,
            read_timeout: Duration,
        ) -> Result<Self> {
            let device_name = device.name().unwrap_or_else(|_| "<unnamed>".into());

            let supported = device
                .default_input_config()
                .map_err(|e| HarkError::CaptureOpen(e.to_string()))?;
            let channels = supported.channels();
            let ch = channels as usize;

            let config = StreamConfig {
                channels,
                sample_rate: SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let (mut producer, consumer) = create_capture_ring();
            let active = Arc::new(AtomicBool::new(true));

            let stream = match supported.sample_format() {
                SampleFormat::I16 => {
                    let active_cb = Arc::clone(&active);
                    let mut mono: Vec<i16> = Vec::new();
                    device.build_input_stream(
                        &config,
                        move |data: &[i16], _info| {
                            if !active_cb.load(Ordering::Relaxed) {
                                return;
                            }
                            let frames = data.len() / ch;
                            mono.resize(frames, 0);
                            for f in 0..frames {
                                let base = f * ch;
                                let sum: i32 =
                                    data[base..base + ch].iter().map(|&s| s as i32).sum();
                                mono[f] = (sum / ch as i32) as i16;
                            }
                            let written = producer.push_slice(&mono);
                            if written < mono.len() {
                                warn!(
                                    "capture ring full: dropped {} samples",
                                    mono.len() - written
                                );
                            }
                        },
                        |err| error!("audio stream error: {err}"),
                        None,
                    )
                }

                SampleFormat::F32 => {
                    let active_cb = Arc::clone(&active);
                    let mut mono: Vec<i16> = Vec::new();
                    device.build_input_stream(
                        &config,
                        move |data: &[f32], _info| {
                            if !active_cb.load(Ordering::Relaxed) {
                                return;
                            }
                            let frames = data.len() / ch;
                            mono.resize(frames, 0);
                            for f in 0..frames {
                                let base = f * ch;
                                let sum: f32 = data[base..base + ch].iter().sum();
                                let avg = sum / ch as f32;
                                mono[f] = (avg.clamp(-1.0, 1.0) * 32767.0) as i16;
                            }
                            let written = producer.push_slice(&mono);
                            if written < mono.len() {
                                warn!(
                                    "capture ring full: dropped {} samples",
                                    mono.len() - written
                                );
                            }
                        },
                        |err| error!("audio stream error: {err}"),
                        None,
                    )
                }

                fmt => {
                    return Err(HarkError::CaptureOpen(format!(
                        "unsupported sample format: {fmt:?}"
                    )))
                }
            }
            .map_err(|e| HarkError::CaptureOpen(e.to_string()))?;

            stream
                .play()
                .map_err(|e| HarkError::CaptureOpen(e.to_string()))?;

            Ok(Self {
                _stream: stream,
                consumer,
                active,
                read_timeout,
                device_name,
            })
        }
    }

    impl AudioSource for MicCapture {
        fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
            let deadline = Instant::now() + self.read_timeout;
            let mut filled = 0;
            loop {
                filled += self.consumer.pop_slice(&mut buf[filled..]);
                if filled == buf.len() || Instant::now() >= deadline {
                    return Ok(filled);
                }
                std::thread::sleep(READ_POLL_INTERVAL);
            }
        }

        fn stop(&mut self) {
            self.active.store(false, Ordering::Release);
        }
    }
}

/// Derive the blocking read bound from a frame duration: enough slack
/// that a healthy stream always fills the frame, short enough that the
/// worker re-checks its stop flag promptly.
pub fn read_timeout_for_frame(frame_duration_ms: u64) -> Duration {
    Duration::from_millis(frame_duration_ms.saturating_mul(2).max(10))
}
