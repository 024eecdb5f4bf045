//! Input-device enumeration and capture-source preference scoring.
//!
//! Source selection is an ordered retry: the engine walks its
//! [`SourcePreference`] list and the first device that opens wins the
//! session. Preference resolution is name-heuristic only — there is no
//! portable API for "this is a voice-optimized microphone".

use serde::{Deserialize, Serialize};

/// One entry in the ordered capture-source preference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourcePreference {
    /// Prefer a device whose name suggests a speech-oriented input
    /// (headset, mic array, communications device).
    VoiceOptimized,
    /// The system default input device, whatever it is.
    GenericMicrophone,
}

/// Metadata about an audio input device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Heuristic flag for devices that likely capture system/output audio.
    pub is_loopback_like: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "what u hear",
    "what you hear",
    "loopback",
    "monitor of",
    "virtual output",
    "speakers (",
    "headphones (",
];

const VOICE_KEYWORDS: &[&str] = &[
    "headset",
    "communications",
    "array",
    "microphone",
    "mic",
    "voice",
    "webcam",
    "usb",
];

/// Best-effort heuristic for loopback/system-output capture devices.
/// These are the worst possible wake-word inputs: they hear the
/// machine's own speech output.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Score a device name for likely voice-capture quality. Higher is better.
pub fn voice_preference_score(name: &str) -> i32 {
    let lowered = name.trim().to_ascii_lowercase();
    let mut score = 0;
    if is_loopback_like_name(&lowered) {
        score -= 16;
    } else {
        score += 8;
    }
    // Earlier keywords are stronger signals of a speech-oriented device.
    for (rank, keyword) in VOICE_KEYWORDS.iter().enumerate() {
        if lowered.contains(keyword) {
            score += (VOICE_KEYWORDS.len() - rank) as i32;
            break;
        }
    }
    score
}

/// List all available audio input devices on the system.
///
/// Returns an empty `Vec` if cpal is unavailable or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .enumerate()
            .map(|(idx, device)| {
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                let is_default = default_name.as_deref() == Some(name.as_str());
                let is_loopback_like = is_loopback_like_name(&name);
                DeviceInfo {
                    name,
                    is_default,
                    is_loopback_like,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            vec![]
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_loopback_names() {
        assert!(is_loopback_like_name("Stereo Mix (Realtek Audio)"));
        assert!(is_loopback_like_name("Monitor of Built-in Audio"));
        assert!(is_loopback_like_name("Speakers (High Definition Audio Device)"));
        assert!(!is_loopback_like_name("Headset Microphone (USB Audio)"));
    }

    #[test]
    fn scores_headset_above_generic_and_loopback() {
        let headset = voice_preference_score("Headset Microphone (Jabra)");
        let generic = voice_preference_score("Built-in Audio Analog Stereo");
        let loopback = voice_preference_score("Stereo Mix (Realtek Audio)");
        assert!(headset > generic);
        assert!(generic > loopback);
    }

    #[test]
    fn preference_serializes_kebab_case() {
        let json = serde_json::to_string(&SourcePreference::VoiceOptimized).unwrap();
        assert_eq!(json, r#""voice-optimized""#);
        let parsed: SourcePreference = serde_json::from_str(r#""generic-microphone""#).unwrap();
        assert_eq!(parsed, SourcePreference::GenericMicrophone);
    }
}
