//! Engine configuration loading: JSON file, then `HARK_*` env overrides.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use hark_core::{DecisionPolicy, EngineConfig};
use tracing::{info, warn};

/// Resolve the config file path: `HARK_CONFIG` wins, otherwise the
/// platform data directory.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("HARK_CONFIG") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("Hark")
            .join("config.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("hark")
            .join("config.json")
    }
}

/// Load the engine config: file if present (missing file is fine, bad
/// JSON is an error), then env overrides on top.
pub fn load_config() -> anyhow::Result<EngineConfig> {
    let path = default_config_path();
    let mut config = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let parsed = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "loaded config file");
        parsed
    } else {
        EngineConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply `HARK_*` overrides from `lookup` onto `config`. Unparseable
/// values are logged and skipped, never fatal.
pub fn apply_env_overrides(
    config: &mut EngineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    fn parse_into<T: std::str::FromStr>(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        slot: &mut T,
    ) {
        if let Some(raw) = lookup(key) {
            match raw.parse() {
                Ok(value) => *slot = value,
                Err(_) => warn!(key, raw, "ignoring unparseable override"),
            }
        }
    }

    parse_into(&lookup, "HARK_DETECTION_THRESHOLD", &mut config.detection_threshold);
    parse_into(&lookup, "HARK_VAD_RMS_THRESHOLD", &mut config.vad_rms_threshold);
    parse_into(&lookup, "HARK_SMOOTHING_WINDOW", &mut config.smoothing_window);
    parse_into(&lookup, "HARK_COOLDOWN_MS", &mut config.cooldown_ms);
    parse_into(&lookup, "HARK_WARMUP_MS", &mut config.warmup_ms);
    parse_into(&lookup, "HARK_FRAME_DURATION_MS", &mut config.frame_duration_ms);

    if let Some(raw) = lookup("HARK_DECISION_POLICY") {
        match raw.as_str() {
            "rising-edge" => config.decision_policy = DecisionPolicy::RisingEdge,
            "level-crossing" => config.decision_policy = DecisionPolicy::LevelCrossing,
            _ => warn!(raw, "ignoring unknown decision policy"),
        }
    }
}
