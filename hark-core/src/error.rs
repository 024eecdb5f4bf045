use thiserror::Error;

/// All errors produced by hark-core.
#[derive(Debug, Error)]
pub enum HarkError {
    #[error("classifier failed to load: {0}")]
    ClassifierLoad(String),

    #[error("no capture source could be initialized (tried {tried} preference(s))")]
    NoCaptureSource { tried: usize },

    #[error("capture open error: {0}")]
    CaptureOpen(String),

    #[error("capture read error: {0}")]
    CaptureRead(String),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("analysis window length mismatch: classifier expects {expected}, got {actual}")]
    WindowShape { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarkError>;
