use thiserror::Error;

/// All errors produced by vigil-core.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("an analysis is already in flight")]
    AnalysisInFlight,

    #[error("detection service error: {0}")]
    Api(String),

    #[error("detection service rejected the request: {0}")]
    Rejected(String),

    #[error("malformed detection response: {0}")]
    Decode(String),

    #[error("unsupported or unrecognized media: {0}")]
    InvalidMedia(String),

    #[error("file too large: {actual} bytes (limit {limit})")]
    MediaTooLarge { limit: u64, actual: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VigilError>;
