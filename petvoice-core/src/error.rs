use std::time::Duration;

use thiserror::Error;

/// All errors produced by petvoice-core.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0} is not available")]
    Unavailable(String),

    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("speech synthesis timed out after {0:?}")]
    SynthesisTimeout(Duration),

    #[error("audio decode error: {0}")]
    AudioDecode(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("recognizer failed to start: {0}")]
    RecognitionStart(String),

    #[error("preference store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VoiceError>;
