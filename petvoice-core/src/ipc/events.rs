//! Events broadcast by [`SynthesisEngine`](crate::SynthesisEngine) and
//! [`RecognitionSession`](crate::RecognitionSession).
//!
//! | Event | Subscribe with |
//! |-------|----------------|
//! | `SynthesisEvent` | `SynthesisEngine::subscribe()` |
//! | `RecognitionEvent` | `RecognitionSession::subscribe()` |
//!
//! Every event is a tagged JSON object: `{"type": "statusChanged", ...}`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Playback lifecycle of the synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisStatus {
    /// Nothing loading or playing.
    #[default]
    Idle,
    /// Waiting on remote synthesis or the local fallback.
    Loading,
    /// Audio is audible.
    Playing,
    /// Audio is held and may be resumed.
    Paused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SynthesisEvent {
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        status: SynthesisStatus,
        /// Text of the utterance in flight, `None` once idle.
        current_text: Option<String>,
    },
    /// Hard failure surfaced to the user (playback or decode).
    Error { message: String },
    /// Soft notice: remote synthesis failed and the local voice was used.
    Advisory { message: String },
    VolumeChanged { volume: f32 },
    AutoPlayChanged { enabled: bool },
    /// Preferred voice id; empty means the language default.
    #[serde(rename_all = "camelCase")]
    VoiceChanged { voice_id: String },
    /// Number of utterances waiting behind the current one.
    QueueChanged { pending: usize },
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// Whether a recognition session ends after the first final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionMode {
    #[default]
    SingleShot,
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecognitionEvent {
    ListeningChanged { listening: bool },
    /// Accumulated final text plus the current partial, if any.
    Transcript { transcript: String, interim: String },
    Confidence { value: f32 },
    /// `code` is the stable identifier of the error category
    /// (`"permission-denied"`, `"network"`, ...).
    Error { code: String, message: String },
}
