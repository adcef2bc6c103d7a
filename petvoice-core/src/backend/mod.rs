//! Speech capability traits and their concrete implementations.
//!
//! | Trait | Used by | Implementations |
//! |-------|---------|-----------------|
//! | [`SynthesisBackend`] | `SynthesisEngine` (remote path) | [`HttpSynthesisBackend`], [`OfflineSynthesis`] |
//! | [`LocalSpeech`] | `SynthesisEngine` (fallback path) | [`EspeakFallback`] |
//! | [`RecognitionBackend`] | `RecognitionSession` | [`UnsupportedRecognition`] |
//!
//! Every capability is injected as `Arc<dyn Trait>` so tests can substitute
//! hand-written fakes.

pub mod espeak;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::audio::Playback;
use crate::error::{Result, VoiceError};

pub use espeak::EspeakFallback;
pub use http::HttpSynthesisBackend;

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Parameters sent to a remote synthesizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    /// Relative speaking rate, e.g. `"+0%"` or `"-10%"`.
    pub rate: String,
    /// Relative pitch, e.g. `"+0Hz"`.
    pub pitch: String,
}

/// Remote text-to-speech. Returns an encoded audio payload.
///
/// The engine bounds every call with its own timeout; implementations do
/// not need one.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalUtterance {
    pub text: String,
    /// BCP-47 tag, e.g. `"it-IT"`.
    pub language: String,
    pub volume: f32,
}

/// On-device speech used when remote synthesis fails.
///
/// The returned playback is already audible; its completion channel reports
/// when the utterance ends and its control stops it early.
#[async_trait]
pub trait LocalSpeech: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn speak(&self, utterance: &LocalUtterance) -> Result<Playback>;
}

/// Remote synthesis for hosts with no endpoint configured. Every call fails,
/// so the engine goes straight to the local voice.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineSynthesis;

#[async_trait]
impl SynthesisBackend for OfflineSynthesis {
    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>> {
        Err(VoiceError::Unavailable(
            "remote synthesis (no endpoint configured)".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerConfig {
    pub language: String,
    pub interim_results: bool,
    pub max_alternatives: u32,
    /// Keep listening after a final result.
    pub continuous: bool,
}

/// One recognised segment within a result event.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSegment {
    pub is_final: bool,
    pub transcript: String,
    /// `0.0..=1.0`; recognisers that do not score report `0.0`.
    pub confidence: f32,
}

/// What a platform recognizer reports.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    /// `results` is the recognizer's running list; only entries from
    /// `result_index` onward are new.
    Result {
        result_index: usize,
        results: Vec<RecognizedSegment>,
    },
    /// `code` is the platform error identifier (`"no-speech"`, `"network"`, ...).
    Error { code: String, message: String },
    /// No further events will follow.
    End,
}

pub trait RecognizerControl: Send + Sync {
    /// Stop listening but deliver any pending final result, then `End`.
    fn stop(&self);
    /// Stop immediately and drop pending results.
    fn abort(&self);
}

/// A running recognizer: control handle plus event stream.
pub struct Recognizer {
    pub control: Box<dyn RecognizerControl>,
    pub events: mpsc::UnboundedReceiver<RecognizerEvent>,
}

impl std::fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recognizer").finish_non_exhaustive()
    }
}

pub trait RecognitionBackend: Send + Sync {
    fn is_supported(&self) -> bool;
    fn start(&self, config: RecognizerConfig) -> Result<Recognizer>;
}

/// Recognition capability for hosts without a speech recognizer.
///
/// `is_supported()` is `false`, so every session operation is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedRecognition;

impl RecognitionBackend for UnsupportedRecognition {
    fn is_supported(&self) -> bool {
        false
    }

    fn start(&self, _config: RecognizerConfig) -> Result<Recognizer> {
        Err(VoiceError::Unavailable("speech recognition".into()))
    }
}
