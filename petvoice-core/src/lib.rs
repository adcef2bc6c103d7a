//! # petvoice-core
//!
//! Speech engines for the pet companion: a synthesis engine that caches,
//! queues and plays replies, and a recognition session that turns microphone
//! input into a transcript and stops itself on silence.
//!
//! ## Architecture
//!
//! ```text
//! speak(text) ─► ClipCache ──hit──────────────────────────┐
//!                    │ miss                                │
//!                    ▼                                     ▼
//!            SynthesisBackend (15 s) ─► AudioBackend::prepare ─► AudioBackend::play
//!                    │ failure                              │
//!                    ▼                                      ▼
//!              LocalSpeech::speak ─────────────► Playback { control, finished }
//!
//! start() ─► RecognitionBackend::start ─► RecognizerEvent stream
//!                                              │
//!                          transcript / interim / confidence, SilenceTimer
//! ```
//!
//! Both engines publish state changes on `tokio::sync::broadcast` channels.
//! Every device, network and storage dependency is a trait object supplied at
//! construction.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod backend;
pub mod error;
pub mod ipc;
pub mod prefs;
pub mod recognition;
pub mod synthesis;
pub mod voices;

// Convenience re-exports for downstream crates
pub use audio::{AudioBackend, AudioClip, Microphone, Playback, PlaybackControl, PlaybackOutcome};
pub use backend::{
    EspeakFallback, HttpSynthesisBackend, LocalSpeech, LocalUtterance, OfflineSynthesis,
    RecognitionBackend, RecognizedSegment, Recognizer, RecognizerConfig, RecognizerControl,
    RecognizerEvent, SynthesisBackend, SynthesisRequest, UnsupportedRecognition,
};
pub use error::VoiceError;
pub use ipc::events::{RecognitionEvent, RecognitionMode, SynthesisEvent, SynthesisStatus};
pub use prefs::{JsonFileStore, KeyValueStore, MemoryStore, PreferenceStore, Preferences};
pub use recognition::{RecognitionConfig, RecognitionErrorKind, RecognitionSession, StartOptions};
pub use synthesis::{SpeakOptions, SynthesisConfig, SynthesisEngine};
pub use voices::default_voice_for;

#[cfg(feature = "audio-cpal")]
pub use audio::CpalAudioBackend;
pub use audio::CpalMicrophone;
