//! Audio output and microphone capabilities.
//!
//! The synthesis engine never touches a device directly. It goes through
//! [`AudioBackend`], which turns an encoded payload into an [`AudioClip`] and
//! starts a [`Playback`] of it. A playback is a control handle plus a oneshot
//! completion channel; the engine awaits the channel and drives pause, resume,
//! stop and volume through the handle.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). [`CpalAudioBackend`] therefore opens, runs and drops each output
//! stream on its own OS thread and talks to it over a command channel.

pub mod device;
pub mod microphone;
#[cfg(feature = "audio-cpal")]
pub mod output;
pub mod resample;
pub mod wav;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Result, VoiceError};

pub use device::{list_output_devices, DeviceInfo};
pub use microphone::{CpalMicrophone, Microphone};
#[cfg(feature = "audio-cpal")]
pub use output::CpalAudioBackend;

/// Decoded mono PCM, ready to play.
///
/// Cloning is cheap (the samples are shared). The buffer is released when the
/// last clone is dropped, which is how cache eviction frees audio.
#[derive(Clone)]
pub struct AudioClip {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Another handle to the same buffer, without copying.
    pub fn shared_samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Number of live handles to this clip's buffer.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.samples)
    }
}

impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("frames", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// `Ok(())` when the clip played to the end, `Err(reason)` on a stream failure.
///
/// A stopped playback drops its sender without sending. The engine always
/// supersedes an item before stopping it, so a closed channel on the current
/// item means the player went away and is reported as a failure.
pub type PlaybackOutcome = std::result::Result<(), String>;

/// Live control over one playing sound.
pub trait PlaybackControl: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    /// Stop and release the output. Must be safe to call more than once.
    fn stop(&self);
    fn set_volume(&self, volume: f32);
}

/// A started sound: control handle plus completion channel.
pub struct Playback {
    pub control: Box<dyn PlaybackControl>,
    pub finished: oneshot::Receiver<PlaybackOutcome>,
}

impl Playback {
    pub fn new(
        control: Box<dyn PlaybackControl>,
        finished: oneshot::Receiver<PlaybackOutcome>,
    ) -> Self {
        Self { control, finished }
    }
}

impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback").finish_non_exhaustive()
    }
}

/// The single playable output the synthesis engine owns.
///
/// Both methods may block (decoding, opening a device); async callers must
/// run them on the blocking pool.
pub trait AudioBackend: Send + Sync {
    /// Decode an encoded payload into a playable clip.
    fn prepare(&self, encoded: Vec<u8>) -> Result<AudioClip>;

    /// Start playing `clip` at `volume` (already clamped to `[0, 1]`).
    fn play(&self, clip: &AudioClip, volume: f32) -> Result<Playback>;
}

/// Run blocking device or decode work on Tokio's blocking pool.
pub(crate) async fn offload<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(join) => Err(VoiceError::Other(anyhow::Error::new(join))),
    }
}
