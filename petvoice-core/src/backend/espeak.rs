//! Offline fallback voice via the `espeak-ng` binary.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{LocalSpeech, LocalUtterance};
use crate::audio::{offload, AudioBackend, Playback};
use crate::error::{Result, VoiceError};

const DEFAULT_BINARY: &str = "espeak-ng";
const SYNTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs `espeak-ng --stdout` and plays the WAV through the shared output.
pub struct EspeakFallback {
    binary: String,
    audio: Arc<dyn AudioBackend>,
    timeout: Duration,
    available: OnceCell<bool>,
}

impl EspeakFallback {
    pub fn new(audio: Arc<dyn AudioBackend>) -> Self {
        Self::with_binary(DEFAULT_BINARY, audio)
    }

    pub fn with_binary(binary: impl Into<String>, audio: Arc<dyn AudioBackend>) -> Self {
        Self {
            binary: binary.into(),
            audio,
            timeout: SYNTH_TIMEOUT,
            available: OnceCell::new(),
        }
    }

    async fn probe(&self) -> bool {
        let found = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);
        info!(binary = self.binary.as_str(), found, "local speech probe");
        found
    }
}

impl std::fmt::Debug for EspeakFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspeakFallback")
            .field("binary", &self.binary)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// espeak-ng voices are named by primary language subtag (`it`, `en`, ...).
pub fn espeak_voice(language: &str) -> String {
    let primary = language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if primary.is_empty() {
        "en".to_string()
    } else {
        primary
    }
}

#[async_trait]
impl LocalSpeech for EspeakFallback {
    async fn is_available(&self) -> bool {
        *self.available.get_or_init(|| self.probe()).await
    }

    async fn speak(&self, utterance: &LocalUtterance) -> Result<Playback> {
        let voice = espeak_voice(&utterance.language);
        debug!(voice = voice.as_str(), "synthesizing with espeak-ng");

        let child = Command::new(&self.binary)
            .arg("--stdout")
            .arg("-v")
            .arg(&voice)
            .arg("--")
            .arg(&utterance.text)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| VoiceError::SynthesisTimeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VoiceError::SynthesisFailed(format!(
                "espeak-ng exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let audio = Arc::clone(&self.audio);
        let volume = utterance.volume;
        offload(move || {
            let clip = audio.prepare(output.stdout)?;
            audio.play(&clip, volume)
        })
        .await
    }
}
