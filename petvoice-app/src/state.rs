//! Application state shared by the command loop and the event forwarders.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use petvoice_core::{
    synthesis::diagnostics::DiagnosticsSnapshot, AudioBackend, CpalAudioBackend, CpalMicrophone,
    EspeakFallback, HttpSynthesisBackend, JsonFileStore, KeyValueStore, LocalSpeech,
    OfflineSynthesis, PreferenceStore, RecognitionSession, SynthesisBackend, SynthesisEngine,
    SynthesisStatus, UnsupportedRecognition,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::settings::{prefs_path, AppSettings};

pub struct AppState {
    pub synthesis: SynthesisEngine,
    pub recognition: RecognitionSession,
    pub prefs: Arc<PreferenceStore>,
    pub settings: AppSettings,
    /// Directory holding `settings.json` and `prefs.json`.
    pub data_dir: PathBuf,
}

impl AppState {
    /// Wire the engines to the real devices described by `settings`.
    pub fn build(settings: AppSettings, data_dir: &Path) -> anyhow::Result<Self> {
        let audio: Arc<dyn AudioBackend> = Arc::new(CpalAudioBackend::new(
            settings.preferred_output_device.clone(),
        ));

        let remote: Arc<dyn SynthesisBackend> = match &settings.synthesis_url {
            Some(url) => {
                let mut backend = HttpSynthesisBackend::new(url.clone())?;
                if let Some(key) = &settings.synthesis_api_key {
                    backend = backend.with_api_key(key.clone());
                }
                info!(endpoint = backend.endpoint(), "remote synthesis configured");
                Arc::new(backend)
            }
            None => {
                warn!("no synthesis endpoint configured; using the local voice only");
                Arc::new(OfflineSynthesis)
            }
        };

        let local: Arc<dyn LocalSpeech> = Arc::new(EspeakFallback::with_binary(
            settings.espeak_binary.clone(),
            Arc::clone(&audio),
        ));

        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(prefs_path(data_dir)));
        let prefs = Arc::new(PreferenceStore::load(store));

        let synthesis = SynthesisEngine::new(
            settings.synthesis_config(),
            remote,
            local,
            audio,
            Arc::clone(&prefs),
        );
        let recognition = RecognitionSession::new(
            settings.recognition_config(),
            Arc::new(UnsupportedRecognition),
            Arc::new(CpalMicrophone::new(settings.preferred_input_device.clone())),
        );

        Ok(Self {
            synthesis,
            recognition,
            prefs,
            settings,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn status_snapshot(&self) -> StatusSnapshot {
        let synthesis = &self.synthesis;
        let recognition = &self.recognition;
        StatusSnapshot {
            status: synthesis.status(),
            current_text: synthesis.current_text(),
            queued: synthesis.queue_len(),
            volume: synthesis.volume(),
            auto_play: synthesis.auto_play(),
            voice: self.prefs.selected_voice_id(),
            error: synthesis.error(),
            advisory: synthesis.last_advisory(),
            cached_clips: synthesis.cache_len(),
            listening: recognition.is_listening(),
            transcript: recognition.transcript(),
            recognition_error: recognition.error().map(|e| e.to_string()),
            diagnostics: synthesis.diagnostics(),
        }
    }
}

/// One-line view printed after every command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: SynthesisStatus,
    pub current_text: Option<String>,
    pub queued: usize,
    pub volume: f32,
    pub auto_play: bool,
    pub voice: String,
    pub error: Option<String>,
    pub advisory: Option<String>,
    pub cached_clips: usize,
    pub listening: bool,
    pub transcript: String,
    pub recognition_error: Option<String>,
    pub diagnostics: DiagnosticsSnapshot,
}
