//! `SynthesisEngine`: text in, one voice out.
//!
//! ## Lifecycle
//!
//! ```text
//! speak(text) / enqueue(text)
//!     └─► Loading        cache hit ──────────────┐
//!           │            miss → remote (15 s) ───┤→ prepare → cache insert
//!           │            remote failed → local fallback (advisory, not cached)
//!           └─► Playing ⇄ Paused                 │
//!                 └─► finished → next queued item, or Idle
//! ```
//!
//! `stop()` returns to `Idle` from any state and clears the queue. `speak()`
//! preempts whatever is loading or playing and drops pending queue items.
//!
//! ## Generations
//!
//! Every attempt is tagged with the generation current when it began. Stop,
//! skip and preemption bump the generation under the state lock, so a remote
//! response, fallback start, or playback completion that arrives later for an
//! older generation is discarded without touching state or the cache.
//!
//! ## Threading
//!
//! Operations are synchronous and return immediately. The asynchronous part
//! of each attempt runs as a Tokio task whose `JoinHandle` is returned. State
//! lives behind a `parking_lot::Mutex` that is never held across `.await`.
//! Decoding and device opens go through the blocking pool so a slow output
//! device never holds a runtime worker.

mod cache;
pub mod diagnostics;
pub mod text;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    audio::{offload, AudioBackend, AudioClip, Playback, PlaybackControl, PlaybackOutcome},
    backend::{LocalSpeech, LocalUtterance, SynthesisBackend, SynthesisRequest},
    error::{Result, VoiceError},
    ipc::events::{SynthesisEvent, SynthesisStatus},
    prefs::PreferenceStore,
    voices::default_voice_for,
};

use cache::ClipCache;
use diagnostics::{DiagnosticsSnapshot, SynthesisDiagnostics};
use text::{cache_key, truncate_chars};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// BCP-47 tag used for the default voice and the local fallback.
    /// Default: `"it-IT"`.
    pub language: String,
    /// Default: `"+0%"`.
    pub rate: String,
    /// Default: `"+0Hz"`.
    pub pitch: String,
    /// Bound on a single remote synthesis call. Default: 15 s.
    pub request_timeout: Duration,
    /// Default: 20.
    pub cache_capacity: usize,
    /// Longer input is cut, not rejected. Default: 5000.
    pub max_text_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            language: "it-IT".to_string(),
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            request_timeout: Duration::from_secs(15),
            cache_capacity: cache::DEFAULT_CAPACITY,
            max_text_chars: 5000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    /// Overrides the preferred voice for this request only.
    pub voice_id: Option<String>,
}

impl SpeakOptions {
    pub fn with_voice(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: Some(voice_id.into()),
        }
    }
}

/// Handle to the synthesis engine. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SynthesisEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: SynthesisConfig,
    remote: Arc<dyn SynthesisBackend>,
    local: Arc<dyn LocalSpeech>,
    audio: Arc<dyn AudioBackend>,
    prefs: Arc<PreferenceStore>,
    state: Mutex<EngineState>,
    cache: Mutex<ClipCache>,
    events: broadcast::Sender<SynthesisEvent>,
    diagnostics: SynthesisDiagnostics,
}

#[derive(Default)]
struct EngineState {
    status: SynthesisStatus,
    current_text: Option<String>,
    error: Option<String>,
    advisory: Option<String>,
    generation: u64,
    /// Control of the audible playback, present in `Playing`/`Paused`.
    playback: Option<Box<dyn PlaybackControl>>,
    /// Task driving the current attempt.
    task: Option<AbortHandle>,
    queue: VecDeque<String>,
}

struct Utterance {
    generation: u64,
    text: String,
    voice: String,
}

/// Why an attempt produced no playback.
enum Halt {
    /// Superseded by stop, skip or a newer request.
    Stale,
    /// Remote synthesis and the local fallback both failed.
    Unavailable(String),
    /// Decode or device failure.
    Playback(VoiceError),
}

impl SynthesisEngine {
    pub fn new(
        config: SynthesisConfig,
        remote: Arc<dyn SynthesisBackend>,
        local: Arc<dyn LocalSpeech>,
        audio: Arc<dyn AudioBackend>,
        prefs: Arc<PreferenceStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAP);
        let cache = ClipCache::new(config.cache_capacity);
        info!(
            language = config.language.as_str(),
            cache_capacity = cache.capacity(),
            "synthesis engine ready"
        );
        Self {
            inner: Arc::new(Inner {
                config,
                remote,
                local,
                audio,
                prefs,
                state: Mutex::new(EngineState::default()),
                cache: Mutex::new(cache),
                events,
                diagnostics: SynthesisDiagnostics::default(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Speak `text` now, preempting anything loading or playing and dropping
    /// queued items. Blank text is ignored and returns `None`.
    pub fn speak(&self, text: &str, options: SpeakOptions) -> Option<JoinHandle<()>> {
        let text = truncate_chars(text, self.inner.config.max_text_chars);
        if text.trim().is_empty() {
            debug!("ignoring blank speak request");
            return None;
        }
        let voice = self.inner.resolve_voice(options.voice_id.as_deref());

        let mut state = self.inner.state.lock();
        if !state.queue.is_empty() {
            debug!(dropped = state.queue.len(), "speak drops queued items");
            state.queue.clear();
            self.inner.emit(SynthesisEvent::QueueChanged { pending: 0 });
        }
        self.inner.halt_current(&mut state);
        Some(self.inner.begin(&mut state, text.to_string(), voice))
    }

    /// Append `text` to the queue. Starts it immediately when idle, in which
    /// case the attempt's handle is returned.
    pub fn enqueue(&self, text: &str) -> Option<JoinHandle<()>> {
        let text = truncate_chars(text, self.inner.config.max_text_chars);
        if text.trim().is_empty() {
            debug!("ignoring blank queue request");
            return None;
        }

        let mut state = self.inner.state.lock();
        if state.status == SynthesisStatus::Idle {
            let voice = self.inner.resolve_voice(None);
            return Some(self.inner.begin(&mut state, text.to_string(), voice));
        }

        state.queue.push_back(text.to_string());
        self.inner.emit(SynthesisEvent::QueueChanged {
            pending: state.queue.len(),
        });
        None
    }

    /// Speak only when the autoplay preference is on.
    pub fn speak_if_auto_play(&self, text: &str) -> Option<JoinHandle<()>> {
        if !self.inner.prefs.auto_play() {
            return None;
        }
        self.speak(text, SpeakOptions::default())
    }

    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        if state.status != SynthesisStatus::Playing {
            return;
        }
        if let Some(control) = &state.playback {
            control.pause();
        }
        let text = state.current_text.clone();
        self.inner.set_status(&mut state, SynthesisStatus::Paused, text);
    }

    pub fn resume(&self) {
        let mut state = self.inner.state.lock();
        if state.status != SynthesisStatus::Paused {
            return;
        }
        if let Some(control) = &state.playback {
            control.resume();
        }
        let text = state.current_text.clone();
        self.inner.set_status(&mut state, SynthesisStatus::Playing, text);
    }

    /// Cancel whatever is loading or playing and clear the queue.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        if !state.queue.is_empty() {
            state.queue.clear();
            self.inner.emit(SynthesisEvent::QueueChanged { pending: 0 });
        }
        if state.status == SynthesisStatus::Idle {
            return;
        }
        self.inner.halt_current(&mut state);
        self.inner.set_status(&mut state, SynthesisStatus::Idle, None);
        info!("synthesis stopped");
    }

    /// Drop the current item and start the next queued one, if any.
    pub fn skip(&self) -> Option<JoinHandle<()>> {
        let mut state = self.inner.state.lock();
        if state.status == SynthesisStatus::Idle {
            return None;
        }
        self.inner.halt_current(&mut state);

        match state.queue.pop_front() {
            Some(next) => {
                self.inner.emit(SynthesisEvent::QueueChanged {
                    pending: state.queue.len(),
                });
                let voice = self.inner.resolve_voice(None);
                Some(self.inner.begin(&mut state, next, voice))
            }
            None => {
                self.inner.set_status(&mut state, SynthesisStatus::Idle, None);
                None
            }
        }
    }

    /// Clamp to `[0, 1]`, apply to the live playback and persist.
    pub fn set_volume(&self, volume: f32) {
        let volume = self.inner.prefs.set_volume(volume);
        let state = self.inner.state.lock();
        if let Some(control) = &state.playback {
            control.set_volume(volume);
        }
        self.inner.emit(SynthesisEvent::VolumeChanged { volume });
    }

    /// Flip autoplay, persist, and return the new value.
    pub fn toggle_auto_play(&self) -> bool {
        let enabled = self.inner.prefs.toggle_auto_play();
        self.inner.emit(SynthesisEvent::AutoPlayChanged { enabled });
        enabled
    }

    /// Persist a preferred voice. Empty restores the language default.
    pub fn select_voice(&self, voice_id: &str) {
        self.inner.prefs.set_selected_voice_id(voice_id);
        let voice_id = self.inner.prefs.selected_voice_id();
        self.inner.emit(SynthesisEvent::VoiceChanged { voice_id });
    }

    /// Resolve once the engine is idle (immediately if it already is).
    pub async fn wait_idle(&self) {
        let mut events = self.inner.events.subscribe();
        loop {
            if self.status() == SynthesisStatus::Idle {
                return;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Observable state
    // -----------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<SynthesisEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> SynthesisStatus {
        self.inner.state.lock().status
    }

    pub fn is_playing(&self) -> bool {
        self.status() == SynthesisStatus::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.status() == SynthesisStatus::Paused
    }

    pub fn is_loading(&self) -> bool {
        self.status() == SynthesisStatus::Loading
    }

    pub fn current_text(&self) -> Option<String> {
        self.inner.state.lock().current_text.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().error.clone()
    }

    /// Most recent fallback notice. Not an error.
    pub fn last_advisory(&self) -> Option<String> {
        self.inner.state.lock().advisory.clone()
    }

    pub fn auto_play(&self) -> bool {
        self.inner.prefs.auto_play()
    }

    pub fn volume(&self) -> f32 {
        self.inner.prefs.volume()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache.lock().len()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.inner.config
    }
}

impl Inner {
    fn emit(&self, event: SynthesisEvent) {
        let _ = self.events.send(event);
    }

    fn set_status(&self, state: &mut EngineState, status: SynthesisStatus, text: Option<String>) {
        if state.status == status && state.current_text == text {
            return;
        }
        debug!(?status, "synthesis status");
        state.status = status;
        state.current_text = text.clone();
        self.emit(SynthesisEvent::StatusChanged {
            status,
            current_text: text,
        });
    }

    fn resolve_voice(&self, requested: Option<&str>) -> String {
        if let Some(voice) = requested.map(str::trim).filter(|v| !v.is_empty()) {
            return voice.to_string();
        }
        let preferred = self.prefs.selected_voice_id();
        if !preferred.is_empty() {
            return preferred;
        }
        default_voice_for(&self.config.language).to_string()
    }

    /// Invalidate the attempt in flight and silence it.
    fn halt_current(&self, state: &mut EngineState) {
        state.generation += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        if let Some(control) = state.playback.take() {
            control.stop();
        }
    }

    fn begin(
        self: &Arc<Self>,
        state: &mut EngineState,
        text: String,
        voice: String,
    ) -> JoinHandle<()> {
        state.generation += 1;
        state.error = None;
        state.advisory = None;
        let utterance = Utterance {
            generation: state.generation,
            text: text.clone(),
            voice,
        };
        self.set_status(state, SynthesisStatus::Loading, Some(text));

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run(utterance).await });
        state.task = Some(handle.abort_handle());
        handle
    }

    async fn run(self: Arc<Self>, utterance: Utterance) {
        let playback = match self.acquire(&utterance).await {
            Ok(playback) => playback,
            Err(Halt::Stale) => {
                SynthesisDiagnostics::bump(&self.diagnostics.stale_discarded);
                debug!(generation = utterance.generation, "discarding superseded attempt");
                return;
            }
            Err(Halt::Unavailable(message)) => {
                self.fail(utterance.generation, message);
                return;
            }
            Err(Halt::Playback(e)) => {
                SynthesisDiagnostics::bump(&self.diagnostics.playback_errors);
                self.fail(utterance.generation, format!("playback failed: {e}"));
                return;
            }
        };

        let Playback { control, finished } = playback;
        if !self.attach(utterance.generation, control) {
            return;
        }
        self.complete(utterance.generation, finished.await);
    }

    async fn acquire(&self, utterance: &Utterance) -> std::result::Result<Playback, Halt> {
        let key = cache_key(&utterance.voice, &utterance.text);

        let cached = self.cache.lock().get(&key);
        if let Some(clip) = cached {
            SynthesisDiagnostics::bump(&self.diagnostics.cache_hits);
            debug!(key = key.as_str(), "clip cache hit");
            return self.play_clip(clip).await.map_err(Halt::Playback);
        }
        SynthesisDiagnostics::bump(&self.diagnostics.cache_misses);

        match self.synthesize_remote(utterance).await {
            Ok(encoded) => {
                if !self.is_current(utterance.generation) {
                    return Err(Halt::Stale);
                }
                let clip = self.prepare_clip(encoded).await.map_err(Halt::Playback)?;
                self.remember(key, clip.clone());
                self.play_clip(clip).await.map_err(Halt::Playback)
            }
            Err(remote_err) => {
                SynthesisDiagnostics::bump(&self.diagnostics.remote_failures);
                if !self.is_current(utterance.generation) {
                    return Err(Halt::Stale);
                }
                warn!("remote synthesis failed, using local voice: {remote_err}");
                self.advise(
                    utterance.generation,
                    format!("remote voice unavailable ({remote_err}); using local voice"),
                );
                self.speak_locally(utterance).await.map_err(|local_err| {
                    Halt::Unavailable(format!(
                        "speech synthesis unavailable: {remote_err}; local voice: {local_err}"
                    ))
                })
            }
        }
    }

    async fn synthesize_remote(&self, utterance: &Utterance) -> Result<Vec<u8>> {
        SynthesisDiagnostics::bump(&self.diagnostics.remote_calls);
        let request = SynthesisRequest {
            text: utterance.text.clone(),
            voice: utterance.voice.clone(),
            rate: self.config.rate.clone(),
            pitch: self.config.pitch.clone(),
        };

        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.remote.synthesize(&request)).await {
            Ok(Ok(encoded)) if encoded.is_empty() => Err(VoiceError::SynthesisFailed(
                "backend returned an empty payload".into(),
            )),
            Ok(result) => result,
            Err(_) => Err(VoiceError::SynthesisTimeout(timeout)),
        }
    }

    async fn prepare_clip(&self, encoded: Vec<u8>) -> Result<AudioClip> {
        let audio = Arc::clone(&self.audio);
        offload(move || audio.prepare(encoded)).await
    }

    async fn play_clip(&self, clip: AudioClip) -> Result<Playback> {
        let audio = Arc::clone(&self.audio);
        let volume = self.prefs.volume();
        offload(move || audio.play(&clip, volume)).await
    }

    async fn speak_locally(&self, utterance: &Utterance) -> Result<Playback> {
        if !self.local.is_available().await {
            return Err(VoiceError::Unavailable("local speech".into()));
        }
        SynthesisDiagnostics::bump(&self.diagnostics.fallback_uses);
        info!(language = self.config.language.as_str(), "speaking with local voice");
        self.local
            .speak(&LocalUtterance {
                text: utterance.text.clone(),
                language: self.config.language.clone(),
                volume: self.prefs.volume(),
            })
            .await
    }

    fn remember(&self, key: String, clip: AudioClip) {
        let evicted = self.cache.lock().insert(key, clip);
        if let Some((evicted_key, entry)) = evicted {
            SynthesisDiagnostics::bump(&self.diagnostics.cache_evictions);
            debug!(
                key = evicted_key.as_str(),
                idle_ms = entry.last_used.elapsed().as_millis() as u64,
                "clip cache eviction"
            );
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn advise(&self, generation: u64, message: String) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        state.advisory = Some(message.clone());
        self.emit(SynthesisEvent::Advisory { message });
    }

    /// Install the playback control for `generation`, or stop it if that
    /// attempt has been superseded meanwhile.
    fn attach(&self, generation: u64, control: Box<dyn PlaybackControl>) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            control.stop();
            SynthesisDiagnostics::bump(&self.diagnostics.stale_discarded);
            debug!(generation, "stopping playback of superseded attempt");
            return false;
        }
        state.playback = Some(control);
        let text = state.current_text.clone();
        self.set_status(&mut state, SynthesisStatus::Playing, text);
        true
    }

    fn complete(
        self: &Arc<Self>,
        generation: u64,
        outcome: std::result::Result<PlaybackOutcome, oneshot::error::RecvError>,
    ) {
        let mut state = self.state.lock();
        if state.generation != generation {
            SynthesisDiagnostics::bump(&self.diagnostics.stale_discarded);
            return;
        }
        state.playback = None;
        state.task = None;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(reason)) => Some(format!("playback failed: {reason}")),
            Err(_) => Some("playback ended unexpectedly".to_string()),
        };
        if let Some(message) = failure {
            SynthesisDiagnostics::bump(&self.diagnostics.playback_errors);
            self.fail_locked(&mut state, message);
            return;
        }

        match state.queue.pop_front() {
            Some(next) => {
                self.emit(SynthesisEvent::QueueChanged {
                    pending: state.queue.len(),
                });
                let voice = self.resolve_voice(None);
                self.begin(&mut state, next, voice);
            }
            None => self.set_status(&mut state, SynthesisStatus::Idle, None),
        }
    }

    fn fail(&self, generation: u64, message: String) {
        let mut state = self.state.lock();
        if state.generation != generation {
            SynthesisDiagnostics::bump(&self.diagnostics.stale_discarded);
            return;
        }
        self.fail_locked(&mut state, message);
    }

    /// Surface `message`, drop the queue and settle in `Idle`.
    fn fail_locked(&self, state: &mut EngineState, message: String) {
        warn!("{message}");
        state.playback = None;
        state.task = None;
        if !state.queue.is_empty() {
            state.queue.clear();
            self.emit(SynthesisEvent::QueueChanged { pending: 0 });
        }
        state.error = Some(message.clone());
        self.emit(SynthesisEvent::Error { message });
        self.set_status(state, SynthesisStatus::Idle, None);
    }
}
