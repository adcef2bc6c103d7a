//! `RecognitionSession`: one listening attempt at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! start(options)        → recognizer started, silence timer armed, listening
//!     ├─► partial       → interim replaced, timer re-armed
//!     ├─► final         → transcript appended, interim cleared
//!     │                   single-shot: stop()
//!     ├─► stop()        → listening = false, final flush still accepted until End
//!     ├─► abort()       → interim dropped, later events ignored
//!     ├─► silence       → stop()
//!     └─► error / End   → idle (error recorded unless "no speech")
//! ```
//!
//! Each start gets a fresh session id. Events and timer wake-ups carry the
//! id they were created for and are ignored once it no longer matches.

pub mod errors;
pub mod timer;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    audio::{offload, Microphone},
    backend::{
        RecognitionBackend, Recognizer, RecognizerConfig, RecognizerControl, RecognizerEvent,
    },
    ipc::events::{RecognitionEvent, RecognitionMode},
};

pub use errors::RecognitionErrorKind;
use timer::SilenceTimer;

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Language used when neither `start` nor `set_language` names one.
    /// Default: `"it-IT"`.
    pub language: String,
    /// Quiet period after which a listening session stops itself.
    /// Default: 5000 ms.
    pub silence_timeout: Duration,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "it-IT".to_string(),
            silence_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub mode: RecognitionMode,
    pub language: Option<String>,
}

impl StartOptions {
    pub fn single_shot() -> Self {
        Self::default()
    }

    pub fn continuous() -> Self {
        Self {
            mode: RecognitionMode::Continuous,
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Handle to the recognition session. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct RecognitionSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: RecognitionConfig,
    backend: Arc<dyn RecognitionBackend>,
    microphone: Arc<dyn Microphone>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<RecognitionEvent>,
}

#[derive(Default)]
struct SessionState {
    listening: bool,
    /// Stopped gracefully, waiting for the recognizer's final flush and `End`.
    draining: bool,
    mode: RecognitionMode,
    /// Set by `set_language`, used by later starts.
    language: Option<String>,
    transcript: String,
    interim: String,
    confidence: f32,
    error: Option<RecognitionErrorKind>,
    session_id: u64,
    control: Option<Box<dyn RecognizerControl>>,
    timer: SilenceTimer,
}

impl RecognitionSession {
    pub fn new(
        config: RecognitionConfig,
        backend: Arc<dyn RecognitionBackend>,
        microphone: Arc<dyn Microphone>,
    ) -> Self {
        let (events, _) = broadcast::channel(BROADCAST_CAP);
        if !backend.is_supported() {
            info!("speech recognition not supported on this host");
        }
        Self {
            inner: Arc::new(SessionInner {
                config,
                backend,
                microphone,
                state: Mutex::new(SessionState::default()),
                events,
            }),
        }
    }

    /// Begin listening. An active session is terminated first.
    pub fn start(&self, options: StartOptions) {
        if !self.inner.backend.is_supported() {
            debug!("recognition unsupported, start ignored");
            return;
        }

        let mut state = self.inner.state.lock();
        if state.listening || state.draining || state.control.is_some() {
            debug!("terminating previous recognition session");
            self.inner.terminate(&mut state);
        }

        state.transcript.clear();
        state.interim.clear();
        state.confidence = 0.0;
        state.error = None;
        state.mode = options.mode;
        self.inner.emit_transcript(&state);

        let language = options
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .or_else(|| state.language.clone())
            .unwrap_or_else(|| self.inner.config.language.clone());

        state.session_id += 1;
        let session_id = state.session_id;

        let config = RecognizerConfig {
            language: language.clone(),
            interim_results: true,
            max_alternatives: 1,
            continuous: options.mode == RecognitionMode::Continuous,
        };

        match self.inner.backend.start(config) {
            Ok(Recognizer { control, events }) => {
                state.control = Some(control);
                state.listening = true;
                self.inner.arm_timer(&mut state, session_id);
                self.inner
                    .emit(RecognitionEvent::ListeningChanged { listening: true });
                info!(language = language.as_str(), mode = ?options.mode, "recognition started");

                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.pump(session_id, events).await });
            }
            Err(e) => {
                warn!("recognizer failed to start: {e}");
                self.inner.report(&mut state, RecognitionErrorKind::from(&e));
            }
        }
    }

    /// Graceful stop: a pending final result is still accepted. Idempotent.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        self.inner.stop_locked(&mut state);
    }

    /// Immediate stop: the interim text is dropped and nothing more from this
    /// recognizer is processed. Idempotent.
    pub fn abort(&self) {
        let mut state = self.inner.state.lock();
        if !(state.listening || state.draining || state.control.is_some()) {
            return;
        }
        self.inner.terminate(&mut state);
        self.inner.emit_transcript(&state);
        info!("recognition aborted");
    }

    /// Open and release the microphone so the OS can ask for permission.
    /// Does not start recognition.
    pub async fn request_permission(&self) -> bool {
        let microphone = Arc::clone(&self.inner.microphone);
        let probed = offload(move || microphone.probe()).await;

        let mut state = self.inner.state.lock();
        match probed {
            Ok(()) => {
                if state.error == Some(RecognitionErrorKind::PermissionDenied) {
                    state.error = None;
                }
                true
            }
            Err(e) => {
                warn!("microphone permission probe failed: {e}");
                self.inner.report(&mut state, RecognitionErrorKind::from(&e));
                false
            }
        }
    }

    /// Reset both transcript buffers. Listening state is untouched.
    pub fn clear_transcript(&self) {
        let mut state = self.inner.state.lock();
        state.transcript.clear();
        state.interim.clear();
        self.inner.emit_transcript(&state);
    }

    /// Language for subsequent `start` calls. Empty restores the default.
    pub fn set_language(&self, language: &str) {
        let language = language.trim();
        self.inner.state.lock().language = (!language.is_empty()).then(|| language.to_string());
    }

    // -----------------------------------------------------------------------
    // Observable state
    // -----------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_supported(&self) -> bool {
        self.inner.backend.is_supported()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.state.lock().listening
    }

    pub fn transcript(&self) -> String {
        self.inner.state.lock().transcript.clone()
    }

    pub fn interim_transcript(&self) -> String {
        self.inner.state.lock().interim.clone()
    }

    /// Confidence of the most recent final segment, `0.0` before any.
    pub fn confidence(&self) -> f32 {
        self.inner.state.lock().confidence
    }

    pub fn error(&self) -> Option<RecognitionErrorKind> {
        self.inner.state.lock().error.clone()
    }

    pub fn mode(&self) -> RecognitionMode {
        self.inner.state.lock().mode
    }

    /// Language the next `start` will use when not given one.
    pub fn language(&self) -> String {
        self.inner
            .state
            .lock()
            .language
            .clone()
            .unwrap_or_else(|| self.inner.config.language.clone())
    }
}

impl SessionInner {
    fn emit(&self, event: RecognitionEvent) {
        let _ = self.events.send(event);
    }

    fn emit_transcript(&self, state: &SessionState) {
        self.emit(RecognitionEvent::Transcript {
            transcript: state.transcript.clone(),
            interim: state.interim.clone(),
        });
    }

    fn report(&self, state: &mut SessionState, kind: RecognitionErrorKind) {
        self.emit(RecognitionEvent::Error {
            code: kind.code().to_string(),
            message: kind.to_string(),
        });
        state.error = Some(kind);
    }

    fn arm_timer(self: &Arc<Self>, state: &mut SessionState, session_id: u64) {
        let weak = Arc::downgrade(self);
        state
            .timer
            .arm(self.config.silence_timeout, move |epoch| async move {
                if let Some(inner) = weak.upgrade() {
                    inner.on_silence(session_id, epoch);
                }
            });
    }

    fn on_silence(&self, session_id: u64, epoch: u64) {
        let mut state = self.state.lock();
        if state.session_id != session_id || state.timer.epoch() != epoch || !state.listening {
            return;
        }
        info!(
            timeout_ms = self.config.silence_timeout.as_millis() as u64,
            "silence timeout, stopping recognition"
        );
        self.stop_locked(&mut state);
    }

    fn stop_locked(&self, state: &mut SessionState) {
        if !state.listening {
            return;
        }
        state.listening = false;
        state.draining = true;
        state.timer.cancel();
        if let Some(control) = &state.control {
            control.stop();
        }
        self.emit(RecognitionEvent::ListeningChanged { listening: false });
        debug!("recognition stopping, awaiting final flush");
    }

    /// Abort the recognizer and orphan its event stream.
    fn terminate(&self, state: &mut SessionState) {
        if let Some(control) = state.control.take() {
            control.abort();
        }
        state.session_id += 1;
        state.timer.cancel();
        state.interim.clear();
        state.draining = false;
        if state.listening {
            state.listening = false;
            self.emit(RecognitionEvent::ListeningChanged { listening: false });
        }
    }

    /// The recognizer is finished: settle in idle.
    fn end_session(&self, state: &mut SessionState) {
        state.timer.cancel();
        state.control = None;
        state.draining = false;
        if state.listening {
            state.listening = false;
            self.emit(RecognitionEvent::ListeningChanged { listening: false });
        }
    }

    async fn pump(
        self: Arc<Self>,
        session_id: u64,
        mut events: mpsc::UnboundedReceiver<RecognizerEvent>,
    ) {
        while let Some(event) = events.recv().await {
            if !self.handle(session_id, event) {
                return;
            }
        }
        // Sender dropped without `End`.
        self.handle(session_id, RecognizerEvent::End);
    }

    /// Apply one recognizer event. Returns `false` once the stream is done.
    fn handle(self: &Arc<Self>, session_id: u64, event: RecognizerEvent) -> bool {
        let mut state = self.state.lock();
        if state.session_id != session_id {
            return false;
        }

        match event {
            RecognizerEvent::Result {
                result_index,
                results,
            } => {
                if !(state.listening || state.draining) {
                    return true;
                }
                if state.listening {
                    self.arm_timer(&mut state, session_id);
                }

                let mut finals: Vec<&str> = Vec::new();
                let mut final_confidence = None;
                let mut partial = None;
                for segment in results.iter().skip(result_index) {
                    if segment.is_final {
                        let text = segment.transcript.trim();
                        if !text.is_empty() {
                            finals.push(text);
                            final_confidence = Some(segment.confidence);
                        }
                    } else {
                        partial = Some(segment.transcript.clone());
                    }
                }

                if !finals.is_empty() {
                    if !state.transcript.is_empty() {
                        state.transcript.push(' ');
                    }
                    state.transcript.push_str(&finals.join(" "));
                    state.interim.clear();
                    if let Some(value) = final_confidence {
                        let value = if value.is_finite() {
                            value.clamp(0.0, 1.0)
                        } else {
                            0.0
                        };
                        state.confidence = value;
                        self.emit(RecognitionEvent::Confidence { value });
                    }
                    self.emit_transcript(&state);
                    debug!(chars = state.transcript.len(), "final transcript committed");

                    if state.mode == RecognitionMode::SingleShot {
                        self.stop_locked(&mut state);
                    }
                } else if let Some(text) = partial {
                    state.interim = text;
                    self.emit_transcript(&state);
                }
                true
            }
            RecognizerEvent::Error { code, message } => {
                let kind = RecognitionErrorKind::from_code(&code, &message);
                if kind.is_reportable() {
                    warn!(code = kind.code(), "recognition error: {message}");
                    self.report(&mut state, kind);
                } else {
                    debug!("no speech detected, ending session");
                }
                self.end_session(&mut state);
                true
            }
            RecognizerEvent::End => {
                self.end_session(&mut state);
                debug!("recognizer ended");
                false
            }
        }
    }
}
