//! Hand-written fakes for every capability the engines consume.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use petvoice_core::{
    AudioBackend, AudioClip, LocalSpeech, LocalUtterance, Microphone, Playback, PlaybackControl,
    PlaybackOutcome, RecognitionBackend, RecognizedSegment, Recognizer, RecognizerConfig,
    RecognizerControl, RecognizerEvent, SynthesisBackend, SynthesisRequest, VoiceError,
};
use tokio::sync::{mpsc, oneshot};

pub type Result<T> = std::result::Result<T, VoiceError>;

/// Let every runnable task finish its current step. Requires paused time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ---------------------------------------------------------------------------
// Remote synthesis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteMode {
    /// Echo the text back as the payload.
    Ok,
    /// Fail like an unreachable host.
    Fail,
    /// Never answer.
    Hang,
    /// Answer after a delay.
    Delay(Duration),
}

pub struct FakeRemote {
    mode: Mutex<RemoteMode>,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeRemote {
    pub fn new(mode: RemoteMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: RemoteMode) {
        *self.mode.lock() = mode;
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SynthesisBackend for FakeRemote {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.requests.lock().push(request.clone());
        let mode = *self.mode.lock();
        match mode {
            RemoteMode::Ok => Ok(request.text.as_bytes().to_vec()),
            RemoteMode::Fail => Err(VoiceError::SynthesisFailed("connection refused".into())),
            RemoteMode::Hang => std::future::pending().await,
            RemoteMode::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(request.text.as_bytes().to_vec())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Audio output
// ---------------------------------------------------------------------------

/// One started sound, as seen by the fake device.
pub struct PlayRecord {
    pub label: String,
    pub volume: f32,
    pub commands: Arc<Mutex<Vec<String>>>,
    done: Option<oneshot::Sender<PlaybackOutcome>>,
}

struct FakeControl {
    commands: Arc<Mutex<Vec<String>>>,
}

impl PlaybackControl for FakeControl {
    fn pause(&self) {
        self.commands.lock().push("pause".into());
    }

    fn resume(&self) {
        self.commands.lock().push("resume".into());
    }

    fn stop(&self) {
        self.commands.lock().push("stop".into());
    }

    fn set_volume(&self, volume: f32) {
        self.commands.lock().push(format!("volume:{volume}"));
    }
}

/// Clips carry their payload bytes as samples so plays can be identified
/// by the text that produced them.
#[derive(Default)]
pub struct FakeAudio {
    plays: Mutex<Vec<PlayRecord>>,
    fail_play: Mutex<bool>,
    /// Drop each completion sender without reporting an outcome.
    drop_completion: Mutex<bool>,
    /// Block inside `play` like a slow device open.
    play_delay: Mutex<Option<Duration>>,
}

impl FakeAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_play(&self, fail: bool) {
        *self.fail_play.lock() = fail;
    }

    pub fn set_drop_completion(&self, drop: bool) {
        *self.drop_completion.lock() = drop;
    }

    pub fn set_play_delay(&self, delay: Option<Duration>) {
        *self.play_delay.lock() = delay;
    }

    pub fn start(&self, label: String, volume: f32) -> Playback {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = oneshot::channel();
        let done = if *self.drop_completion.lock() {
            None
        } else {
            Some(done_tx)
        };
        self.plays.lock().push(PlayRecord {
            label,
            volume,
            commands: Arc::clone(&commands),
            done,
        });
        Playback::new(Box::new(FakeControl { commands }), done_rx)
    }

    pub fn labels(&self) -> Vec<String> {
        self.plays.lock().iter().map(|p| p.label.clone()).collect()
    }

    pub fn play_count(&self) -> usize {
        self.plays.lock().len()
    }

    pub fn commands(&self, index: usize) -> Vec<String> {
        self.plays.lock()[index].commands.lock().clone()
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.plays.lock().last().map(|p| p.volume)
    }

    /// Complete the most recent sound. Returns `false` if nobody was waiting.
    pub fn finish_last(&self, outcome: PlaybackOutcome) -> bool {
        let sender = self.plays.lock().last_mut().and_then(|p| p.done.take());
        sender.map(|tx| tx.send(outcome).is_ok()).unwrap_or(false)
    }

    pub fn finish(&self, index: usize, outcome: PlaybackOutcome) -> bool {
        let sender = self.plays.lock()[index].done.take();
        sender.map(|tx| tx.send(outcome).is_ok()).unwrap_or(false)
    }
}

pub fn clip_text(clip: &AudioClip) -> String {
    clip.samples().iter().map(|s| *s as u8 as char).collect()
}

impl AudioBackend for FakeAudio {
    fn prepare(&self, encoded: Vec<u8>) -> Result<AudioClip> {
        if encoded.starts_with(b"corrupt") {
            return Err(VoiceError::AudioDecode("unrecognised container".into()));
        }
        Ok(AudioClip::new(encoded.iter().map(|b| *b as f32).collect(), 16_000))
    }

    fn play(&self, clip: &AudioClip, volume: f32) -> Result<Playback> {
        if *self.fail_play.lock() {
            return Err(VoiceError::NoDefaultOutputDevice);
        }
        let delay = *self.play_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        Ok(self.start(clip_text(clip), volume))
    }
}

// ---------------------------------------------------------------------------
// Local fallback
// ---------------------------------------------------------------------------

pub struct FakeLocal {
    available: bool,
    audio: Arc<FakeAudio>,
    utterances: Mutex<Vec<LocalUtterance>>,
}

impl FakeLocal {
    pub fn new(available: bool, audio: Arc<FakeAudio>) -> Arc<Self> {
        Arc::new(Self {
            available,
            audio,
            utterances: Mutex::new(Vec::new()),
        })
    }

    pub fn utterances(&self) -> Vec<LocalUtterance> {
        self.utterances.lock().clone()
    }
}

#[async_trait]
impl LocalSpeech for FakeLocal {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn speak(&self, utterance: &LocalUtterance) -> Result<Playback> {
        self.utterances.lock().push(utterance.clone());
        Ok(self
            .audio
            .start(format!("local:{}", utterance.text), utterance.volume))
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

pub struct FakeRecognizerSession {
    pub config: RecognizerConfig,
    pub commands: Arc<Mutex<Vec<&'static str>>>,
    events: mpsc::UnboundedSender<RecognizerEvent>,
}

struct FakeRecognizerControl {
    commands: Arc<Mutex<Vec<&'static str>>>,
}

impl RecognizerControl for FakeRecognizerControl {
    fn stop(&self) {
        self.commands.lock().push("stop");
    }

    fn abort(&self) {
        self.commands.lock().push("abort");
    }
}

pub struct FakeRecognition {
    supported: bool,
    fail_start: Mutex<bool>,
    sessions: Mutex<Vec<FakeRecognizerSession>>,
}

impl FakeRecognition {
    pub fn new(supported: bool) -> Arc<Self> {
        Arc::new(Self {
            supported,
            fail_start: Mutex::new(false),
            sessions: Mutex::new(Vec::new()),
        })
    }

    pub fn set_fail_start(&self, fail: bool) {
        *self.fail_start.lock() = fail;
    }

    pub fn starts(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn config(&self, index: usize) -> RecognizerConfig {
        self.sessions.lock()[index].config.clone()
    }

    pub fn commands(&self, index: usize) -> Vec<&'static str> {
        self.sessions.lock()[index].commands.lock().clone()
    }

    /// Deliver an event on session `index`.
    pub fn send(&self, index: usize, event: RecognizerEvent) {
        let _ = self.sessions.lock()[index].events.send(event);
    }

    /// Deliver an event on the most recent session.
    pub fn send_latest(&self, event: RecognizerEvent) {
        let index = self.starts() - 1;
        self.send(index, event);
    }
}

impl RecognitionBackend for FakeRecognition {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(&self, config: RecognizerConfig) -> Result<Recognizer> {
        if *self.fail_start.lock() {
            return Err(VoiceError::RecognitionStart("service busy".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let commands = Arc::new(Mutex::new(Vec::new()));
        self.sessions.lock().push(FakeRecognizerSession {
            config,
            commands: Arc::clone(&commands),
            events: tx,
        });
        Ok(Recognizer {
            control: Box::new(FakeRecognizerControl { commands }),
            events: rx,
        })
    }
}

pub fn partial(text: &str) -> RecognizerEvent {
    RecognizerEvent::Result {
        result_index: 0,
        results: vec![RecognizedSegment {
            is_final: false,
            transcript: text.into(),
            confidence: 0.0,
        }],
    }
}

pub fn final_result(text: &str, confidence: f32) -> RecognizerEvent {
    RecognizerEvent::Result {
        result_index: 0,
        results: vec![RecognizedSegment {
            is_final: true,
            transcript: text.into(),
            confidence,
        }],
    }
}

pub fn platform_error(code: &str) -> RecognizerEvent {
    RecognizerEvent::Error {
        code: code.into(),
        message: format!("platform reported {code}"),
    }
}

// ---------------------------------------------------------------------------
// Microphone
// ---------------------------------------------------------------------------

pub struct FakeMicrophone {
    deny: bool,
}

impl FakeMicrophone {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self { deny: false })
    }

    pub fn denied() -> Arc<Self> {
        Arc::new(Self { deny: true })
    }
}

impl Microphone for FakeMicrophone {
    fn probe(&self) -> Result<()> {
        if self.deny {
            Err(VoiceError::PermissionDenied("user declined".into()))
        } else {
            Ok(())
        }
    }
}
