//! cpal playback of decoded clips.
//!
//! Each [`CpalAudioBackend::play`] spawns one OS thread that owns the
//! `cpal::Stream` for the lifetime of that sound. The thread takes commands
//! over a crossbeam channel and reports the outcome on the playback's oneshot.
//!
//! The output callback runs on the OS audio thread. It must not allocate,
//! lock, or do I/O: it reads the shared sample buffer and a few atomics only.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::device::{list_output_devices, resolve_output_device};
use super::resample::RateConverter;
use super::wav::decode_wav;
use super::{AudioBackend, AudioClip, Playback, PlaybackControl, PlaybackOutcome};
use crate::error::{Result, VoiceError};

/// How often the player thread checks for completion between commands.
const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Grace period after the last sample so the device flushes its buffer.
const TAIL_DRAIN: Duration = Duration::from_millis(120);
const RESAMPLE_CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy)]
enum PlayerCommand {
    Pause,
    Resume,
    Stop,
    Volume(f32),
}

struct PlayerShared {
    position: AtomicUsize,
    /// `f32::to_bits` of the current gain.
    volume: AtomicU32,
    paused: AtomicBool,
    drained: AtomicBool,
    stream_error: Mutex<Option<String>>,
}

struct CpalPlaybackControl {
    commands: Sender<PlayerCommand>,
}

impl CpalPlaybackControl {
    fn send(&self, command: PlayerCommand) {
        // A closed channel means the sound already ended.
        let _ = self.commands.send(command);
    }
}

impl PlaybackControl for CpalPlaybackControl {
    fn pause(&self) {
        self.send(PlayerCommand::Pause);
    }

    fn resume(&self) {
        self.send(PlayerCommand::Resume);
    }

    fn stop(&self) {
        self.send(PlayerCommand::Stop);
    }

    fn set_volume(&self, volume: f32) {
        self.send(PlayerCommand::Volume(volume));
    }
}

/// WAV in, speakers out.
#[derive(Debug, Clone, Default)]
pub struct CpalAudioBackend {
    preferred_device: Option<String>,
}

impl CpalAudioBackend {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self { preferred_device }
    }
}

impl AudioBackend for CpalAudioBackend {
    fn prepare(&self, encoded: Vec<u8>) -> Result<AudioClip> {
        decode_wav(&encoded)
    }

    fn play(&self, clip: &AudioClip, volume: f32) -> Result<Playback> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);
        let (done_tx, done_rx) = oneshot::channel();

        let clip = clip.clone();
        let preferred = self.preferred_device.clone();

        thread::Builder::new()
            .name("petvoice-playback".into())
            .spawn(move || {
                run_player(clip, volume, preferred, ready_tx, command_rx, done_tx);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Playback::new(
                Box::new(CpalPlaybackControl {
                    commands: command_tx,
                }),
                done_rx,
            )),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(VoiceError::Other(anyhow::anyhow!(
                "playback thread exited before opening a stream"
            ))),
        }
    }
}

fn run_player(
    clip: AudioClip,
    volume: f32,
    preferred: Option<String>,
    ready: Sender<Result<()>>,
    commands: Receiver<PlayerCommand>,
    done: oneshot::Sender<PlaybackOutcome>,
) {
    let (stream, shared) = match open_stream(&clip, volume, preferred.as_deref()) {
        Ok(opened) => {
            let _ = ready.send(Ok(()));
            opened
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut stopped = false;
    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(PlayerCommand::Pause) => {
                shared.paused.store(true, Ordering::Relaxed);
                if let Err(e) = stream.pause() {
                    debug!("stream pause unsupported, muting instead: {e}");
                }
            }
            Ok(PlayerCommand::Resume) => {
                shared.paused.store(false, Ordering::Relaxed);
                if let Err(e) = stream.play() {
                    warn!("stream resume failed: {e}");
                }
            }
            Ok(PlayerCommand::Volume(v)) => {
                shared.volume.store(v.to_bits(), Ordering::Relaxed);
            }
            Ok(PlayerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                stopped = true;
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let failure = shared.stream_error.lock().take();
        if let Some(reason) = failure {
            drop(stream);
            error!("playback stream failed: {reason}");
            let _ = done.send(Err(reason));
            return;
        }

        if shared.drained.load(Ordering::Relaxed) {
            break;
        }
    }

    if !stopped {
        thread::sleep(TAIL_DRAIN);
    }
    drop(stream);

    if stopped {
        debug!("playback stopped");
    } else {
        debug!(frames = shared.position.load(Ordering::Relaxed), "playback complete");
        let _ = done.send(Ok(()));
    }
}

fn open_stream(
    clip: &AudioClip,
    volume: f32,
    preferred: Option<&str>,
) -> Result<(cpal::Stream, Arc<PlayerShared>)> {
    let host = cpal::default_host();

    let wanted = resolve_output_device(&list_output_devices(), preferred);
    let named = wanted.as_deref().and_then(|name| {
        host.output_devices()
            .ok()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
    });
    let device = named
        .or_else(|| host.default_output_device())
        .ok_or(VoiceError::NoDefaultOutputDevice)?;

    let supported = device
        .default_output_config()
        .map_err(|e| VoiceError::AudioDevice(e.to_string()))?;
    let config = supported.config();
    let device_rate = config.sample_rate.0;

    info!(
        device = device.name().unwrap_or_default().as_str(),
        device_rate,
        clip_rate = clip.sample_rate(),
        "opening output stream"
    );

    let samples: Arc<[f32]> = if clip.sample_rate() == device_rate {
        clip.shared_samples()
    } else {
        RateConverter::new(clip.sample_rate(), device_rate, RESAMPLE_CHUNK)?
            .convert_all(clip.samples())
            .into()
    };

    let shared = Arc::new(PlayerShared {
        position: AtomicUsize::new(0),
        volume: AtomicU32::new(volume.to_bits()),
        paused: AtomicBool::new(false),
        drained: AtomicBool::new(false),
        stream_error: Mutex::new(None),
    });

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, Arc::clone(&shared)),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, Arc::clone(&shared)),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, Arc::clone(&shared)),
        other => Err(VoiceError::AudioDevice(format!(
            "unsupported output sample format: {other:?}"
        ))),
    }?;

    stream
        .play()
        .map_err(|e| VoiceError::AudioStream(e.to_string()))?;

    Ok((stream, shared))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<[f32]>,
    shared: Arc<PlayerShared>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let callback_shared = Arc::clone(&shared);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let paused = callback_shared.paused.load(Ordering::Relaxed);
                let gain = f32::from_bits(callback_shared.volume.load(Ordering::Relaxed));
                let mut pos = callback_shared.position.load(Ordering::Relaxed);

                for frame in data.chunks_mut(channels) {
                    let sample = if !paused && pos < samples.len() {
                        let v = samples[pos] * gain;
                        pos += 1;
                        v
                    } else {
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = T::from_sample(sample);
                    }
                }

                callback_shared.position.store(pos, Ordering::Relaxed);
                if pos >= samples.len() {
                    callback_shared.drained.store(true, Ordering::Relaxed);
                }
            },
            move |err| {
                *shared.stream_error.lock() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| VoiceError::AudioStream(e.to_string()))
}
