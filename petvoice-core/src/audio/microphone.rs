//! Microphone permission probe.
//!
//! Opening an input stream is what triggers the OS permission prompt (macOS
//! TCC, Windows privacy settings, PipeWire portals). The probe opens the
//! stream, starts it, and drops it straight away. No samples are kept.

#[cfg(feature = "audio-cpal")]
use tracing::{info, warn};

use crate::error::{Result, VoiceError};

pub trait Microphone: Send + Sync {
    /// Acquire an input handle and release it. Blocking.
    fn probe(&self) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct CpalMicrophone {
    preferred_device: Option<String>,
}

impl CpalMicrophone {
    pub fn new(preferred_device: Option<String>) -> Self {
        Self { preferred_device }
    }
}

#[cfg(feature = "audio-cpal")]
impl Microphone for CpalMicrophone {
    fn probe(&self) -> Result<()> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
        use cpal::{BuildStreamError, SampleFormat};

        let host = cpal::default_host();
        let mut selected = None;

        if let Some(preferred) = self.preferred_device.as_deref() {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected = devices.find(|d| d.name().map(|n| n == preferred).unwrap_or(false));
                    if selected.is_none() {
                        warn!("preferred input device '{preferred}' not found, falling back");
                    }
                }
                Err(e) => warn!("failed to list input devices while resolving preference: {e}"),
            }
        }

        let device = match selected.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => host
                .input_devices()
                .map_err(|e| VoiceError::AudioDevice(e.to_string()))?
                .next()
                .ok_or(VoiceError::NoDefaultInputDevice)?,
        };

        let supported = device
            .default_input_config()
            .map_err(|e| VoiceError::PermissionDenied(e.to_string()))?;
        let config = supported.config();
        let on_error = |err: cpal::StreamError| warn!("microphone probe stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                device.build_input_stream(&config, |_: &[f32], _| {}, on_error, None)
            }
            SampleFormat::I16 => {
                device.build_input_stream(&config, |_: &[i16], _| {}, on_error, None)
            }
            SampleFormat::U16 => {
                device.build_input_stream(&config, |_: &[u16], _| {}, on_error, None)
            }
            other => {
                return Err(VoiceError::AudioDevice(format!(
                    "unsupported input sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => {
                VoiceError::AudioDevice("input device not available".into())
            }
            other => VoiceError::PermissionDenied(other.to_string()),
        })?;

        stream
            .play()
            .map_err(|e| VoiceError::PermissionDenied(e.to_string()))?;
        drop(stream);

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "microphone access granted"
        );
        Ok(())
    }
}

#[cfg(not(feature = "audio-cpal"))]
impl Microphone for CpalMicrophone {
    fn probe(&self) -> Result<()> {
        Err(VoiceError::Unavailable(
            "microphone (built without audio-cpal)".into(),
        ))
    }
}
