//! WAV decoding into mono f32 clips.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use super::AudioClip;
use crate::error::{Result, VoiceError};

/// Decode a RIFF/WAV payload, downmixing to mono.
///
/// Streams written to a pipe (`espeak-ng --stdout`) carry placeholder chunk
/// sizes, so decoding stops at the first short read instead of failing as long
/// as some audio was recovered.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioClip> {
    let mut reader =
        WavReader::new(Cursor::new(bytes)).map_err(|e| VoiceError::AudioDecode(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let (interleaved, truncated) = match spec.sample_format {
        SampleFormat::Float => collect_lossy(reader.samples::<f32>()),
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            collect_lossy(reader.samples::<i32>().map(|s| s.map(|v| v as f32 * scale)))
        }
    };

    if let Some(e) = truncated {
        if interleaved.is_empty() {
            return Err(VoiceError::AudioDecode(e.to_string()));
        }
        debug!(samples = interleaved.len(), "wav stream ended early: {e}");
    }

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    if mono.is_empty() {
        return Err(VoiceError::AudioDecode("wav payload has no samples".into()));
    }

    Ok(AudioClip::new(mono, spec.sample_rate))
}

fn collect_lossy<I>(samples: I) -> (Vec<f32>, Option<hound::Error>)
where
    I: Iterator<Item = hound::Result<f32>>,
{
    let mut out = Vec::new();
    for sample in samples {
        match sample {
            Ok(v) => out.push(v),
            Err(e) => return (out, Some(e)),
        }
    }
    (out, None)
}
