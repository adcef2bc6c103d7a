//! Clip sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! ## Design
//!
//! Synthesizers return audio at their own rate (24 kHz for most neural
//! voices, 22.05 kHz for espeak-ng) while output devices run at whatever the
//! OS mixer picked, commonly 48 kHz. `RateConverter` bridges that gap on the
//! playback thread before the stream starts, so the realtime callback only
//! copies samples.
//!
//! When clip rate == device rate, `RateConverter` is a passthrough and no
//! rubato session is created at all.
//!
//! ## Usage
//!
//! ```ignore
//! let mut rc = RateConverter::new(24_000, 48_000, 1024)?;
//! let mut out = rc.process(clip.samples());
//! out.extend(rc.finish());
//! ```

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::error;

use crate::error::{Result, VoiceError};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds a partial input chunk between calls.
    input_buf: Vec<f32>,
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
    ratio: f64,
    /// Input frames accepted since the last `finish()`.
    frames_in: usize,
    /// Output frames produced since the last `finish()`.
    frames_out: usize,
}

impl RateConverter {
    /// # Errors
    /// Returns `VoiceError::AudioDevice` if rubato fails to initialise.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        let ratio = target_rate as f64 / source_rate.max(1) as f64;

        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
                ratio,
                frames_in: 0,
                frames_out: 0,
            });
        }

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| VoiceError::AudioDevice(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        tracing::debug!(source_rate, target_rate, chunk_size, "clip resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
            ratio,
            frames_in: 0,
            frames_out: 0,
        })
    }

    /// Resample `samples`, returning whatever full chunks produced (may be empty).
    ///
    /// Any remainder shorter than `chunk_size` is kept for the next call or
    /// for [`finish`](Self::finish).
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);
        self.frames_in += samples.len();

        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];

            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }

            self.input_buf.drain(..self.chunk_size);
        }

        self.frames_out += result.len();
        result
    }

    /// Flush the buffered tail, zero-padding the last chunk, and trim the
    /// output to the length the ratio predicts for the input seen so far.
    pub fn finish(&mut self) -> Vec<f32> {
        if self.resampler.is_none() {
            return Vec::new();
        }

        let expected_total = (self.frames_in as f64 * self.ratio).round() as usize;
        let mut tail = Vec::new();

        if !self.input_buf.is_empty() {
            let pad = self.chunk_size - self.input_buf.len();
            let frames_in = self.frames_in;
            tail = self.process(&vec![0.0; pad]);
            self.frames_in = frames_in;
        }

        let budget = expected_total.saturating_sub(self.frames_out - tail.len());
        tail.truncate(budget);

        self.frames_in = 0;
        self.frames_out = 0;
        tail
    }

    /// Convert a whole clip in one call.
    pub fn convert_all(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut out = self.process(samples);
        out.extend(self.finish());
        out
    }

    /// Returns `true` when source rate == target rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
