//! Spectrum Analyser
//!
//! Produces the dB-magnitude spectrum consumed by the spectral detectors from
//! a time-domain frame: Blackman window, forward FFT, `|X[k]| / N` magnitude,
//! exponential smoothing across frames and conversion to decibels.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::{f32::consts::PI, sync::Arc};
use thiserror::Error;

/// Magnitudes are clamped here before conversion so silent bins stay finite.
const MIN_MAGNITUDE: f32 = 1e-12;

/// Errors returned by the `SpectrumAnalyser`.
#[derive(Debug, Error)]
pub enum AnalyserError {
    /// Frame received was not of the expected size.
    #[error("expected frame of length {expected}, got {got}")]
    InvalidFrameSize {
        /// The expected size of the audio frame.
        expected: usize,
        /// The actual size of the received audio frame.
        got: usize,
    },

    /// An error occurred during the configuration of the analyser.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Builder for a `SpectrumAnalyser`.
pub struct SpectrumAnalyserBuilder {
    window_size: usize,
    sampling_rate: usize,
    smoothing: f32,
}

impl SpectrumAnalyserBuilder {
    /// Start with default parameters:
    /// window_size = 8192, sampling_rate = 44_100, smoothing = 0.8.
    pub fn new() -> Self {
        SpectrumAnalyserBuilder {
            window_size: 8192,
            sampling_rate: 44_100,
            smoothing: 0.8,
        }
    }

    /// Set the analysis window size (a power of two).
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Set the sampling rate of the audio.
    pub fn sampling_rate(mut self, rate: usize) -> Self {
        self.sampling_rate = rate;
        self
    }

    /// Set the smoothing time constant (0.0 = none, towards 1.0 = slow).
    pub fn smoothing(mut self, tau: f32) -> Self {
        self.smoothing = tau;
        self
    }

    /// Finalize and create the `SpectrumAnalyser`.
    pub fn build(self) -> Result<SpectrumAnalyser, AnalyserError> {
        if !self.window_size.is_power_of_two() || self.window_size < 32 {
            return Err(AnalyserError::Configuration(
                "window_size must be a power of two >= 32".into(),
            ));
        }
        if self.sampling_rate == 0 {
            return Err(AnalyserError::Configuration("sampling_rate cannot be zero".into()));
        }
        if self.smoothing.is_nan() || !(0.0..1.0).contains(&self.smoothing) {
            return Err(AnalyserError::Configuration(
                "smoothing must be within [0, 1)".into(),
            ));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.window_size);

        Ok(SpectrumAnalyser {
            window: blackman_window(self.window_size),
            fft_buffer: vec![Complex { re: 0.0, im: 0.0 }; self.window_size],
            smoothed: vec![0.0; self.window_size / 2],
            decibels: vec![0.0; self.window_size / 2],
            window_size: self.window_size,
            sampling_rate: self.sampling_rate,
            smoothing: self.smoothing,
            fft,
        })
    }
}

impl Default for SpectrumAnalyserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-to-spectrum converter.
///
/// Keeps the smoothed magnitudes of the previous frame; everything else is
/// recomputed per call.
pub struct SpectrumAnalyser {
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    decibels: Vec<f32>,
    window_size: usize,
    sampling_rate: usize,
    smoothing: f32,
    fft: Arc<dyn Fft<f32>>,
}

impl SpectrumAnalyser {
    /// Start customizing with a builder.
    pub fn builder() -> SpectrumAnalyserBuilder {
        SpectrumAnalyserBuilder::new()
    }

    /// Analysis window size in samples.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Sampling rate in Hz.
    pub fn sampling_rate(&self) -> usize {
        self.sampling_rate
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Analyse one frame and return its `window_size / 2` dB magnitudes.
    pub fn process(&mut self, frame: &[f32]) -> Result<&[f32], AnalyserError> {
        if frame.len() != self.window_size {
            return Err(AnalyserError::InvalidFrameSize {
                expected: self.window_size,
                got: frame.len(),
            });
        }

        for ((slot, &sample), &w) in self.fft_buffer.iter_mut().zip(frame).zip(&self.window) {
            slot.re = sample * w;
            slot.im = 0.0;
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / self.window_size as f32;
        let tau = self.smoothing;
        for ((smoothed, db), c) in self
            .smoothed
            .iter_mut()
            .zip(self.decibels.iter_mut())
            .zip(&self.fft_buffer)
        {
            let mag = c.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * mag;
            *db = 20.0 * smoothed.max(MIN_MAGNITUDE).log10();
        }

        Ok(&self.decibels)
    }
}

/// Classic Blackman window (alpha = 0.16).
fn blackman_window(size: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / n;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
