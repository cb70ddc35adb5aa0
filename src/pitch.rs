//! Pitch Estimator
//!
//! Fundamental-frequency estimation over a time-domain buffer using a
//! square difference function (SDF) with first-valley selection and
//! parabolic lag refinement.

use log::trace;
use thiserror::Error;

/// Errors returned when configuring a `PitchEstimator`.
#[derive(Debug, Error)]
pub enum PitchError {
    /// The estimator parameters are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Builder for a `PitchEstimator`.
#[derive(Debug, Clone)]
pub struct PitchEstimatorBuilder {
    min_frequency: f32,
    max_frequency: f32,
    window_ratio: f32,
    rms_gate: f32,
    valley_ratio: f32,
}

impl PitchEstimatorBuilder {
    /// Start with default parameters:
    /// min_frequency = 40 Hz, max_frequency = 1200 Hz,
    /// window_ratio = 0.5, rms_gate = 0.002, valley_ratio = 0.2.
    pub fn new() -> Self {
        PitchEstimatorBuilder {
            min_frequency: 40.0,
            max_frequency: 1200.0,
            window_ratio: 0.5,
            rms_gate: 0.002,
            valley_ratio: 0.2,
        }
    }

    /// Narrower guitar range: 70 Hz to 1100 Hz over a 0.4 window.
    pub fn guitar() -> Self {
        Self::new()
            .min_frequency(70.0)
            .max_frequency(1100.0)
            .window_ratio(0.4)
    }

    /// Lowest fundamental to search for, in Hz. Sets the maximum lag.
    pub fn min_frequency(mut self, hz: f32) -> Self {
        self.min_frequency = hz;
        self
    }

    /// Highest fundamental to search for, in Hz. Sets the minimum lag.
    pub fn max_frequency(mut self, hz: f32) -> Self {
        self.max_frequency = hz;
        self
    }

    /// Fraction of the buffer summed per lag (0.0..1.0).
    pub fn window_ratio(mut self, ratio: f32) -> Self {
        self.window_ratio = ratio;
        self
    }

    /// RMS below which the buffer is treated as silence.
    pub fn rms_gate(mut self, rms: f32) -> Self {
        self.rms_gate = rms;
        self
    }

    /// Fraction of the SDF value at the minimum lag a valley must fall below
    /// to be accepted before the global minimum.
    pub fn valley_ratio(mut self, ratio: f32) -> Self {
        self.valley_ratio = ratio;
        self
    }

    /// Validate and create the `PitchEstimator`.
    pub fn build(self) -> Result<PitchEstimator, PitchError> {
        if !self.min_frequency.is_finite() || self.min_frequency <= 0.0 {
            return Err(PitchError::Configuration(
                "min_frequency must be a positive number".into(),
            ));
        }
        if !self.max_frequency.is_finite() || self.max_frequency <= self.min_frequency {
            return Err(PitchError::Configuration(
                "max_frequency must be greater than min_frequency".into(),
            ));
        }
        if self.window_ratio.is_nan() || self.window_ratio <= 0.0 || self.window_ratio >= 1.0 {
            return Err(PitchError::Configuration(
                "window_ratio must be within (0, 1)".into(),
            ));
        }
        if self.rms_gate.is_nan() || self.rms_gate < 0.0 {
            return Err(PitchError::Configuration("rms_gate cannot be negative".into()));
        }
        if self.valley_ratio.is_nan() || self.valley_ratio <= 0.0 || self.valley_ratio > 1.0 {
            return Err(PitchError::Configuration(
                "valley_ratio must be within (0, 1]".into(),
            ));
        }

        Ok(self.into_estimator())
    }

    fn into_estimator(self) -> PitchEstimator {
        PitchEstimator {
            min_frequency: self.min_frequency,
            max_frequency: self.max_frequency,
            window_ratio: self.window_ratio,
            rms_gate: self.rms_gate,
            valley_ratio: self.valley_ratio,
        }
    }
}

impl Default for PitchEstimatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Autocorrelation-style fundamental frequency estimator.
///
/// Stateless: [`PitchEstimator::estimate`] only reads its input.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchEstimator {
    min_frequency: f32,
    max_frequency: f32,
    window_ratio: f32,
    rms_gate: f32,
    valley_ratio: f32,
}

impl PitchEstimator {
    /// Return a builder to customize the search range and thresholds.
    pub fn builder() -> PitchEstimatorBuilder {
        PitchEstimatorBuilder::new()
    }

    /// Lowest fundamental searched, in Hz.
    pub fn min_frequency(&self) -> f32 {
        self.min_frequency
    }

    /// Highest fundamental searched, in Hz.
    pub fn max_frequency(&self) -> f32 {
        self.max_frequency
    }

    /// Estimate the fundamental frequency of `buffer` in Hz.
    ///
    /// Returns `None` when the buffer is too quiet, too short for the lag
    /// range, or no periodicity is found.
    pub fn estimate(&self, buffer: &[f32], sample_rate: f32) -> Option<f32> {
        if buffer.is_empty() || sample_rate.is_nan() || sample_rate <= 0.0 {
            return None;
        }

        // 1) noise gate
        let rms = (buffer.iter().map(|&s| s * s).sum::<f32>() / buffer.len() as f32).sqrt();
        if rms.is_nan() || rms < self.rms_gate {
            trace!("pitch: rms {rms:.5} below gate {}", self.rms_gate);
            return None;
        }

        let min_lag = ((sample_rate / self.max_frequency).floor() as usize).max(1);
        let max_lag = (sample_rate / self.min_frequency).floor() as usize;
        if max_lag <= min_lag || max_lag >= buffer.len() {
            trace!(
                "pitch: lag range {min_lag}..={max_lag} does not fit a {}-sample buffer",
                buffer.len()
            );
            return None;
        }

        // the summing window must leave room for the largest lag
        let window = ((buffer.len() as f32 * self.window_ratio).floor() as usize)
            .min(buffer.len() - max_lag);
        if window == 0 {
            return None;
        }

        // 2) square difference function
        let mut diff = vec![0.0_f32; max_lag + 1];
        for lag in min_lag..=max_lag {
            diff[lag] = buffer[..window]
                .iter()
                .zip(&buffer[lag..lag + window])
                .map(|(a, b)| {
                    let d = a - b;
                    d * d
                })
                .sum();
        }

        // 3) first significant valley, else the global minimum
        let lag = self.find_valley(&diff, min_lag, max_lag)?;

        // 4) parabolic refinement
        let mut period = lag as f32;
        if lag > min_lag && lag < max_lag {
            let (y1, y2, y3) = (diff[lag - 1], diff[lag], diff[lag + 1]);
            let a = (y1 + y3 - 2.0 * y2) / 2.0;
            let b = (y3 - y1) / 2.0;
            if a != 0.0 {
                period -= b / (2.0 * a);
            }
        }

        let frequency = sample_rate / period;
        if frequency.is_finite() && frequency > 0.0 {
            Some(frequency)
        } else {
            None
        }
    }

    /// Running-minimum scan that stops at the first strict local minimum below
    /// `valley_ratio * diff[min_lag]`.
    fn find_valley(&self, diff: &[f32], min_lag: usize, max_lag: usize) -> Option<usize> {
        let threshold = self.valley_ratio * diff[min_lag];
        let mut best = None;
        let mut min_diff = f32::INFINITY;

        for lag in min_lag..=max_lag {
            let d = diff[lag];
            if d < min_diff {
                min_diff = d;
                best = Some(lag);
            }
            if lag > min_lag
                && lag < max_lag
                && d < threshold
                && d < diff[lag - 1]
                && d < diff[lag + 1]
            {
                return Some(lag);
            }
        }
        best
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        PitchEstimatorBuilder::new().into_estimator()
    }
}
