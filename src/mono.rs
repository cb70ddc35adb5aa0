//! Monophonic Detector
//!
//! One best-guess note per frame: the autocorrelation estimate when it is
//! usable, otherwise the strongest spectral peak.

use crate::note::{frequency_to_note, Note};
use crate::pitch::PitchEstimator;
use crate::spectrum::Spectrum;
use log::trace;

/// Autocorrelation results at or above this frequency are distrusted.
pub const MONO_MAX_FREQUENCY: f32 = 1200.0;

/// Minimum magnitude (dB) of the fallback spectral peak.
pub const MONO_FALLBACK_FLOOR_DB: f32 = -90.0;

/// Lowest bin scanned by the fallback; bins below carry DC and hum.
const FALLBACK_FIRST_BIN: usize = 2;

/// Combines a `PitchEstimator` with a global spectral peak fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonophonicDetector {
    estimator: PitchEstimator,
}

impl MonophonicDetector {
    /// Create a detector around `estimator`.
    pub fn new(estimator: PitchEstimator) -> Self {
        MonophonicDetector { estimator }
    }

    /// The time-domain estimator in use.
    pub fn estimator(&self) -> &PitchEstimator {
        &self.estimator
    }

    /// Detect the single most likely note in this frame.
    ///
    /// `samples` and `spectrum` must come from the same capture.
    pub fn detect(
        &self,
        samples: &[f32],
        spectrum: &Spectrum<'_>,
        reference_pitch: f32,
    ) -> Option<Note> {
        match self.estimator.estimate(samples, spectrum.sample_rate()) {
            Some(freq) if freq < MONO_MAX_FREQUENCY => {
                return frequency_to_note(freq, reference_pitch);
            }
            Some(freq) => trace!("mono: autocorrelation gave {freq:.1} Hz, using spectral peak"),
            None => trace!("mono: no autocorrelation pitch, using spectral peak"),
        }

        let last = spectrum.len().checked_sub(1)?;
        let (bin, db) = spectrum.max_in_range(FALLBACK_FIRST_BIN..=last)?;
        if db <= MONO_FALLBACK_FLOOR_DB {
            trace!("mono: strongest bin {bin} at {db:.1} dB is below the floor");
            return None;
        }

        frequency_to_note(spectrum.refine_peak(bin), reference_pitch).map(|n| n.with_magnitude(db))
    }
}
