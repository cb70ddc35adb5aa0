//! Engine
//!
//! Per-frame entry point. An external scheduler calls [`Engine::advance`]
//! once per analysis frame with that frame's buffers; the engine runs the
//! detector for the active [`Mode`] and returns a [`FrameReport`].

use crate::chord::{ChordIdentifier, ChordMatch};
use crate::mono::MonophonicDetector;
use crate::note::{cents_between, Note, DEFAULT_REFERENCE_PITCH};
use crate::peaks::ChordPeakExtractor;
use crate::pitch::PitchEstimator;
use crate::spectrum::{Spectrum, SpectrumError};
use crate::targets::{detect_targets, Target, TargetReading};
use crate::tuning::Tuning;
use log::debug;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A reading further than this many cents from its target is not shown in its slot.
pub const TARGET_MATCH_CENTS: f32 = 200.0;

/// Errors returned by the `Engine`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A frame buffer had the wrong length.
    #[error("expected {buffer} of length {expected}, got {got}")]
    InvalidFrameSize {
        /// Which buffer was wrong, `"samples"` or `"spectrum"`.
        buffer: &'static str,
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },

    /// The engine configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The spectrum could not be wrapped.
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
}

/// Which detector runs on each frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    /// One note per frame.
    #[default]
    Mono,
    /// One reading per tuning target.
    Poly,
    /// Several peaks and an optional chord name.
    Chord,
}

/// Buffers captured for one analysis frame.
#[derive(Debug, Copy, Clone)]
pub struct Frame<'a> {
    /// Time-domain samples, `window_size` long.
    pub samples: &'a [f32],
    /// dB magnitudes of the same capture, `window_size / 2` long.
    pub spectrum: &'a [f32],
}

/// Readings for every target of a polyphonic frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolyReport {
    /// The targets searched this frame, in order.
    pub targets: Vec<Target>,
    /// Readings for the targets that cleared the threshold.
    pub readings: Vec<TargetReading>,
}

impl PolyReport {
    /// The reading produced by `target`, if it lies within
    /// [`TARGET_MATCH_CENTS`] of the target frequency.
    pub fn reading_for(&self, target: &Target) -> Option<&TargetReading> {
        self.readings.iter().find(|r| {
            r.target_id == target.id
                && cents_between(r.note.frequency, target.frequency).abs() < TARGET_MATCH_CENTS
        })
    }

    /// One slot per target, in target order.
    pub fn slots(&self) -> impl Iterator<Item = (&Target, Option<&TargetReading>)> + '_ {
        self.targets.iter().map(move |t| (t, self.reading_for(t)))
    }
}

/// Peaks and chord of a chord-mode frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChordReport {
    /// Up to six peaks, strongest first.
    pub peaks: Vec<Note>,
    /// The chord they form, if any.
    pub chord: Option<ChordMatch>,
}

/// Result of one frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrameReport {
    /// Monophonic result.
    Mono(Option<Note>),
    /// Per-target results.
    Poly(PolyReport),
    /// Chord results.
    Chord(ChordReport),
}

/// Builder for an `Engine`.
pub struct EngineBuilder {
    sample_rate: f32,
    window_size: usize,
    reference_pitch: f32,
    mode: Mode,
    tuning: Tuning,
    pitch_estimator: PitchEstimator,
    chord_peaks: ChordPeakExtractor,
    chord_identifier: ChordIdentifier,
}

impl EngineBuilder {
    /// Start with default parameters:
    /// sample_rate = 44_100, window_size = 8192, reference_pitch = 440,
    /// mode = Mono, standard guitar tuning.
    pub fn new() -> Self {
        EngineBuilder {
            sample_rate: 44_100.0,
            window_size: 8192,
            reference_pitch: DEFAULT_REFERENCE_PITCH,
            mode: Mode::default(),
            tuning: Tuning::standard(),
            pitch_estimator: PitchEstimator::default(),
            chord_peaks: ChordPeakExtractor::default(),
            chord_identifier: ChordIdentifier::default(),
        }
    }

    /// Set the sample rate in Hz.
    pub fn sample_rate(mut self, hz: f32) -> Self {
        self.sample_rate = hz;
        self
    }

    /// Set the analysis window size (a power of two).
    pub fn window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    /// Set the frequency of A4 in Hz.
    pub fn reference_pitch(mut self, hz: f32) -> Self {
        self.reference_pitch = hz;
        self
    }

    /// Set the initial mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the tuning whose strings become the polyphonic targets.
    pub fn tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Use a custom time-domain estimator for mono mode.
    pub fn pitch_estimator(mut self, estimator: PitchEstimator) -> Self {
        self.pitch_estimator = estimator;
        self
    }

    /// Use a custom peak extractor for chord mode.
    pub fn chord_peaks(mut self, extractor: ChordPeakExtractor) -> Self {
        self.chord_peaks = extractor;
        self
    }

    /// Use a custom chord template table.
    pub fn chord_identifier(mut self, identifier: ChordIdentifier) -> Self {
        self.chord_identifier = identifier;
        self
    }

    /// Validate and create the `Engine`.
    pub fn build(self) -> Result<Engine, EngineError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EngineError::Configuration(
                "sample_rate must be a positive number".into(),
            ));
        }
        if !self.window_size.is_power_of_two() || self.window_size < 32 {
            return Err(EngineError::Configuration(
                "window_size must be a power of two >= 32".into(),
            ));
        }
        validate_reference_pitch(self.reference_pitch)?;

        let targets = self.tuning.targets(self.reference_pitch);
        Ok(Engine {
            sample_rate: self.sample_rate,
            window_size: self.window_size,
            reference_pitch: self.reference_pitch,
            mode: self.mode,
            tuning: Some(self.tuning),
            targets,
            mono: MonophonicDetector::new(self.pitch_estimator),
            chord_peaks: self.chord_peaks,
            chord_identifier: self.chord_identifier,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame-driven analysis engine.
///
/// Holds only configuration; [`Engine::advance`] takes `&self` and the same
/// frame always produces the same report.
pub struct Engine {
    sample_rate: f32,
    window_size: usize,
    reference_pitch: f32,
    mode: Mode,
    tuning: Option<Tuning>,
    targets: Vec<Target>,
    mono: MonophonicDetector,
    chord_peaks: ChordPeakExtractor,
    chord_identifier: ChordIdentifier,
}

impl Engine {
    /// Return a builder to customize the engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Analysis window size in samples.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Current frequency of A4.
    pub fn reference_pitch(&self) -> f32 {
        self.reference_pitch
    }

    /// Active mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Active tuning, `None` once explicit targets were set.
    pub fn tuning(&self) -> Option<&Tuning> {
        self.tuning.as_ref()
    }

    /// Targets searched in poly mode.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Switch the detector run by `advance`.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Change the A4 reference. Targets derived from a tuning follow it.
    pub fn set_reference_pitch(&mut self, hz: f32) -> Result<(), EngineError> {
        validate_reference_pitch(hz)?;
        self.reference_pitch = hz;
        if let Some(tuning) = &self.tuning {
            self.targets = tuning.targets(hz);
        }
        debug!("engine: reference pitch set to {hz} Hz");
        Ok(())
    }

    /// Switch tuning and re-derive the targets.
    pub fn set_tuning(&mut self, tuning: Tuning) {
        debug!("engine: tuning set to {}", tuning.name());
        self.targets = tuning.targets(self.reference_pitch);
        self.tuning = Some(tuning);
    }

    /// Search explicit targets instead of a tuning's strings. They are kept
    /// as given when the reference pitch changes.
    pub fn set_targets(&mut self, targets: Vec<Target>) {
        debug!("engine: {} explicit targets", targets.len());
        self.tuning = None;
        self.targets = targets;
    }

    /// Analyse one frame.
    ///
    /// Returns `Err(InvalidFrameSize)` if either buffer does not match the
    /// configured window size.
    pub fn advance(&self, frame: &Frame<'_>) -> Result<FrameReport, EngineError> {
        if frame.samples.len() != self.window_size {
            return Err(EngineError::InvalidFrameSize {
                buffer: "samples",
                expected: self.window_size,
                got: frame.samples.len(),
            });
        }
        if frame.spectrum.len() != self.window_size / 2 {
            return Err(EngineError::InvalidFrameSize {
                buffer: "spectrum",
                expected: self.window_size / 2,
                got: frame.spectrum.len(),
            });
        }
        let spectrum = Spectrum::new(frame.spectrum, self.sample_rate, self.window_size)?;

        let report = match self.mode {
            Mode::Mono => FrameReport::Mono(self.mono.detect(
                frame.samples,
                &spectrum,
                self.reference_pitch,
            )),
            Mode::Poly => FrameReport::Poly(PolyReport {
                targets: self.targets.clone(),
                readings: detect_targets(&spectrum, &self.targets, self.reference_pitch),
            }),
            Mode::Chord => {
                let peaks = self.chord_peaks.extract(&spectrum, self.reference_pitch);
                let chord = self.chord_identifier.identify(&peaks);
                FrameReport::Chord(ChordReport { peaks, chord })
            }
        };
        Ok(report)
    }
}

fn validate_reference_pitch(hz: f32) -> Result<(), EngineError> {
    if !hz.is_finite() || hz <= 0.0 {
        return Err(EngineError::Configuration(format!(
            "reference_pitch must be a positive number, got {hz}"
        )));
    }
    Ok(())
}
