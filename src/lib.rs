//! # chord_tuner
//!
//! Frame-driven pitch and chord analysis for instrument tuners: estimate
//! the fundamental of a single note, track one reading per string, or pick
//! several peaks out of a spectrum and name the chord they form.
//!
//! ## Example
//! ```rust
//! use chord_tuner::{Engine, Frame, FrameReport, Mode, SpectrumAnalyser};
//!
//! fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1) Build an analyser producing dB spectra
//!     let mut analyser = SpectrumAnalyser::builder()
//!         .window_size(8192)
//!         .sampling_rate(44_100)
//!         .build()?;
//!
//!     // 2) Build an engine for the same window
//!     let engine = Engine::builder()
//!         .window_size(8192)
//!         .sample_rate(44_100.0)
//!         .mode(Mode::Chord)
//!         .build()?;
//!
//!     // 3) Once per frame:
//!     let samples: Vec<f32> = vec![0.0; 8192]; // fill with actual samples
//!     let spectrum = analyser.process(&samples)?.to_vec();
//!     let frame = Frame { samples: &samples, spectrum: &spectrum };
//!     if let FrameReport::Chord(report) = engine.advance(&frame)? {
//!         if let Some(chord) = report.chord {
//!             println!("{chord}");
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//! - `serde`: derives `Serialize`/`Deserialize` for notes, readings and reports

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rust_2018_idioms)]
#![deny(clippy::all)]

/// Per-frame engine API.
pub use engine::{
    ChordReport, Engine, EngineBuilder, EngineError, Frame, FrameReport, Mode, PolyReport,
};

/// Note naming.
pub use note::{
    cents_between, frequency_to_note, midi_to_frequency, Note, NoteName, ParseNoteNameError,
    DEFAULT_REFERENCE_PITCH,
};

/// Detectors.
pub use chord::{default_templates, ChordIdentifier, ChordMatch, ChordTemplate};
pub use mono::MonophonicDetector;
pub use peaks::{ChordPeakExtractor, ChordPeakExtractorBuilder};
pub use pitch::{PitchError, PitchEstimator, PitchEstimatorBuilder};
pub use targets::{detect_targets, Target, TargetReading};

/// Spectra.
pub use analyser::{AnalyserError, SpectrumAnalyser, SpectrumAnalyserBuilder};
pub use spectrum::{Spectrum, SpectrumError};

/// Tunings.
pub use tuning::{Tuning, TuningError, TuningString, PRESET_KEYS};

/// Windowed FFT producing dB magnitude spectra.
pub mod analyser;

/// Chord naming from detected notes.
pub mod chord;

/// Per-frame entry point.
pub mod engine;

/// Monophonic note detection.
pub mod mono;

/// Frequency to note mapping.
pub mod note;

/// Multi-peak extraction for chords.
pub mod peaks;

/// Autocorrelation pitch estimation.
pub mod pitch;

/// dB spectrum view and peak refinement.
pub mod spectrum;

/// Per-string targeted detection.
pub mod targets;

/// Guitar tunings.
pub mod tuning;
