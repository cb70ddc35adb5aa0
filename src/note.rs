//! Note Mapping
//!
//! Conversion between frequencies and equal-tempered note names, octaves and
//! cent offsets relative to a caller-supplied reference pitch.

use std::fmt::Display;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of pitch classes in an octave
pub const SEMITONES: usize = 12;

/// Standard concert pitch for A4 in Hz
pub const DEFAULT_REFERENCE_PITCH: f32 = 440.0;

/// MIDI note number of A4
const A4_MIDI: i32 = 69;

/// Twelve chromatic pitch classes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NoteName {
    /// C
    C,
    /// C sharp / D flat
    Cs,
    /// D
    D,
    /// D sharp / E flat
    Ds,
    /// E
    E,
    /// F
    F,
    /// F sharp / G flat
    Fs,
    /// G
    G,
    /// G sharp / A flat
    Gs,
    /// A
    A,
    /// A sharp / B flat
    As,
    /// B
    B,
}

impl NoteName {
    /// All pitch classes in ascending order starting at C.
    pub const ALL: [NoteName; SEMITONES] = [
        NoteName::C,
        NoteName::Cs,
        NoteName::D,
        NoteName::Ds,
        NoteName::E,
        NoteName::F,
        NoteName::Fs,
        NoteName::G,
        NoteName::Gs,
        NoteName::A,
        NoteName::As,
        NoteName::B,
    ];

    /// Pitch class for a semitone index, wrapped into `0..12`.
    pub const fn from_index(idx: usize) -> NoteName {
        Self::ALL[idx % SEMITONES]
    }

    /// Semitone index of this pitch class, `C = 0` through `B = 11`.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Sharp-spelled label, e.g. `"C#"`.
    pub const fn label(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::Cs => "C#",
            NoteName::D => "D",
            NoteName::Ds => "D#",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::Fs => "F#",
            NoteName::G => "G",
            NoteName::Gs => "G#",
            NoteName::A => "A",
            NoteName::As => "A#",
            NoteName::B => "B",
        }
    }
}

impl Display for NoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string is not a sharp-spelled pitch class.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized note name: `{0}`")]
pub struct ParseNoteNameError(pub String);

impl FromStr for NoteName {
    type Err = ParseNoteNameError;

    /// Parses `C`, `c#`, `A#` and friends. Letter case is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        NoteName::ALL
            .iter()
            .copied()
            .find(|n| n.label() == upper)
            .ok_or_else(|| ParseNoteNameError(s.to_string()))
    }
}

/// A frequency resolved to its nearest equal-tempered note.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Note {
    /// Pitch class of the nearest semitone.
    pub name: NoteName,
    /// Octave number, MIDI convention (A4 = 440 Hz sits in octave 4).
    pub octave: i32,
    /// Signed deviation from the nearest semitone in cents, within [-50, +50).
    pub cents: f32,
    /// Measured frequency in Hz, rounded to two decimals.
    pub frequency: f32,
    /// Spectral magnitude in dB when the note came from a spectrum peak.
    pub magnitude: Option<f32>,
}

impl Note {
    /// Attach a spectral magnitude (dB) to this note.
    pub fn with_magnitude(mut self, db: f32) -> Self {
        self.magnitude = Some(db);
        self
    }

    /// MIDI note number of the nearest semitone.
    pub fn midi_number(&self) -> i32 {
        (self.octave + 1) * SEMITONES as i32 + self.name.index() as i32
    }

    /// True when `|cents|` is below `tolerance_cents`.
    pub fn is_in_tune(&self, tolerance_cents: f32) -> bool {
        self.cents.abs() < tolerance_cents
    }
}

impl Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} {:+.1}c", self.name, self.octave, self.cents)
    }
}

/// Map a frequency to its nearest note relative to `reference_pitch` (the
/// frequency of A4).
///
/// Returns `None` for non-positive or non-finite frequencies, and for an
/// unusable reference pitch.
pub fn frequency_to_note(frequency: f32, reference_pitch: f32) -> Option<Note> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    if !reference_pitch.is_finite() || reference_pitch <= 0.0 {
        return None;
    }

    let n = SEMITONES as f32 * (frequency / reference_pitch).log2();
    // half-way cases round up to the next semitone, so cents stay within [-50, +50)
    let round_n = (n + 0.5).floor();
    let midi = round_n as i32 + A4_MIDI;

    Some(Note {
        name: NoteName::from_index(midi.rem_euclid(SEMITONES as i32) as usize),
        octave: midi.div_euclid(SEMITONES as i32) - 1,
        cents: 100.0 * (n - round_n),
        frequency: (frequency * 100.0).round() / 100.0,
        magnitude: None,
    })
}

/// Equal-tempered frequency of a MIDI note number.
pub fn midi_to_frequency(midi: i32, reference_pitch: f32) -> f32 {
    reference_pitch * 2f32.powf((midi - A4_MIDI) as f32 / SEMITONES as f32)
}

/// Deviation of `frequency` from `target` in cents (positive = sharp).
pub fn cents_between(frequency: f32, target: f32) -> f32 {
    1200.0 * (frequency / target).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concert_a_maps_to_a4() {
        let note = frequency_to_note(440.0, 440.0).unwrap();
        assert_eq!(note.name, NoteName::A);
        assert_eq!(note.octave, 4);
        assert!(note.cents.abs() < 1e-4);
        assert_eq!(note.frequency, 440.0);
        assert_eq!(note.magnitude, None);
    }

    #[test]
    fn a_sharp_four() {
        let note = frequency_to_note(466.16, 440.0).unwrap();
        assert_eq!(note.name, NoteName::As);
        assert_eq!(note.octave, 4);
        assert!(note.cents.abs() < 0.1, "cents = {}", note.cents);
    }

    #[test]
    fn invalid_frequencies_are_absent() {
        assert!(frequency_to_note(-5.0, 440.0).is_none());
        assert!(frequency_to_note(0.0, 440.0).is_none());
        assert!(frequency_to_note(f32::NAN, 440.0).is_none());
        assert!(frequency_to_note(f32::INFINITY, 440.0).is_none());
        assert!(frequency_to_note(440.0, 0.0).is_none());
    }

    #[test]
    fn octave_boundary_at_c() {
        let b3 = frequency_to_note(246.94, 440.0).unwrap();
        assert_eq!((b3.name, b3.octave), (NoteName::B, 3));
        let c4 = frequency_to_note(261.63, 440.0).unwrap();
        assert_eq!((c4.name, c4.octave), (NoteName::C, 4));
        assert_eq!(c4.midi_number(), 60);
    }

    #[test]
    fn low_notes_wrap_pitch_class() {
        // A0 and C0 sit below the reference by several octaves
        let a0 = frequency_to_note(27.5, 440.0).unwrap();
        assert_eq!((a0.name, a0.octave), (NoteName::A, 0));
        let c0 = frequency_to_note(16.35, 440.0).unwrap();
        assert_eq!((c0.name, c0.octave), (NoteName::C, 0));
        let b_minus1 = frequency_to_note(15.43, 440.0).unwrap();
        assert_eq!((b_minus1.name, b_minus1.octave), (NoteName::B, -1));
    }

    #[test]
    fn reference_pitch_shifts_naming() {
        // 432 Hz is A4 when the reference is 432
        let note = frequency_to_note(432.0, 432.0).unwrap();
        assert_eq!(note.name, NoteName::A);
        assert!(note.cents.abs() < 1e-4);

        // and about 31.8 cents flat against 440
        let flat = frequency_to_note(432.0, 440.0).unwrap();
        assert_eq!(flat.name, NoteName::A);
        assert!((flat.cents + 31.77).abs() < 0.05, "cents = {}", flat.cents);
    }

    #[test]
    fn cents_are_signed() {
        let sharp = frequency_to_note(440.0 * 2f32.powf(20.0 / 1200.0), 440.0).unwrap();
        assert!((sharp.cents - 20.0).abs() < 0.01);
        let flat = frequency_to_note(440.0 * 2f32.powf(-20.0 / 1200.0), 440.0).unwrap();
        assert!((flat.cents + 20.0).abs() < 0.01);
        assert!(sharp.is_in_tune(25.0));
        assert!(!flat.is_in_tune(5.0));
    }

    #[test]
    fn frequency_is_rounded_to_two_decimals() {
        let note = frequency_to_note(110.123_456, 440.0).unwrap();
        assert!((note.frequency - 110.12).abs() < 1e-4);
    }

    #[test]
    fn midi_round_trip() {
        for midi in 28..96 {
            let f = midi_to_frequency(midi, 440.0);
            let note = frequency_to_note(f, 440.0).unwrap();
            assert_eq!(note.midi_number(), midi);
        }
        assert!((cents_between(440.0 * 2f32.powf(10.0 / 1200.0), 440.0) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn cents_stay_below_plus_fifty() {
        // just past half-way above A4 is A#4, about 50 cents flat
        let note = frequency_to_note(440.0 * 2f32.powf(50.05 / 1200.0), 440.0).unwrap();
        assert_eq!((note.name, note.octave), (NoteName::As, 4));
        assert!((note.cents + 49.95).abs() < 0.01);

        let mut f = 40.0_f32;
        while f < 2000.0 {
            let cents = frequency_to_note(f, 440.0).unwrap().cents;
            assert!((-50.001..50.0).contains(&cents), "{f} Hz: {cents}");
            f *= 1.0013;
        }
    }

    #[test]
    fn parses_note_names() {
        assert_eq!("c#".parse::<NoteName>().unwrap(), NoteName::Cs);
        assert_eq!("A".parse::<NoteName>().unwrap(), NoteName::A);
        assert!("H".parse::<NoteName>().is_err());
        assert_eq!(NoteName::Gs.to_string(), "G#");
        assert_eq!(NoteName::from_index(14), NoteName::D);
    }
}
