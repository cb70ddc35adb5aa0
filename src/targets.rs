//! Targeted Detector
//!
//! Polyphonic detection against a list of expected frequencies (one per
//! string). Each target searches its own narrow band of the spectrum, so a
//! loud string never hides a quiet one.

use crate::note::{cents_between, frequency_to_note, Note};
use crate::spectrum::Spectrum;
use log::trace;
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Half-width of each target's search band in semitones.
pub const TARGET_SEARCH_SEMITONES: f32 = 1.5;

/// Minimum magnitude (dB) of a target's peak.
pub const TARGET_FLOOR_DB: f32 = -95.0;

/// An expected frequency to search near, e.g. one guitar string.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    /// Caller-assigned identifier (string number for guitars).
    pub id: u32,
    /// Short label shown next to the id, e.g. `"E"` or `"e"`.
    pub label: String,
    /// Expected frequency in Hz.
    pub frequency: f32,
}

impl Target {
    /// Create a target.
    pub fn new(id: u32, label: impl Into<String>, frequency: f32) -> Self {
        Target {
            id,
            label: label.into(),
            frequency,
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.id, self.label)
    }
}

/// A note detected near a target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TargetReading {
    /// Id of the target that produced this reading.
    pub target_id: u32,
    /// The detected note; `magnitude` is always set.
    pub note: Note,
    /// The target frequency that was searched around.
    pub target_frequency: f32,
}

impl TargetReading {
    /// Deviation of the detected frequency from the target, in cents.
    pub fn cents_from_target(&self) -> f32 {
        cents_between(self.note.frequency, self.target_frequency)
    }
}

/// Detect one note per target that clears [`TARGET_FLOOR_DB`].
///
/// Targets whose search band falls outside the spectrum, or whose strongest
/// bin is too quiet, are omitted. Readings keep the order of `targets`.
pub fn detect_targets(
    spectrum: &Spectrum<'_>,
    targets: &[Target],
    reference_pitch: f32,
) -> Vec<TargetReading> {
    targets
        .iter()
        .filter_map(|target| detect_target(spectrum, target, reference_pitch))
        .collect()
}

fn detect_target(
    spectrum: &Spectrum<'_>,
    target: &Target,
    reference_pitch: f32,
) -> Option<TargetReading> {
    if !target.frequency.is_finite() || target.frequency <= 0.0 {
        trace!("target {target}: invalid frequency {}", target.frequency);
        return None;
    }

    let ratio = 2f32.powf(TARGET_SEARCH_SEMITONES / 12.0);
    let low_bin = spectrum.frequency_to_bin(target.frequency / ratio).floor();
    let high_bin = spectrum.frequency_to_bin(target.frequency * ratio).ceil();
    if low_bin < 0.0 || high_bin >= spectrum.len() as f32 {
        trace!("target {target}: bins {low_bin}..={high_bin} outside spectrum");
        return None;
    }

    let (bin, db) = spectrum.max_in_range(low_bin as usize..=high_bin as usize)?;
    if db <= TARGET_FLOOR_DB {
        return None;
    }

    let note = frequency_to_note(spectrum.refine_peak(bin), reference_pitch)?;
    Some(TargetReading {
        target_id: target.id,
        note: note.with_magnitude(db),
        target_frequency: target.frequency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteName;

    const SR: f32 = 44_100.0;
    const N: usize = 8192;

    fn standard_targets() -> Vec<Target> {
        vec![
            Target::new(1, "e", 329.63),
            Target::new(2, "B", 246.94),
            Target::new(3, "G", 196.00),
            Target::new(4, "D", 146.83),
            Target::new(5, "A", 110.00),
            Target::new(6, "E", 82.41),
        ]
    }

    /// Write a parabolic peak whose vertex sits at `freq`.
    fn inject_peak(bins: &mut [f32], freq: f32) {
        let exact = freq * N as f32 / SR;
        let best = exact.round();
        let p = exact - best;
        let best = best as usize;
        bins[best - 1] = -50.0 - 60.0 * p - 30.0 * p * p;
        bins[best] = -30.0 * p * p - 20.0;
        bins[best + 1] = -50.0 + 60.0 * p - 30.0 * p * p;
    }

    #[test]
    fn six_strings_ten_cents_sharp() {
        let targets = standard_targets();
        let mut bins = vec![-100.0; N / 2];
        for t in &targets {
            inject_peak(&mut bins, t.frequency * 2f32.powf(10.0 / 1200.0));
        }
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();
        let readings = detect_targets(&spectrum, &targets, 440.0);

        assert_eq!(readings.len(), 6);
        for (reading, target) in readings.iter().zip(&targets) {
            assert_eq!(reading.target_id, target.id);
            assert_eq!(reading.target_frequency, target.frequency);
            assert!(reading.note.magnitude.unwrap() > -28.0);
            let cents = reading.cents_from_target();
            assert!((cents - 10.0).abs() < 5.0, "string {}: {cents} cents", target.id);
        }
        assert_eq!(readings[5].note.name, NoteName::E);
        assert_eq!(readings[5].note.octave, 2);
    }

    #[test]
    fn quiet_target_is_omitted_without_affecting_others() {
        let targets = standard_targets();
        let mut bins = vec![-100.0; N / 2];
        inject_peak(&mut bins, 110.0);
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();
        let readings = detect_targets(&spectrum, &targets, 440.0);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].target_id, 5);
    }

    #[test]
    fn shared_peak_is_reported_by_every_target_in_range() {
        // two targets a semitone apart both see the same peak
        let targets = vec![Target::new(1, "A", 110.0), Target::new(2, "A#", 116.54)];
        let mut bins = vec![-100.0; N / 2];
        inject_peak(&mut bins, 113.0);
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();
        let readings = detect_targets(&spectrum, &targets, 440.0);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].note.frequency, readings[1].note.frequency);
    }

    #[test]
    fn out_of_range_targets_are_skipped() {
        let targets = vec![
            Target::new(1, "x", 30_000.0),
            Target::new(2, "y", -1.0),
            Target::new(3, "z", f32::NAN),
            Target::new(4, "A", 110.0),
        ];
        let mut bins = vec![-100.0; N / 2];
        inject_peak(&mut bins, 110.0);
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();
        let readings = detect_targets(&spectrum, &targets, 440.0);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].target_id, 4);
    }

    #[test]
    fn target_display() {
        assert_eq!(Target::new(6, "E", 82.41).to_string(), "6 - E");
    }
}
