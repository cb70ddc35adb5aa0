//! Chord Peak Extractor
//!
//! Picks several independent spectral peaks out of one spectrum, names them,
//! and drops peaks that look like overtones of a stronger fundamental.

use crate::note::{frequency_to_note, Note};
use crate::spectrum::Spectrum;
use log::trace;

/// Builder for a `ChordPeakExtractor`.
#[derive(Debug, Clone)]
pub struct ChordPeakExtractorBuilder {
    min_frequency: f32,
    max_frequency: f32,
    threshold_db: f32,
    local_window: usize,
    max_candidates: usize,
    max_peaks: usize,
    harmonic_tolerance: f32,
    harmonic_margin_db: f32,
}

impl ChordPeakExtractorBuilder {
    /// Start with default parameters:
    /// frequency range 50..1200 Hz, threshold = -85 dB, local_window = 20 bins,
    /// max_candidates = 10, max_peaks = 6, harmonic_tolerance = 0.03,
    /// harmonic_margin_db = 10.
    pub fn new() -> Self {
        ChordPeakExtractorBuilder {
            min_frequency: 50.0,
            max_frequency: 1200.0,
            threshold_db: -85.0,
            local_window: 20,
            max_candidates: 10,
            max_peaks: 6,
            harmonic_tolerance: 0.03,
            harmonic_margin_db: 10.0,
        }
    }

    /// Frequency band scanned for peaks, in Hz.
    pub fn frequency_range(mut self, min_hz: f32, max_hz: f32) -> Self {
        self.min_frequency = min_hz;
        self.max_frequency = max_hz;
        self
    }

    /// Magnitude a peak must exceed, in dB.
    pub fn threshold_db(mut self, db: f32) -> Self {
        self.threshold_db = db;
        self
    }

    /// Half-width in bins of the local dominance check.
    pub fn local_window(mut self, bins: usize) -> Self {
        self.local_window = bins;
        self
    }

    /// Strongest candidates kept before harmonic filtering.
    pub fn max_candidates(mut self, n: usize) -> Self {
        self.max_candidates = n;
        self
    }

    /// Peaks returned after harmonic filtering.
    pub fn max_peaks(mut self, n: usize) -> Self {
        self.max_peaks = n;
        self
    }

    /// Maximum distance of a frequency ratio from an integer to count as a harmonic.
    pub fn harmonic_tolerance(mut self, tolerance: f32) -> Self {
        self.harmonic_tolerance = tolerance;
        self
    }

    /// How much weaker (dB) a harmonic must be than its fundamental to be dropped.
    pub fn harmonic_margin_db(mut self, db: f32) -> Self {
        self.harmonic_margin_db = db;
        self
    }

    /// Build the `ChordPeakExtractor`.
    pub fn build(self) -> ChordPeakExtractor {
        ChordPeakExtractor {
            min_frequency: self.min_frequency,
            max_frequency: self.max_frequency,
            threshold_db: self.threshold_db,
            local_window: self.local_window,
            max_candidates: self.max_candidates,
            max_peaks: self.max_peaks,
            harmonic_tolerance: self.harmonic_tolerance,
            harmonic_margin_db: self.harmonic_margin_db,
        }
    }
}

impl Default for ChordPeakExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-peak scanner feeding the chord identifier
#[derive(Debug, Clone, PartialEq)]
pub struct ChordPeakExtractor {
    min_frequency: f32,
    max_frequency: f32,
    threshold_db: f32,
    local_window: usize,
    max_candidates: usize,
    max_peaks: usize,
    harmonic_tolerance: f32,
    harmonic_margin_db: f32,
}

impl ChordPeakExtractor {
    /// Return a builder to customize thresholds and limits.
    pub fn builder() -> ChordPeakExtractorBuilder {
        ChordPeakExtractorBuilder::new()
    }

    /// Create an extractor with default parameters.
    pub fn new() -> Self {
        ChordPeakExtractorBuilder::new().build()
    }

    /// Extract up to `max_peaks` notes, strongest first.
    pub fn extract(&self, spectrum: &Spectrum<'_>, reference_pitch: f32) -> Vec<Note> {
        let candidates = self.candidates(spectrum, reference_pitch);
        self.filter_harmonics(&candidates)
    }

    /// Phase 1: named local maxima, deduplicated by note and octave, strongest
    /// `max_candidates` first.
    pub fn candidates(&self, spectrum: &Spectrum<'_>, reference_pitch: f32) -> Vec<Note> {
        let bins = spectrum.bins();
        if bins.len() < 3 {
            return Vec::new();
        }

        let min_bin = (spectrum.frequency_to_bin(self.min_frequency).floor() as usize).max(1);
        let max_bin =
            (spectrum.frequency_to_bin(self.max_frequency).floor() as usize).min(bins.len() - 1);

        let mut peaks: Vec<Note> = Vec::new();
        for i in min_bin..max_bin {
            let mag = bins[i];
            if !(mag > self.threshold_db && mag > bins[i - 1] && mag > bins[i + 1]) {
                continue;
            }

            // 1) nothing louder within the local window
            let lo = i.saturating_sub(self.local_window).max(min_bin);
            let hi = (i + self.local_window).min(max_bin);
            if bins[lo..=hi].iter().any(|&other| other > mag) {
                continue;
            }

            // 2) name it, first peak per note and octave wins
            let Some(note) = frequency_to_note(spectrum.refine_peak(i), reference_pitch) else {
                continue;
            };
            if peaks.iter().any(|p| p.name == note.name && p.octave == note.octave) {
                continue;
            }
            peaks.push(note.with_magnitude(mag));
        }

        sort_by_magnitude(&mut peaks);
        peaks.truncate(self.max_candidates);
        peaks
    }

    /// Phase 2: walk `candidates` best to worst, dropping any that sit near an
    /// integer multiple (>= 2) of an accepted peak while being more than
    /// `harmonic_margin_db` weaker. Returns at most `max_peaks`, strongest first.
    pub fn filter_harmonics(&self, candidates: &[Note]) -> Vec<Note> {
        let mut ordered = candidates.to_vec();
        sort_by_magnitude(&mut ordered);

        let mut accepted: Vec<Note> = Vec::with_capacity(ordered.len());
        for current in ordered {
            if let Some(fundamental) = accepted
                .iter()
                .find(|prev| self.is_overtone(&current, prev))
            {
                trace!(
                    "peaks: dropping {} {:.2} Hz as overtone of {} {:.2} Hz",
                    current.name,
                    current.frequency,
                    fundamental.name,
                    fundamental.frequency
                );
                continue;
            }
            accepted.push(current);
        }

        sort_by_magnitude(&mut accepted);
        accepted.truncate(self.max_peaks);
        accepted
    }

    fn is_overtone(&self, current: &Note, prev: &Note) -> bool {
        let ratio = current.frequency / prev.frequency;
        let rounded = ratio.round();
        if rounded < 2.0 || (ratio - rounded).abs() >= self.harmonic_tolerance {
            return false;
        }
        magnitude_of(current) < magnitude_of(prev) - self.harmonic_margin_db
    }
}

impl Default for ChordPeakExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn magnitude_of(note: &Note) -> f32 {
    note.magnitude.unwrap_or(f32::NEG_INFINITY)
}

/// Stable descending sort on magnitude.
fn sort_by_magnitude(notes: &mut [Note]) {
    notes.sort_by(|a, b| magnitude_of(b).total_cmp(&magnitude_of(a)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::NoteName;

    const SR: f32 = 44_100.0;
    const N: usize = 8192;

    fn note_at(freq: f32, db: f32) -> Note {
        frequency_to_note(freq, 440.0).unwrap().with_magnitude(db)
    }

    /// Three-bin lobe centred on the bin nearest `freq`.
    fn lobe(bins: &mut [f32], freq: f32, db: f32) {
        let bin = (freq * N as f32 / SR).round() as usize;
        bins[bin - 1] = db - 6.0;
        bins[bin] = db;
        bins[bin + 1] = db - 6.0;
    }

    #[test]
    fn weak_octave_is_dropped() {
        let extractor = ChordPeakExtractor::new();
        let kept = extractor.filter_harmonics(&[note_at(220.0, -55.0), note_at(110.0, -40.0)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].frequency, 110.0);
    }

    #[test]
    fn strong_octave_is_kept() {
        let extractor = ChordPeakExtractor::new();
        let kept = extractor.filter_harmonics(&[note_at(110.0, -40.0), note_at(220.0, -42.0)]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].frequency, 110.0);
        assert_eq!(kept[1].frequency, 220.0);
    }

    #[test]
    fn third_harmonic_and_non_harmonics() {
        let extractor = ChordPeakExtractor::new();
        let kept = extractor.filter_harmonics(&[
            note_at(110.0, -40.0),
            note_at(330.0, -60.0), // 3x, dropped
            note_at(165.0, -60.0), // 1.5x, kept
            note_at(233.0, -60.0), // 2.12x, outside tolerance, kept
        ]);
        let freqs: Vec<f32> = kept.iter().map(|n| n.frequency).collect();
        assert_eq!(freqs, vec![110.0, 165.0, 233.0]);
    }

    #[test]
    fn filtered_output_is_capped() {
        let extractor = ChordPeakExtractor::new();
        let notes: Vec<Note> = (0..9)
            .map(|i| note_at(100.0 + 37.0 * i as f32, -30.0 - i as f32))
            .collect();
        let kept = extractor.filter_harmonics(&notes);
        assert_eq!(kept.len(), 6);
        assert!(kept.windows(2).all(|w| w[0].magnitude >= w[1].magnitude));
    }

    #[test]
    fn extracts_spread_triad() {
        let mut bins = vec![-120.0; N / 2];
        lobe(&mut bins, 130.81, -30.0); // C3
        lobe(&mut bins, 329.63, -35.0); // E4
        lobe(&mut bins, 783.99, -40.0); // G5
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();

        let peaks = ChordPeakExtractor::new().extract(&spectrum, 440.0);
        let names: Vec<(NoteName, i32)> = peaks.iter().map(|n| (n.name, n.octave)).collect();
        assert_eq!(
            names,
            vec![(NoteName::C, 3), (NoteName::E, 4), (NoteName::G, 5)]
        );
        assert_eq!(peaks[0].magnitude, Some(-30.0));
    }

    #[test]
    fn local_dominance_suppresses_nearby_weaker_peak() {
        let mut bins = vec![-120.0; N / 2];
        lobe(&mut bins, 200.0, -30.0);
        lobe(&mut bins, 250.0, -40.0); // ~9 bins away
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();

        let peaks = ChordPeakExtractor::new().extract(&spectrum, 440.0);
        assert_eq!(peaks.len(), 1);

        let narrow = ChordPeakExtractor::builder().local_window(3).build();
        assert_eq!(narrow.extract(&spectrum, 440.0).len(), 2);
    }

    #[test]
    fn ignores_quiet_and_out_of_band_peaks() {
        let mut bins = vec![-120.0; N / 2];
        lobe(&mut bins, 40.0, -20.0); // below 50 Hz
        lobe(&mut bins, 1500.0, -20.0); // above 1200 Hz
        lobe(&mut bins, 440.0, -88.0); // below threshold
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();
        assert!(ChordPeakExtractor::new().extract(&spectrum, 440.0).is_empty());
    }

    #[test]
    fn extraction_is_repeatable() {
        let mut bins = vec![-120.0; N / 2];
        lobe(&mut bins, 98.0, -30.0);
        lobe(&mut bins, 246.94, -33.0);
        let spectrum = Spectrum::new(&bins, SR, N).unwrap();
        let extractor = ChordPeakExtractor::new();
        assert_eq!(extractor.extract(&spectrum, 440.0), extractor.extract(&spectrum, 440.0));
    }
}
