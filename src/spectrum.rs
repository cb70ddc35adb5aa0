//! Spectrum
//!
//! Read-only view over a dB-magnitude spectrum plus the sub-bin parabolic
//! peak refinement shared by every frequency-domain detector.

use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors when wrapping a spectrum buffer
#[derive(Debug, Error)]
pub enum SpectrumError {
    /// The spectrum did not hold `window_size / 2` bins.
    #[error("expected a {expected}-bin spectrum, got {got}")]
    InvalidLength {
        /// The expected number of bins (half the analysis window).
        expected: usize,
        /// The actual number of bins provided.
        got: usize,
    },

    /// An invalid argument was provided.
    #[error("invalid argument `{arg}`: {msg}")]
    InvalidArgument {
        /// The name of the invalid argument.
        arg: &'static str,
        /// A description of the problem.
        msg: String,
    },
}

/// A dB-magnitude spectrum of one analysis window.
///
/// Bin `i` is centred on `i * sample_rate / window_size` Hz.
#[derive(Debug, Copy, Clone)]
pub struct Spectrum<'a> {
    bins: &'a [f32],
    sample_rate: f32,
    window_size: usize,
}

impl<'a> Spectrum<'a> {
    /// Wrap `bins` produced from a `window_size`-sample window at `sample_rate`.
    ///
    /// Returns:
    /// - `Err(InvalidArgument)` if `sample_rate` is not positive or `window_size` is zero.
    /// - `Err(InvalidLength)` if `bins.len() != window_size / 2`.
    pub fn new(
        bins: &'a [f32],
        sample_rate: f32,
        window_size: usize,
    ) -> Result<Self, SpectrumError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SpectrumError::InvalidArgument {
                arg: "sample_rate",
                msg: format!("must be a positive number, got {sample_rate}"),
            });
        }
        if window_size == 0 {
            return Err(SpectrumError::InvalidArgument {
                arg: "window_size",
                msg: "must be >= 1".to_string(),
            });
        }
        if bins.len() != window_size / 2 {
            return Err(SpectrumError::InvalidLength {
                expected: window_size / 2,
                got: bins.len(),
            });
        }
        Ok(Spectrum {
            bins,
            sample_rate,
            window_size,
        })
    }

    /// The raw dB magnitudes.
    pub fn bins(&self) -> &'a [f32] {
        self.bins
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// True when the spectrum holds no bins.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Analysis window size in samples.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Width of one bin in Hz.
    pub fn bin_width(&self) -> f32 {
        self.sample_rate / self.window_size as f32
    }

    /// Centre frequency of bin `bin`.
    pub fn bin_frequency(&self, bin: f32) -> f32 {
        bin * self.bin_width()
    }

    /// Fractional bin position of `frequency`.
    pub fn frequency_to_bin(&self, frequency: f32) -> f32 {
        frequency / self.bin_width()
    }

    /// Magnitude of `bin`, if in range.
    pub fn magnitude(&self, bin: usize) -> Option<f32> {
        self.bins.get(bin).copied()
    }

    /// Refine `bin` to sub-bin accuracy by fitting a parabola through it and
    /// its two neighbours, returning the interpolated frequency.
    ///
    /// Neighbours beyond either end of the spectrum are replaced by the bin
    /// itself. A flat or degenerate neighbourhood yields the bin's centre
    /// frequency.
    pub fn refine_peak(&self, bin: usize) -> f32 {
        let centre = self.bin_frequency(bin as f32);
        let Some(y2) = self.magnitude(bin) else {
            return centre;
        };
        let y1 = bin.checked_sub(1).and_then(|b| self.magnitude(b)).unwrap_or(y2);
        let y3 = self.magnitude(bin + 1).unwrap_or(y2);

        if y1 == y2 && y2 == y3 {
            return centre;
        }

        let p = 0.5 * (y1 - y3) / (y1 - 2.0 * y2 + y3);
        let refined = self.bin_frequency(bin as f32 + p);
        if refined.is_finite() {
            refined
        } else {
            centre
        }
    }

    /// First bin holding the strictly largest magnitude in `range`, with that
    /// magnitude. `None` if the range is empty, out of bounds, or holds only
    /// `NaN`/`-inf`.
    pub fn max_in_range(&self, range: RangeInclusive<usize>) -> Option<(usize, f32)> {
        let (start, end) = (*range.start(), *range.end());
        if start > end || end >= self.bins.len() {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        let mut best_mag = f32::NEG_INFINITY;
        for (i, &mag) in self.bins[start..=end].iter().enumerate() {
            if mag > best_mag {
                best_mag = mag;
                best = Some((start + i, mag));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 44_100.0;
    const N: usize = 8192;

    fn flat(db: f32) -> Vec<f32> {
        vec![db; N / 2]
    }

    #[test]
    fn rejects_mis_sized_buffers() {
        let bins = vec![0.0; 100];
        match Spectrum::new(&bins, SR, N) {
            Err(SpectrumError::InvalidLength { expected, got }) => {
                assert_eq!(expected, 4096);
                assert_eq!(got, 100);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(Spectrum::new(&bins, 0.0, 200).is_err());
        assert!(Spectrum::new(&bins, SR, 0).is_err());
    }

    #[test]
    fn flat_neighbourhood_returns_bin_centre() {
        let bins = flat(-100.0);
        let s = Spectrum::new(&bins, SR, N).unwrap();
        assert_eq!(s.refine_peak(100), 100.0 * SR / N as f32);
    }

    #[test]
    fn recovers_fractional_offset() {
        let mut bins = flat(-100.0);
        // samples of the parabola y = -20 - 30 (x - 0.25)^2 at x = -1, 0, 1
        let p = 0.25_f32;
        bins[99] = -20.0 - 30.0 * (-1.0 - p) * (-1.0 - p);
        bins[100] = -20.0 - 30.0 * p * p;
        bins[101] = -20.0 - 30.0 * (1.0 - p) * (1.0 - p);
        let s = Spectrum::new(&bins, SR, N).unwrap();
        let expected = 100.25 * SR / N as f32;
        assert!((s.refine_peak(100) - expected).abs() < 1e-2);
    }

    #[test]
    fn edges_are_clamped() {
        let mut bins = flat(-100.0);
        bins[0] = -10.0;
        bins[1] = -40.0;
        let last = bins.len() - 1;
        bins[last] = -10.0;
        let s = Spectrum::new(&bins, SR, N).unwrap();

        // y1 = y2 at the lower edge pulls the estimate downwards of bin 0
        let low = s.refine_peak(0);
        assert!(low.is_finite());
        assert!(low <= 0.0);

        let high = s.refine_peak(last);
        assert!(high.is_finite());
        assert!(high >= s.bin_frequency(last as f32));
    }

    #[test]
    fn degenerate_neighbourhood_falls_back_to_centre() {
        let mut bins = flat(-100.0);
        bins[10] = f32::NEG_INFINITY;
        bins[11] = -50.0;
        let s = Spectrum::new(&bins, SR, N).unwrap();
        assert_eq!(s.refine_peak(11), s.bin_frequency(11.0));
    }

    #[test]
    fn max_in_range_prefers_first_maximum() {
        let mut bins = flat(-100.0);
        bins[20] = -30.0;
        bins[25] = -30.0;
        let s = Spectrum::new(&bins, SR, N).unwrap();
        assert_eq!(s.max_in_range(10..=30), Some((20, -30.0)));
        assert_eq!(s.max_in_range(30..=10), None);
        assert_eq!(s.max_in_range(4090..=5000), None);
    }
}
