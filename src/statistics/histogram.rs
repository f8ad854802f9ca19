//! Fixed-binning histograms of coincidence time differences.
//!
//! A histogram covers `[-range_s, +range_s)` with equal-width bins. Samples
//! outside the range are tallied separately so the total input count stays
//! accounted for; only in-range mass enters the normalized frequencies.
//! Reference and test histograms must share identical binning before any
//! comparison, which [`Histogram::ensure_same_binning`] enforces.

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::types::CoincidenceSample;

/// Bin counts of signed time differences over a fixed symmetric range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    counts: Vec<u64>,
    range_s: f64,
    in_range: u64,
    out_of_range: u64,
}

impl Histogram {
    /// Build an empty histogram with the given binning.
    pub fn empty(bins: usize, range_s: f64) -> Self {
        Self {
            counts: vec![0; bins],
            range_s,
            in_range: 0,
            out_of_range: 0,
        }
    }

    /// Build a histogram from raw time differences in seconds.
    pub fn from_dts(dts: &[f64], bins: usize, range_s: f64) -> Self {
        let mut hist = Self::empty(bins, range_s);
        for &dt in dts {
            hist.push(dt);
        }
        hist
    }

    /// Build a histogram from one evaluation window's coincidence samples.
    pub fn from_window(samples: &[CoincidenceSample], bins: usize, range_s: f64) -> Self {
        let mut hist = Self::empty(bins, range_s);
        for sample in samples {
            hist.push(sample.dt_s);
        }
        hist
    }

    /// Add one time difference.
    pub fn push(&mut self, dt_s: f64) {
        match self.bin_index(dt_s) {
            Some(idx) => {
                self.counts[idx] += 1;
                self.in_range += 1;
            }
            None => self.out_of_range += 1,
        }
    }

    /// Bin index for a time difference, or `None` if it falls outside
    /// `[-range_s, +range_s)`.
    pub fn bin_index(&self, dt_s: f64) -> Option<usize> {
        if !dt_s.is_finite() || dt_s < -self.range_s || dt_s >= self.range_s {
            return None;
        }
        let width = 2.0 * self.range_s / self.counts.len() as f64;
        let idx = ((dt_s + self.range_s) / width) as usize;
        // Floating-point roundoff at the top edge can land one past the end.
        Some(idx.min(self.counts.len() - 1))
    }

    /// Number of bins.
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Half-range in seconds.
    pub fn range_s(&self) -> f64 {
        self.range_s
    }

    /// Raw bin counts.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Count of samples that landed inside the range.
    pub fn total(&self) -> u64 {
        self.in_range
    }

    /// Count of samples that fell outside the range.
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Whether no sample landed inside the range.
    pub fn is_empty(&self) -> bool {
        self.in_range == 0
    }

    /// Normalized bin frequencies summing to 1, or all zeros when the
    /// histogram is empty.
    pub fn normalized(&self) -> Vec<f64> {
        if self.in_range == 0 {
            return vec![0.0; self.counts.len()];
        }
        let total = self.in_range as f64;
        self.counts.iter().map(|&c| c as f64 / total).collect()
    }

    /// Bin frequencies as fractions of every recorded sample, including the
    /// out-of-range ones. The vector sums to less than 1 when mass fell
    /// outside the range, so a window whose coincidence peak was pushed past
    /// the edge still differs from the reference instead of renormalizing
    /// back into the same shape.
    pub fn mass_fractions(&self) -> Vec<f64> {
        let total = (self.in_range + self.out_of_range) as f64;
        if total == 0.0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts.iter().map(|&c| c as f64 / total).collect()
    }

    /// Require identical binning between two histograms.
    pub fn ensure_same_binning(&self, other: &Histogram) -> Result<(), InputError> {
        if self.bins() != other.bins() {
            return Err(InputError::BinMismatch {
                expected: self.bins(),
                got: other.bins(),
            });
        }
        let tolerance = self.range_s.abs().max(other.range_s.abs()) * 1e-12;
        if (self.range_s - other.range_s).abs() > tolerance {
            return Err(InputError::InvalidConfig {
                reason: format!(
                    "histogram ranges differ: {} s vs {} s",
                    self.range_s, other.range_s
                ),
            });
        }
        Ok(())
    }
}
