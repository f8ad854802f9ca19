//! Hellinger distance between coincidence histograms.
//!
//! For bin frequencies p and q over identical binning,
//!
//! ```text
//! H(p, q) = sqrt( 1 - sum_i sqrt(p_i * q_i) )
//! ```
//!
//! bounded in [0, 1]: 0 for identical histograms, 1 for disjoint ones. The
//! frequencies are taken over every recorded sample, with the out-of-range
//! tally carried as one extra overflow component so that p and q each sum to
//! exactly 1. Mass pushed beyond the histogram edge therefore registers as
//! distance even when the surviving in-range shape looks unchanged.
//!
//! Degenerate inputs take sentinel values instead of dividing by zero,
//! because a spoofing scenario can legitimately empty a window: both
//! histograms empty compares as 0 (nothing diverged), exactly one empty
//! compares as 1 (all mass displaced). Both cases log at warn level.

use log::warn;

use crate::error::InputError;

use super::Histogram;

/// Compute the Hellinger distance between a reference and a test histogram.
///
/// Pure function of its inputs; no state is kept across calls. Binning
/// mismatch is an [`InputError`].
pub fn hellinger(reference: &Histogram, test: &Histogram) -> Result<f64, InputError> {
    reference.ensure_same_binning(test)?;

    match (reference.is_empty(), test.is_empty()) {
        (true, true) => {
            warn!("hellinger: both histograms empty, returning 0");
            Ok(0.0)
        }
        (true, false) | (false, true) => {
            warn!("hellinger: one histogram empty, returning 1");
            Ok(1.0)
        }
        (false, false) => {
            let p = reference.mass_fractions();
            let q = test.mass_fractions();
            let mut affinity: f64 = p
                .iter()
                .zip(q.iter())
                .map(|(&pi, &qi)| (pi * qi).sqrt())
                .sum();
            affinity += (overflow_fraction(reference) * overflow_fraction(test)).sqrt();
            // Roundoff can push the affinity a hair past 1 for identical
            // histograms.
            Ok((1.0 - affinity).max(0.0).sqrt().min(1.0))
        }
    }
}

/// Share of a histogram's samples that fell outside its range.
fn overflow_fraction(hist: &Histogram) -> f64 {
    let total = hist.total() + hist.out_of_range();
    hist.out_of_range() as f64 / total as f64
}
