//! Quantum time transfer: sub-picosecond clock-offset estimation from the
//! reserved synchronization stream.
//!
//! Each sync sample is folded onto the phase of a shared reference
//! oscillator; the circular mean of those phases gives the offset, and the
//! circular spread (shrunk by averaging and widened by entanglement-quality
//! loss) gives the reported uncertainty. Offsets are therefore only defined
//! modulo one reference period. The default reference frequency is chosen
//! incommensurate with the nanosecond grid, so a spoofer pulling the clock
//! by a round number of nanoseconds still lands on a large folded phase
//! instead of hiding at zero.

use std::collections::VecDeque;
use std::f64::consts::{PI, TAU};

use log::warn;

use crate::config::DetectorConfig;
use crate::error::InputError;
use crate::types::{CoincidenceSample, SyncEstimate};

/// Fidelity of an entangled pair after free decoherence for `storage_s`.
///
/// Amplitude damping decays with `t1_s`, phase damping with `t2_s`; the
/// result is mapped onto `[0.5, 1.0]`, with `0.5` meaning the pair carries no
/// usable phase correlation at all.
pub fn decoherence_fidelity(storage_s: f64, t1_s: f64, t2_s: f64) -> f64 {
    let amplitude = (-storage_s / t1_s).exp();
    let phase = (-storage_s / t2_s).exp();
    0.5 + 0.5 * (amplitude * phase).clamp(0.0, 1.0)
}

/// Phase-based clock-offset estimator.
#[derive(Debug, Clone)]
pub struct BellPhaseEstimator {
    reference_hz: f64,
    visibility: f64,
    precision_floor_s: f64,
}

impl BellPhaseEstimator {
    /// Build an estimator from a validated configuration.
    ///
    /// The channel fidelity is clamped below by `min_visibility` so a badly
    /// decohered channel inflates the uncertainty instead of collapsing it;
    /// the clamp is logged once here rather than on every batch.
    pub fn new(config: &DetectorConfig) -> Result<Self, InputError> {
        config.validate()?;
        if config.fidelity < config.min_visibility {
            warn!(
                "channel fidelity {} below visibility floor {}; estimates use the floor",
                config.fidelity, config.min_visibility
            );
        }
        Ok(Self {
            reference_hz: config.reference_ghz * 1e9,
            visibility: config.fidelity.clamp(config.min_visibility, 1.0),
            precision_floor_s: config.precision_floor_ps * 1e-12,
        })
    }

    /// Effective interferometric visibility used for uncertainty scaling.
    pub fn visibility(&self) -> f64 {
        self.visibility
    }

    /// One reference period in seconds; offsets are reported modulo this.
    pub fn period_s(&self) -> f64 {
        1.0 / self.reference_hz
    }

    /// Estimate the clock offset for one evaluation window.
    ///
    /// An empty batch yields the uninformative sentinel (zero offset,
    /// infinite sigma) and a warning rather than an error, so a window with a
    /// dropped sync stream degrades the fused score instead of aborting the
    /// run.
    pub fn estimate(&self, batch: &[CoincidenceSample], window_index: usize) -> SyncEstimate {
        let n = batch.len();
        if n == 0 {
            warn!("sync batch for window {window_index} is empty; offset estimate is uninformative");
            return SyncEstimate {
                window_index,
                offset_s: 0.0,
                sigma_s: f64::INFINITY,
                n_samples: 0,
            };
        }

        let mut sin_sum = 0.0;
        let mut cos_sum = 0.0;
        for sample in batch {
            let phi = self.phase_of(sample.dt_s);
            sin_sum += phi.sin();
            cos_sum += phi.cos();
        }

        let mean_phase = sin_sum.atan2(cos_sum);
        let offset_s = mean_phase / (TAU * self.reference_hz);

        // Mean resultant length; 1.0 is a perfectly coherent batch.
        let resultant = (sin_sum * sin_sum + cos_sum * cos_sum).sqrt() / n as f64;
        let sigma_s = self.sigma_from_resultant(resultant, n);

        SyncEstimate {
            window_index,
            offset_s,
            sigma_s,
            n_samples: n,
        }
    }

    /// Normalized deviation of a window's offset from the calibrated
    /// baseline. Uninformative estimates score zero so they never fake an
    /// alarm on their own.
    pub fn deviation(&self, estimate: &SyncEstimate, baseline_offset_s: f64) -> f64 {
        if estimate.n_samples == 0 || !estimate.sigma_s.is_finite() || estimate.sigma_s <= 0.0 {
            return 0.0;
        }
        (estimate.offset_s - baseline_offset_s).abs() / estimate.sigma_s
    }

    /// Fold a time difference onto the reference phase, in `(-pi, pi]`.
    fn phase_of(&self, dt_s: f64) -> f64 {
        let cycles = dt_s * self.reference_hz;
        let frac = cycles - cycles.floor();
        let mut phi = TAU * frac;
        if phi > PI {
            phi -= TAU;
        }
        phi
    }

    fn sigma_from_resultant(&self, resultant: f64, n: usize) -> f64 {
        if resultant <= 0.0 {
            // Phases uniform on the circle; the batch carries no offset
            // information.
            return f64::INFINITY;
        }
        let resultant = resultant.min(1.0);
        let circular_std_rad = (-2.0 * resultant.ln()).max(0.0).sqrt();
        let spread_s = circular_std_rad / (TAU * self.reference_hz);
        let scaled = spread_s / (self.visibility * (n as f64).sqrt());
        scaled.max(self.precision_floor_s)
    }
}

/// Rolling least-squares estimate of how the clock offset moves over time.
/// Mirrors the slow oscillator drift a real timing receiver keeps an eye on
/// between calibrations.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    capacity: usize,
    window_len_s: f64,
    points: VecDeque<(f64, f64)>,
}

impl DriftTracker {
    /// Tracker remembering at most `capacity` informative estimates, with
    /// `window_len_s` the evaluation-window length used to place each
    /// estimate on the time axis.
    pub fn new(capacity: usize, window_len_s: f64) -> Self {
        Self {
            capacity: capacity.max(2),
            window_len_s,
            points: VecDeque::new(),
        }
    }

    /// Record a window's estimate. Uninformative estimates are skipped.
    pub fn push(&mut self, estimate: &SyncEstimate) {
        if estimate.n_samples == 0 || !estimate.sigma_s.is_finite() {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        let t = estimate.window_index as f64 * self.window_len_s;
        self.points.push_back((t, estimate.offset_s));
    }

    /// Number of buffered estimates.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the buffer holds no estimates yet.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Clock-drift rate in seconds of offset per second of elapsed time, or
    /// `None` before two distinct windows have been seen.
    pub fn slope(&self) -> Option<f64> {
        if self.points.len() < 2 {
            return None;
        }
        let n = self.points.len() as f64;
        let mean_x: f64 = self.points.iter().map(|p| p.0).sum::<f64>() / n;
        let mean_y: f64 = self.points.iter().map(|p| p.1).sum::<f64>() / n;
        let mut covariance = 0.0;
        let mut variance = 0.0;
        for &(x, y) in &self.points {
            covariance += (x - mean_x) * (y - mean_y);
            variance += (x - mean_x) * (x - mean_x);
        }
        if variance <= 0.0 {
            return None;
        }
        Some(covariance / variance)
    }
}
