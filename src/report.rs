//! Run-level aggregation: score summaries and ROC sweeps.
//!
//! Per-window [`DetectionScore`]s are the engine's terminal artifact; this
//! module reduces a run of them to the numbers experiment harnesses compare:
//! mean fused score, flagged fraction, and receiver operating characteristic
//! curves between a clean and an attacked score population. Everything here
//! serializes, persistence stays with the caller.

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::types::DetectionScore;

/// Aggregate outcome of one scored run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of windows scored.
    pub windows: usize,
    /// Mean fused score across the run.
    pub mean_fused: f64,
    /// Fraction of windows with a spoof verdict.
    pub spoof_fraction: f64,
    /// Windows whose scoring overran the latency budget.
    pub latency_violations: usize,
    /// Threshold the run was scored against.
    pub threshold: f64,
}

impl RunSummary {
    /// Reduce a run of window scores to its summary.
    ///
    /// All scores in a run come from one frozen context, so the threshold is
    /// taken from the first record.
    pub fn from_scores(scores: &[DetectionScore]) -> Result<Self, InputError> {
        if scores.is_empty() {
            return Err(InputError::EmptyCorpus {
                corpus: "detection scores",
            });
        }
        let windows = scores.len();
        let mean_fused = scores.iter().map(|s| s.fused_score).sum::<f64>() / windows as f64;
        let flagged = scores.iter().filter(|s| s.verdict.is_spoof()).count();
        let latency_violations = scores.iter().filter(|s| s.latency_exceeded).count();
        Ok(Self {
            windows,
            mean_fused,
            spoof_fraction: flagged as f64 / windows as f64,
            latency_violations,
            threshold: scores[0].threshold_used,
        })
    }

    /// Run-level detection: mean fused score over the calibrated threshold.
    pub fn detected(&self) -> bool {
        self.mean_fused > self.threshold
    }
}

/// One operating point of an ROC sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// Decision threshold; windows with `fused_score >= threshold` count as
    /// detections at this point.
    pub threshold: f64,
    /// Fraction of clean windows flagged at this threshold.
    pub false_positive_rate: f64,
    /// Fraction of attacked windows flagged at this threshold.
    pub true_positive_rate: f64,
}

/// Sweep a detection threshold across two score populations.
///
/// Thresholds run over every fused score observed in either population,
/// descending, with one synthetic point above the maximum so the curve
/// starts at (0, 0); it ends at (1, 1) by construction. Rates are
/// nondecreasing along the returned points.
pub fn roc_points(
    clean: &[DetectionScore],
    attacked: &[DetectionScore],
) -> Result<Vec<RocPoint>, InputError> {
    if clean.is_empty() {
        return Err(InputError::EmptyCorpus {
            corpus: "clean detection scores",
        });
    }
    if attacked.is_empty() {
        return Err(InputError::EmptyCorpus {
            corpus: "attacked detection scores",
        });
    }

    let mut thresholds: Vec<f64> = clean
        .iter()
        .chain(attacked)
        .map(|s| s.fused_score)
        .collect();
    thresholds.sort_by(|a, b| b.total_cmp(a));
    thresholds.dedup();

    let rate = |scores: &[DetectionScore], t: f64| {
        scores.iter().filter(|s| s.fused_score >= t).count() as f64 / scores.len() as f64
    };

    let mut points = Vec::with_capacity(thresholds.len() + 1);
    points.push(RocPoint {
        threshold: thresholds[0] + 1.0,
        false_positive_rate: 0.0,
        true_positive_rate: 0.0,
    });
    for t in thresholds {
        points.push(RocPoint {
            threshold: t,
            false_positive_rate: rate(clean, t),
            true_positive_rate: rate(attacked, t),
        });
    }
    Ok(points)
}

/// Area under an ROC curve by trapezoidal integration.
///
/// Expects points ordered as [`roc_points`] returns them; fewer than two
/// points have no area.
pub fn auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            let width = pair[1].false_positive_rate - pair[0].false_positive_rate;
            let height = 0.5 * (pair[0].true_positive_rate + pair[1].true_positive_rate);
            width * height
        })
        .sum()
}
