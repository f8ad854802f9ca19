//! Score fusion and threshold calibration.
//!
//! The three detection channels emit scores on wildly different scales: a
//! bounded divergence, a squared reconstruction error, and a sigma-normalized
//! offset deviation. Each is rescaled against the legitimate calibration
//! population before the weighted combination, so no channel dominates just
//! because its units are bigger. The alarm threshold is then an empirical
//! quantile of the fused legitimate scores, which pins the false-positive
//! rate to the configured target without assuming any score distribution.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::statistics::compute_quantile;
use crate::types::Verdict;

/// Spans narrower than this are treated as degenerate when rescaling.
const MIN_SPAN: f64 = 1e-12;

/// Relative weight of each detection channel in the fused score.
///
/// Weights are normalized at fusion time, so only their ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Histogram-divergence channel.
    pub hellinger: f64,
    /// Reconstruction-error channel.
    pub anomaly: f64,
    /// Clock-offset deviation channel.
    pub qtt: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            hellinger: 0.5,
            anomaly: 0.2,
            qtt: 0.3,
        }
    }
}

impl FusionWeights {
    /// Reject weight sets that cannot form a convex combination.
    pub fn validate(&self) -> Result<(), InputError> {
        let weights = [
            ("hellinger", self.hellinger),
            ("anomaly", self.anomaly),
            ("qtt", self.qtt),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(InputError::InvalidWeights {
                    reason: format!("{name} weight must be finite and non-negative, got {w}"),
                });
            }
        }
        if self.sum() <= 0.0 {
            return Err(InputError::InvalidWeights {
                reason: "at least one weight must be positive".to_string(),
            });
        }
        Ok(())
    }

    fn sum(&self) -> f64 {
        self.hellinger + self.anomaly + self.qtt
    }
}

/// Raw per-channel scores for one evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawScores {
    /// Hellinger distance to the reference histogram.
    pub hellinger: f64,
    /// Squared reconstruction error from the anomaly model.
    pub anomaly: f64,
    /// Sigma-normalized clock-offset deviation.
    pub qtt_deviation: f64,
}

/// Min-max rescaler fitted to the legitimate population of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreScale {
    min: f64,
    max: f64,
}

impl ScoreScale {
    /// Fit the scale to a population of raw scores.
    ///
    /// Non-finite entries are ignored; an empty (or all non-finite)
    /// population is an [`InputError`].
    pub fn from_population(values: &[f64]) -> Result<Self, InputError> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if min > max {
            return Err(InputError::EmptyCorpus {
                corpus: "finite calibration scores",
            });
        }
        Ok(Self { min, max })
    }

    /// Map a raw score onto [0, 1] relative to the fitted population.
    ///
    /// Values beyond the population clamp to the edges. A degenerate
    /// population (all scores equal) rescales everything to the
    /// uninformative midpoint 0.5, with a warning, since relative position
    /// within it is meaningless.
    pub fn rescale(&self, value: f64) -> f64 {
        if value.is_nan() {
            warn!("rescaling NaN score; substituting uninformative 0.5");
            return 0.5;
        }
        let span = self.max - self.min;
        if span < MIN_SPAN {
            warn!(
                "degenerate calibration span {:.3e}; rescaling to uninformative 0.5",
                span
            );
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Fitted fusion state: per-channel scales, weights, and alarm threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionCalibration {
    weights: FusionWeights,
    hellinger_scale: ScoreScale,
    anomaly_scale: ScoreScale,
    qtt_scale: ScoreScale,
    threshold: f64,
}

impl FusionCalibration {
    /// Fit scales and threshold from the legitimate calibration population.
    ///
    /// `fpr_target` is the acceptable false-positive rate, valid in
    /// (0, 0.5]; the threshold is the `1 - fpr_target` quantile of the fused
    /// legitimate scores.
    pub fn fit(
        weights: FusionWeights,
        legitimate: &[RawScores],
        fpr_target: f64,
    ) -> Result<Self, InputError> {
        weights.validate()?;
        if !(fpr_target > 0.0 && fpr_target <= 0.5) {
            return Err(InputError::InvalidFprTarget { fpr: fpr_target });
        }
        if legitimate.is_empty() {
            return Err(InputError::EmptyCorpus {
                corpus: "fusion calibration scores",
            });
        }

        let column = |f: fn(&RawScores) -> f64| -> Vec<f64> { legitimate.iter().map(f).collect() };
        let hellinger_scale = ScoreScale::from_population(&column(|s| s.hellinger))?;
        let anomaly_scale = ScoreScale::from_population(&column(|s| s.anomaly))?;
        let qtt_scale = ScoreScale::from_population(&column(|s| s.qtt_deviation))?;

        let mut calibration = Self {
            weights,
            hellinger_scale,
            anomaly_scale,
            qtt_scale,
            threshold: f64::NAN,
        };
        let mut fused: Vec<f64> = legitimate.iter().map(|s| calibration.fuse(s)).collect();
        calibration.threshold = compute_quantile(&mut fused, 1.0 - fpr_target);
        Ok(calibration)
    }

    /// Fuse one window's raw scores into a single score in [0, 1].
    pub fn fuse(&self, raw: &RawScores) -> f64 {
        let h = self.hellinger_scale.rescale(raw.hellinger);
        let a = self.anomaly_scale.rescale(raw.anomaly);
        let q = self.qtt_scale.rescale(raw.qtt_deviation);
        let w = &self.weights;
        (w.hellinger * h + w.anomaly * a + w.qtt * q) / w.sum()
    }

    /// Calibrated alarm threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Verdict for a fused score: spoof strictly above the threshold.
    ///
    /// Scores exactly at the threshold stay clean, so legitimate windows
    /// sitting on the calibration quantile do not alarm.
    pub fn classify(&self, fused: f64) -> Verdict {
        if fused > self.threshold {
            Verdict::Spoof
        } else {
            Verdict::Clean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_population(n: usize) -> Vec<RawScores> {
        // All three channels share the same ramp, so rescaled components and
        // fused scores are i / (n - 1).
        (0..n)
            .map(|i| {
                let v = i as f64;
                RawScores {
                    hellinger: v * 0.01,
                    anomaly: v * 10.0,
                    qtt_deviation: v * 0.5,
                }
            })
            .collect()
    }

    #[test]
    fn default_weights_favor_hellinger() {
        let w = FusionWeights::default();
        assert!(w.hellinger > w.qtt && w.qtt > w.anomaly);
        assert!((w.sum() - 1.0).abs() < 1e-12);
        assert!(w.validate().is_ok());
    }

    #[test]
    fn invalid_weights_rejected() {
        let negative = FusionWeights {
            hellinger: -0.1,
            ..FusionWeights::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(InputError::InvalidWeights { .. })
        ));

        let all_zero = FusionWeights {
            hellinger: 0.0,
            anomaly: 0.0,
            qtt: 0.0,
        };
        assert!(all_zero.validate().is_err());

        let nan = FusionWeights {
            qtt: f64::NAN,
            ..FusionWeights::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn rescale_maps_population_onto_unit_interval() {
        let scale = ScoreScale::from_population(&[2.0, 4.0, 6.0]).unwrap();
        assert_eq!(scale.rescale(2.0), 0.0);
        assert_eq!(scale.rescale(6.0), 1.0);
        assert!((scale.rescale(4.0) - 0.5).abs() < 1e-12);
        // Out-of-population values clamp.
        assert_eq!(scale.rescale(-10.0), 0.0);
        assert_eq!(scale.rescale(100.0), 1.0);
        assert_eq!(scale.rescale(f64::INFINITY), 1.0);
    }

    #[test]
    fn degenerate_span_rescales_to_midpoint() {
        let scale = ScoreScale::from_population(&[3.0, 3.0, 3.0]).unwrap();
        assert_eq!(scale.rescale(3.0), 0.5);
        assert_eq!(scale.rescale(999.0), 0.5);
        assert_eq!(scale.rescale(f64::NAN), 0.5);
    }

    #[test]
    fn non_finite_population_entries_ignored() {
        let scale = ScoreScale::from_population(&[1.0, f64::INFINITY, 3.0]).unwrap();
        assert_eq!(scale.rescale(3.0), 1.0);

        assert!(matches!(
            ScoreScale::from_population(&[f64::NAN, f64::INFINITY]),
            Err(InputError::EmptyCorpus { .. })
        ));
        assert!(ScoreScale::from_population(&[]).is_err());
    }

    #[test]
    fn threshold_is_upper_quantile_of_legit_fused() {
        let legit = ramp_population(20);
        let cal = FusionCalibration::fit(FusionWeights::default(), &legit, 0.05).unwrap();
        // Fused legit scores are i/19; the 0.95 quantile averages the two
        // largest order statistics.
        let expected = (18.0 / 19.0 + 19.0 / 19.0) / 2.0;
        assert!(
            (cal.threshold() - expected).abs() < 1e-12,
            "threshold {} expected {}",
            cal.threshold(),
            expected
        );
    }

    #[test]
    fn fusion_respects_weights() {
        let legit = ramp_population(10);
        let only_hellinger = FusionWeights {
            hellinger: 1.0,
            anomaly: 0.0,
            qtt: 0.0,
        };
        let cal = FusionCalibration::fit(only_hellinger, &legit, 0.1).unwrap();
        let raw = RawScores {
            hellinger: 0.09,
            anomaly: 0.0,
            qtt_deviation: 4.5,
        };
        // With all weight on hellinger, fused equals its rescaled value 1.0.
        assert!((cal.fuse(&raw) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn classify_is_strictly_above_threshold() {
        let legit = ramp_population(20);
        let cal = FusionCalibration::fit(FusionWeights::default(), &legit, 0.05).unwrap();
        let t = cal.threshold();
        assert_eq!(cal.classify(t), Verdict::Clean);
        assert_eq!(cal.classify(t + 1e-9), Verdict::Spoof);
        assert_eq!(cal.classify(0.0), Verdict::Clean);
    }

    #[test]
    fn fused_score_stays_in_unit_interval() {
        let legit = ramp_population(20);
        let cal = FusionCalibration::fit(FusionWeights::default(), &legit, 0.05).unwrap();
        let extreme = RawScores {
            hellinger: 100.0,
            anomaly: 1e9,
            qtt_deviation: 1e12,
        };
        let fused = cal.fuse(&extreme);
        assert!((0.0..=1.0).contains(&fused));
        assert!((fused - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_population_rejected() {
        assert!(matches!(
            FusionCalibration::fit(FusionWeights::default(), &[], 0.05),
            Err(InputError::EmptyCorpus { .. })
        ));
    }

    #[test]
    fn fpr_target_range_is_enforced() {
        let legit = ramp_population(10);
        for fpr in [0.0, 0.6, 1.0, -0.5, 2.0, f64::NAN] {
            assert!(matches!(
                FusionCalibration::fit(FusionWeights::default(), &legit, fpr),
                Err(InputError::InvalidFprTarget { .. })
            ));
        }
        assert!(FusionCalibration::fit(FusionWeights::default(), &legit, 0.5).is_ok());
    }

    #[test]
    fn empirical_fpr_tracks_target() {
        use rand::{Rng, SeedableRng};
        use rand_xoshiro::Xoshiro256PlusPlus;

        // Calibrate on one legitimate draw, evaluate on a fresh one from the
        // same distribution; the realized false-positive rate must sit within
        // one percentage point of the target.
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4242);
        let mut draw = |n: usize| -> Vec<RawScores> {
            (0..n)
                .map(|_| RawScores {
                    hellinger: rng.random_range(0.0..0.05),
                    anomaly: rng.random_range(0.0..2e-3),
                    qtt_deviation: rng.random_range(0.0..3.0),
                })
                .collect()
        };

        let calibration_draw = draw(20_000);
        let evaluation_draw = draw(50_000);
        let cal =
            FusionCalibration::fit(FusionWeights::default(), &calibration_draw, 0.05).unwrap();

        let false_positives = evaluation_draw
            .iter()
            .filter(|raw| cal.classify(cal.fuse(raw)).is_spoof())
            .count();
        let fpr = false_positives as f64 / evaluation_draw.len() as f64;
        assert!(
            (fpr - 0.05).abs() < 0.01,
            "empirical fpr {} off target 0.05",
            fpr
        );
    }
}
