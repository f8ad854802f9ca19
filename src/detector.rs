//! Detection engine facade: calibrate once, score windows forever.
//!
//! [`Detector::calibrate`] simulates a known-legitimate stretch of link time
//! and distills it into a [`CalibratedDetector`]: pooled reference histogram,
//! trained anomaly model, learned baseline clock offset, per-channel score
//! scales and the alarm threshold. That context is read-only and `Send +
//! Sync`, so windows can be scored from any thread without locking; scoring
//! never mutates anything.
//!
//! [`CalibratedDetector::run_scenario`] closes the loop for simulation
//! studies: generate a fresh run, optionally perturb it with an [`Attack`],
//! and score every complete evaluation window.

use std::time::Instant;

use log::{debug, warn};

use crate::anomaly::{AnomalyModel, TrainedAnomaly};
use crate::attack::Attack;
use crate::channel::PairSource;
use crate::coincidence::CoincidenceExtractor;
use crate::config::DetectorConfig;
use crate::error::InputError;
use crate::fusion::{FusionCalibration, RawScores};
use crate::qtt::{BellPhaseEstimator, DriftTracker};
use crate::statistics::{hellinger, Histogram};
use crate::types::{CoincidenceSample, DetectionScore, SyncEstimate};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fewest complete evaluation windows a calibration run must cover.
///
/// Below this the fused-score quantile is an average of almost every
/// calibration window and the threshold means little.
pub const MIN_CALIBRATION_WINDOWS: usize = 4;

// Stream tags for deriving per-stage seeds from one run seed.
const SEED_EVENTS: u64 = 1;
const SEED_SYNC: u64 = 2;
const SEED_TRAIN: u64 = 3;
const SEED_ATTACK_EVENTS: u64 = 4;
const SEED_ATTACK_SYNC: u64 = 5;

/// Everything one evaluation window feeds into scoring.
#[derive(Debug, Clone, Default)]
pub struct WindowObservation {
    /// Evaluation window index within the run.
    pub window_index: usize,
    /// Matched coincidences whose ground event fell in this window.
    pub coincidences: Vec<CoincidenceSample>,
    /// Reserved sync-stream measurements from this window.
    pub sync: Vec<CoincidenceSample>,
}

/// One simulated run to score against a calibrated detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    /// Run length in seconds; only complete windows are scored.
    pub duration_s: f64,
    /// True clock offset of the legitimate link during the run.
    pub true_offset_s: f64,
    /// Perturbation applied to the satellite side, if any.
    pub attack: Option<Attack>,
    /// Run seed; every stochastic stage derives its own stream from it.
    pub seed: u64,
}

impl Scenario {
    /// A legitimate run with no perturbation.
    pub fn clean(duration_s: f64, seed: u64) -> Self {
        Self {
            duration_s,
            true_offset_s: 0.0,
            attack: None,
            seed,
        }
    }

    /// A run with the given attack applied to the satellite side.
    pub fn attacked(duration_s: f64, attack: Attack, seed: u64) -> Self {
        Self {
            duration_s,
            true_offset_s: 0.0,
            attack: Some(attack),
            seed,
        }
    }

    fn label(&self) -> &'static str {
        self.attack.as_ref().map_or("clean", |a| a.name())
    }
}

/// Uncalibrated engine: a validated configuration and nothing else.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
}

impl Detector {
    /// Create a detector from a configuration, validating it up front.
    pub fn new(config: DetectorConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this detector was built with.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Calibrate on a simulated legitimate run with zero true clock offset.
    pub fn calibrate(&self, duration_s: f64, seed: u64) -> Result<CalibratedDetector, InputError> {
        self.calibrate_at_offset(duration_s, 0.0, seed)
    }

    /// Calibrate on a simulated legitimate run whose clocks sit at
    /// `true_offset_s`.
    ///
    /// The offset is learned back out of the sync stream as the baseline, so
    /// scoring flags deviations from it rather than from zero. Calibration
    /// needs at least [`MIN_CALIBRATION_WINDOWS`] complete windows and at
    /// least one matched coincidence.
    pub fn calibrate_at_offset(
        &self,
        duration_s: f64,
        true_offset_s: f64,
        seed: u64,
    ) -> Result<CalibratedDetector, InputError> {
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(InputError::NonPositiveDuration {
                seconds: duration_s,
            });
        }
        let n_windows = (duration_s / self.config.window_secs) as usize;
        if n_windows < MIN_CALIBRATION_WINDOWS {
            return Err(InputError::InvalidConfig {
                reason: format!(
                    "calibration covers {n_windows} complete windows, need at least \
                     {MIN_CALIBRATION_WINDOWS}; extend the duration or shorten window_secs"
                ),
            });
        }

        let source = PairSource::new(&self.config)?;
        let extractor = CoincidenceExtractor::new(&self.config)?;
        let estimator = BellPhaseEstimator::new(&self.config)?;

        let run = source.generate(duration_s, derive_seed(seed, SEED_EVENTS))?;
        let coincidences = extractor.extract(&run);
        if coincidences.is_empty() {
            return Err(InputError::EmptyCorpus {
                corpus: "calibration coincidences",
            });
        }
        let sync = source.sync_samples(duration_s, true_offset_s, derive_seed(seed, SEED_SYNC))?;
        let windows = split_windows(n_windows, coincidences, sync);

        // Pooled reference distribution over the whole calibration run.
        let mut reference = Histogram::empty(self.config.hist_bins, self.config.hist_range_s());
        for window in &windows {
            for sample in &window.coincidences {
                reference.push(sample.dt_s);
            }
        }

        let histograms: Vec<Histogram> = windows
            .iter()
            .map(|w| {
                Histogram::from_window(&w.coincidences, self.config.hist_bins, self.config.hist_range_s())
            })
            .collect();

        let mut model = AnomalyModel::new(&self.config)?;
        model.train(&histograms, derive_seed(seed, SEED_TRAIN))?;
        let anomaly = model
            .trained()
            .cloned()
            .ok_or(InputError::ModelNotTrained)?;

        let estimates: Vec<SyncEstimate> = windows
            .iter()
            .map(|w| estimator.estimate(&w.sync, w.window_index))
            .collect();
        let baseline_offset_s = weighted_baseline(&estimates);

        let mut raw = Vec::with_capacity(windows.len());
        for (hist, estimate) in histograms.iter().zip(&estimates) {
            raw.push(RawScores {
                hellinger: hellinger(&reference, hist)?,
                anomaly: anomaly.score(hist)?,
                qtt_deviation: estimator.deviation(estimate, baseline_offset_s),
            });
        }
        let fusion = FusionCalibration::fit(self.config.fusion_weights, &raw, self.config.fpr_target)?;
        debug!(
            "calibrated on {} windows: threshold {:.4}, baseline offset {:.3e} s",
            windows.len(),
            fusion.threshold(),
            baseline_offset_s
        );

        Ok(CalibratedDetector {
            config: self.config.clone(),
            source,
            extractor,
            estimator,
            reference,
            anomaly,
            fusion,
            baseline_offset_s,
        })
    }
}

/// Frozen scoring context produced by calibration.
///
/// Holds only read-only state, so one instance can score windows from many
/// threads at once.
#[derive(Debug, Clone)]
pub struct CalibratedDetector {
    config: DetectorConfig,
    source: PairSource,
    extractor: CoincidenceExtractor,
    estimator: BellPhaseEstimator,
    reference: Histogram,
    anomaly: TrainedAnomaly,
    fusion: FusionCalibration,
    baseline_offset_s: f64,
}

impl CalibratedDetector {
    /// The configuration this context was calibrated under.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Pooled legitimate coincidence histogram from calibration.
    pub fn reference(&self) -> &Histogram {
        &self.reference
    }

    /// The frozen anomaly model.
    pub fn anomaly(&self) -> &TrainedAnomaly {
        &self.anomaly
    }

    /// Calibrated alarm threshold on the fused score.
    pub fn threshold(&self) -> f64 {
        self.fusion.threshold()
    }

    /// Baseline clock offset learned from the calibration sync stream.
    pub fn baseline_offset_s(&self) -> f64 {
        self.baseline_offset_s
    }

    /// Score one evaluation window.
    ///
    /// Empty windows are legal and score through the degenerate-histogram
    /// and empty-batch sentinels; errors only arise from mismatched binning,
    /// which cannot happen for observations produced by this context.
    pub fn score_window(&self, window: &WindowObservation) -> Result<DetectionScore, InputError> {
        Ok(self.score_inner(window)?.0)
    }

    /// Score a batch of windows in order.
    pub fn score_windows(
        &self,
        windows: &[WindowObservation],
    ) -> Result<Vec<DetectionScore>, InputError> {
        windows.iter().map(|w| self.score_window(w)).collect()
    }

    /// Score a batch of windows across the rayon thread pool.
    ///
    /// Windows are independent; the only synchronization is the final
    /// collect, and the output order matches the input order.
    #[cfg(feature = "parallel")]
    pub fn score_windows_par(
        &self,
        windows: &[WindowObservation],
    ) -> Result<Vec<DetectionScore>, InputError> {
        windows.par_iter().map(|w| self.score_window(w)).collect()
    }

    /// Simulate a run, apply the scenario's attack, and score every complete
    /// window.
    ///
    /// Runs shorter than one window are scored as a single partial window.
    /// Clock drift across the run is tracked from the per-window sync
    /// estimates and logged at debug level.
    pub fn run_scenario(&self, scenario: &Scenario) -> Result<Vec<DetectionScore>, InputError> {
        let mut run = self
            .source
            .generate(scenario.duration_s, derive_seed(scenario.seed, SEED_EVENTS))?;
        let mut sync = self.source.sync_samples(
            scenario.duration_s,
            scenario.true_offset_s,
            derive_seed(scenario.seed, SEED_SYNC),
        )?;
        if let Some(attack) = &scenario.attack {
            attack.apply_to_events(
                &mut run.satellite,
                derive_seed(scenario.seed, SEED_ATTACK_EVENTS),
            )?;
            attack.apply_to_dts(&mut sync, derive_seed(scenario.seed, SEED_ATTACK_SYNC))?;
        }

        let coincidences = self.extractor.extract(&run);
        let n_windows = ((scenario.duration_s / self.config.window_secs) as usize).max(1);
        let windows = split_windows(n_windows, coincidences, sync);

        let mut tracker = DriftTracker::new(self.config.drift_window, self.config.window_secs);
        let mut scores = Vec::with_capacity(windows.len());
        for window in &windows {
            let (score, estimate) = self.score_inner(window)?;
            tracker.push(&estimate);
            scores.push(score);
        }
        if let Some(slope) = tracker.slope() {
            debug!(
                "{} scenario over {} windows: drift estimate {:.3e} s/s",
                scenario.label(),
                windows.len(),
                slope
            );
        }
        Ok(scores)
    }

    fn score_inner(
        &self,
        window: &WindowObservation,
    ) -> Result<(DetectionScore, SyncEstimate), InputError> {
        let start = Instant::now();

        let hist = Histogram::from_window(
            &window.coincidences,
            self.config.hist_bins,
            self.config.hist_range_s(),
        );
        let estimate = self.estimator.estimate(&window.sync, window.window_index);
        let raw = RawScores {
            hellinger: hellinger(&self.reference, &hist)?,
            anomaly: self.anomaly.score(&hist)?,
            qtt_deviation: self.estimator.deviation(&estimate, self.baseline_offset_s),
        };
        let fused_score = self.fusion.fuse(&raw);
        let verdict = self.fusion.classify(fused_score);

        let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
        let latency_exceeded = elapsed_ms > self.config.latency_budget_ms;
        if latency_exceeded {
            warn!(
                "window {} took {:.1} ms to score, over the {:.0} ms budget",
                window.window_index, elapsed_ms, self.config.latency_budget_ms
            );
        }

        let score = DetectionScore {
            window_index: window.window_index,
            hellinger_score: raw.hellinger,
            anomaly_score: raw.anomaly,
            qtt_deviation: raw.qtt_deviation,
            fused_score,
            verdict,
            threshold_used: self.fusion.threshold(),
            latency_exceeded,
            elapsed_ms,
        };
        Ok((score, estimate))
    }
}

/// Bucket run-level sample streams into per-window observations.
///
/// Samples stamped past the last complete window are dropped; every index in
/// `0..n_windows` gets an observation even if nothing landed in it.
fn split_windows(
    n_windows: usize,
    coincidences: Vec<CoincidenceSample>,
    sync: Vec<CoincidenceSample>,
) -> Vec<WindowObservation> {
    let mut windows: Vec<WindowObservation> = (0..n_windows)
        .map(|window_index| WindowObservation {
            window_index,
            ..WindowObservation::default()
        })
        .collect();
    for sample in coincidences {
        if sample.window_index < n_windows {
            windows[sample.window_index].coincidences.push(sample);
        }
    }
    for sample in sync {
        if sample.window_index < n_windows {
            windows[sample.window_index].sync.push(sample);
        }
    }
    windows
}

/// Precision-weighted mean offset over the informative estimates, or 0 with
/// a warning when every window came back uninformative.
fn weighted_baseline(estimates: &[SyncEstimate]) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for estimate in estimates.iter().filter(|e| e.is_informative()) {
        let weight = 1.0 / (estimate.sigma_s * estimate.sigma_s);
        numerator += weight * estimate.offset_s;
        denominator += weight;
    }
    if denominator > 0.0 {
        numerator / denominator
    } else {
        warn!("no informative sync estimates during calibration; baseline offset defaults to 0");
        0.0
    }
}

/// Mix a run seed with a stream tag so each stochastic stage draws from its
/// own deterministic generator (splitmix64 finalizer).
fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
