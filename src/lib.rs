//! # photon-sentry
//!
//! Quantum-assisted detection of GNSS timing spoofing.
//!
//! Simulates an entangled-photon timing link between a ground station and a
//! LEO platform, extracts cross-site coincidences, and scores fixed-length
//! evaluation windows for clock manipulation through three fused channels:
//! - Hellinger distance between the window's coincidence-time histogram and
//!   a calibrated reference
//! - Reconstruction error from a frozen autoencoder over the same histograms
//! - Sigma-normalized clock-offset deviation from the Bell-state phase
//!   estimator on the reserved synchronization stream
//!
//! Calibration on a known-legitimate run freezes a [`CalibratedDetector`];
//! scoring is read-only after that, deterministic given a seed, and each
//! window yields one serializable [`DetectionScore`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use photon_sentry::{Attack, Detector, DetectorConfig, Scenario};
//!
//! let detector = Detector::new(DetectorConfig::nominal())?;
//! let calibrated = detector.calibrate(600.0, 7)?;
//!
//! let scores = calibrated.run_scenario(&Scenario::attacked(
//!     60.0,
//!     Attack::time_push(),
//!     13,
//! ))?;
//! for score in &scores {
//!     println!(
//!         "window {}: {:?} (fused {:.3} vs threshold {:.3})",
//!         score.window_index, score.verdict, score.fused_score, score.threshold_used,
//!     );
//! }
//! ```
//!
//! Windows are independent at scoring time; enable the `parallel` feature
//! for [`CalibratedDetector::score_windows_par`] across the rayon pool.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod detector;
mod error;
mod types;

// Functional modules
pub mod anomaly;
pub mod attack;
pub mod channel;
pub mod coincidence;
pub mod fusion;
pub mod qtt;
pub mod report;
pub mod statistics;

// Re-exports for public API
pub use config::DetectorConfig;
pub use detector::{
    CalibratedDetector, Detector, Scenario, WindowObservation, MIN_CALIBRATION_WINDOWS,
};
pub use error::InputError;
pub use types::{
    ChannelKind, CoincidenceSample, DetectionScore, PhotonEvent, SiteId, SyncEstimate, Verdict,
};

// Re-exports for convenience
pub use anomaly::{AnomalyModel, TrainedAnomaly};
pub use attack::Attack;
pub use channel::{PairRun, PairSource};
pub use coincidence::{CoincidenceExtractor, MatchPolicy, NearestGreedy};
pub use fusion::{FusionCalibration, FusionWeights, RawScores};
pub use qtt::{decoherence_fidelity, BellPhaseEstimator, DriftTracker};
pub use report::{auc, roc_points, RocPoint, RunSummary};
pub use statistics::{hellinger, Histogram};
