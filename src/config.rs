//! Configuration for the detection engine.
//!
//! One flat, validated configuration object covers the quantum channel,
//! coincidence extraction, QTT synchronization, the anomaly model, and score
//! fusion. Components read only the fields they need; nothing mutates the
//! configuration after construction.

use crate::error::InputError;
use crate::fusion::FusionWeights;

/// Configuration options for the spoofing detector.
///
/// Defaults describe the nominal ground-to-LEO operating point: 5 kHz pair
/// generation, 50 ps detector jitter, a 200 ps coincidence window, and a 1 kHz
/// reserved synchronization stream.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    // =========================================================================
    // Quantum channel
    // =========================================================================
    /// Entangled-pair generation rate in Hz.
    ///
    /// Operating range of interest is 1-10 kHz. Default: 5000.
    pub pair_rate_hz: f64,

    /// Per-detector timing jitter, one sigma, in picoseconds.
    ///
    /// Applied independently to each site's detection time. Default: 50.
    pub jitter_ps: f64,

    /// Probability that a generated pair survives the free-space link.
    ///
    /// Stands in for the full link-budget computation, which an external
    /// collaborator owns. Default: 0.05.
    pub link_transmission: f64,

    /// Per-site detector quantum efficiency. Default: 0.8.
    pub detector_efficiency: f64,

    /// Dark-count rate per site in Hz. Zero disables the background stream.
    ///
    /// Default: 10.
    pub dark_rate_hz: f64,

    // =========================================================================
    // Coincidence extraction and windowing
    // =========================================================================
    /// Coincidence window half-width in picoseconds.
    ///
    /// Two cross-site events closer than this are candidates for matching.
    /// Zero is legal and yields no matches. Default: 200.
    pub coincidence_window_ps: f64,

    /// Evaluation window length in seconds.
    ///
    /// Each window produces one histogram, one sync estimate, and one
    /// detection score. Default: 10.
    pub window_secs: f64,

    // =========================================================================
    // Histogram binning
    // =========================================================================
    /// Number of histogram bins. Default: 100.
    pub hist_bins: usize,

    /// Histogram half-range in nanoseconds; bins cover [-range, +range).
    ///
    /// Default: 5.0.
    pub hist_range_ns: f64,

    // =========================================================================
    // QTT synchronization
    // =========================================================================
    /// Reserved synchronization stream rate in Hz. Default: 1000.
    pub sync_rate_hz: f64,

    /// Bell-pair interference reference frequency in GHz.
    ///
    /// Sets the phase period of the estimator: offsets are resolved within
    /// one period (about 2.86 ns at the default). The default is deliberately
    /// incommensurate with the nanosecond grid so that whole-nanosecond clock
    /// pulls fold to a large phase instead of aliasing onto zero.
    /// Default: 0.35.
    pub reference_ghz: f64,

    /// Entangled-state fidelity after decoherence, in [0, 1].
    ///
    /// Acts as the correlation visibility of the phase measurement. See
    /// [`crate::qtt::decoherence_fidelity`] for deriving this from storage
    /// time. Default: 0.95.
    pub fidelity: f64,

    /// Lower clamp applied to fidelity before it divides anything.
    ///
    /// Default: 0.1.
    pub min_visibility: f64,

    /// Floor on the per-batch timing spread, in picoseconds.
    ///
    /// Prevents a zero-variance batch from reporting zero uncertainty.
    /// Default: 0.1 (the sub-picosecond precision target).
    pub precision_floor_ps: f64,

    /// One-sigma noise of a single sync-stream measurement, in picoseconds.
    ///
    /// Default: 3.0, which reaches the 0.1 ps target after one second of
    /// 1 kHz sync data at nominal fidelity.
    pub sync_pulse_sigma_ps: f64,

    /// Sliding-window length (in sync estimates) for clock-drift tracking.
    ///
    /// Default: 100.
    pub drift_window: usize,

    // =========================================================================
    // Anomaly model
    // =========================================================================
    /// Latent dimensionality of the reconstruction model. Default: 16.
    pub latent_dim: usize,

    /// Full-batch gradient-descent epochs. Default: 300.
    pub epochs: usize,

    /// Gradient-descent learning rate. Default: 0.05.
    pub learning_rate: f64,

    /// Weight of the latent-norm regularizer in the training loss.
    ///
    /// Default: 1e-3.
    pub latent_penalty: f64,

    // =========================================================================
    // Fusion and calibration
    // =========================================================================
    /// Relative weights of the three detection components.
    pub fusion_weights: FusionWeights,

    /// Target false-positive rate for threshold calibration, in (0, 0.5].
    ///
    /// Default: 0.05; deployments leaning on QTT typically run 0.01.
    pub fpr_target: f64,

    /// Per-window scoring latency budget in milliseconds.
    ///
    /// Overruns set a flag on the window's score; they are never errors.
    /// Default: 1000.
    pub latency_budget_ms: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            // Quantum channel
            pair_rate_hz: 5_000.0,
            jitter_ps: 50.0,
            link_transmission: 0.05,
            detector_efficiency: 0.8,
            dark_rate_hz: 10.0,

            // Coincidence extraction
            coincidence_window_ps: 200.0,
            window_secs: 10.0,

            // Histogram binning
            hist_bins: 100,
            hist_range_ns: 5.0,

            // QTT
            sync_rate_hz: 1_000.0,
            reference_ghz: 0.35,
            fidelity: 0.95,
            min_visibility: 0.1,
            precision_floor_ps: 0.1,
            sync_pulse_sigma_ps: 3.0,
            drift_window: 100,

            // Anomaly model
            latent_dim: 16,
            epochs: 300,
            learning_rate: 0.05,
            latent_penalty: 1e-3,

            // Fusion
            fusion_weights: FusionWeights::default(),
            fpr_target: 0.05,
            latency_budget_ms: 1_000.0,
        }
    }
}

impl DetectorConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nominal operating point; alias for the defaults.
    pub fn nominal() -> Self {
        Self::default()
    }

    /// Reduced-cost configuration for rapid iteration and many-trial tests.
    ///
    /// Shorter evaluation windows, fewer training epochs, and a short drift
    /// window.
    pub fn quick() -> Self {
        Self {
            window_secs: 2.0,
            epochs: 100,
            drift_window: 20,
            ..Default::default()
        }
    }

    /// Tightened configuration for QTT-heavy deployments.
    ///
    /// Runs the 1% false-positive target and shifts fusion weight toward the
    /// synchronization channel.
    pub fn high_precision() -> Self {
        Self {
            fpr_target: 0.01,
            fusion_weights: FusionWeights {
                hellinger: 0.4,
                anomaly: 0.2,
                qtt: 0.4,
            },
            ..Default::default()
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Set the pair generation rate in Hz.
    pub fn pair_rate_hz(mut self, rate: f64) -> Self {
        assert!(rate > 0.0, "pair_rate_hz must be positive");
        self.pair_rate_hz = rate;
        self
    }

    /// Set the per-detector jitter in picoseconds.
    pub fn jitter_ps(mut self, sigma: f64) -> Self {
        assert!(sigma >= 0.0, "jitter_ps must be non-negative");
        self.jitter_ps = sigma;
        self
    }

    /// Set the link survival probability.
    pub fn link_transmission(mut self, p: f64) -> Self {
        assert!((0.0..=1.0).contains(&p), "link_transmission must be in [0, 1]");
        self.link_transmission = p;
        self
    }

    /// Set the per-site detector efficiency.
    pub fn detector_efficiency(mut self, p: f64) -> Self {
        assert!((0.0..=1.0).contains(&p), "detector_efficiency must be in [0, 1]");
        self.detector_efficiency = p;
        self
    }

    /// Set the dark-count rate in Hz.
    pub fn dark_rate_hz(mut self, rate: f64) -> Self {
        assert!(rate >= 0.0, "dark_rate_hz must be non-negative");
        self.dark_rate_hz = rate;
        self
    }

    /// Set the coincidence window half-width in picoseconds.
    pub fn coincidence_window_ps(mut self, w: f64) -> Self {
        assert!(w >= 0.0, "coincidence_window_ps must be non-negative");
        self.coincidence_window_ps = w;
        self
    }

    /// Set the evaluation window length in seconds.
    pub fn window_secs(mut self, secs: f64) -> Self {
        assert!(secs > 0.0, "window_secs must be positive");
        self.window_secs = secs;
        self
    }

    /// Set the histogram bin count.
    pub fn hist_bins(mut self, bins: usize) -> Self {
        assert!(bins > 0, "hist_bins must be positive");
        self.hist_bins = bins;
        self
    }

    /// Set the histogram half-range in nanoseconds.
    pub fn hist_range_ns(mut self, range: f64) -> Self {
        assert!(range > 0.0, "hist_range_ns must be positive");
        self.hist_range_ns = range;
        self
    }

    /// Set the synchronization stream rate in Hz.
    pub fn sync_rate_hz(mut self, rate: f64) -> Self {
        assert!(rate > 0.0, "sync_rate_hz must be positive");
        self.sync_rate_hz = rate;
        self
    }

    /// Set the phase reference frequency in GHz.
    pub fn reference_ghz(mut self, f: f64) -> Self {
        assert!(f > 0.0, "reference_ghz must be positive");
        self.reference_ghz = f;
        self
    }

    /// Set the entangled-state fidelity.
    pub fn fidelity(mut self, fidelity: f64) -> Self {
        assert!((0.0..=1.0).contains(&fidelity), "fidelity must be in [0, 1]");
        self.fidelity = fidelity;
        self
    }

    /// Set the latent dimensionality of the anomaly model.
    pub fn latent_dim(mut self, dim: usize) -> Self {
        assert!(dim > 0, "latent_dim must be positive");
        self.latent_dim = dim;
        self
    }

    /// Set the fusion weights.
    pub fn fusion_weights(mut self, weights: FusionWeights) -> Self {
        self.fusion_weights = weights;
        self
    }

    /// Set the calibration false-positive-rate target.
    pub fn fpr_target(mut self, fpr: f64) -> Self {
        assert!(fpr > 0.0 && fpr <= 0.5, "fpr_target must be in (0, 0.5]");
        self.fpr_target = fpr;
        self
    }

    /// Set the per-window latency budget in milliseconds.
    pub fn latency_budget_ms(mut self, ms: f64) -> Self {
        assert!(ms > 0.0, "latency_budget_ms must be positive");
        self.latency_budget_ms = ms;
        self
    }

    // =========================================================================
    // Derived quantities
    // =========================================================================

    /// Coincidence window half-width in seconds.
    pub fn coincidence_window_s(&self) -> f64 {
        self.coincidence_window_ps * 1e-12
    }

    /// Histogram half-range in seconds.
    pub fn hist_range_s(&self) -> f64 {
        self.hist_range_ns * 1e-9
    }

    /// Expected coincidence rate in Hz under the configured channel losses.
    ///
    /// pair rate x link survival x efficiency at both sites.
    pub fn expected_coincidence_rate_hz(&self) -> f64 {
        self.pair_rate_hz
            * self.link_transmission
            * self.detector_efficiency
            * self.detector_efficiency
    }

    /// Check every field against its documented constraint.
    pub fn validate(&self) -> Result<(), InputError> {
        if !(self.pair_rate_hz.is_finite() && self.pair_rate_hz > 0.0) {
            return Err(InputError::NonPositiveRate {
                parameter: "pair_rate_hz",
                rate_hz: self.pair_rate_hz,
            });
        }
        if !(self.sync_rate_hz.is_finite() && self.sync_rate_hz > 0.0) {
            return Err(InputError::NonPositiveRate {
                parameter: "sync_rate_hz",
                rate_hz: self.sync_rate_hz,
            });
        }
        if !(self.dark_rate_hz.is_finite() && self.dark_rate_hz >= 0.0) {
            return Err(InputError::NonPositiveRate {
                parameter: "dark_rate_hz",
                rate_hz: self.dark_rate_hz,
            });
        }
        if !(self.window_secs.is_finite() && self.window_secs > 0.0) {
            return Err(InputError::NonPositiveWindow {
                seconds: self.window_secs,
            });
        }
        if !(self.jitter_ps.is_finite() && self.jitter_ps >= 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("jitter_ps must be non-negative, got {}", self.jitter_ps),
            });
        }
        if !(0.0..=1.0).contains(&self.link_transmission) {
            return Err(InputError::InvalidConfig {
                reason: format!("link_transmission must be in [0, 1], got {}", self.link_transmission),
            });
        }
        if !(0.0..=1.0).contains(&self.detector_efficiency) {
            return Err(InputError::InvalidConfig {
                reason: format!("detector_efficiency must be in [0, 1], got {}", self.detector_efficiency),
            });
        }
        if !(self.coincidence_window_ps.is_finite() && self.coincidence_window_ps >= 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("coincidence_window_ps must be non-negative, got {}", self.coincidence_window_ps),
            });
        }
        if self.hist_bins == 0 {
            return Err(InputError::InvalidConfig {
                reason: "hist_bins must be positive".to_string(),
            });
        }
        if !(self.hist_range_ns.is_finite() && self.hist_range_ns > 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("hist_range_ns must be positive, got {}", self.hist_range_ns),
            });
        }
        if !(self.reference_ghz.is_finite() && self.reference_ghz > 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("reference_ghz must be positive, got {}", self.reference_ghz),
            });
        }
        if !(0.0..=1.0).contains(&self.fidelity) {
            return Err(InputError::InvalidConfig {
                reason: format!("fidelity must be in [0, 1], got {}", self.fidelity),
            });
        }
        if !(self.min_visibility > 0.0 && self.min_visibility <= 1.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("min_visibility must be in (0, 1], got {}", self.min_visibility),
            });
        }
        if !(self.precision_floor_ps.is_finite() && self.precision_floor_ps > 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("precision_floor_ps must be positive, got {}", self.precision_floor_ps),
            });
        }
        if !(self.sync_pulse_sigma_ps.is_finite() && self.sync_pulse_sigma_ps >= 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("sync_pulse_sigma_ps must be non-negative, got {}", self.sync_pulse_sigma_ps),
            });
        }
        if self.latent_dim == 0 {
            return Err(InputError::InvalidConfig {
                reason: "latent_dim must be positive".to_string(),
            });
        }
        if self.epochs == 0 {
            return Err(InputError::InvalidConfig {
                reason: "epochs must be positive".to_string(),
            });
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("learning_rate must be positive, got {}", self.learning_rate),
            });
        }
        if !(self.latent_penalty.is_finite() && self.latent_penalty >= 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("latent_penalty must be non-negative, got {}", self.latent_penalty),
            });
        }
        self.fusion_weights.validate()?;
        if !(self.fpr_target > 0.0 && self.fpr_target <= 0.5) {
            return Err(InputError::InvalidFprTarget {
                fpr: self.fpr_target,
            });
        }
        if !(self.latency_budget_ms.is_finite() && self.latency_budget_ms > 0.0) {
            return Err(InputError::InvalidConfig {
                reason: format!("latency_budget_ms must be positive, got {}", self.latency_budget_ms),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pair_rate_hz, 5_000.0);
        assert_eq!(config.coincidence_window_ps, 200.0);
        assert_eq!(config.hist_bins, 100);
        assert_eq!(config.fpr_target, 0.05);
    }

    #[test]
    fn presets_are_valid() {
        assert!(DetectorConfig::nominal().validate().is_ok());
        assert!(DetectorConfig::quick().validate().is_ok());
        assert!(DetectorConfig::high_precision().validate().is_ok());

        let hp = DetectorConfig::high_precision();
        assert_eq!(hp.fpr_target, 0.01);
    }

    #[test]
    fn builder_methods_chain() {
        let config = DetectorConfig::new()
            .pair_rate_hz(2_000.0)
            .coincidence_window_ps(500.0)
            .window_secs(5.0)
            .fpr_target(0.01);

        assert_eq!(config.pair_rate_hz, 2_000.0);
        assert_eq!(config.coincidence_window_ps, 500.0);
        assert_eq!(config.window_secs, 5.0);
        assert_eq!(config.fpr_target, 0.01);
    }

    #[test]
    fn expected_rate_combines_losses() {
        let config = DetectorConfig::default();
        let expected = 5_000.0 * 0.05 * 0.8 * 0.8;
        assert!((config.expected_coincidence_rate_hz() - expected).abs() < 1e-9);
    }

    #[test]
    fn validation_rejects_bad_rate() {
        let mut config = DetectorConfig::default();
        config.pair_rate_hz = 0.0;
        assert!(matches!(
            config.validate(),
            Err(InputError::NonPositiveRate { parameter: "pair_rate_hz", .. })
        ));

        config.pair_rate_hz = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_bad_fpr() {
        let mut config = DetectorConfig::default();
        config.fpr_target = 0.6;
        assert!(matches!(config.validate(), Err(InputError::InvalidFprTarget { .. })));
    }

    #[test]
    fn validation_rejects_zero_bins() {
        let mut config = DetectorConfig::default();
        config.hist_bins = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_window() {
        let mut config = DetectorConfig::default();
        config.window_secs = 0.0;
        assert!(matches!(
            config.validate(),
            Err(InputError::NonPositiveWindow { .. })
        ));
    }

    #[test]
    #[should_panic]
    fn builder_rejects_negative_rate() {
        DetectorConfig::new().pair_rate_hz(-1.0);
    }

    #[test]
    #[should_panic]
    fn builder_rejects_fpr_above_half() {
        DetectorConfig::new().fpr_target(0.9);
    }
}
