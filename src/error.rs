//! Input validation errors.
//!
//! The engine distinguishes three failure classes. Invalid inputs surface
//! immediately as [`InputError`] and are never silently corrected. Numeric
//! degeneracies (empty histograms, zero-visibility batches, zero-span score
//! populations) are handled locally with defined sentinel values and a
//! warn-level log entry, because a spoofing scenario can legitimately drive a
//! distribution into a degenerate state. Latency overruns are reported as a
//! flag on the per-window result, never as an error.

/// Errors raised for invalid configuration or invalid call sequences.
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// A rate parameter (pair rate, sync rate, dark rate) was zero, negative,
    /// or non-finite.
    NonPositiveRate {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// The rejected value in Hz.
        rate_hz: f64,
    },

    /// A duration was zero, negative, or non-finite.
    NonPositiveDuration {
        /// The rejected value in seconds.
        seconds: f64,
    },

    /// A window length (evaluation window or coincidence half-width) was
    /// zero, negative, or non-finite.
    NonPositiveWindow {
        /// The rejected value in seconds.
        seconds: f64,
    },

    /// A histogram was scored or compared against a different binning.
    BinMismatch {
        /// Bin count the model or reference was built with.
        expected: usize,
        /// Bin count of the offending histogram.
        got: usize,
    },

    /// A training or calibration corpus was empty.
    EmptyCorpus {
        /// Which corpus was empty.
        corpus: &'static str,
    },

    /// The anomaly model was asked to score before being trained.
    ModelNotTrained,

    /// Fusion weights were negative, non-finite, or summed to zero.
    InvalidWeights {
        /// Human-readable description of the violation.
        reason: String,
    },

    /// The false-positive-rate target was outside (0, 0.5].
    InvalidFprTarget {
        /// The rejected value.
        fpr: f64,
    },

    /// A configuration field failed validation.
    InvalidConfig {
        /// Field name and constraint that was violated.
        reason: String,
    },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::NonPositiveRate { parameter, rate_hz } => {
                write!(f, "{} must be a positive rate, got {} Hz", parameter, rate_hz)
            }
            InputError::NonPositiveDuration { seconds } => {
                write!(f, "duration must be positive, got {} s", seconds)
            }
            InputError::NonPositiveWindow { seconds } => {
                write!(f, "window length must be positive, got {} s", seconds)
            }
            InputError::BinMismatch { expected, got } => {
                write!(f, "histogram binning mismatch: expected {} bins, got {}", expected, got)
            }
            InputError::EmptyCorpus { corpus } => {
                write!(f, "{} corpus is empty", corpus)
            }
            InputError::ModelNotTrained => {
                write!(f, "anomaly model must be trained before scoring")
            }
            InputError::InvalidWeights { reason } => {
                write!(f, "invalid fusion weights: {}", reason)
            }
            InputError::InvalidFprTarget { fpr } => {
                write!(f, "fpr target must be in (0, 0.5], got {}", fpr)
            }
            InputError::InvalidConfig { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for InputError {}
