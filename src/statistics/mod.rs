//! Distributional statistics for the detection pipeline.
//!
//! This module provides the statistical infrastructure shared by the
//! divergence test, the anomaly model, and threshold calibration:
//! - Fixed-binning histograms over coincidence time differences
//! - Hellinger distance with degenerate-histogram sentinels
//! - Type 2 quantile computation for false-positive-rate thresholds

mod hellinger;
mod histogram;
mod quantile;

pub use hellinger::hellinger;
pub use histogram::Histogram;
pub use quantile::{compute_quantile, compute_quantile_sorted};
