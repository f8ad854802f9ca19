//! Core data model shared across the detection pipeline.

use serde::{Deserialize, Serialize};

/// Detection site of a photon event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SiteId {
    /// Ground-station detector.
    Ground,
    /// Low-Earth-orbit source detector.
    Satellite,
}

/// Provenance of a photon event within a site stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// One half of an entangled pair.
    Entangled,
    /// Dark-count background event, uncorrelated across sites.
    Dark,
    /// Reserved synchronization stream used by the QTT protocol.
    Sync,
}

/// A single timestamped photon detection. Immutable once generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonEvent {
    /// Site that recorded the detection.
    pub site: SiteId,
    /// Detection time in seconds from the start of the run. Sub-picosecond
    /// structure is carried in the fractional part.
    pub time_s: f64,
    /// Event provenance.
    pub channel: ChannelKind,
}

impl PhotonEvent {
    /// Create an entangled-channel event.
    pub fn entangled(site: SiteId, time_s: f64) -> Self {
        Self {
            site,
            time_s,
            channel: ChannelKind::Entangled,
        }
    }

    /// Create a dark-count event.
    pub fn dark(site: SiteId, time_s: f64) -> Self {
        Self {
            site,
            time_s,
            channel: ChannelKind::Dark,
        }
    }
}

/// A matched cross-site pair, reduced to its signed arrival-time difference.
///
/// `dt_s` is satellite time minus ground time. One sample per matched pair;
/// samples are ordered by ground-event time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoincidenceSample {
    /// Signed time difference in seconds.
    pub dt_s: f64,
    /// Evaluation window this sample falls into.
    pub window_index: usize,
    /// Sequential identifier of the matched pair within the run.
    pub pair_id: u64,
}

/// Clock-offset estimate produced by the QTT protocol for one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncEstimate {
    /// Evaluation window the estimate belongs to.
    pub window_index: usize,
    /// Estimated clock offset in seconds, within one reference period.
    pub offset_s: f64,
    /// One-sigma uncertainty of the estimate in seconds. Infinite when the
    /// batch contained no usable samples.
    pub sigma_s: f64,
    /// Number of samples the estimate was formed from.
    pub n_samples: usize,
}

impl SyncEstimate {
    /// Whether the estimate carries any information (finite uncertainty).
    pub fn is_informative(&self) -> bool {
        self.sigma_s.is_finite()
    }
}

/// Binary verdict for one evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Fused score stayed at or below the calibrated threshold.
    Clean,
    /// Fused score exceeded the calibrated threshold.
    Spoof,
}

impl Verdict {
    /// True for [`Verdict::Spoof`].
    pub fn is_spoof(&self) -> bool {
        matches!(self, Verdict::Spoof)
    }
}

/// Terminal artifact of one evaluation window. Immutable.
///
/// External collaborators persist these records; the engine itself never
/// writes them anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionScore {
    /// Evaluation window this score describes.
    pub window_index: usize,
    /// Hellinger distance between reference and window histogram, in [0, 1].
    pub hellinger_score: f64,
    /// Reconstruction error from the frozen anomaly model.
    pub anomaly_score: f64,
    /// |offset − baseline| / sigma from the window's sync estimate.
    pub qtt_deviation: f64,
    /// Weighted combination of the rescaled components, in [0, 1].
    pub fused_score: f64,
    /// Decision against the calibrated threshold.
    pub verdict: Verdict,
    /// Threshold the verdict was taken against.
    pub threshold_used: f64,
    /// Whether scoring this window exceeded the latency budget.
    pub latency_exceeded: bool,
    /// Wall time spent scoring this window, in milliseconds.
    pub elapsed_ms: f64,
}
