//! Coincidence extraction: turning two raw detection streams into signed
//! time-difference samples.
//!
//! Matching is channel-blind. Dark counts participate like any other event,
//! which is what makes accidental coincidences part of the histogram floor
//! rather than something filtered away upstream.

use std::borrow::Cow;

use crate::channel::PairRun;
use crate::config::DetectorConfig;
use crate::error::InputError;
use crate::types::{CoincidenceSample, PhotonEvent};

/// Pairing strategy between two time-sorted detection streams.
///
/// Implementations return index pairs `(ground, satellite)` whose events lie
/// within `window_s` of each other, and must consume each satellite event at
/// most once.
pub trait MatchPolicy {
    fn match_events(
        &self,
        ground: &[PhotonEvent],
        satellite: &[PhotonEvent],
        window_s: f64,
    ) -> Vec<(usize, usize)>;
}

/// Greedy nearest-neighbour matching within a fixed coincidence window.
///
/// Ground events are visited in time order; each takes the closest unclaimed
/// satellite event within the window, ties going to the earlier one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestGreedy;

impl MatchPolicy for NearestGreedy {
    fn match_events(
        &self,
        ground: &[PhotonEvent],
        satellite: &[PhotonEvent],
        window_s: f64,
    ) -> Vec<(usize, usize)> {
        let mut matches = Vec::new();
        let mut taken = vec![false; satellite.len()];
        let mut base = 0usize;

        for (gi, g) in ground.iter().enumerate() {
            // Skip satellite events that can never match again: consumed, or
            // already more than one window behind the current ground event.
            while base < satellite.len()
                && (taken[base] || satellite[base].time_s < g.time_s - window_s)
            {
                base += 1;
            }

            let mut best: Option<(usize, f64)> = None;
            let mut k = base;
            while k < satellite.len() && satellite[k].time_s <= g.time_s + window_s {
                if !taken[k] {
                    let gap = (satellite[k].time_s - g.time_s).abs();
                    if best.is_none_or(|(_, b)| gap < b) {
                        best = Some((k, gap));
                    }
                }
                k += 1;
            }

            if let Some((k, _)) = best {
                taken[k] = true;
                matches.push((gi, k));
            }
        }

        matches
    }
}

/// Extracts coincidence samples from a [`PairRun`] and stamps each with its
/// evaluation window.
#[derive(Debug, Clone)]
pub struct CoincidenceExtractor {
    coincidence_window_s: f64,
    window_len_s: f64,
}

impl CoincidenceExtractor {
    /// Build an extractor from a validated configuration.
    pub fn new(config: &DetectorConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(Self {
            coincidence_window_s: config.coincidence_window_s(),
            window_len_s: config.window_secs,
        })
    }

    /// Half-width of the acceptance window in seconds.
    pub fn coincidence_window_s(&self) -> f64 {
        self.coincidence_window_s
    }

    /// Extract coincidences with the default nearest-neighbour policy.
    pub fn extract(&self, run: &PairRun) -> Vec<CoincidenceSample> {
        self.extract_with(&NearestGreedy, run)
    }

    /// Extract coincidences with a caller-supplied pairing policy.
    ///
    /// `dt` is satellite minus ground, so a satellite stream pushed late in
    /// time shows up as a positive shift. Window indices come from the ground
    /// timestamp and are non-decreasing in the returned order.
    pub fn extract_with(
        &self,
        policy: &dyn MatchPolicy,
        run: &PairRun,
    ) -> Vec<CoincidenceSample> {
        let ground = sorted_view(&run.ground);
        let satellite = sorted_view(&run.satellite);

        let matches = policy.match_events(&ground, &satellite, self.coincidence_window_s);
        let mut samples = Vec::with_capacity(matches.len());
        for (pair_id, (gi, si)) in matches.into_iter().enumerate() {
            let g = &ground[gi];
            let s = &satellite[si];
            samples.push(CoincidenceSample {
                dt_s: s.time_s - g.time_s,
                window_index: (g.time_s.max(0.0) / self.window_len_s) as usize,
                pair_id: pair_id as u64,
            });
        }
        samples
    }
}

/// Borrow the stream as-is when already time-sorted, otherwise sort a copy.
fn sorted_view(events: &[PhotonEvent]) -> Cow<'_, [PhotonEvent]> {
    if events.is_sorted_by(|a, b| a.time_s <= b.time_s) {
        Cow::Borrowed(events)
    } else {
        let mut owned = events.to_vec();
        owned.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        Cow::Owned(owned)
    }
}
