//! Simulated entangled-photon channel between the ground station and the
//! orbiting source.
//!
//! Pair creation is a Poisson process at the configured rate; each pair
//! survives the free-space link with probability `link_transmission`, then
//! each site detects its photon with probability `detector_efficiency` and
//! records the creation time plus independent Gaussian jitter. Uncorrelated
//! dark counts are overlaid per site. A reserved synchronization stream at
//! `sync_rate_hz` feeds the QTT estimator.
//!
//! All randomness flows from an explicit seed through a Xoshiro256++
//! generator, so every run is reproducible.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::DetectorConfig;
use crate::error::InputError;
use crate::types::{ChannelKind, CoincidenceSample, PhotonEvent, SiteId};

/// One generated run: the two site streams, each sorted by time.
#[derive(Debug, Clone)]
pub struct PairRun {
    /// Ground-station detections.
    pub ground: Vec<PhotonEvent>,
    /// Satellite detections.
    pub satellite: Vec<PhotonEvent>,
}

impl PairRun {
    /// Total event count across both sites.
    pub fn len(&self) -> usize {
        self.ground.len() + self.satellite.len()
    }

    /// Whether neither site recorded anything.
    pub fn is_empty(&self) -> bool {
        self.ground.is_empty() && self.satellite.is_empty()
    }
}

/// Seeded generator of photon-detection event streams.
#[derive(Debug, Clone)]
pub struct PairSource {
    pair_rate_hz: f64,
    link_transmission: f64,
    detector_efficiency: f64,
    window_len_s: f64,
    inter_arrival: Exp<f64>,
    jitter: Normal<f64>,
    dark_gap: Option<Exp<f64>>,
    sync_gap: Exp<f64>,
    sync_noise: Normal<f64>,
}

impl PairSource {
    /// Build a source from a validated configuration.
    pub fn new(config: &DetectorConfig) -> Result<Self, InputError> {
        config.validate()?;

        let inter_arrival = Exp::new(config.pair_rate_hz).map_err(|_| InputError::NonPositiveRate {
            parameter: "pair_rate_hz",
            rate_hz: config.pair_rate_hz,
        })?;
        let jitter = Normal::new(0.0, config.jitter_ps * 1e-12).map_err(|_| {
            InputError::InvalidConfig {
                reason: format!("jitter_ps must be non-negative, got {}", config.jitter_ps),
            }
        })?;
        let dark_gap = if config.dark_rate_hz > 0.0 {
            Some(
                Exp::new(config.dark_rate_hz).map_err(|_| InputError::NonPositiveRate {
                    parameter: "dark_rate_hz",
                    rate_hz: config.dark_rate_hz,
                })?,
            )
        } else {
            None
        };
        let sync_gap = Exp::new(config.sync_rate_hz).map_err(|_| InputError::NonPositiveRate {
            parameter: "sync_rate_hz",
            rate_hz: config.sync_rate_hz,
        })?;
        let sync_noise = Normal::new(0.0, config.sync_pulse_sigma_ps * 1e-12).map_err(|_| {
            InputError::InvalidConfig {
                reason: format!(
                    "sync_pulse_sigma_ps must be non-negative, got {}",
                    config.sync_pulse_sigma_ps
                ),
            }
        })?;

        Ok(Self {
            pair_rate_hz: config.pair_rate_hz,
            link_transmission: config.link_transmission,
            detector_efficiency: config.detector_efficiency,
            window_len_s: config.window_secs,
            inter_arrival,
            jitter,
            dark_gap,
            sync_gap,
            sync_noise,
        })
    }

    /// Generate both site streams for one run.
    ///
    /// Events come back sorted by time per site. The same seed reproduces the
    /// same run bit for bit.
    pub fn generate(&self, duration_s: f64, seed: u64) -> Result<PairRun, InputError> {
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(InputError::NonPositiveDuration { seconds: duration_s });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let expected = (duration_s * self.pair_rate_hz * self.link_transmission) as usize;
        let mut ground: Vec<PhotonEvent> = Vec::with_capacity(expected + 16);
        let mut satellite: Vec<PhotonEvent> = Vec::with_capacity(expected + 16);

        let mut t = 0.0;
        loop {
            t += self.inter_arrival.sample(&mut rng);
            if t >= duration_s {
                break;
            }
            if !rng.random_bool(self.link_transmission) {
                continue;
            }
            if rng.random_bool(self.detector_efficiency) {
                let jittered = t + self.jitter.sample(&mut rng);
                ground.push(PhotonEvent::entangled(SiteId::Ground, jittered));
            }
            if rng.random_bool(self.detector_efficiency) {
                let jittered = t + self.jitter.sample(&mut rng);
                satellite.push(PhotonEvent::entangled(SiteId::Satellite, jittered));
            }
        }

        if let Some(dark_gap) = &self.dark_gap {
            for site in [SiteId::Ground, SiteId::Satellite] {
                let mut t = 0.0;
                loop {
                    t += dark_gap.sample(&mut rng);
                    if t >= duration_s {
                        break;
                    }
                    let event = PhotonEvent::dark(site, t);
                    match site {
                        SiteId::Ground => ground.push(event),
                        SiteId::Satellite => satellite.push(event),
                    }
                }
            }
        }

        // Jitter and dark overlays can reorder timestamps.
        ground.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        satellite.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));

        Ok(PairRun { ground, satellite })
    }

    /// Generate the reserved synchronization stream for the QTT protocol.
    ///
    /// Each pulse yields one ready-made [`CoincidenceSample`] whose time
    /// difference is `true_offset_s` plus single-shot measurement noise.
    /// Window indices follow the configured evaluation-window length.
    pub fn sync_samples(
        &self,
        duration_s: f64,
        true_offset_s: f64,
        seed: u64,
    ) -> Result<Vec<CoincidenceSample>, InputError> {
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(InputError::NonPositiveDuration { seconds: duration_s });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut samples = Vec::new();
        let mut t = 0.0;
        let mut pair_id = 0u64;
        loop {
            t += self.sync_gap.sample(&mut rng);
            if t >= duration_s {
                break;
            }
            samples.push(CoincidenceSample {
                dt_s: true_offset_s + self.sync_noise.sample(&mut rng),
                window_index: (t / self.window_len_s) as usize,
                pair_id,
            });
            pair_id += 1;
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lossless_config() -> DetectorConfig {
        let mut config = DetectorConfig::default();
        config.link_transmission = 1.0;
        config.detector_efficiency = 1.0;
        config.jitter_ps = 0.0;
        config.dark_rate_hz = 0.0;
        config
    }

    #[test]
    fn same_seed_reproduces_run() {
        let source = PairSource::new(&DetectorConfig::default()).unwrap();
        let a = source.generate(5.0, 42).unwrap();
        let b = source.generate(5.0, 42).unwrap();
        assert_eq!(a.ground, b.ground);
        assert_eq!(a.satellite, b.satellite);
    }

    #[test]
    fn different_seeds_differ() {
        let source = PairSource::new(&DetectorConfig::default()).unwrap();
        let a = source.generate(5.0, 1).unwrap();
        let b = source.generate(5.0, 2).unwrap();
        assert_ne!(a.ground, b.ground);
    }

    #[test]
    fn lossless_count_tracks_rate() {
        let source = PairSource::new(&lossless_config()).unwrap();
        let run = source.generate(10.0, 7).unwrap();
        // Poisson mean 50_000; five sigma is ~1_120.
        let expected = 50_000.0;
        assert!(
            (run.ground.len() as f64 - expected).abs() < 1_500.0,
            "ground count {} far from {}",
            run.ground.len(),
            expected
        );
        // With no losses both sites see every pair.
        assert_eq!(run.ground.len(), run.satellite.len());
    }

    #[test]
    fn losses_thin_the_streams() {
        let mut config = lossless_config();
        config.link_transmission = 0.1;
        let source = PairSource::new(&config).unwrap();
        let run = source.generate(10.0, 7).unwrap();
        let expected = 5_000.0;
        assert!(
            (run.ground.len() as f64 - expected).abs() < 500.0,
            "thinned count {} far from {}",
            run.ground.len(),
            expected
        );
    }

    #[test]
    fn streams_are_sorted() {
        let source = PairSource::new(&DetectorConfig::default()).unwrap();
        let run = source.generate(5.0, 3).unwrap();
        for stream in [&run.ground, &run.satellite] {
            for pair in stream.windows(2) {
                assert!(pair[0].time_s <= pair[1].time_s);
            }
        }
    }

    #[test]
    fn dark_counts_present_at_configured_rate() {
        let mut config = DetectorConfig::default();
        config.dark_rate_hz = 1_000.0;
        let source = PairSource::new(&config).unwrap();
        let run = source.generate(10.0, 11).unwrap();
        let dark = run
            .ground
            .iter()
            .filter(|e| e.channel == ChannelKind::Dark)
            .count();
        // Poisson mean 10_000 per site.
        assert!(
            (dark as f64 - 10_000.0).abs() < 600.0,
            "dark count {} far from 10_000",
            dark
        );
    }

    #[test]
    fn zero_dark_rate_produces_no_dark_events() {
        let source = PairSource::new(&lossless_config()).unwrap();
        let run = source.generate(5.0, 5).unwrap();
        assert!(run.ground.iter().all(|e| e.channel == ChannelKind::Entangled));
    }

    #[test]
    fn non_positive_duration_rejected() {
        let source = PairSource::new(&DetectorConfig::default()).unwrap();
        assert!(matches!(
            source.generate(0.0, 1),
            Err(InputError::NonPositiveDuration { .. })
        ));
        assert!(source.generate(-1.0, 1).is_err());
        assert!(source.generate(f64::NAN, 1).is_err());
    }

    #[test]
    fn invalid_rate_rejected_at_construction() {
        let mut config = DetectorConfig::default();
        config.pair_rate_hz = -5.0;
        assert!(matches!(
            PairSource::new(&config),
            Err(InputError::NonPositiveRate { .. })
        ));
    }

    #[test]
    fn sync_samples_center_on_true_offset() {
        let config = DetectorConfig::default().window_secs(1.0);
        let source = PairSource::new(&config).unwrap();
        let offset = 2.0e-12;
        let stream = source.sync_samples(10.0, offset, 9).unwrap();
        // Mean of ~10_000 pulses with 3 ps single-shot noise.
        assert!(stream.len() > 9_000);
        let mean: f64 = stream.iter().map(|s| s.dt_s).sum::<f64>() / stream.len() as f64;
        assert!(
            (mean - offset).abs() < 0.5e-12,
            "sync mean {} far from {}",
            mean,
            offset
        );
        assert!(stream.iter().all(|s| s.window_index < 10));
    }

    #[test]
    fn sync_sample_windows_advance() {
        let config = DetectorConfig::default().window_secs(1.0);
        let source = PairSource::new(&config).unwrap();
        let stream = source.sync_samples(4.0, 0.0, 13).unwrap();
        let max_window = stream.iter().map(|s| s.window_index).max().unwrap();
        assert_eq!(max_window, 3);
        for pair in stream.windows(2) {
            assert!(pair[0].window_index <= pair[1].window_index);
        }
    }

    #[test]
    fn sync_samples_reject_bad_duration() {
        let source = PairSource::new(&DetectorConfig::default()).unwrap();
        assert!(matches!(
            source.sync_samples(-1.0, 0.0, 1),
            Err(InputError::NonPositiveDuration { .. })
        ));
    }
}
