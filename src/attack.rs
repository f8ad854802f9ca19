//! Spoofing-attack models applied to the satellite side of a run.
//!
//! Attacks perturb raw satellite detection times (and, symmetrically, the
//! sync-stream time differences, since dt is satellite minus ground). Each
//! spoofed event is selected independently at `spoof_rate`, so partial
//! takeovers where only a fraction of the signal is counterfeit are part of
//! the model, not a special case.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::types::{CoincidenceSample, PhotonEvent};

/// A timing-spoofing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Attack {
    /// Constant pull of the satellite clock, plus meaconing noise.
    TimePush {
        /// Applied shift in nanoseconds.
        delta_ns: f64,
        /// Gaussian noise the spoofer adds on top, in picoseconds.
        noise_ps: f64,
        /// Fraction of events replaced by the spoofer.
        spoof_rate: f64,
    },
    /// Replayed recording with uncontrolled per-event delay.
    Replay {
        /// Half-width of the uniform delay in nanoseconds.
        spread_ns: f64,
        /// Fraction of events replaced by the spoofer.
        spoof_rate: f64,
    },
    /// Constant pull and replay jitter combined.
    Hybrid {
        /// Applied shift in nanoseconds.
        delta_ns: f64,
        /// Half-width of the uniform delay in nanoseconds.
        spread_ns: f64,
        /// Gaussian noise in picoseconds.
        noise_ps: f64,
        /// Fraction of events replaced by the spoofer.
        spoof_rate: f64,
    },
}

impl Attack {
    /// Canonical time-push: 10 ns pull on half the events with 5 ps noise.
    pub fn time_push() -> Self {
        Attack::TimePush {
            delta_ns: 10.0,
            noise_ps: 5.0,
            spoof_rate: 0.5,
        }
    }

    /// Canonical replay: every event delayed by up to +/-100 ns.
    pub fn replay() -> Self {
        Attack::Replay {
            spread_ns: 100.0,
            spoof_rate: 1.0,
        }
    }

    /// Canonical hybrid: 10 ns pull with +/-50 ns replay jitter on half the
    /// events.
    pub fn hybrid() -> Self {
        Attack::Hybrid {
            delta_ns: 10.0,
            spread_ns: 50.0,
            noise_ps: 5.0,
            spoof_rate: 0.5,
        }
    }

    /// Short name for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Attack::TimePush { .. } => "time-push",
            Attack::Replay { .. } => "replay",
            Attack::Hybrid { .. } => "hybrid",
        }
    }

    /// Fraction of events the spoofer replaces.
    pub fn spoof_rate(&self) -> f64 {
        match *self {
            Attack::TimePush { spoof_rate, .. }
            | Attack::Replay { spoof_rate, .. }
            | Attack::Hybrid { spoof_rate, .. } => spoof_rate,
        }
    }

    /// Reject parameter sets outside the model's domain.
    pub fn validate(&self) -> Result<(), InputError> {
        let check = |name: &str, value: f64, non_negative: bool| -> Result<(), InputError> {
            if !value.is_finite() || (non_negative && value < 0.0) {
                return Err(InputError::InvalidConfig {
                    reason: format!("attack {name} must be finite and non-negative, got {value}"),
                });
            }
            Ok(())
        };
        match *self {
            Attack::TimePush { delta_ns, noise_ps, .. } => {
                check("delta_ns", delta_ns, false)?;
                check("noise_ps", noise_ps, true)?;
            }
            Attack::Replay { spread_ns, .. } => {
                check("spread_ns", spread_ns, true)?;
            }
            Attack::Hybrid { delta_ns, spread_ns, noise_ps, .. } => {
                check("delta_ns", delta_ns, false)?;
                check("spread_ns", spread_ns, true)?;
                check("noise_ps", noise_ps, true)?;
            }
        }
        let rate = self.spoof_rate();
        if !(0.0..=1.0).contains(&rate) || rate.is_nan() {
            return Err(InputError::InvalidConfig {
                reason: format!("attack spoof_rate must be in [0, 1], got {rate}"),
            });
        }
        Ok(())
    }

    /// Perturb raw satellite detection times in place.
    pub fn apply_to_events(
        &self,
        satellite: &mut [PhotonEvent],
        seed: u64,
    ) -> Result<(), InputError> {
        self.validate()?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let noise = self.noise_dist()?;
        for event in satellite.iter_mut() {
            if rng.random_bool(self.spoof_rate()) {
                event.time_s += self.draw_shift(&mut rng, &noise);
            }
        }
        Ok(())
    }

    /// Perturb sync-stream time differences in place.
    ///
    /// dt is satellite minus ground, so the same shift that delays the raw
    /// satellite stream adds directly onto dt.
    pub fn apply_to_dts(
        &self,
        samples: &mut [CoincidenceSample],
        seed: u64,
    ) -> Result<(), InputError> {
        self.validate()?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let noise = self.noise_dist()?;
        for sample in samples.iter_mut() {
            if rng.random_bool(self.spoof_rate()) {
                sample.dt_s += self.draw_shift(&mut rng, &noise);
            }
        }
        Ok(())
    }

    fn noise_dist(&self) -> Result<Normal<f64>, InputError> {
        let sigma_ps = match *self {
            Attack::TimePush { noise_ps, .. } | Attack::Hybrid { noise_ps, .. } => noise_ps,
            Attack::Replay { .. } => 0.0,
        };
        Normal::new(0.0, sigma_ps * 1e-12).map_err(|_| InputError::InvalidConfig {
            reason: format!("attack noise_ps must be non-negative, got {sigma_ps}"),
        })
    }

    fn draw_shift(&self, rng: &mut Xoshiro256PlusPlus, noise: &Normal<f64>) -> f64 {
        match *self {
            Attack::TimePush { delta_ns, .. } => delta_ns * 1e-9 + noise.sample(rng),
            Attack::Replay { spread_ns, .. } => {
                let spread = spread_ns * 1e-9;
                if spread > 0.0 {
                    rng.random_range(-spread..spread)
                } else {
                    0.0
                }
            }
            Attack::Hybrid { delta_ns, spread_ns, .. } => {
                let spread = spread_ns * 1e-9;
                let replayed = if spread > 0.0 {
                    rng.random_range(-spread..spread)
                } else {
                    0.0
                };
                delta_ns * 1e-9 + replayed + noise.sample(rng)
            }
        }
    }
}
