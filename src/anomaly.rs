//! Reconstruction-based anomaly scoring for coincidence histograms.
//!
//! A small bottleneck autoencoder (tanh encoder, linear decoder) is trained
//! on the mass fractions of legitimate windows with full-batch gradient
//! descent. Once trained, a window's anomaly score is its squared
//! reconstruction error: windows resembling the training population
//! reconstruct well, windows with a displaced or hollowed-out coincidence
//! peak do not. The latent norm penalty only regularizes training; it does
//! not enter the score.
//!
//! The model is deliberately a state machine. Scoring is meaningless before
//! calibration, so an untrained model refuses to score instead of returning
//! garbage that would silently poison the fused verdict.

use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::error::InputError;
use crate::statistics::Histogram;

/// Hyperparameters carried by an untrained model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalySettings {
    /// Input dimensionality; must equal the histogram bin count.
    pub input_dim: usize,
    /// Bottleneck width.
    pub latent_dim: usize,
    /// Full-batch gradient-descent epochs.
    pub epochs: usize,
    /// Gradient-descent step size.
    pub learning_rate: f64,
    /// Weight of the latent-norm regularizer in the training loss.
    pub latent_penalty: f64,
}

/// Weights of a trained model, along with the settings that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedAnomaly {
    settings: AnomalySettings,
    w1: DMatrix<f64>,
    b1: DVector<f64>,
    w2: DMatrix<f64>,
    b2: DVector<f64>,
    final_loss: f64,
}

impl TrainedAnomaly {
    /// Mean training loss of the last epoch.
    pub fn final_loss(&self) -> f64 {
        self.final_loss
    }

    /// Anomaly score of one window: its squared reconstruction error.
    pub fn score(&self, hist: &Histogram) -> Result<f64, InputError> {
        if hist.bins() != self.settings.input_dim {
            return Err(InputError::BinMismatch {
                expected: self.settings.input_dim,
                got: hist.bins(),
            });
        }
        Ok(self.reconstruction_error(&DVector::from_vec(hist.mass_fractions())))
    }

    fn encode(&self, x: &DVector<f64>) -> DVector<f64> {
        let mut z = &self.w1 * x + &self.b1;
        z.apply(|v| *v = v.tanh());
        z
    }

    fn reconstruct(&self, z: &DVector<f64>) -> DVector<f64> {
        &self.w2 * z + &self.b2
    }

    fn reconstruction_error(&self, x: &DVector<f64>) -> f64 {
        let z = self.encode(x);
        let residual = self.reconstruct(&z) - x;
        residual.norm_squared()
    }
}

/// Histogram anomaly model: either waiting for calibration data or trained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnomalyModel {
    /// Holds hyperparameters; refuses to score.
    Untrained(AnomalySettings),
    /// Holds fitted weights; ready to score.
    Trained(TrainedAnomaly),
}

impl AnomalyModel {
    /// Untrained model with hyperparameters from a validated configuration.
    pub fn new(config: &DetectorConfig) -> Result<Self, InputError> {
        config.validate()?;
        Ok(AnomalyModel::Untrained(AnomalySettings {
            input_dim: config.hist_bins,
            latent_dim: config.latent_dim,
            epochs: config.epochs,
            learning_rate: config.learning_rate,
            latent_penalty: config.latent_penalty,
        }))
    }

    /// Whether the model has been trained.
    pub fn is_trained(&self) -> bool {
        matches!(self, AnomalyModel::Trained(_))
    }

    /// Mean training loss of the last epoch, once trained.
    pub fn final_loss(&self) -> Option<f64> {
        match self {
            AnomalyModel::Untrained(_) => None,
            AnomalyModel::Trained(trained) => Some(trained.final_loss),
        }
    }

    /// The frozen trained handle, once trained.
    pub fn trained(&self) -> Option<&TrainedAnomaly> {
        match self {
            AnomalyModel::Untrained(_) => None,
            AnomalyModel::Trained(trained) => Some(trained),
        }
    }

    /// Fit the autoencoder to a corpus of legitimate windows, transitioning
    /// the model in place. Training again replaces the previous fit.
    ///
    /// Weights start from a seeded Xavier-uniform draw, so the same corpus
    /// and seed always produce the same model.
    pub fn train(&mut self, corpus: &[Histogram], seed: u64) -> Result<(), InputError> {
        let settings = match self {
            AnomalyModel::Untrained(settings) => *settings,
            AnomalyModel::Trained(trained) => trained.settings,
        };

        if corpus.is_empty() {
            return Err(InputError::EmptyCorpus {
                corpus: "anomaly training windows",
            });
        }
        let inputs = corpus
            .iter()
            .map(|hist| {
                if hist.bins() != settings.input_dim {
                    return Err(InputError::BinMismatch {
                        expected: settings.input_dim,
                        got: hist.bins(),
                    });
                }
                Ok(DVector::from_vec(hist.mass_fractions()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let trained = fit(settings, &inputs, seed);
        debug!(
            "anomaly model trained on {} windows, final loss {:.3e}",
            inputs.len(),
            trained.final_loss
        );
        *self = AnomalyModel::Trained(trained);
        Ok(())
    }

    /// Anomaly score of one window: its squared reconstruction error.
    pub fn score(&self, hist: &Histogram) -> Result<f64, InputError> {
        match self {
            AnomalyModel::Untrained(_) => Err(InputError::ModelNotTrained),
            AnomalyModel::Trained(trained) => trained.score(hist),
        }
    }
}

/// Full-batch gradient descent on reconstruction loss plus latent penalty.
fn fit(settings: AnomalySettings, inputs: &[DVector<f64>], seed: u64) -> TrainedAnomaly {
    let d = settings.input_dim;
    let k = settings.latent_dim;
    let n = inputs.len() as f64;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let scale = (6.0 / (d + k) as f64).sqrt();
    let mut w1 = DMatrix::from_fn(k, d, |_, _| rng.random_range(-scale..scale));
    let mut b1 = DVector::zeros(k);
    let mut w2 = DMatrix::from_fn(d, k, |_, _| rng.random_range(-scale..scale));
    let mut b2 = DVector::zeros(d);

    let mut epoch_loss = 0.0;
    for _ in 0..settings.epochs {
        let mut grad_w1 = DMatrix::zeros(k, d);
        let mut grad_b1 = DVector::zeros(k);
        let mut grad_w2 = DMatrix::zeros(d, k);
        let mut grad_b2 = DVector::zeros(d);
        epoch_loss = 0.0;

        for x in inputs {
            let mut z = &w1 * x + &b1;
            z.apply(|v| *v = v.tanh());
            let xhat = &w2 * &z + &b2;
            let residual = &xhat - x;
            epoch_loss += residual.norm_squared() + settings.latent_penalty * z.norm_squared();

            // d loss / d xhat
            let d_xhat = 2.0 * &residual;
            grad_w2 += &d_xhat * z.transpose();
            grad_b2 += &d_xhat;

            // Back through the decoder and the tanh.
            let d_z = w2.transpose() * &d_xhat + 2.0 * settings.latent_penalty * &z;
            let d_pre = d_z.component_mul(&z.map(|v| 1.0 - v * v));
            grad_w1 += &d_pre * x.transpose();
            grad_b1 += &d_pre;
        }

        let step = settings.learning_rate / n;
        w1 -= grad_w1 * step;
        b1 -= grad_b1 * step;
        w2 -= grad_w2 * step;
        b2 -= grad_b2 * step;
    }

    TrainedAnomaly {
        settings,
        w1,
        b1,
        w2,
        b2,
        final_loss: epoch_loss / n.max(1.0),
    }
}
