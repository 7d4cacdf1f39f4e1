//! Stochastic Gradient Descent (SGD) regressor
//!
//! Processes one sample at a time with an elastic-net penalty. The default
//! configuration is squared-error loss with an inverse-scaling learning rate.

use super::models::{check_fit_shapes, linear_predict, Model};
use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SGDLoss {
    SquaredError,
    /// Robust regression, quadratic inside `epsilon`
    Huber,
    /// Epsilon-insensitive (SVR-like)
    Epsilon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningRateSchedule {
    Constant,
    Optimal,    // 1 / (alpha * (t + t0))
    InvScaling, // eta0 / t^power_t
    Adaptive,   // Halve when loss stops improving
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SGDConfig {
    pub loss: SGDLoss,
    pub learning_rate: LearningRateSchedule,
    pub eta0: f64,
    pub alpha: f64,    // Penalty strength
    pub l1_ratio: f64, // ElasticNet mixing (0 = L2, 1 = L1)
    pub max_iter: usize,
    pub tol: f64,
    pub power_t: f64, // For InvScaling schedule
    pub epsilon: f64, // For Huber and Epsilon losses
    pub random_state: Option<u64>,
}

impl Default for SGDConfig {
    fn default() -> Self {
        Self {
            loss: SGDLoss::SquaredError,
            learning_rate: LearningRateSchedule::InvScaling,
            eta0: 0.01,
            alpha: 0.0001,
            l1_ratio: 0.0,
            max_iter: 100,
            tol: 1e-4,
            power_t: 0.25,
            epsilon: 0.1,
            random_state: Some(42),
        }
    }
}

impl SGDConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_eta0(mut self, eta0: f64) -> Self {
        self.eta0 = eta0;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    fn learning_rate_at(&self, t: usize) -> f64 {
        match self.learning_rate {
            LearningRateSchedule::Constant | LearningRateSchedule::Adaptive => self.eta0,
            LearningRateSchedule::Optimal => {
                let t0 = 1.0 / (self.alpha * self.eta0);
                1.0 / (self.alpha * (t as f64 + t0))
            }
            LearningRateSchedule::InvScaling => self.eta0 / (t as f64).powf(self.power_t),
        }
    }

    /// Derivative of the loss with respect to the prediction
    fn loss_gradient(&self, pred: f64, target: f64) -> f64 {
        let diff = pred - target;
        match self.loss {
            SGDLoss::SquaredError => diff,
            SGDLoss::Huber => {
                if diff.abs() <= self.epsilon {
                    diff
                } else {
                    self.epsilon * diff.signum()
                }
            }
            SGDLoss::Epsilon => {
                if diff.abs() <= self.epsilon {
                    0.0
                } else {
                    diff.signum()
                }
            }
        }
    }
}

fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SGDRegressor {
    pub config: SGDConfig,
    pub weights: Option<Array1<f64>>,
    pub bias: f64,
    /// Epochs run by the last fit
    pub n_iter: usize,
}

impl Default for SGDRegressor {
    fn default() -> Self {
        Self::new(SGDConfig::default())
    }
}

impl SGDRegressor {
    pub fn new(config: SGDConfig) -> Self {
        Self {
            config,
            weights: None,
            bias: 0.0,
            n_iter: 0,
        }
    }
}

impl Model for SGDRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_shapes(x, y)?;
        let n = x.nrows();
        let p = x.ncols();
        let config = &self.config;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_state.unwrap_or(42));
        let mut w = Array1::zeros(p);
        let mut b = 0.0;
        let mut indices: Vec<usize> = (0..n).collect();
        let mut prev_loss = f64::MAX;
        let mut current_eta = config.eta0;
        let mut t = 1usize;
        let mut epochs = 0;

        let l2_coeff = config.alpha * (1.0 - config.l1_ratio);
        let l1_coeff = config.alpha * config.l1_ratio;

        for epoch in 0..config.max_iter {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for &i in &indices {
                let xi = x.row(i);
                let pred = xi.dot(&w) + b;

                let lr = match config.learning_rate {
                    LearningRateSchedule::Adaptive => current_eta,
                    _ => config.learning_rate_at(t),
                };

                let dloss = config.loss_gradient(pred, y[i]);
                epoch_loss += dloss * dloss;

                for j in 0..p {
                    let grad = dloss * xi[j] + l2_coeff * w[j];
                    w[j] -= lr * grad;
                    if l1_coeff > 0.0 {
                        w[j] = soft_threshold(w[j], lr * l1_coeff);
                    }
                }
                b -= lr * dloss;
                t += 1;
            }

            epoch_loss /= n as f64;
            epochs = epoch + 1;

            if !epoch_loss.is_finite() || !b.is_finite() {
                return Err(ForecastError::TrainingError(format!(
                    "SGD diverged after {} epochs; lower eta0 or scale the features",
                    epochs
                )));
            }

            if config.learning_rate == LearningRateSchedule::Adaptive && epoch_loss > prev_loss - config.tol {
                current_eta *= 0.5;
                if current_eta < 1e-10 {
                    break;
                }
            }

            if epoch > 0 && (prev_loss - epoch_loss).abs() < config.tol {
                break;
            }
            prev_loss = epoch_loss;
        }

        self.weights = Some(w);
        self.bias = b;
        self.n_iter = epochs;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let w = self.weights.as_ref().ok_or(ForecastError::ModelNotFitted)?;
        linear_predict(x, w, self.bias)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    fn intercept(&self) -> Option<f64> {
        self.weights.as_ref().map(|_| self.bias)
    }

    fn name(&self) -> &'static str {
        "sgdr"
    }
}
