//! Model dispatch and hold-out evaluation

use super::config::{ModelType, TrainingConfig};
use super::linear_models::{ElasticNetRegression, LassoRegression, LinearRegression, RidgeRegression};
use super::models::{Model, ModelMetrics};
use super::sgd::SGDRegressor;
use crate::error::{ForecastError, Result};
use crate::preprocessing::Scaler;
use ndarray::{s, Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LinearRegression(LinearRegression),
    RidgeRegression(RidgeRegression),
    LassoRegression(LassoRegression),
    ElasticNetRegression(ElasticNetRegression),
    SGDRegressor(SGDRegressor),
}

impl TrainedModel {
    /// Fresh, unfitted model for the configured algorithm
    pub fn from_config(config: &TrainingConfig) -> Self {
        match config.model_type {
            ModelType::Linear => TrainedModel::LinearRegression(LinearRegression::new()),
            ModelType::Ridge => TrainedModel::RidgeRegression(RidgeRegression::new(config.alpha)),
            ModelType::Lasso => {
                TrainedModel::LassoRegression(LassoRegression::new(config.alpha).with_max_iter(config.max_iter))
            }
            ModelType::ElasticNet => TrainedModel::ElasticNetRegression(
                ElasticNetRegression::new(config.alpha, config.l1_ratio).with_max_iter(config.max_iter),
            ),
            ModelType::Sgd => TrainedModel::SGDRegressor(SGDRegressor::new(config.sgd.clone())),
        }
    }

    /// Build and fit in one step
    pub fn train(config: &TrainingConfig, x: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let mut model = Self::from_config(config);
        model.fit(x, y)?;
        Ok(model)
    }

    fn inner(&self) -> &dyn Model {
        match self {
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::RidgeRegression(m) => m,
            TrainedModel::LassoRegression(m) => m,
            TrainedModel::ElasticNetRegression(m) => m,
            TrainedModel::SGDRegressor(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::RidgeRegression(m) => m,
            TrainedModel::LassoRegression(m) => m,
            TrainedModel::ElasticNetRegression(m) => m,
            TrainedModel::SGDRegressor(m) => m,
        }
    }
}

impl Model for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn coefficients(&self) -> Option<&Array1<f64>> {
        self.inner().coefficients()
    }

    fn intercept(&self) -> Option<f64> {
        self.inner().intercept()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

/// Split a matrix whose last column is the target
pub fn split_target(matrix: &Array2<f64>) -> Result<(Array2<f64>, Array1<f64>)> {
    if matrix.ncols() < 2 {
        return Err(ForecastError::ShapeError {
            expected: "at least 2 columns (features and target)".to_string(),
            actual: format!("{} columns", matrix.ncols()),
        });
    }
    let last = matrix.ncols() - 1;
    Ok((
        matrix.slice(s![.., ..last]).to_owned(),
        matrix.column(last).to_owned(),
    ))
}

/// Hold-out evaluation of one scaler + model pipeline
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    config: TrainingConfig,
}

impl ModelEvaluator {
    /// Fewest rows that leave a usable train and test split
    pub const MIN_ROWS: usize = 4;

    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Shuffle with the configured seed, hold out `test_fraction` of the rows,
    /// fit on the rest and score the hold-out.
    pub fn evaluate(&self, matrix: &Array2<f64>) -> Result<ModelMetrics> {
        self.config.validate()?;
        let n = matrix.nrows();
        if n < Self::MIN_ROWS {
            return Err(ForecastError::DataInsufficient {
                key: "evaluation".to_string(),
                required: Self::MIN_ROWS,
                actual: n,
            });
        }
        let (x, y) = split_target(matrix)?;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64 * self.config.test_fraction).ceil() as usize).clamp(1, n - 2);
        let (test_idx, train_idx) = indices.split_at(n_test);

        let x_train = x.select(Axis(0), train_idx);
        let y_train = y.select(Axis(0), train_idx);
        let x_test = x.select(Axis(0), test_idx);
        let y_test = y.select(Axis(0), test_idx);

        let mut scaler = Scaler::new(self.config.scaler);
        let x_train = scaler.fit_transform(&x_train)?;
        let x_test = scaler.transform(&x_test)?;

        let model = TrainedModel::train(&self.config, &x_train, &y_train)?;
        let predictions = model.predict(&x_test)?;

        debug!(
            model = model.name(),
            train_rows = train_idx.len(),
            test_rows = test_idx.len(),
            "evaluated hold-out split"
        );
        ModelMetrics::compute_regression(&y_test, &predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_matrix(n: usize) -> Array2<f64> {
        // y = 2*x0 + 3*x1 + 1
        Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 5) % 7) as f64,
            _ => 2.0 * i as f64 + 3.0 * ((i * 5) % 7) as f64 + 1.0,
        })
    }

    #[test]
    fn test_trained_model_dispatch() {
        let (x, y) = split_target(&linear_matrix(20)).unwrap();
        for model_type in [ModelType::Linear, ModelType::Ridge, ModelType::Lasso, ModelType::ElasticNet] {
            let config = TrainingConfig::new(model_type).with_alpha(0.001);
            let model = TrainedModel::train(&config, &x, &y).unwrap();
            assert_eq!(model.name(), model_type.name());
            assert_eq!(model.coefficients().unwrap().len(), 2);
            assert_eq!(model.predict(&x).unwrap().len(), 20);
        }
    }

    #[test]
    fn test_trained_model_serde() {
        let (x, y) = split_target(&linear_matrix(10)).unwrap();
        let model = TrainedModel::train(&TrainingConfig::new(ModelType::Linear), &x, &y).unwrap();
        let bytes = bincode::serialize(&model).unwrap();
        let restored: TrainedModel = bincode::deserialize(&bytes).unwrap();
        assert_eq!(model.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }

    #[test]
    fn test_split_target() {
        let (x, y) = split_target(&linear_matrix(5)).unwrap();
        assert_eq!(x.ncols(), 2);
        assert_eq!(y.len(), 5);
        assert!(split_target(&Array2::zeros((3, 1))).is_err());
    }

    #[test]
    fn test_evaluator_linear_signal() {
        let evaluator = ModelEvaluator::new(TrainingConfig::new(ModelType::Linear));
        let metrics = evaluator.evaluate(&linear_matrix(40)).unwrap();
        assert_eq!(metrics.n_samples, 10);
        assert!(metrics.mae < 1e-6, "MAE = {}", metrics.mae);
    }

    #[test]
    fn test_evaluator_needs_rows() {
        let evaluator = ModelEvaluator::new(TrainingConfig::default());
        let result = evaluator.evaluate(&linear_matrix(3));
        assert!(matches!(result, Err(ForecastError::DataInsufficient { .. })));
    }
}
