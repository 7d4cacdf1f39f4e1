//! Model trait and regression metrics

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Metrics for regression evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(ForecastError::InvalidInput("no samples to evaluate".to_string()));
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        // R²
        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        })
    }
}

/// Summary statistics of a target column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub count: usize,
}

impl TargetStats {
    pub fn compute(values: &Array1<f64>) -> Result<Self> {
        let mean = values
            .mean()
            .ok_or_else(|| ForecastError::InvalidInput("empty target column".to_string()))?;
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            min,
            max,
            mean,
            std: values.std(0.0),
            count: values.len(),
        })
    }
}

/// A regression algorithm the registry can fit and query
pub trait Model: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Fitted weights, one per feature
    fn coefficients(&self) -> Option<&Array1<f64>> {
        None
    }

    fn intercept(&self) -> Option<f64> {
        None
    }

    /// Short algorithm name
    fn name(&self) -> &'static str;
}

/// Reject mismatched design matrix and target lengths
pub(crate) fn check_fit_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ForecastError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(ForecastError::InvalidInput("cannot fit on zero samples".to_string()));
    }
    Ok(())
}

/// Linear prediction `x · w + b` with a width check
pub(crate) fn linear_predict(x: &Array2<f64>, coefficients: &Array1<f64>, intercept: f64) -> Result<Array1<f64>> {
    if x.ncols() != coefficients.len() {
        return Err(ForecastError::ShapeError {
            expected: format!("{} features", coefficients.len()),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(x.dot(coefficients) + intercept)
}

/// R² of predictions, 1 for a constant target
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let y_mean = y_true.mean().unwrap_or(0.0);
    let ss_res = (y_pred - y_true).mapv(|v| v * v).sum();
    let ss_tot = y_true.mapv(|v| (v - y_mean).powi(2)).sum();
    if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.1, 2.9, 4.2, 4.8];

        let metrics = ModelMetrics::compute_regression(&y_true, &y_pred).unwrap();

        assert!(metrics.mse < 0.1);
        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
        assert!((metrics.mae - 0.14).abs() < 1e-9);
        assert!(metrics.r2 > 0.9);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_metrics_length_mismatch() {
        let result = ModelMetrics::compute_regression(&array![1.0, 2.0], &array![1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_target_stats() {
        let stats = TargetStats::compute(&array![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.mean, 5.0);
        assert!((stats.std - 2.0).abs() < 1e-12);
        assert_eq!(stats.count, 8);

        assert!(TargetStats::compute(&Array1::zeros(0)).is_err());
    }
}
