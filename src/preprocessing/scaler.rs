//! Per-column feature scaling over dense matrices

use crate::error::{ForecastError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    #[default]
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
    /// No scaling
    None,
}

impl FromStr for ScalerType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(ScalerType::Standard),
            "minmax" | "min_max" => Ok(ScalerType::MinMax),
            "robust" => Ok(ScalerType::Robust),
            "maxabs" | "max_abs" => Ok(ScalerType::MaxAbs),
            "none" => Ok(ScalerType::None),
            other => Err(ForecastError::InvalidParameter {
                name: "scaler".to_string(),
                value: other.to_string(),
                reason: "expected one of: standard, minmax, robust, maxabs, none".to_string(),
            }),
        }
    }
}

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean, min, or median
    scale: f64,  // std, range, or IQR
}

/// Feature scaler, fitted column by column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new(ScalerType::default())
    }
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Number of columns the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.params.len()
    }

    /// Fit the scaler to every column of `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(ForecastError::DataError("cannot fit scaler on empty data".to_string()));
        }

        self.params = x
            .axis_iter(Axis(1))
            .map(|column| self.compute_params(column))
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        let mut result = x.clone();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Inverse transform the data
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        let mut result = x.clone();
        for (mut column, params) in result.axis_iter_mut(Axis(1)).zip(&self.params) {
            column.mapv_inplace(|v| v * params.scale + params.center);
        }
        Ok(result)
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(ForecastError::ModelNotFitted);
        }
        if x.ncols() != self.params.len() {
            return Err(ForecastError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }

    fn compute_params(&self, column: ArrayView1<f64>) -> ScalerParams {
        let nonzero = |s: f64| if s == 0.0 || !s.is_finite() { 1.0 } else { s };

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = column.mean().unwrap_or(0.0);
                // Population standard deviation
                let std = column.std(0.0);
                ScalerParams { center: mean, scale: nonzero(std) }
            }
            ScalerType::MinMax => {
                let min = column.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = column.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                ScalerParams { center: min, scale: nonzero(max - min) }
            }
            ScalerType::Robust => {
                let mut values = column.to_vec();
                values.sort_by(|a, b| a.total_cmp(b));
                let sorted = Array1::from(values);
                let median = quantile(&sorted, 0.5);
                let iqr = quantile(&sorted, 0.75) - quantile(&sorted, 0.25);
                ScalerParams { center: median, scale: nonzero(iqr) }
            }
            ScalerType::MaxAbs => {
                let max_abs = column.iter().fold(0.0f64, |a, b| a.max(b.abs()));
                ScalerParams { center: 0.0, scale: nonzero(max_abs) }
            }
            ScalerType::None => ScalerParams { center: 0.0, scale: 1.0 },
        }
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &Array1<f64>, q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
