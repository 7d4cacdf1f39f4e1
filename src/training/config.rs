//! Training configuration

use super::sgd::SGDConfig;
use crate::error::{ForecastError, Result};
use crate::preprocessing::ScalerType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regression algorithm fitted per partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelType {
    /// Stochastic gradient descent regressor
    #[default]
    Sgd,
    /// Ordinary least squares
    Linear,
    /// Ridge Regression
    Ridge,
    /// Lasso Regression
    Lasso,
    /// Elastic Net
    ElasticNet,
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Sgd => "sgdr",
            ModelType::Linear => "linear",
            ModelType::Ridge => "ridge",
            ModelType::Lasso => "lasso",
            ModelType::ElasticNet => "elastic",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelType {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sgdr" | "sgd" => Ok(ModelType::Sgd),
            "linear" | "ols" => Ok(ModelType::Linear),
            "ridge" => Ok(ModelType::Ridge),
            "lasso" => Ok(ModelType::Lasso),
            "elastic" | "elasticnet" | "elastic_net" => Ok(ModelType::ElasticNet),
            other => Err(ForecastError::InvalidParameter {
                name: "model".to_string(),
                value: other.to_string(),
                reason: "expected one of: sgdr, linear, ridge, lasso, elastic".to_string(),
            }),
        }
    }
}

/// Configuration for per-partition training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Model type to train
    pub model_type: ModelType,

    /// Scaler fitted to each partition's features
    pub scaler: ScalerType,

    /// Fewest rows a partition needs to be trained
    pub min_rows: usize,

    /// Positions of year, month and day in prediction matrices
    pub date_columns: [usize; 3],

    /// Regularization strength for ridge, lasso and elastic net
    pub alpha: f64,

    /// Elastic net L1 mixing ratio
    pub l1_ratio: f64,

    /// Coordinate descent iteration cap
    pub max_iter: usize,

    /// SGD parameters
    pub sgd: SGDConfig,

    /// Hold-out fraction used by the evaluator
    pub test_fraction: f64,

    /// Random seed for reproducibility
    pub random_state: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            model_type: ModelType::Sgd,
            scaler: ScalerType::Standard,
            min_rows: 2,
            date_columns: [0, 1, 2],
            alpha: 1.0,
            l1_ratio: 0.5,
            max_iter: 1000,
            sgd: SGDConfig::default(),
            test_fraction: 0.25,
            random_state: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration
    pub fn new(model_type: ModelType) -> Self {
        Self {
            model_type,
            ..Default::default()
        }
    }

    /// Builder method to set model type
    pub fn with_model(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn with_date_columns(mut self, date_columns: [usize; 3]) -> Self {
        self.date_columns = date_columns;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_sgd(mut self, sgd: SGDConfig) -> Self {
        self.sgd = sgd;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    /// Builder method to set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self.sgd.random_state = Some(seed);
        self
    }

    /// Reject settings no model can train with
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| ForecastError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.min_rows < 2 {
            return Err(invalid("min_rows", self.min_rows.to_string(), "must be at least 2"));
        }
        if self.alpha < 0.0 {
            return Err(invalid("alpha", self.alpha.to_string(), "must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(invalid("l1_ratio", self.l1_ratio.to_string(), "must be in [0, 1]"));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid("test_fraction", self.test_fraction.to_string(), "must be in (0, 1)"));
        }
        if self.sgd.eta0 <= 0.0 {
            return Err(invalid("sgd.eta0", self.sgd.eta0.to_string(), "must be positive"));
        }
        if self.sgd.max_iter == 0 {
            return Err(invalid("sgd.max_iter", "0".to_string(), "must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.model_type, ModelType::Sgd);
        assert_eq!(config.min_rows, 2);
        assert_eq!(config.date_columns, [0, 1, 2]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_type_names() {
        for name in ["sgdr", "linear", "ridge", "lasso", "elastic"] {
            let model: ModelType = name.parse().unwrap();
            assert_eq!(model.name(), name);
        }
        assert!("forest".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(TrainingConfig::default().with_min_rows(1).validate().is_err());
        assert!(TrainingConfig::default().with_alpha(-1.0).validate().is_err());
        assert!(TrainingConfig::default().with_test_fraction(1.0).validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"model_type": "Ridge", "alpha": 0.5, "sgd": {"eta0": 0.1}}"#).unwrap();
        assert_eq!(config.model_type, ModelType::Ridge);
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.sgd.eta0, 0.1);
        assert_eq!(config.scaler, ScalerType::Standard);
    }
}
