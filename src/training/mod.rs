//! Regression models fitted per partition
//!
//! Provides:
//! - Linear models (OLS, Ridge, Lasso, ElasticNet)
//! - Stochastic Gradient Descent regressor (default)
//! - Serializable model dispatch and hold-out evaluation

mod config;
mod engine;
mod models;
pub mod linear_models;
pub mod sgd;

pub use config::{ModelType, TrainingConfig};
pub use engine::{split_target, ModelEvaluator, TrainedModel};
pub use linear_models::{ElasticNetRegression, LassoRegression, LinearRegression, RidgeRegression};
pub use models::{r2_score, Model, ModelMetrics, TargetStats};
pub use sgd::{LearningRateSchedule, SGDConfig, SGDLoss, SGDRegressor};
