//! Sales forecast - per-partition weekly sales regression
//!
//! This crate turns raw store/department extracts into numeric feature
//! matrices and fits one regression model per (store, department) pair:
//! - Schema resolution and column-wise value transformers
//! - Feature matrix assembly with one-hot and date-rank expansion
//! - Per-partition scaling and regression (SGD, OLS, ridge, lasso, elastic net)
//! - A serializable model registry with zero-prediction fallback
//!
//! # Modules
//!
//! - [`preprocessing`] - Raw records to feature matrices, scalers
//! - [`training`] - Regression models, hold-out evaluation
//! - [`registry`] - Entity keys, record ids, the model registry
//! - [`utils`] - Matrix and submission file I/O
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod preprocessing;
pub mod registry;
pub mod training;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{ForecastError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ForecastError, Result};

    // Feature extraction
    pub use crate::preprocessing::{
        FeatureConfig, FeatureLayout, FeatureMatrix, FeatureVectorBuilder, Scaler, ScalerType, SchemaResolver,
        TransformKind, ValueTransformer, Vocabulary,
    };

    // Registry
    pub use crate::registry::{EntityKey, ModelRegistry, Prediction, PredictionSource, RecordId};

    // Training
    pub use crate::training::{Model, ModelEvaluator, ModelMetrics, ModelType, TrainedModel, TrainingConfig};
}
