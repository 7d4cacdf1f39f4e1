//! Feature extraction
//!
//! Provides the raw-record to numeric-matrix path:
//! - Column-count schema resolution (train vs. test)
//! - Column-wise value transformers with optional normalization
//! - Per-file feature matrix assembly with one-hot expansion
//! - Shared vocabularies for aligning train and test matrices
//! - Per-column feature scaling for the model registry

mod config;
mod pipeline;
mod scaler;
pub mod schema;
pub mod transforms;

pub use config::FeatureConfig;
pub use pipeline::{output_fields, FeatureMatrix, FeatureVectorBuilder, RawRecords, DATE_RANK_COLUMN};
pub use scaler::{Scaler, ScalerType};
pub use schema::{FeatureLayout, Field, Schema, SchemaKind, SchemaResolver, TARGET};
pub use transforms::{
    BooleanEncode, CarryForwardFill, CategoricalOneHot, DayNormalize, MarkdownFill, MonthNormalize,
    Normalization, NumberFill, OrdinalDateEncode, TransformError, TransformKind, ValueTransformer,
    Vocabulary,
};
