//! Per-entity model registry and record identifiers

mod composite;
mod key;

pub use composite::{ModelRegistry, PartitionEntry, Prediction, PredictionSource, PredictionSummary, TrainingSummary};
pub use key::{EntityKey, IdComponent, RecordId};
