//! Per-entity model registry
//!
//! One (scaler, model) pair per [`EntityKey`]. Training a key that already
//! has an entry replaces it. Predicting a key with no entry yields zeros and
//! is reported as a fallback, so output ids stay aligned with the input rows.

use super::key::{EntityKey, RecordId};
use crate::error::{ForecastError, Result};
use crate::preprocessing::Scaler;
use crate::training::{split_target, Model, TrainedModel, TrainingConfig};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// Fitted state of one partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub scaler: Scaler,
    pub model: TrainedModel,
    /// Rows the entry was trained on
    pub n_rows: usize,
}

impl PartitionEntry {
    /// Fit a fresh scaler and model on a matrix whose last column is the target
    pub fn fit(config: &TrainingConfig, key: EntityKey, matrix: &Array2<f64>) -> Result<Self> {
        if matrix.nrows() < config.min_rows {
            return Err(ForecastError::DataInsufficient {
                key: key.to_string(),
                required: config.min_rows,
                actual: matrix.nrows(),
            });
        }

        let (x, y) = split_target(matrix)?;
        let mut scaler = Scaler::new(config.scaler);
        let x_scaled = scaler.fit_transform(&x)?;
        let model = TrainedModel::train(config, &x_scaled, &y).map_err(|e| match e {
            ForecastError::TrainingError(msg) => ForecastError::TrainingError(format!("{}: {}", key, msg)),
            other => other,
        })?;

        debug!(%key, rows = matrix.nrows(), model = model.name(), "trained partition");
        Ok(Self {
            scaler,
            model,
            n_rows: matrix.nrows(),
        })
    }

    pub fn predict(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let scaled = self.scaler.transform(features)?;
        self.model.predict(&scaled)
    }
}

/// Whether a prediction came from a trained entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionSource {
    Model,
    /// No entry for the key; every value is zero
    Fallback,
}

/// Predictions for one partition, row-aligned with the input matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub key: EntityKey,
    pub ids: Vec<String>,
    pub values: Array1<f64>,
    pub source: PredictionSource,
}

impl Prediction {
    pub fn is_fallback(&self) -> bool {
        self.source == PredictionSource::Fallback
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(id, value)` pairs in row order
    pub fn rows(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.ids.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

/// Outcome of training many partitions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub trained: Vec<EntityKey>,
    /// Partitions below the minimum row count
    pub skipped: Vec<EntityKey>,
}

/// Model-backed vs. fallback counts over many predictions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub model_backed: usize,
    pub fallback: usize,
    pub fallback_keys: Vec<EntityKey>,
}

impl PredictionSummary {
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        let mut summary = Self::default();
        for prediction in predictions {
            match prediction.source {
                PredictionSource::Model => summary.model_backed += 1,
                PredictionSource::Fallback => {
                    summary.fallback += 1;
                    summary.fallback_keys.push(prediction.key);
                }
            }
        }
        summary
    }
}

/// Registry of independently trained partitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRegistry {
    config: TrainingConfig,
    entries: BTreeMap<EntityKey, PartitionEntry>,
}

impl ModelRegistry {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrainingConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Change where `predict` finds year, month and day
    pub fn set_date_columns(&mut self, date_columns: [usize; 3]) {
        self.config.date_columns = date_columns;
    }

    /// Train one partition, replacing any previous entry for the key
    pub fn train(&mut self, key: EntityKey, matrix: &Array2<f64>) -> Result<()> {
        self.config.validate()?;
        let entry = PartitionEntry::fit(&self.config, key, matrix)?;
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Train many partitions in parallel.
    ///
    /// Partitions below `min_rows` are skipped and listed in the summary; any
    /// other failure aborts without changing the registry.
    pub fn train_all(&mut self, partitions: &[(EntityKey, Array2<f64>)]) -> Result<TrainingSummary> {
        self.config.validate()?;
        let config = &self.config;
        let fitted: Vec<(EntityKey, Result<PartitionEntry>)> = partitions
            .par_iter()
            .map(|(key, matrix)| (*key, PartitionEntry::fit(config, *key, matrix)))
            .collect();

        let mut summary = TrainingSummary::default();
        let mut trained = Vec::with_capacity(fitted.len());
        for (key, result) in fitted {
            match result {
                Ok(entry) => {
                    summary.trained.push(key);
                    trained.push((key, entry));
                }
                Err(ForecastError::DataInsufficient { required, actual, .. }) => {
                    warn!(%key, required, actual, "skipping partition with too few rows");
                    summary.skipped.push(key);
                }
                Err(e) => return Err(e),
            }
        }

        self.entries.extend(trained);
        info!(
            trained = summary.trained.len(),
            skipped = summary.skipped.len(),
            "trained partitions"
        );
        Ok(summary)
    }

    /// Predict one partition.
    ///
    /// Ids come from the configured date columns. A key with no entry gets an
    /// all-zero vector tagged [`PredictionSource::Fallback`].
    pub fn predict(&self, key: EntityKey, features: &Array2<f64>) -> Result<Prediction> {
        let ids = self.record_ids(key, features)?;

        match self.entries.get(&key) {
            Some(entry) => {
                let values = if features.nrows() == 0 {
                    Array1::zeros(0)
                } else {
                    entry.predict(features)?
                };
                Ok(Prediction {
                    key,
                    ids,
                    values,
                    source: PredictionSource::Model,
                })
            }
            None => {
                warn!(%key, rows = features.nrows(), "no trained model, predicting zeros");
                Ok(Prediction {
                    key,
                    ids,
                    values: Array1::zeros(features.nrows()),
                    source: PredictionSource::Fallback,
                })
            }
        }
    }

    /// Predict many partitions in parallel; results keep the input order
    pub fn predict_all(
        &self,
        partitions: &[(EntityKey, Array2<f64>)],
    ) -> Result<(Vec<Prediction>, PredictionSummary)> {
        let predictions = partitions
            .par_iter()
            .map(|(key, features)| self.predict(*key, features))
            .collect::<Result<Vec<_>>>()?;

        let summary = PredictionSummary::from_predictions(&predictions);
        info!(
            model_backed = summary.model_backed,
            fallback = summary.fallback,
            "predicted partitions"
        );
        Ok((predictions, summary))
    }

    fn record_ids(&self, key: EntityKey, features: &Array2<f64>) -> Result<Vec<String>> {
        let [year, month, day] = self.config.date_columns;
        let needed = year.max(month).max(day) + 1;
        if features.nrows() > 0 && features.ncols() < needed {
            return Err(ForecastError::ShapeError {
                expected: format!("at least {} columns for the date fields", needed),
                actual: format!("{} columns", features.ncols()),
            });
        }

        Ok(features
            .rows()
            .into_iter()
            .map(|row| RecordId::encode(&key, row[year], row[month], row[day]))
            .collect())
    }

    /// Mean of each coefficient across partitions whose model exposes them
    pub fn coefficient_means(&self) -> Result<Option<Array1<f64>>> {
        let mut sum: Option<Array1<f64>> = None;
        let mut count = 0usize;

        for (key, entry) in &self.entries {
            let Some(coefficients) = entry.model.coefficients() else {
                continue;
            };
            if let Some(total) = sum.as_mut() {
                if total.len() != coefficients.len() {
                    return Err(ForecastError::ShapeError {
                        expected: format!("{} coefficients", total.len()),
                        actual: format!("{} coefficients for {}", coefficients.len(), key),
                    });
                }
                *total += coefficients;
            } else {
                sum = Some(coefficients.clone());
            }
            count += 1;
        }

        Ok(sum.map(|total| total / count as f64))
    }

    pub fn get(&self, key: &EntityKey) -> Option<&PartitionEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Trained keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> + '_ {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the whole registry as one bincode blob
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        info!(path = %path.display(), partitions = self.len(), bytes = bytes.len(), "saved registry");
        Ok(())
    }

    /// Restore a registry written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        let registry: Self = bincode::deserialize(&bytes)?;
        info!(path = %path.display(), partitions = registry.len(), "loaded registry");
        Ok(registry)
    }
}
