//! Feature vector builder
//!
//! Turns one raw extract into a numeric [`FeatureMatrix`]: resolve the schema
//! from the first line, read every record as strings, run each declared
//! column through its transformer in output order, expand the categorical
//! column into its one-hot block and append the target for training files.

use super::config::FeatureConfig;
use super::schema::{FeatureLayout, Field, Schema, SchemaResolver, TARGET};
use super::transforms::{
    CategoricalOneHot, NumberFill, OrdinalDateEncode, TransformError, TransformKind,
    ValueTransformer, Vocabulary,
};
use crate::error::{ForecastError, Result};
use crate::registry::{EntityKey, RecordId};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use polars::prelude::{CsvReadOptions, DataFrame, DataType, PlSmallStr, Schema as FrameSchema, SerReader};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the optional chronological rank column
pub const DATE_RANK_COLUMN: &str = "date_rank";

/// Raw string records of one file, stored column by column in schema order
#[derive(Debug, Clone)]
pub struct RawRecords {
    schema: Schema,
    source: String,
    columns: Vec<Vec<String>>,
    n_rows: usize,
}

impl RawRecords {
    /// Assemble records from already-split rows
    pub fn from_rows(schema: Schema, source: impl Into<String>, rows: &[Vec<String>]) -> Result<Self> {
        let source = source.into();
        let mut columns = vec![Vec::with_capacity(rows.len()); schema.len()];

        for row in rows {
            if row.len() != schema.len() {
                return Err(ForecastError::SchemaError {
                    file: source,
                    expected: schema.len().to_string(),
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value.clone());
            }
        }

        Ok(Self {
            schema,
            source,
            columns,
            n_rows: rows.len(),
        })
    }

    fn from_frame(schema: Schema, source: String, df: &DataFrame) -> Result<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(|field| -> Result<Vec<String>> {
                let series = df.column(field.name())?.as_materialized_series();
                let values: Vec<String> = series
                    .str()?
                    .into_iter()
                    .map(|v| v.unwrap_or("").to_string())
                    .collect();
                Ok(values)
            })
            .collect::<Result<Vec<Vec<String>>>>()?;

        Ok(Self {
            schema,
            source,
            columns,
            n_rows: df.height(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// File the records came from, used in error context
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_train(&self) -> bool {
        self.schema.is_train()
    }

    /// Raw values of one field, in file order
    pub fn column(&self, field: Field) -> Option<Vec<&str>> {
        self.schema
            .position(field)
            .map(|idx| self.columns[idx].iter().map(String::as_str).collect())
    }

    fn require(&self, field: Field) -> Result<Vec<&str>> {
        self.column(field).ok_or_else(|| {
            ForecastError::DataError(format!("{}: schema has no '{}' column", self.source, field))
        })
    }

    /// `YYYY-MM-DD` composite of the year, month and day fields
    pub fn date_strings(&self) -> Result<Vec<String>> {
        let years = self.require(Field::Year)?;
        let months = self.require(Field::Month)?;
        let days = self.require(Field::Day)?;

        Ok(years
            .iter()
            .zip(&months)
            .zip(&days)
            .map(|((y, m), d)| compose_date(y, m, d))
            .collect())
    }

    /// Canonical submission id of every record, in file order.
    ///
    /// Entity extracts carry no key columns, so the key must come from the
    /// file name; full extracts read it from each row.
    pub fn record_ids(&self, key: Option<EntityKey>) -> Result<Vec<String>> {
        let years = self.numeric_column(Field::Year)?;
        let months = self.numeric_column(Field::Month)?;
        let days = self.numeric_column(Field::Day)?;

        let keys: Vec<EntityKey> = match self.schema.layout() {
            FeatureLayout::Store => {
                let stores = self.numeric_column(Field::StoreId)?;
                let depts = self.numeric_column(Field::DeptId)?;
                stores
                    .iter()
                    .zip(&depts)
                    .map(|(s, d)| EntityKey::from_values(*s, *d))
                    .collect()
            }
            FeatureLayout::Entity => {
                let key = key.ok_or_else(|| {
                    ForecastError::InvalidInput(format!(
                        "{}: an entity key is required to generate ids",
                        self.source
                    ))
                })?;
                vec![key; self.n_rows]
            }
        };

        Ok((0..self.n_rows)
            .map(|i| RecordId::encode(&keys[i], years[i], months[i], days[i]))
            .collect())
    }

    fn numeric_column(&self, field: Field) -> Result<Vec<f64>> {
        self.require(field)?
            .iter()
            .enumerate()
            .map(|(row, v)| {
                v.trim().parse::<f64>().map_err(|_| ForecastError::ValueError {
                    file: self.source.clone(),
                    column: field.name().to_string(),
                    source: TransformError::new(row, *v, "expected a number"),
                })
            })
            .collect()
    }
}

fn compose_date(year: &str, month: &str, day: &str) -> String {
    let parse = |v: &str| v.trim().parse::<f64>().ok().map(|n| n.trunc() as i64);
    match (parse(year), parse(month), parse(day)) {
        (Some(y), Some(m), Some(d)) => format!("{:04}-{:02}-{:02}", y, m, d),
        _ => format!("{}-{}-{}", year, month, day),
    }
}

/// Assembled numeric matrix of one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    /// Rows in file order; target last when `has_target`
    pub data: Array2<f64>,
    pub column_names: Vec<String>,
    pub has_target: bool,
    pub layout: FeatureLayout,
    /// Positions of the year, month and day columns
    pub date_columns: [usize; 3],
}

impl FeatureMatrix {
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Feature columns only
    pub fn features(&self) -> ArrayView2<'_, f64> {
        if self.has_target {
            self.data.slice(ndarray::s![.., ..self.data.ncols() - 1])
        } else {
            self.data.view()
        }
    }

    /// Target column, if present
    pub fn target(&self) -> Option<ndarray::ArrayView1<'_, f64>> {
        if self.has_target && self.data.ncols() > 0 {
            Some(self.data.column(self.data.ncols() - 1))
        } else {
            None
        }
    }
}

/// Builds feature matrices one file at a time.
///
/// Every build starts from fresh transformer instances, so files never share
/// state and can be processed in parallel. Without a seeded [`Vocabulary`] the
/// one-hot block and date rank are file-local: two files agree on column
/// meaning only if they see the same values in the same order. Fit a shared
/// vocabulary with [`fit_vocabulary`](Self::fit_vocabulary) when train and test
/// matrices must line up.
#[derive(Debug, Clone, Default)]
pub struct FeatureVectorBuilder {
    config: FeatureConfig,
    vocabulary: Option<Vocabulary>,
}

impl FeatureVectorBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        Self {
            config,
            vocabulary: None,
        }
    }

    /// Seed every categorical and date encoder with a shared vocabulary
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    pub fn resolver(&self) -> SchemaResolver {
        SchemaResolver::new(self.config.layout)
    }

    /// Resolve a file's schema from its first line
    pub fn resolve_schema(&self, path: &Path) -> Result<Schema> {
        let file = File::open(path)?;
        let mut first_line = String::new();
        BufReader::new(file).read_line(&mut first_line)?;
        self.resolver()
            .resolve_line(&first_line)
            .map_err(|e| e.in_file(&path.display().to_string()))
    }

    /// Resolve the schema and read every record as strings
    pub fn read_records(&self, path: &Path) -> Result<RawRecords> {
        let schema = self.resolve_schema(path)?;
        let source = path.display().to_string();

        let frame_schema: FrameSchema = schema
            .fields()
            .iter()
            .map(|f| (PlSmallStr::from_static(f.name()), DataType::String))
            .collect();

        let df = CsvReadOptions::default()
            .with_has_header(false)
            .with_schema(Some(Arc::new(frame_schema)))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        debug!(file = %source, rows = df.height(), columns = schema.len(), "read raw records");
        RawRecords::from_frame(schema, source, &df)
    }

    /// Build the feature matrix of one file
    pub fn build(&self, path: &Path) -> Result<FeatureMatrix> {
        let records = self.read_records(path)?;
        let matrix = self.build_from_records(&records)?;
        info!(
            file = %records.source(),
            rows = matrix.nrows(),
            columns = matrix.ncols(),
            train = matrix.has_target,
            "extracted features"
        );
        Ok(matrix)
    }

    /// Build many files in parallel; results keep the input order
    pub fn build_many<P>(&self, paths: &[P]) -> Result<Vec<FeatureMatrix>>
    where
        P: AsRef<Path> + Sync,
    {
        paths.par_iter().map(|p| self.build(p.as_ref())).collect()
    }

    /// Assemble the matrix from records already in memory
    pub fn build_from_records(&self, records: &RawRecords) -> Result<FeatureMatrix> {
        let layout = records.schema().layout();
        let source = records.source();
        let mut blocks: Vec<Array2<f64>> = Vec::new();
        let mut column_names: Vec<String> = Vec::new();
        let mut date_columns = [0usize; 3];

        for &field in output_fields(layout) {
            let values = records.require(field)?;

            match field {
                Field::Type => {
                    let (block, names) = self.encode_categorical(source, &values)?;
                    blocks.push(block);
                    column_names.extend(names);
                }
                _ => {
                    let kind = TransformKind::for_field(field, layout);
                    let mut transformer = kind.build(&self.config, self.vocabulary.as_ref());
                    let block = run(transformer.as_mut(), source, field.name(), &values)?;
                    match field {
                        Field::Year => date_columns[0] = column_names.len(),
                        Field::Month => date_columns[1] = column_names.len(),
                        Field::Day => date_columns[2] = column_names.len(),
                        _ => {}
                    }
                    blocks.push(block);
                    column_names.push(field.name().to_string());
                }
            }

            if field == Field::Day && self.config.include_date_rank {
                let block = self.encode_date_rank(records)?;
                blocks.push(block);
                column_names.push(DATE_RANK_COLUMN.to_string());
            }
        }

        let has_target = records.is_train();
        if has_target {
            let values = records.require(TARGET)?;
            // The target is never normalized.
            let mut transformer = NumberFill::new(self.config.number_fill, false);
            blocks.push(run(&mut transformer, source, TARGET.name(), &values)?);
            column_names.push(TARGET.name().to_string());
        }

        let views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.view()).collect();
        let data = if views.is_empty() {
            Array2::zeros((records.n_rows(), 0))
        } else {
            concatenate(Axis(1), &views)?
        };

        Ok(FeatureMatrix {
            data,
            column_names,
            has_target,
            layout,
            date_columns,
        })
    }

    fn encode_categorical(&self, source: &str, values: &[&str]) -> Result<(Array2<f64>, Vec<String>)> {
        let seeded = self.vocabulary.as_ref().map(|v| v.categories.len());
        let mut encoder = match &self.vocabulary {
            Some(vocab) => {
                CategoricalOneHot::with_vocabulary(vocab.categories.iter().cloned(), self.config.normalize)
            }
            None => CategoricalOneHot::new(self.config.normalize),
        };

        let block = run(&mut encoder, source, Field::Type.name(), values)?;

        if let Some(n_seeded) = seeded {
            let unseen = &encoder.vocabulary()[n_seeded..];
            if !unseen.is_empty() {
                warn!(file = %source, values = ?unseen, "categories missing from the shared vocabulary");
            }
        }

        let names = encoder
            .vocabulary()
            .iter()
            .map(|v| format!("{}={}", Field::Type.name(), v))
            .collect();
        Ok((block, names))
    }

    fn encode_date_rank(&self, records: &RawRecords) -> Result<Array2<f64>> {
        let dates = records.date_strings()?;
        let values: Vec<&str> = dates.iter().map(String::as_str).collect();
        let mut encoder = match &self.vocabulary {
            Some(vocab) => OrdinalDateEncode::with_dates(vocab.dates.iter().copied(), self.config.normalize),
            None => OrdinalDateEncode::new(self.config.normalize),
        };
        let block = run(&mut encoder, records.source(), DATE_RANK_COLUMN, &values)?;

        if self.vocabulary.is_some() {
            let unseen = encoder.unseen();
            if !unseen.is_empty() {
                warn!(file = %records.source(), dates = ?unseen, "dates missing from the shared vocabulary");
            }
        }
        Ok(block)
    }

    /// Fit a shared vocabulary over several files.
    ///
    /// Categories keep their first-seen order across files in the given order;
    /// dates are the sorted union.
    pub fn fit_vocabulary<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vocabulary> {
        let mut categories: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut dates = BTreeSet::new();

        for path in paths {
            let records = self.read_records(path.as_ref())?;

            if let Some(values) = records.column(Field::Type) {
                for value in values {
                    if seen.insert(value.to_string()) {
                        categories.push(value.to_string());
                    }
                }
            }

            for (row, date) in records.date_strings()?.iter().enumerate() {
                let parsed = OrdinalDateEncode::parse(row, date).map_err(|source| {
                    ForecastError::ValueError {
                        file: records.source().to_string(),
                        column: DATE_RANK_COLUMN.to_string(),
                        source,
                    }
                })?;
                dates.insert(parsed);
            }
        }

        info!(
            files = paths.len(),
            categories = categories.len(),
            dates = dates.len(),
            "fitted shared vocabulary"
        );

        Ok(Vocabulary {
            categories,
            dates: dates.into_iter().collect(),
        })
    }
}

/// Output field order for a layout, before the one-hot expansion
pub fn output_fields(layout: FeatureLayout) -> &'static [Field] {
    const ENTITY: [Field; 13] = [
        Field::Year,
        Field::Month,
        Field::Day,
        Field::Temperature,
        Field::FuelPrice,
        Field::Markdown1,
        Field::Markdown2,
        Field::Markdown3,
        Field::Markdown4,
        Field::Markdown5,
        Field::Cpi,
        Field::Unemployment,
        Field::IsHoliday,
    ];
    match layout {
        FeatureLayout::Entity => &ENTITY,
        FeatureLayout::Store => layout.test_features(),
    }
}

fn run(
    transformer: &mut dyn ValueTransformer,
    source: &str,
    column: &str,
    values: &[&str],
) -> Result<Array2<f64>> {
    debug!(column, transformer = transformer.name(), rows = values.len(), "transforming column");
    transformer
        .transform(values)
        .map_err(|source_err| ForecastError::ValueError {
            file: source.to_string(),
            column: column.to_string(),
            source: source_err,
        })
}
