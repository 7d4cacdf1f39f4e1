//! Column-wise value transformers
//!
//! Every transformer consumes one column of raw strings and yields one output
//! row per input value. Most produce a single output column; the categorical
//! encoder produces one indicator column per vocabulary entry.
//!
//! Normalization is orthogonal to the encoding rule: when enabled, the encoded
//! block is rescaled by the transformer's [`Normalization`].

use super::config::FeatureConfig;
use super::schema::{FeatureLayout, Field};
use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Date format of the composite date column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A raw value that violates its column's contract
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {row}: {reason} (got {token:?})")]
pub struct TransformError {
    /// Zero-based row index within the file
    pub row: usize,
    pub token: String,
    pub reason: String,
}

impl TransformError {
    pub fn new(row: usize, token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row,
            token: token.into(),
            reason: reason.into(),
        }
    }
}

/// How an encoded block is rescaled when normalization is on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Normalization {
    /// `(v - min) / (max - min)` over the whole block; a constant block maps to zeros
    MinMax,
    /// Divide by a fixed domain constant
    Divide(f64),
}

impl Normalization {
    pub fn apply(&self, values: Array2<f64>) -> Array2<f64> {
        match *self {
            Normalization::MinMax => {
                if values.is_empty() {
                    return values;
                }
                let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                if max == min {
                    return Array2::zeros(values.raw_dim());
                }
                let range = max - min;
                values.mapv(|v| (v - min) / range)
            }
            Normalization::Divide(divisor) => values.mapv(|v| v / divisor),
        }
    }
}

/// Shared contract of the column encoders
pub trait ValueTransformer: Send {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Apply the encoding rule, one output row per input value
    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError>;

    /// Whether [`transform`](Self::transform) rescales the encoded block
    fn normalizes(&self) -> bool;

    fn normalization(&self) -> Normalization {
        Normalization::MinMax
    }

    /// Encode, then normalize if enabled
    fn transform(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let encoded = self.encode(values)?;
        if self.normalizes() {
            Ok(self.normalization().apply(encoded))
        } else {
            Ok(encoded)
        }
    }
}

fn single_column(values: Vec<f64>) -> Array2<f64> {
    Array1::from(values).insert_axis(Axis(1))
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok()
}

// ============ Numeric fills ============

/// Parses numbers, substituting a fixed fill value on failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberFill {
    pub fill_value: f64,
    pub normalize: bool,
}

impl Default for NumberFill {
    fn default() -> Self {
        Self::new(0.0, false)
    }
}

impl NumberFill {
    pub fn new(fill_value: f64, normalize: bool) -> Self {
        Self { fill_value, normalize }
    }
}

impl ValueTransformer for NumberFill {
    fn name(&self) -> &'static str {
        "number_fill"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let encoded = values
            .iter()
            .map(|v| parse_number(v).unwrap_or(self.fill_value))
            .collect();
        Ok(single_column(encoded))
    }

    fn normalizes(&self) -> bool {
        self.normalize
    }
}

/// Parses numbers; a failure repeats the last successfully parsed value.
///
/// The carried value starts at `fill_value` on every pass and never leaks
/// between columns or calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarryForwardFill {
    pub fill_value: f64,
    pub normalize: bool,
}

impl Default for CarryForwardFill {
    fn default() -> Self {
        Self::new(0.0, false)
    }
}

impl CarryForwardFill {
    pub fn new(fill_value: f64, normalize: bool) -> Self {
        Self { fill_value, normalize }
    }
}

impl ValueTransformer for CarryForwardFill {
    fn name(&self) -> &'static str {
        "carry_forward_fill"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let mut carried = self.fill_value;
        let encoded = values
            .iter()
            .map(|v| match parse_number(v) {
                Some(parsed) => {
                    carried = parsed;
                    parsed
                }
                None => carried,
            })
            .collect();
        Ok(single_column(encoded))
    }

    fn normalizes(&self) -> bool {
        self.normalize
    }
}

/// Promotional markdowns: the literal `NA` means no markdown
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkdownFill {
    pub normalize: bool,
}

impl MarkdownFill {
    pub const MISSING: &'static str = "NA";

    pub fn new(normalize: bool) -> Self {
        Self { normalize }
    }
}

impl ValueTransformer for MarkdownFill {
    fn name(&self) -> &'static str {
        "markdown_fill"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let encoded = values
            .iter()
            .enumerate()
            .map(|(row, v)| {
                if *v == Self::MISSING {
                    Ok(0.0)
                } else {
                    parse_number(v).ok_or_else(|| {
                        TransformError::new(row, *v, "markdown must be a number or NA")
                    })
                }
            })
            .collect::<Result<Vec<f64>, TransformError>>()?;
        Ok(single_column(encoded))
    }

    fn normalizes(&self) -> bool {
        self.normalize
    }
}

/// Month of year, normalized by 12
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthNormalize {
    inner: NumberFill,
}

impl MonthNormalize {
    pub fn new(fill_value: f64, normalize: bool) -> Self {
        Self { inner: NumberFill::new(fill_value, normalize) }
    }
}

impl ValueTransformer for MonthNormalize {
    fn name(&self) -> &'static str {
        "month_normalize"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        self.inner.encode(values)
    }

    fn normalizes(&self) -> bool {
        self.inner.normalize
    }

    fn normalization(&self) -> Normalization {
        Normalization::Divide(12.0)
    }
}

/// Day of month, normalized by 31
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayNormalize {
    inner: NumberFill,
}

impl DayNormalize {
    pub fn new(fill_value: f64, normalize: bool) -> Self {
        Self { inner: NumberFill::new(fill_value, normalize) }
    }
}

impl ValueTransformer for DayNormalize {
    fn name(&self) -> &'static str {
        "day_normalize"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        self.inner.encode(values)
    }

    fn normalizes(&self) -> bool {
        self.inner.normalize
    }

    fn normalization(&self) -> Normalization {
        // Month length is ignored.
        Normalization::Divide(31.0)
    }
}

// ============ Strict encoders ============

/// `TRUE` → 1, `FALSE` → 0, anything else is a contract violation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BooleanEncode {
    pub normalize: bool,
}

impl BooleanEncode {
    pub fn new(normalize: bool) -> Self {
        Self { normalize }
    }
}

impl ValueTransformer for BooleanEncode {
    fn name(&self) -> &'static str {
        "boolean_encode"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let encoded = values
            .iter()
            .enumerate()
            .map(|(row, v)| match *v {
                "TRUE" => Ok(1.0),
                "FALSE" => Ok(0.0),
                other => Err(TransformError::new(row, other, "must be TRUE or FALSE")),
            })
            .collect::<Result<Vec<f64>, TransformError>>()?;
        Ok(single_column(encoded))
    }

    fn normalizes(&self) -> bool {
        self.normalize
    }
}

// ============ Vocabulary encoders ============

/// One-hot encoding with a first-seen-order vocabulary.
///
/// The vocabulary lives in the instance and grows across calls, so column
/// meaning is local to whatever this instance has seen. Two files encoded by
/// separate instances agree only if they see the same values in the same
/// order; seed with [`with_vocabulary`](Self::with_vocabulary) to pin it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoricalOneHot {
    vocabulary: Vec<String>,
    index: HashMap<String, usize>,
    pub normalize: bool,
}

impl CategoricalOneHot {
    pub fn new(normalize: bool) -> Self {
        Self {
            vocabulary: Vec::new(),
            index: HashMap::new(),
            normalize,
        }
    }

    /// Start from a known vocabulary; unseen values are still appended
    pub fn with_vocabulary<I, S>(vocabulary: I, normalize: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut encoder = Self::new(normalize);
        for value in vocabulary {
            encoder.observe(&value.into());
        }
        encoder
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn width(&self) -> usize {
        self.vocabulary.len()
    }

    fn observe(&mut self, value: &str) -> usize {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.vocabulary.len();
        self.vocabulary.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }
}

impl ValueTransformer for CategoricalOneHot {
    fn name(&self) -> &'static str {
        "categorical_one_hot"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let positions: Vec<usize> = values.iter().map(|v| self.observe(v)).collect();

        let mut encoded = Array2::zeros((values.len(), self.width()));
        for (row, &col) in positions.iter().enumerate() {
            encoded[[row, col]] = 1.0;
        }
        Ok(encoded)
    }

    fn normalizes(&self) -> bool {
        self.normalize
    }
}

/// Chronological rank of each distinct `YYYY-MM-DD` date.
///
/// Ranks depend on which dates the instance has seen, like the categorical
/// vocabulary. Seeded dates keep their ranks; dates outside the seed rank
/// after all of them, in chronological order among themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrdinalDateEncode {
    seeded: Vec<NaiveDate>,
    unseen: BTreeSet<NaiveDate>,
    pub normalize: bool,
}

impl OrdinalDateEncode {
    pub fn new(normalize: bool) -> Self {
        Self::default().with_normalize(normalize)
    }

    pub fn with_dates<I>(dates: I, normalize: bool) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let seeded: BTreeSet<NaiveDate> = dates.into_iter().collect();
        Self {
            seeded: seeded.into_iter().collect(),
            unseen: BTreeSet::new(),
            normalize,
        }
    }

    fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Dates in rank order: the seed, then later arrivals
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.seeded.iter().chain(self.unseen.iter()).copied().collect()
    }

    /// Dates seen since construction that were not in the seed
    pub fn unseen(&self) -> Vec<NaiveDate> {
        self.unseen.iter().copied().collect()
    }

    pub fn parse(row: usize, value: &str) -> Result<NaiveDate, TransformError> {
        NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
            .map_err(|e| TransformError::new(row, value, format!("invalid date: {}", e)))
    }

    fn rank(&self, date: &NaiveDate) -> usize {
        match self.seeded.binary_search(date) {
            Ok(rank) => rank,
            Err(_) => self.seeded.len() + self.unseen.range(..*date).count(),
        }
    }
}

impl ValueTransformer for OrdinalDateEncode {
    fn name(&self) -> &'static str {
        "ordinal_date_encode"
    }

    fn encode(&mut self, values: &[&str]) -> Result<Array2<f64>, TransformError> {
        let parsed = values
            .iter()
            .enumerate()
            .map(|(row, v)| Self::parse(row, v))
            .collect::<Result<Vec<NaiveDate>, TransformError>>()?;

        for date in &parsed {
            if self.seeded.binary_search(date).is_err() {
                self.unseen.insert(*date);
            }
        }

        let encoded = parsed.iter().map(|d| self.rank(d) as f64).collect();
        Ok(single_column(encoded))
    }

    fn normalizes(&self) -> bool {
        self.normalize
    }
}

// ============ Static column table ============

/// Externally fitted vocabularies shared by train and test builds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Categorical values in first-seen order
    pub categories: Vec<String>,
    /// Distinct dates, sorted
    pub dates: Vec<NaiveDate>,
}

/// Which encoder a column uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    NumberFill,
    CarryForwardFill,
    MarkdownFill,
    BooleanEncode,
    CategoricalOneHot,
    OrdinalDateEncode,
    MonthNormalize,
    DayNormalize,
}

impl TransformKind {
    /// The per-field lookup table
    pub fn for_field(field: Field, layout: FeatureLayout) -> Self {
        match field {
            Field::Type => TransformKind::CategoricalOneHot,
            Field::Markdown1
            | Field::Markdown2
            | Field::Markdown3
            | Field::Markdown4
            | Field::Markdown5 => TransformKind::MarkdownFill,
            Field::Cpi | Field::Unemployment => TransformKind::CarryForwardFill,
            Field::IsHoliday => TransformKind::BooleanEncode,
            Field::Month if layout == FeatureLayout::Store => TransformKind::MonthNormalize,
            Field::Day if layout == FeatureLayout::Store => TransformKind::DayNormalize,
            Field::StoreId
            | Field::DeptId
            | Field::Size
            | Field::Year
            | Field::Month
            | Field::Day
            | Field::Temperature
            | Field::FuelPrice
            | Field::WeeklySales => TransformKind::NumberFill,
        }
    }

    /// Build a fresh encoder for one column of one file
    pub fn build(
        &self,
        config: &FeatureConfig,
        vocabulary: Option<&Vocabulary>,
    ) -> Box<dyn ValueTransformer> {
        let normalize = config.normalize;
        match self {
            TransformKind::NumberFill => Box::new(NumberFill::new(config.number_fill, normalize)),
            TransformKind::CarryForwardFill => {
                Box::new(CarryForwardFill::new(config.carry_forward_fill, normalize))
            }
            TransformKind::MarkdownFill => Box::new(MarkdownFill::new(normalize)),
            TransformKind::BooleanEncode => Box::new(BooleanEncode::new(normalize)),
            TransformKind::CategoricalOneHot => match vocabulary {
                Some(vocab) => Box::new(CategoricalOneHot::with_vocabulary(
                    vocab.categories.iter().cloned(),
                    normalize,
                )),
                None => Box::new(CategoricalOneHot::new(normalize)),
            },
            TransformKind::OrdinalDateEncode => match vocabulary {
                Some(vocab) => Box::new(OrdinalDateEncode::with_dates(
                    vocab.dates.iter().copied(),
                    normalize,
                )),
                None => Box::new(OrdinalDateEncode::new(normalize)),
            },
            TransformKind::MonthNormalize => {
                Box::new(MonthNormalize::new(config.number_fill, normalize))
            }
            TransformKind::DayNormalize => Box::new(DayNormalize::new(config.number_fill, normalize)),
        }
    }
}
