//! Record schemas and the column-count schema resolver
//!
//! Raw extracts carry no header. Field names are injected positionally from
//! the schema resolved for the file, and the schema is chosen purely from the
//! number of fields on the first line.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named field of a raw sales record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    StoreId,
    DeptId,
    Type,
    Size,
    Year,
    Month,
    Day,
    Temperature,
    FuelPrice,
    Markdown1,
    Markdown2,
    Markdown3,
    Markdown4,
    Markdown5,
    Cpi,
    Unemployment,
    IsHoliday,
    WeeklySales,
}

impl Field {
    /// Column name used for the field
    pub fn name(&self) -> &'static str {
        match self {
            Field::StoreId => "store_id",
            Field::DeptId => "dept_id",
            Field::Type => "type",
            Field::Size => "size",
            Field::Year => "year",
            Field::Month => "month",
            Field::Day => "day",
            Field::Temperature => "temperature",
            Field::FuelPrice => "fuel_price",
            Field::Markdown1 => "markdown1",
            Field::Markdown2 => "markdown2",
            Field::Markdown3 => "markdown3",
            Field::Markdown4 => "markdown4",
            Field::Markdown5 => "markdown5",
            Field::Cpi => "cpi",
            Field::Unemployment => "unemployment",
            Field::IsHoliday => "is_holiday",
            Field::WeeklySales => "weekly_sales",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The training target, appended after the test fields
pub const TARGET: Field = Field::WeeklySales;

/// Fields of a per-(store, department) extract; the key lives in the file name.
pub const ENTITY_TEST_FEATURES: [Field; 15] = [
    Field::Type,
    Field::Size,
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

/// Fields of the full joined extract, one row per store, department and week.
pub const STORE_TEST_FEATURES: [Field; 17] = [
    Field::StoreId,
    Field::DeptId,
    Field::Type,
    Field::Size,
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

/// Which raw record layout a run consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FeatureLayout {
    /// Per-(store, department) extracts
    #[default]
    Entity,
    /// Full joined extract with store and department columns
    Store,
}

impl FeatureLayout {
    /// Ordered test fields (no target) for this layout
    pub fn test_features(&self) -> &'static [Field] {
        match self {
            FeatureLayout::Entity => &ENTITY_TEST_FEATURES,
            FeatureLayout::Store => &STORE_TEST_FEATURES,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeatureLayout::Entity => "entity",
            FeatureLayout::Store => "store",
        }
    }
}

impl FromStr for FeatureLayout {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "entity" | "dept" | "department" => Ok(FeatureLayout::Entity),
            "store" | "full" => Ok(FeatureLayout::Store),
            other => Err(ForecastError::InvalidParameter {
                name: "layout".to_string(),
                value: other.to_string(),
                reason: "expected one of: entity, store".to_string(),
            }),
        }
    }
}

/// Whether a file carries the target column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaKind {
    Train,
    Test,
}

/// Ordered field list resolved for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    layout: FeatureLayout,
    kind: SchemaKind,
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(layout: FeatureLayout, kind: SchemaKind) -> Self {
        let mut fields = layout.test_features().to_vec();
        if kind == SchemaKind::Train {
            fields.push(TARGET);
        }
        Self { layout, kind, fields }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// True if the schema ends with the target column
    pub fn is_train(&self) -> bool {
        self.kind == SchemaKind::Train
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a field in the raw record, if the schema has it
    pub fn position(&self, field: Field) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.position(field).is_some()
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name()).collect()
    }
}

/// Classifies a file as train or test from its field count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemaResolver {
    layout: FeatureLayout,
}

impl SchemaResolver {
    pub fn new(layout: FeatureLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    /// Resolve the schema for a file with `n_columns` fields per record.
    ///
    /// The returned `SchemaError` names no file; callers attach one with
    /// [`ForecastError::in_file`].
    pub fn resolve(&self, n_columns: usize) -> Result<Schema> {
        let n_test = self.layout.test_features().len();

        if n_columns == n_test {
            Ok(Schema::new(self.layout, SchemaKind::Test))
        } else if n_columns == n_test + 1 {
            Ok(Schema::new(self.layout, SchemaKind::Train))
        } else {
            Err(ForecastError::SchemaError {
                file: String::new(),
                expected: format!("{} (test) or {} (train)", n_test, n_test + 1),
                actual: n_columns,
            })
        }
    }

    /// Resolve from the first raw line of a file
    pub fn resolve_line(&self, line: &str) -> Result<Schema> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let n_columns = if line.is_empty() { 0 } else { line.split(',').count() };
        self.resolve(n_columns)
    }
}

impl ForecastError {
    /// Attach the offending file to schema and value errors
    pub fn in_file(self, file: &str) -> Self {
        match self {
            ForecastError::SchemaError { expected, actual, .. } => ForecastError::SchemaError {
                file: file.to_string(),
                expected,
                actual,
            },
            ForecastError::ValueError { column, source, .. } => ForecastError::ValueError {
                file: file.to_string(),
                column,
                source,
            },
            other => other,
        }
    }
}
