//! Matrix and submission file I/O
//!
//! Numeric matrices are headerless comma-delimited files, one record per row.
//! Extract files and their matrices are named after the partition key:
//! `"{store}-{dept}"` and `"{store}-{dept}.num"`.

use crate::error::{ForecastError, Result};
use crate::preprocessing::FeatureVectorBuilder;
use crate::registry::EntityKey;
use ndarray::Array2;
use polars::prelude::{
    Column, CsvReadOptions, CsvWriter, DataFrame, DataType, PlSmallStr, Schema as FrameSchema, SerReader, SerWriter,
};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extension of numeric matrix files
pub const MATRIX_EXTENSION: &str = "num";

/// Header of the submission file
pub const SUBMISSION_HEADER: [&str; 2] = ["Id", "Weekly_Sales"];

/// Read a headerless numeric matrix
pub fn load_matrix(path: &Path) -> Result<Array2<f64>> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    let first_line = first_line.trim_end_matches(&['\r', '\n'][..]);
    if first_line.is_empty() {
        return Ok(Array2::zeros((0, 0)));
    }

    // Every column is f64; integer-looking leading rows must not fix the dtype.
    let schema: FrameSchema = (0..first_line.split(',').count())
        .map(|j| (PlSmallStr::from(format!("column_{}", j)), DataType::Float64))
        .collect();

    let df = CsvReadOptions::default()
        .with_has_header(false)
        .with_schema(Some(Arc::new(schema)))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let (n_rows, n_cols) = df.shape();
    let mut matrix = Array2::zeros((n_rows, n_cols));
    for (j, column) in df.get_columns().iter().enumerate() {
        let values = column.cast(&DataType::Float64)?;
        for (i, value) in values.f64()?.into_iter().enumerate() {
            matrix[[i, j]] = value.ok_or_else(|| {
                ForecastError::DataError(format!(
                    "{}: non-numeric value at row {}, column {}",
                    path.display(),
                    i,
                    j
                ))
            })?;
        }
    }

    debug!(path = %path.display(), rows = n_rows, cols = n_cols, "loaded matrix");
    Ok(matrix)
}

/// Write a matrix without header
pub fn save_matrix(path: &Path, matrix: &Array2<f64>) -> Result<()> {
    let columns = matrix
        .columns()
        .into_iter()
        .enumerate()
        .map(|(j, values)| Column::new(format!("column_{}", j).into(), values.to_vec()))
        .collect::<Vec<_>>();
    let mut df = DataFrame::new(columns)?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(false).finish(&mut df)?;
    debug!(path = %path.display(), rows = matrix.nrows(), cols = matrix.ncols(), "saved matrix");
    Ok(())
}

/// Partition key encoded in a file name, ignoring any extension
pub fn partition_key(path: &Path) -> Option<EntityKey> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    stem.parse().ok()
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_matrix(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(MATRIX_EXTENSION)
}

/// `"{store}-{dept}.num"` files in a directory, ordered by key
pub fn discover_partitions(dir: &Path) -> Result<Vec<(EntityKey, PathBuf)>> {
    let mut partitions: Vec<(EntityKey, PathBuf)> = list_files(dir)?
        .into_iter()
        .filter(|path| is_matrix(path))
        .filter_map(|path| partition_key(&path).map(|key| (key, path)))
        .collect();
    partitions.sort_by_key(|(key, _)| *key);
    Ok(partitions)
}

/// Raw extract files in a directory: every file that is not a matrix
pub fn discover_extracts(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_files(dir)?.into_iter().filter(|path| !is_matrix(path)).collect())
}

/// Matrix file written for an extract
pub fn matrix_path(extract: &Path) -> PathBuf {
    let mut name = extract.as_os_str().to_os_string();
    name.push(".");
    name.push(MATRIX_EXTENSION);
    PathBuf::from(name)
}

/// Build every extract in `dir` in parallel and write `{file}.num` next to it
pub fn extract_directory(builder: &FeatureVectorBuilder, dir: &Path) -> Result<Vec<PathBuf>> {
    let start = Instant::now();
    let extracts = discover_extracts(dir)?;

    let written = extracts
        .par_iter()
        .map(|extract| -> Result<PathBuf> {
            let matrix = builder.build(extract)?;
            let output = matrix_path(extract);
            save_matrix(&output, &matrix.data)?;
            Ok(output)
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        dir = %dir.display(),
        files = written.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "extracted directory"
    );
    Ok(written)
}

/// One record id per line
pub fn write_ids(path: &Path, ids: &[String]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}

/// `Id,Weekly_Sales` with predictions rounded to two decimals
pub fn write_submission<'a, I>(path: &Path, rows: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let (ids, values): (Vec<&str>, Vec<f64>) = rows.into_iter().unzip();
    let n_rows = ids.len();
    let mut df = DataFrame::new(vec![
        Column::new(SUBMISSION_HEADER[0].into(), ids),
        Column::new(SUBMISSION_HEADER[1].into(), values),
    ])?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_float_precision(Some(2))
        .finish(&mut df)?;
    info!(path = %path.display(), rows = n_rows, "wrote submission");
    Ok(n_rows)
}
