//! Sales forecast CLI Module
//!
//! Command-line interface for feature extraction, per-partition training,
//! prediction and the evaluation reports.

use clap::{Parser, Subcommand};
use colored::*;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::ForecastError;
use crate::preprocessing::{FeatureConfig, FeatureLayout, FeatureVectorBuilder, ScalerType};
use crate::registry::{EntityKey, ModelRegistry};
use crate::training::{split_target, ModelEvaluator, ModelType, TargetStats, TrainingConfig};
use crate::utils::{
    discover_extracts, discover_partitions, extract_directory, load_matrix, matrix_path, partition_key,
    save_matrix, write_ids, write_submission,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", "!".yellow(), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sales-forecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Per-store/department weekly sales feature extraction and regression")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn raw extracts into numeric matrices (`{file}.num`)
    Extract {
        /// Extract file or directory of extracts
        #[arg(short, long)]
        input: PathBuf,

        /// Record layout (entity, store)
        #[arg(long, default_value = "entity")]
        layout: String,

        /// Normalize feature columns
        #[arg(long)]
        normalize: bool,

        /// Append the chronological date rank column
        #[arg(long)]
        date_rank: bool,

        /// Fit one categorical/date vocabulary over all inputs first
        #[arg(long)]
        shared_vocabulary: bool,

        /// FeatureConfig JSON; flags above are ignored when given
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write the record ids of test extracts, one per line
    Ids {
        /// Extract file or directory of extracts
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Record layout (entity, store)
        #[arg(long, default_value = "entity")]
        layout: String,
    },

    /// Train one model per partition matrix and save the registry
    Train {
        /// Training matrix or directory of `{store}-{dept}.num` files
        #[arg(short, long)]
        data: PathBuf,

        /// Output registry file
        #[arg(short, long)]
        output: PathBuf,

        /// Model type (sgdr, linear, ridge, lasso, elastic)
        #[arg(short, long)]
        model: Option<String>,

        /// Scaler type (standard, minmax, robust, maxabs, none)
        #[arg(long)]
        scaler: Option<String>,

        /// TrainingConfig JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Predict test matrices and write a submission file
    Predict {
        /// Trained registry file
        #[arg(short, long)]
        registry: PathBuf,

        /// Test matrix or directory of `{store}-{dept}.num` files
        #[arg(short, long)]
        data: PathBuf,

        /// Submission output file
        #[arg(short, long)]
        output: PathBuf,

        /// Year, month and day column positions, e.g. "0,1,2"
        #[arg(long)]
        date_columns: Option<String>,
    },

    /// Hold-out evaluation of each partition
    Evaluate {
        /// Training matrix or directory of `{store}-{dept}.num` files
        #[arg(short, long)]
        data: PathBuf,

        /// Model type (sgdr, linear, ridge, lasso, elastic)
        #[arg(short, long)]
        model: Option<String>,

        /// TrainingConfig JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Summary statistics of the target column
    TargetStats {
        /// Training matrix or directory of `{store}-{dept}.num` files
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Mean model coefficients across partitions
    Weights {
        /// Trained registry file
        #[arg(short, long)]
        registry: PathBuf,
    },
}

// ─── Input helpers ─────────────────────────────────────────────────────────────

/// Deserialize a JSON config file
pub fn load_config<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ForecastError::ConfigError(format!("{}: {}", path.display(), e)))?;
    let config = serde_json::from_str(&text)
        .map_err(|e| ForecastError::ConfigError(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

fn training_config(
    config: Option<&Path>,
    model: Option<&str>,
    scaler: Option<&str>,
) -> anyhow::Result<TrainingConfig> {
    let mut config = match config {
        Some(path) => load_config(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(model) = model {
        config = config.with_model(model.parse::<ModelType>()?);
    }
    if let Some(scaler) = scaler {
        config = config.with_scaler(scaler.parse::<ScalerType>()?);
    }
    config.validate()?;
    Ok(config)
}

/// Matrix files keyed by partition: a directory, or one keyed file
fn partition_inputs(path: &Path) -> anyhow::Result<Vec<(EntityKey, PathBuf)>> {
    if path.is_dir() {
        return Ok(discover_partitions(path)?);
    }
    let key = partition_key(path)
        .ok_or_else(|| anyhow::anyhow!("cannot read a store-dept key from {}", path.display()))?;
    Ok(vec![(key, path.to_path_buf())])
}

fn load_partitions(path: &Path) -> anyhow::Result<Vec<(EntityKey, ndarray::Array2<f64>)>> {
    partition_inputs(path)?
        .into_iter()
        .map(|(key, file)| Ok((key, load_matrix(&file)?)))
        .collect()
}

fn extract_inputs(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_dir() {
        Ok(discover_extracts(path)?)
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

fn parse_date_columns(s: &str) -> anyhow::Result<[usize; 3]> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [year, month, day] => Ok([*year, *month, *day]),
        _ => anyhow::bail!("expected three comma-separated positions, got {:?}", s),
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_extract(
    input: &Path,
    layout: &str,
    normalize: bool,
    date_rank: bool,
    shared_vocabulary: bool,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    section("Extract");

    let config = match config {
        Some(path) => load_config(path)?,
        None => FeatureConfig::new()
            .with_layout(layout.parse::<FeatureLayout>()?)
            .with_normalize(normalize)
            .with_date_rank(date_rank),
    };
    let mut builder = FeatureVectorBuilder::with_config(config);

    if shared_vocabulary {
        step_run("Fitting shared vocabulary");
        let vocabulary = builder.fit_vocabulary(&extract_inputs(input)?)?;
        step_done(&format!(
            "{} categories, {} dates",
            vocabulary.categories.len(),
            vocabulary.dates.len()
        ));
        builder = builder.with_vocabulary(vocabulary);
    }

    step_run(&format!("Extracting {}", input.display()));
    let start = Instant::now();
    let written = if input.is_dir() {
        extract_directory(&builder, input)?
    } else {
        let matrix = builder.build(input)?;
        let output = matrix_path(input);
        save_matrix(&output, &matrix.data)?;
        vec![output]
    };
    step_done(&format!("{} files in {:?}", written.len(), start.elapsed()));

    println!();
    Ok(())
}

pub fn cmd_ids(input: &Path, output: &Path, layout: &str) -> anyhow::Result<()> {
    section("Ids");

    let builder = FeatureVectorBuilder::with_config(FeatureConfig::new().with_layout(layout.parse::<FeatureLayout>()?));
    let mut ids = Vec::new();
    for extract in extract_inputs(input)? {
        let records = builder.read_records(&extract)?;
        ids.extend(records.record_ids(partition_key(&extract))?);
    }

    write_ids(output, &ids)?;
    step_ok(&format!("{} ids → {}", ids.len(), output.display()));
    println!();
    Ok(())
}

pub fn cmd_train(
    data: &Path,
    output: &Path,
    model: Option<&str>,
    scaler: Option<&str>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let config = training_config(config, model, scaler)?;

    step_run("Loading partitions");
    let start = Instant::now();
    let partitions = load_partitions(data)?;
    step_done(&format!("{} partitions in {:?}", partitions.len(), start.elapsed()));

    step_run(&format!("Training {}", config.model_type.name().cyan()));
    let start = Instant::now();
    let mut registry = ModelRegistry::with_config(config);
    let summary = registry.train_all(&partitions)?;
    step_done(&format!("{:?}", start.elapsed()));

    registry.save(output)?;

    println!();
    line_box_top();
    line_box(&kv("Model    ", registry.config().model_type.name()));
    line_box(&kv("Trained  ", &summary.trained.len().to_string()));
    line_box(&kv("Skipped  ", &summary.skipped.len().to_string()));
    line_box(&kv("Registry ", &output.display().to_string()));
    line_box_bottom();

    for key in &summary.skipped {
        step_warn(&format!("{} has fewer than {} rows", key, registry.config().min_rows));
    }
    println!();
    Ok(())
}

pub fn cmd_predict(
    registry_path: &Path,
    data: &Path,
    output: &Path,
    date_columns: Option<&str>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading registry");
    let mut registry = ModelRegistry::load(registry_path)?;
    if let Some(columns) = date_columns {
        registry.set_date_columns(parse_date_columns(columns)?);
    }
    step_done(&format!("{} partitions", registry.len()));

    step_run("Predicting");
    let start = Instant::now();
    let partitions = load_partitions(data)?;
    let (predictions, summary) = registry.predict_all(&partitions)?;
    step_done(&format!("{:?}", start.elapsed()));

    let rows = write_submission(output, predictions.iter().flat_map(|p| p.rows()))?;

    println!();
    println!("  {:<16} {}", muted("Rows"), rows.to_string().white().bold());
    println!("  {:<16} {}", muted("Model-backed"), summary.model_backed.to_string().white());
    println!("  {:<16} {}", muted("Fallback"), summary.fallback.to_string().white());
    for key in &summary.fallback_keys {
        step_warn(&format!("{} has no trained model, predicted zeros", key));
    }
    println!();
    Ok(())
}

pub fn cmd_evaluate(data: &Path, model: Option<&str>, config: Option<&Path>) -> anyhow::Result<()> {
    section("Evaluate");

    let config = training_config(config, model, None)?;
    let evaluator = ModelEvaluator::new(config);

    println!("  {:<10} {:>12} {:>12} {:>8}", muted("Partition"), muted("MAE"), muted("RMSE"), muted("R²"));
    println!("  {}", dim(&"─".repeat(46)));

    let mut maes = Vec::new();
    for (key, matrix) in load_partitions(data)? {
        match evaluator.evaluate(&matrix) {
            Ok(metrics) => {
                println!("  {:<10} {:>12.2} {:>12.2} {:>8.4}", key.to_string(), metrics.mae, metrics.rmse, metrics.r2);
                maes.push(metrics.mae);
            }
            Err(ForecastError::DataInsufficient { actual, .. }) => {
                println!("  {:<10} {:>12}", key.to_string(), dim(&format!("{} rows", actual)));
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("  {}", dim(&"─".repeat(46)));
    if !maes.is_empty() {
        let mean = maes.iter().sum::<f64>() / maes.len() as f64;
        println!("  {} {} {:.2}", ok("mean"), muted("MAE:"), mean);
    }
    println!();
    Ok(())
}

pub fn cmd_target_stats(data: &Path) -> anyhow::Result<()> {
    section("Target");

    println!(
        "  {:<10} {:>8} {:>12} {:>12} {:>12} {:>12}",
        muted("Partition"), muted("Rows"), muted("Min"), muted("Max"), muted("Mean"), muted("Std")
    );
    println!("  {}", dim(&"─".repeat(72)));

    for (key, matrix) in load_partitions(data)? {
        if matrix.nrows() == 0 {
            continue;
        }
        let (_, target) = split_target(&matrix)?;
        let stats = TargetStats::compute(&target)?;
        println!(
            "  {:<10} {:>8} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            key.to_string(), stats.count, stats.min, stats.max, stats.mean, stats.std
        );
    }
    println!();
    Ok(())
}

pub fn cmd_weights(registry_path: &Path) -> anyhow::Result<()> {
    section("Weights");

    let registry = ModelRegistry::load(registry_path)?;
    match registry.coefficient_means()? {
        Some(means) => {
            for (i, weight) in means.iter().enumerate() {
                println!("  {:<8} {:>14.6}", muted(&format!("w{}", i)), weight);
            }
        }
        None => step_warn("no trained partition exposes coefficients"),
    }
    println!();
    Ok(())
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Extract { input, layout, normalize, date_rank, shared_vocabulary, config } => {
            cmd_extract(&input, &layout, normalize, date_rank, shared_vocabulary, config.as_deref())
        }
        Commands::Ids { input, output, layout } => cmd_ids(&input, &output, &layout),
        Commands::Train { data, output, model, scaler, config } => {
            cmd_train(&data, &output, model.as_deref(), scaler.as_deref(), config.as_deref())
        }
        Commands::Predict { registry, data, output, date_columns } => {
            cmd_predict(&registry, &data, &output, date_columns.as_deref())
        }
        Commands::Evaluate { data, model, config } => cmd_evaluate(&data, model.as_deref(), config.as_deref()),
        Commands::TargetStats { data } => cmd_target_stats(&data),
        Commands::Weights { registry } => cmd_weights(&registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_columns() {
        assert_eq!(parse_date_columns("5, 6,7").unwrap(), [5, 6, 7]);
        assert!(parse_date_columns("1,2").is_err());
        assert!(parse_date_columns("a,b,c").is_err());
    }

    #[test]
    fn test_training_config_overrides() {
        let config = training_config(None, Some("ridge"), Some("minmax")).unwrap();
        assert_eq!(config.model_type, ModelType::Ridge);
        assert_eq!(config.scaler, ScalerType::MinMax);
        assert!(training_config(None, Some("forest"), None).is_err());
    }

    #[test]
    fn test_bad_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training.json");
        std::fs::write(&path, "{ \"model_type\": ").unwrap();

        let err = load_config::<TrainingConfig>(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<ForecastError>(), Some(ForecastError::ConfigError(_))));

        let missing = dir.path().join("missing.json");
        let err = load_config::<TrainingConfig>(&missing).unwrap_err();
        assert!(matches!(err.downcast_ref::<ForecastError>(), Some(ForecastError::ConfigError(_))));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["sales-forecast", "train", "-d", "parts", "-o", "reg.bin", "-m", "linear"]).unwrap();
        assert!(matches!(cli.command, Commands::Train { .. }));
        let cli = Cli::try_parse_from(["sales-forecast", "target-stats", "-d", "1-1.num"]).unwrap();
        assert!(matches!(cli.command, Commands::TargetStats { .. }));
    }
}
