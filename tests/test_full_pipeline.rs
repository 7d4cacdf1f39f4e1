//! Integration test: extracts → matrices → registry → submission

use chrono::{Duration, NaiveDate};
use sales_forecast::preprocessing::{FeatureConfig, FeatureVectorBuilder};
use sales_forecast::registry::{EntityKey, ModelRegistry};
use sales_forecast::training::{ModelEvaluator, ModelType, TrainingConfig};
use sales_forecast::utils::{
    discover_extracts, discover_partitions, extract_directory, load_matrix, partition_key, save_matrix, write_ids,
    write_submission,
};
use std::fs;
use std::path::Path;

fn extract_lines(start: NaiveDate, weeks: usize, train: bool) -> String {
    let mut out = String::new();
    for i in 0..weeks {
        let date = start + Duration::weeks(i as i64);
        let temperature = 40.0 + (i % 9) as f64 * 2.5;
        let fuel = 2.5 + (i % 5) as f64 * 0.05;
        let cpi = if i % 6 == 3 { String::new() } else { format!("{:.3}", 211.0 + i as f64 * 0.1) };
        let holiday = if i % 10 == 0 { "TRUE" } else { "FALSE" };
        let markdown = if i % 4 == 0 { "NA".to_string() } else { format!("{:.2}", 100.0 * i as f64) };
        out.push_str(&format!(
            "A,151315,{},{},{},{:.2},{:.3},{},NA,NA,NA,NA,{},8.106,{}",
            date.format("%Y"),
            date.format("%-m"),
            date.format("%-d"),
            temperature,
            fuel,
            markdown,
            cpi,
            holiday
        ));
        if train {
            let sales = 20000.0 + 150.0 * temperature - 4000.0 * fuel + if holiday == "TRUE" { 5000.0 } else { 0.0 };
            out.push_str(&format!(",{:.2}", sales));
        }
        out.push('\n');
    }
    out
}

fn write_extract(dir: &Path, key: &str, contents: String) {
    fs::write(dir.join(key), contents).unwrap();
}

#[test]
fn test_extract_train_predict_submit() {
    let train_dir = tempfile::tempdir().unwrap();
    let test_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let train_start = NaiveDate::from_ymd_opt(2010, 2, 5).unwrap();
    let test_start = NaiveDate::from_ymd_opt(2012, 11, 2).unwrap();
    write_extract(train_dir.path(), "1-1", extract_lines(train_start, 40, true));
    write_extract(train_dir.path(), "1-2", extract_lines(train_start, 30, true));
    write_extract(test_dir.path(), "1-1", extract_lines(test_start, 3, false));
    write_extract(test_dir.path(), "2-7", extract_lines(test_start, 2, false));

    let builder = FeatureVectorBuilder::new();
    assert_eq!(extract_directory(&builder, train_dir.path()).unwrap().len(), 2);
    assert_eq!(extract_directory(&builder, test_dir.path()).unwrap().len(), 2);

    // Train
    let train_parts: Vec<_> = discover_partitions(train_dir.path())
        .unwrap()
        .into_iter()
        .map(|(key, path)| (key, load_matrix(&path).unwrap()))
        .collect();
    assert_eq!(train_parts[0].1.dim(), (40, 14));

    let mut registry = ModelRegistry::with_config(TrainingConfig::new(ModelType::Ridge).with_alpha(0.5));
    let summary = registry.train_all(&train_parts).unwrap();
    assert_eq!(summary.trained, vec![EntityKey::new(1, 1), EntityKey::new(1, 2)]);

    let registry_path = out_dir.path().join("registry.bin");
    registry.save(&registry_path).unwrap();
    let registry = ModelRegistry::load(&registry_path).unwrap();

    // Predict
    let test_parts: Vec<_> = discover_partitions(test_dir.path())
        .unwrap()
        .into_iter()
        .map(|(key, path)| (key, load_matrix(&path).unwrap()))
        .collect();
    let (predictions, summary) = registry.predict_all(&test_parts).unwrap();
    assert_eq!(summary.model_backed, 1);
    assert_eq!(summary.fallback_keys, vec![EntityKey::new(2, 7)]);
    assert!(predictions[0].values.iter().all(|v| v.is_finite() && *v > 0.0));
    assert!(predictions[1].values.iter().all(|v| *v == 0.0));

    // Ids from the raw extracts agree with the registry's ids
    let mut raw_ids = Vec::new();
    for extract in discover_extracts(test_dir.path()).unwrap() {
        let records = builder.read_records(&extract).unwrap();
        raw_ids.extend(records.record_ids(partition_key(&extract)).unwrap());
    }
    let registry_ids: Vec<String> = predictions.iter().flat_map(|p| p.ids.clone()).collect();
    assert_eq!(raw_ids, registry_ids);
    assert_eq!(raw_ids[0], "1_1_2012-11-02");
    assert_eq!(raw_ids[3], "2_7_2012-11-02");

    let ids_path = out_dir.path().join("ids");
    write_ids(&ids_path, &raw_ids).unwrap();
    assert_eq!(fs::read_to_string(&ids_path).unwrap().lines().count(), 5);

    let submission = out_dir.path().join("submission.csv");
    let rows = write_submission(&submission, predictions.iter().flat_map(|p| p.rows())).unwrap();
    assert_eq!(rows, 5);
    let text = fs::read_to_string(&submission).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Id,Weekly_Sales");
    assert_eq!(lines[4], "2_7_2012-11-02,0.00");
    assert!(lines[1].starts_with("1_1_2012-11-02,"));
}

#[test]
fn test_evaluate_extracted_partition() {
    let dir = tempfile::tempdir().unwrap();
    write_extract(
        dir.path(),
        "5-9",
        extract_lines(NaiveDate::from_ymd_opt(2010, 2, 5).unwrap(), 40, true),
    );
    let matrix = FeatureVectorBuilder::new().build(&dir.path().join("5-9")).unwrap();

    let evaluator = ModelEvaluator::new(TrainingConfig::new(ModelType::Ridge).with_alpha(0.01));
    let metrics = evaluator.evaluate(&matrix.data).unwrap();
    assert_eq!(metrics.n_samples, 10);
    assert!(metrics.mae < 500.0, "MAE = {}", metrics.mae);
}

#[test]
fn test_extracted_matrix_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    write_extract(
        dir.path(),
        "3-4",
        extract_lines(NaiveDate::from_ymd_opt(2010, 2, 5).unwrap(), 20, true),
    );

    for normalize in [false, true] {
        let builder = FeatureVectorBuilder::with_config(FeatureConfig::new().with_normalize(normalize));
        let matrix = builder.build(&dir.path().join("3-4")).unwrap();

        let path = dir.path().join(format!("3-4.{}.num", normalize));
        save_matrix(&path, &matrix.data).unwrap();
        assert_eq!(load_matrix(&path).unwrap(), matrix.data, "normalize = {}", normalize);
    }
}
