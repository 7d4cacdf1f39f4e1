//! Integration test: raw extracts to feature matrices

use sales_forecast::error::ForecastError;
use sales_forecast::preprocessing::{FeatureConfig, FeatureLayout, FeatureVectorBuilder, SchemaKind};
use sales_forecast::registry::EntityKey;
use std::fs;
use std::path::{Path, PathBuf};

const ENTITY_TRAIN: &str = "\
A,151315,2010,2,5,42.31,2.572,NA,NA,NA,NA,NA,211.0963582,8.106,FALSE,24924.5
A,151315,2010,2,12,38.51,2.548,NA,NA,NA,NA,NA,,8.106,TRUE,46039.49
A,151315,2010,2,19,,2.514,NA,NA,NA,NA,NA,211.2891429,,FALSE,41595.55
A,151315,2010,2,26,46.63,2.561,NA,NA,NA,NA,NA,211.3196429,8.106,FALSE,19403.54
";

const ENTITY_TEST: &str = "\
A,151315,2012,11,2,55.32,3.386,6766.44,5147.7,50.82,3639.9,2737.42,223.4627793,6.573,FALSE
A,151315,2012,11,9,61.24,3.314,11421.32,3370.89,40.28,4646.79,6154.16,223.4813073,6.573,FALSE
";

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_schema_follows_column_count() {
    let dir = tempfile::tempdir().unwrap();
    let train = write(dir.path(), "1-1", ENTITY_TRAIN);
    let test = write(dir.path(), "1-1.test", ENTITY_TEST);
    let builder = FeatureVectorBuilder::new();

    assert_eq!(builder.resolve_schema(&train).unwrap().kind(), SchemaKind::Train);
    assert_eq!(builder.resolve_schema(&test).unwrap().kind(), SchemaKind::Test);
}

#[test]
fn test_unknown_width_is_a_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "bad", "A,1,2010,2,5\n");

    match FeatureVectorBuilder::new().build(&path) {
        Err(ForecastError::SchemaError { actual, .. }) => assert_eq!(actual, 5),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_train_file_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "1-1", ENTITY_TRAIN);
    let matrix = FeatureVectorBuilder::new().build(&path).unwrap();

    assert_eq!(matrix.nrows(), 4);
    assert_eq!(matrix.ncols(), 14);
    // empty temperature falls back to 0
    assert_eq!(matrix.data[[2, 3]], 0.0);
    // empty cpi and unemployment repeat the previous row
    assert_eq!(matrix.data[[1, 10]], 211.0963582);
    assert_eq!(matrix.data[[2, 11]], 8.106);
    // NA markdowns are 0
    assert!(matrix.data.column(5).iter().all(|v| *v == 0.0));
    assert_eq!(matrix.target().unwrap()[3], 19403.54);
}

#[test]
fn test_test_file_ids_use_file_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "3-14", ENTITY_TEST);
    let builder = FeatureVectorBuilder::new();

    let records = builder.read_records(&path).unwrap();
    let ids = records.record_ids(Some(EntityKey::new(3, 14))).unwrap();
    assert_eq!(ids, vec!["3_14_2012-11-02", "3_14_2012-11-09"]);

    let matrix = builder.build(&path).unwrap();
    assert!(!matrix.has_target);
    assert_eq!(matrix.ncols(), 13);
}

#[test]
fn test_shared_vocabulary_aligns_store_files() {
    let dir = tempfile::tempdir().unwrap();
    let train = write(
        dir.path(),
        "train",
        "1,1,A,151315,2010,2,5,42.31,2.572,NA,NA,NA,NA,NA,211.09,8.106,FALSE,100\n\
         2,1,B,202307,2010,2,5,40.19,2.572,NA,NA,NA,NA,NA,210.75,8.324,FALSE,200\n",
    );
    let test = write(
        dir.path(),
        "test",
        "2,1,B,202307,2012,11,2,55.32,3.386,NA,NA,NA,NA,NA,223.46,6.573,FALSE\n",
    );

    let config = FeatureConfig::new().with_layout(FeatureLayout::Store);
    let local = FeatureVectorBuilder::with_config(config.clone()).build(&test).unwrap();
    assert_eq!(local.column_names[2], "type=B");

    let builder = FeatureVectorBuilder::with_config(config);
    let vocabulary = builder.fit_vocabulary(&[&train, &test]).unwrap();
    assert_eq!(vocabulary.categories, vec!["A", "B"]);
    assert_eq!(vocabulary.dates.len(), 2);

    let builder = builder.with_vocabulary(vocabulary);
    let train_matrix = builder.build(&train).unwrap();
    let test_matrix = builder.build(&test).unwrap();
    assert_eq!(
        train_matrix.column_names[..test_matrix.ncols()],
        test_matrix.column_names[..]
    );
    assert_eq!(test_matrix.data.row(0).to_vec()[2..4], [0.0, 1.0]);
}

#[test]
fn test_build_many_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "1-1", ENTITY_TRAIN);
    let b = write(dir.path(), "1-2", ENTITY_TEST);

    let matrices = FeatureVectorBuilder::new().build_many(&[a, b]).unwrap();
    assert_eq!(matrices.len(), 2);
    assert!(matrices[0].has_target);
    assert!(!matrices[1].has_target);
}
