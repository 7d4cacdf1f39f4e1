//! Integration test: per-partition training, fallback and persistence

use ndarray::{s, Array2};
use sales_forecast::error::ForecastError;
use sales_forecast::registry::{EntityKey, ModelRegistry, PredictionSource};
use sales_forecast::training::{Model, ModelType, SGDConfig, TrainingConfig};

/// `year, month, day, x0, x1, target` with target = 3*x0 - 2*x1 + 50
fn partition(n: usize, offset: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, 6), |(i, j)| {
        let x0 = ((i * i) % 11) as f64 + offset;
        let x1 = ((i * 7) % 5) as f64;
        match j {
            0 => 2011.0,
            1 => 1.0 + (i / 4) as f64,
            2 => 1.0 + 7.0 * (i % 4) as f64,
            3 => x0,
            4 => x1,
            _ => 3.0 * x0 - 2.0 * x1 + 50.0,
        }
    })
}

fn features(matrix: &Array2<f64>) -> Array2<f64> {
    matrix.slice(s![.., ..5]).to_owned()
}

#[test]
fn test_partitions_are_independent() {
    let mut registry = ModelRegistry::with_config(TrainingConfig::new(ModelType::Linear));
    let a = EntityKey::new(1, 1);
    let b = EntityKey::new(1, 2);
    registry.train(a, &partition(16, 0.0)).unwrap();
    registry.train(b, &partition(16, 100.0)).unwrap();

    let before = registry.predict(a, &features(&partition(4, 0.0))).unwrap();
    registry.train(b, &partition(20, -50.0)).unwrap();
    let after = registry.predict(a, &features(&partition(4, 0.0))).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_linear_partition_recovers_signal() {
    let mut registry = ModelRegistry::with_config(TrainingConfig::new(ModelType::Linear));
    let key = EntityKey::new(7, 3);
    let train = partition(24, 0.0);
    registry.train(key, &train).unwrap();

    let prediction = registry.predict(key, &features(&train)).unwrap();
    for (p, y) in prediction.values.iter().zip(train.column(5).iter()) {
        assert!((p - y).abs() < 1e-4, "{} vs {}", p, y);
    }
    assert_eq!(prediction.ids[0], "7_3_2011-01-01");
    assert_eq!(prediction.ids[5], "7_3_2011-02-08");
}

#[test]
fn test_sgd_default_model_trains() {
    let config = TrainingConfig::default().with_sgd(SGDConfig::default().with_max_iter(50));
    let mut registry = ModelRegistry::with_config(config);
    let key = EntityKey::new(2, 2);
    registry.train(key, &partition(30, 0.0)).unwrap();

    let entry = registry.get(&key).unwrap();
    assert_eq!(entry.model.name(), "sgdr");
    let prediction = registry.predict(key, &features(&partition(3, 0.0))).unwrap();
    assert!(prediction.values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_fallback_and_insufficient_rows() {
    let config = TrainingConfig::new(ModelType::Ridge).with_min_rows(5);
    let mut registry = ModelRegistry::with_config(config);

    let result = registry.train(EntityKey::new(1, 1), &partition(4, 0.0));
    assert!(matches!(result, Err(ForecastError::DataInsufficient { required: 5, actual: 4, .. })));

    let prediction = registry.predict(EntityKey::new(1, 1), &features(&partition(4, 0.0))).unwrap();
    assert_eq!(prediction.source, PredictionSource::Fallback);
    assert!(prediction.values.iter().all(|v| *v == 0.0));
    assert_eq!(prediction.ids.len(), 4);
}

#[test]
fn test_bulk_train_predict_and_persist() {
    let mut registry = ModelRegistry::with_config(TrainingConfig::new(ModelType::Ridge).with_alpha(0.1));
    let partitions: Vec<(EntityKey, Array2<f64>)> = (1..=6)
        .map(|dept| (EntityKey::new(1, dept), partition(if dept == 4 { 1 } else { 12 }, dept as f64)))
        .collect();

    let summary = registry.train_all(&partitions).unwrap();
    assert_eq!(summary.trained.len(), 5);
    assert_eq!(summary.skipped, vec![EntityKey::new(1, 4)]);
    assert_eq!(registry.len(), 5);

    let requests: Vec<(EntityKey, Array2<f64>)> =
        partitions.iter().map(|(key, m)| (*key, features(m))).collect();
    let (predictions, summary) = registry.predict_all(&requests).unwrap();
    assert_eq!(predictions.len(), 6);
    assert_eq!(summary.model_backed, 5);
    assert_eq!(summary.fallback_keys, vec![EntityKey::new(1, 4)]);
    for (prediction, (key, matrix)) in predictions.iter().zip(&requests) {
        assert_eq!(prediction.key, *key);
        assert_eq!(prediction.len(), matrix.nrows());
    }

    let means = registry.coefficient_means().unwrap().unwrap();
    assert_eq!(means.len(), 5);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.bin");
    registry.save(&path).unwrap();
    let restored = ModelRegistry::load(&path).unwrap();
    assert_eq!(restored.len(), 5);
    assert_eq!(restored.config(), registry.config());
    let (again, _) = restored.predict_all(&requests).unwrap();
    assert_eq!(again, predictions);
}
