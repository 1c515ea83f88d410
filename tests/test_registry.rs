//! Integration test: model registry over both store backends

use model_serve::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn sample() -> (Vec<Vec<f64>>, Vec<f64>) {
    let features: Vec<Vec<f64>> = (0..40)
        .map(|i| {
            let x = i as f64 / 4.0;
            vec![x, (x * 0.7).sin()]
        })
        .collect();
    let labels = features.iter().map(|r| 2.0 * r[0] - r[1] + 0.5).collect();
    (features, labels)
}

async fn bucket_registry() -> (ObjectStorage, ModelRegistry) {
    let storage = ObjectStorage::in_memory();
    storage.create_bucket("models").await.unwrap();
    let store = BucketModelStore::new(storage.clone(), "models");
    (storage, ModelRegistry::new(Arc::new(store)))
}

#[tokio::test]
async fn test_every_kind_trains_and_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::new(Arc::new(LocalModelStore::new(dir.path()).unwrap()));
    let (features, labels) = sample();

    for kind in ModelKind::ALL {
        let outcome = registry
            .train(TrainRequest::new(kind.as_str(), features.clone(), labels.clone()))
            .await
            .unwrap();
        assert_eq!(outcome.kind, kind);
        assert_eq!(outcome.n_samples, 40);
        assert!(outcome.metrics.r2 > 0.8, "{kind} r2 = {}", outcome.metrics.r2);

        let predictions = registry.predict(kind.as_str(), &features[..5]).await.unwrap();
        assert_eq!(predictions.len(), 5);
    }
}

#[tokio::test]
async fn test_bucket_store_round_trip() {
    let (storage, registry) = bucket_registry().await;
    let (features, labels) = sample();

    registry
        .train(TrainRequest::new("LinReg", features.clone(), labels).with_name("house-prices"))
        .await
        .unwrap();
    assert_eq!(storage.list_objects("models").await.unwrap(), vec!["house-prices.bin"]);

    // A fresh registry over the same bucket loads the artifact
    let reloaded = ModelRegistry::new(Arc::new(BucketModelStore::new(storage.clone(), "models")));
    let a = registry.predict("house-prices", &features[..3]).await.unwrap();
    let b = reloaded.predict("house-prices", &features[..3]).await.unwrap();
    assert_eq!(a, b);

    reloaded.delete("house-prices").await.unwrap();
    assert!(storage.list_objects("models").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupted_artifact_rejected() {
    let (storage, registry) = bucket_registry().await;
    storage
        .save_model("models", "broken.bin", b"not a model".to_vec())
        .await
        .unwrap();

    let err = registry.predict("broken", &[vec![1.0]]).await.unwrap_err();
    assert!(matches!(err, ServingError::SerializationError(_)));
}

#[tokio::test]
async fn test_retrain_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::new(Arc::new(LocalModelStore::new(dir.path()).unwrap()));

    registry
        .train(TrainRequest::new("LinReg", vec![vec![1.0], vec![2.0], vec![3.0]], vec![1.0, 2.0, 3.0]))
        .await
        .unwrap();
    registry
        .train(TrainRequest::new("LinReg", vec![vec![1.0], vec![2.0], vec![3.0]], vec![2.0, 4.0, 6.0]))
        .await
        .unwrap();

    let fresh = ModelRegistry::new(Arc::new(LocalModelStore::new(dir.path()).unwrap()));
    let predictions = fresh.predict("LinReg", &[vec![4.0]]).await.unwrap();
    assert!((predictions[0] - 8.0).abs() < 1e-6);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prediction_length_matches_rows(
        rows in prop::collection::vec(prop::collection::vec(-100.0f64..100.0, 3), 0..50)
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let predictions = runtime.block_on(async {
            let (_storage, registry) = bucket_registry().await;
            let features = vec![
                vec![1.0, 0.0, 2.0],
                vec![0.0, 1.0, 1.0],
                vec![2.0, 1.0, 0.0],
                vec![1.0, 3.0, 1.0],
                vec![4.0, 1.0, 2.0],
            ];
            registry
                .train(TrainRequest::new("LinReg", features, vec![1.0, 2.0, 3.0, 4.0, 5.0]))
                .await
                .unwrap();
            registry.predict("LinReg", &rows).await.unwrap()
        });

        prop_assert_eq!(predictions.len(), rows.len());
        prop_assert!(predictions.iter().all(|p| p.is_finite()));
    }
}
