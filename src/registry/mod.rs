//! Model registry
//!
//! Dispatches training requests to the matching algorithm, keeps trained
//! instances in memory and delegates persistence to a [`ModelStore`].

use chrono::Utc;
use ndarray::Array1;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, ServingError};
use crate::store::{validate_name, ModelStore};
use crate::training::{self, artifact, ArtifactMetadata, Hyperparameters, ModelKind, ModelMetrics, TrainedModel};

/// Inputs for a single training call
#[derive(Debug, Clone)]
pub struct TrainRequest {
    /// Kind name as supplied by the caller; resolved case-insensitively
    pub kind: String,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    pub params: Option<Hyperparameters>,
    /// Write the artifact to the store
    pub persist: bool,
    /// Artifact name; defaults to the canonical kind name
    pub save_as: Option<String>,
}

impl TrainRequest {
    pub fn new(kind: impl Into<String>, features: Vec<Vec<f64>>, labels: Vec<f64>) -> Self {
        Self {
            kind: kind.into(),
            features,
            labels,
            params: None,
            persist: true,
            save_as: None,
        }
    }

    pub fn with_params(mut self, params: Hyperparameters) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.save_as = Some(name.into());
        self
    }
}

/// Acknowledgment returned after training
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutcome {
    pub name: String,
    pub kind: ModelKind,
    pub n_samples: usize,
    pub n_features: usize,
    pub persisted: bool,
    pub metrics: ModelMetrics,
}

/// In-memory models plus a per-name generation
///
/// Every write to a name (train, delete) bumps its generation. A store load
/// only populates the cache if the generation it started under is still
/// current, so a concurrent retrain is never overwritten by an older artifact.
#[derive(Default)]
struct ModelCache {
    models: HashMap<String, Arc<TrainedModel>>,
    generations: HashMap<String, u64>,
}

impl ModelCache {
    fn generation(&self, name: &str) -> u64 {
        self.generations.get(name).copied().unwrap_or(0)
    }

    fn bump(&mut self, name: &str) {
        *self.generations.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Trains, caches and serves regression models
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    cache: RwLock<ModelCache>,
    /// Serializes store writes with their cache update
    writes: Mutex<()>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(ModelCache::default()),
            writes: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    /// Supported model kinds
    pub fn list(&self) -> Vec<&'static str> {
        ModelKind::names()
    }

    /// Names of models currently held in memory
    pub fn loaded(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.read().models.keys().cloned().collect();
        names.sort();
        names
    }

    /// Fit a model and keep it under its artifact name
    pub async fn train(&self, request: TrainRequest) -> Result<TrainOutcome> {
        let kind: ModelKind = request.kind.parse()?;
        let name = request
            .save_as
            .clone()
            .unwrap_or_else(|| kind.as_str().to_string());
        validate_name(&name)?;

        let mut model = training::build_model(kind, request.params.as_ref())?;
        let x = training::to_matrix(&request.features)?;
        let y = Array1::from(request.labels);
        let (n_samples, n_features) = x.dim();

        info!(model = %name, %kind, n_samples, n_features, "Training model");

        let (model, metrics) = tokio::task::spawn_blocking(move || {
            let metrics = training::fit(&mut model, &x, &y)?;
            Ok::<_, ServingError>((model, metrics))
        })
        .await
        .map_err(|e| ServingError::TrainingError(format!("training task failed: {}", e)))??;

        let _write = self.writes.lock().await;
        if request.persist {
            let metadata = ArtifactMetadata {
                name: name.clone(),
                kind,
                n_features,
                n_samples,
                hyperparameters: serde_json::Value::Object(request.params.unwrap_or_default())
                    .to_string(),
                trained_at: Utc::now().to_rfc3339(),
            };
            let bytes = artifact::encode(&model, metadata)?;
            self.store.put(&name, bytes).await?;
            debug!(model = %name, scope = %self.store.scope(), "Artifact persisted");
        }

        {
            let mut cache = self.cache.write();
            cache.bump(&name);
            cache.models.insert(name.clone(), Arc::new(model));
        }

        info!(
            model = %name,
            r2 = metrics.r2,
            rmse = metrics.rmse,
            secs = metrics.training_time_secs,
            persisted = request.persist,
            "Model trained"
        );

        Ok(TrainOutcome {
            name,
            kind,
            n_samples,
            n_features,
            persisted: request.persist,
            metrics,
        })
    }

    async fn resolve(&self, name: &str) -> Result<Arc<TrainedModel>> {
        let (cached, generation) = {
            let cache = self.cache.read();
            (cache.models.get(name).cloned(), cache.generation(name))
        };
        if let Some(model) = cached {
            return Ok(model);
        }

        validate_name(name)?;
        let bytes = self.store.get(name).await?;
        let (model, metadata) = tokio::task::spawn_blocking(move || artifact::decode(&bytes))
            .await
            .map_err(|e| ServingError::SerializationError(format!("decode task failed: {}", e)))??;
        debug!(
            model = name,
            kind = %metadata.kind,
            trained_at = %metadata.trained_at,
            "Artifact loaded from store"
        );

        let model = Arc::new(model);
        let mut cache = self.cache.write();
        if let Some(current) = cache.models.get(name) {
            return Ok(Arc::clone(current));
        }
        if cache.generation(name) == generation {
            cache.models.insert(name.to_string(), Arc::clone(&model));
        } else {
            debug!(model = name, "Name rewritten during load; artifact not cached");
        }
        Ok(model)
    }

    /// Predict one value per feature row
    pub async fn predict(&self, name: &str, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let model = self.resolve(name).await?;
        if features.is_empty() {
            return Ok(Vec::new());
        }

        let x = training::to_matrix(features)?;
        let rows = x.nrows();
        let predictions = tokio::task::spawn_blocking(move || model.predict(&x))
            .await
            .map_err(|e| ServingError::ComputationError(format!("prediction task failed: {}", e)))??;
        debug!(model = name, rows, "Prediction served");
        Ok(predictions.to_vec())
    }

    /// Remove a model's artifact, then forget it in memory
    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let _write = self.writes.lock().await;

        let persisted = match self.store.delete(name).await {
            Ok(()) => true,
            Err(ServingError::ModelNotFound(_)) => false,
            Err(e) => return Err(e),
        };

        let in_memory = {
            let mut cache = self.cache.write();
            cache.bump(name);
            cache.models.remove(name).is_some()
        };

        match (persisted, in_memory) {
            (false, false) => return Err(ServingError::ModelNotFound(name.to_string())),
            (false, true) => {
                warn!(model = name, "Model was never persisted; removed from memory only");
            }
            _ => {}
        }

        info!(model = name, "Model deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalModelStore;

    fn registry() -> (tempfile::TempDir, ModelRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalModelStore::new(dir.path()).unwrap();
        (dir, ModelRegistry::new(Arc::new(store)))
    }

    fn sample() -> (Vec<Vec<f64>>, Vec<f64>) {
        (vec![vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 4.0]], vec![1.0, 2.0, 3.0])
    }

    #[test]
    fn test_list_kinds() {
        let (_dir, registry) = registry();
        assert_eq!(registry.list(), vec!["LinReg", "Catboost"]);
    }

    #[tokio::test]
    async fn test_train_defaults_name_to_kind() {
        let (dir, registry) = registry();
        let (x, y) = sample();

        let outcome = registry.train(TrainRequest::new("linreg", x, y)).await.unwrap();
        assert_eq!(outcome.name, "LinReg");
        assert_eq!(outcome.n_features, 2);
        assert!(outcome.persisted);
        assert!(dir.path().join("LinReg.bin").exists());
    }

    #[tokio::test]
    async fn test_unsupported_kind_writes_nothing() {
        let (dir, registry) = registry();
        let (x, y) = sample();

        let err = registry.train(TrainRequest::new("svm", x, y)).await.unwrap_err();
        assert!(matches!(err, ServingError::UnsupportedModelKind { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(registry.loaded().is_empty());
    }

    #[tokio::test]
    async fn test_predict_after_restart_loads_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = sample();
        {
            let store = LocalModelStore::new(dir.path()).unwrap();
            let registry = ModelRegistry::new(Arc::new(store));
            registry.train(TrainRequest::new("LinReg", x, y)).await.unwrap();
        }

        let store = LocalModelStore::new(dir.path()).unwrap();
        let registry = ModelRegistry::new(Arc::new(store));
        let preds = registry.predict("LinReg", &[vec![4.0, 5.0]]).await.unwrap();
        assert_eq!(preds.len(), 1);
        assert!((preds[0] - 4.0).abs() < 1e-3);
        assert_eq!(registry.loaded(), vec!["LinReg"]);
    }

    #[tokio::test]
    async fn test_unpersisted_model_is_served_from_memory() {
        let (dir, registry) = registry();
        let (x, y) = sample();

        registry
            .train(TrainRequest::new("Catboost", x, y).with_persist(false).with_name("scratch"))
            .await
            .unwrap();
        assert!(!dir.path().join("scratch.bin").exists());
        assert_eq!(registry.predict("scratch", &[vec![1.0, 2.0]]).await.unwrap().len(), 1);

        registry.delete("scratch").await.unwrap();
        assert!(matches!(
            registry.predict("scratch", &[vec![1.0, 2.0]]).await,
            Err(ServingError::ModelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_unknown() {
        let (_dir, registry) = registry();
        assert!(matches!(registry.delete("ghost").await, Err(ServingError::ModelNotFound(_))));
    }

    #[tokio::test]
    async fn test_feature_count_mismatch() {
        let (_dir, registry) = registry();
        let (x, y) = sample();
        registry.train(TrainRequest::new("LinReg", x, y)).await.unwrap();

        let err = registry.predict("LinReg", &[vec![1.0]]).await.unwrap_err();
        assert!(matches!(err, ServingError::ShapeError { .. }));
    }

    #[tokio::test]
    async fn test_empty_prediction_input() {
        let (_dir, registry) = registry();
        let (x, y) = sample();
        registry.train(TrainRequest::new("LinReg", x, y)).await.unwrap();
        assert!(registry.predict("LinReg", &[]).await.unwrap().is_empty());
    }

    /// Local store whose reads are slow and whose deletes can be made to fail
    struct FlakyStore {
        inner: LocalModelStore,
        read_delay: std::time::Duration,
        fail_deletes: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn new(root: &std::path::Path, read_delay_ms: u64) -> Self {
            Self {
                inner: LocalModelStore::new(root).unwrap(),
                read_delay: std::time::Duration::from_millis(read_delay_ms),
                fail_deletes: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl ModelStore for FlakyStore {
        async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
            self.inner.put(name, bytes).await
        }

        async fn get(&self, name: &str) -> Result<Vec<u8>> {
            let bytes = self.inner.get(name).await;
            tokio::time::sleep(self.read_delay).await;
            bytes
        }

        async fn delete(&self, name: &str) -> Result<()> {
            if self.fail_deletes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ServingError::StorageError("backend unavailable".to_string()));
            }
            self.inner.delete(name).await
        }

        fn scope(&self) -> String {
            "flaky".to_string()
        }
    }

    fn line(slope: f64) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (1..=5).map(|i| vec![i as f64]).collect();
        let y = x.iter().map(|r| slope * r[0]).collect();
        (x, y)
    }

    #[tokio::test]
    async fn test_retrain_during_store_load_wins() {
        let dir = tempfile::tempdir().unwrap();
        {
            let writer = ModelRegistry::new(Arc::new(LocalModelStore::new(dir.path()).unwrap()));
            let (x, y) = line(1.0);
            writer.train(TrainRequest::new("LinReg", x, y)).await.unwrap();
        }

        let registry = Arc::new(ModelRegistry::new(Arc::new(FlakyStore::new(dir.path(), 300))));
        let loading = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.predict("LinReg", &[vec![10.0]]).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let (x, y) = line(2.0);
        registry.train(TrainRequest::new("LinReg", x, y)).await.unwrap();
        loading.await.unwrap().unwrap();

        let served = registry.predict("LinReg", &[vec![10.0]]).await.unwrap();
        assert!((served[0] - 20.0).abs() < 1e-6, "served {}", served[0]);

        let fresh = ModelRegistry::new(Arc::new(LocalModelStore::new(dir.path()).unwrap()));
        let stored = fresh.predict("LinReg", &[vec![10.0]]).await.unwrap();
        assert!((served[0] - stored[0]).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_store_delete_keeps_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FlakyStore::new(dir.path(), 0));
        let registry = ModelRegistry::new(store.clone());
        let (x, y) = line(3.0);
        registry
            .train(TrainRequest::new("LinReg", x, y).with_persist(false))
            .await
            .unwrap();

        store.fail_deletes.store(true, std::sync::atomic::Ordering::SeqCst);
        let err = registry.delete("LinReg").await.unwrap_err();
        assert!(matches!(err, ServingError::StorageError(_)));
        assert_eq!(registry.predict("LinReg", &[vec![1.0]]).await.unwrap().len(), 1);

        store.fail_deletes.store(false, std::sync::atomic::Ordering::SeqCst);
        registry.delete("LinReg").await.unwrap();
        assert!(registry.loaded().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_predictions_agree() {
        let (_dir, registry) = registry();
        let registry = Arc::new(registry);
        let (x, y) = line(2.0);
        registry.train(TrainRequest::new("LinReg", x, y)).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let rows: Vec<Vec<f64>> = (0..100).map(|j| vec![(i * 100 + j) as f64]).collect();
                    (rows.clone(), registry.predict("LinReg", &rows).await.unwrap())
                })
            })
            .collect();

        for handle in handles {
            let (rows, predictions) = handle.await.unwrap();
            for (row, p) in rows.iter().zip(predictions) {
                assert!((p - 2.0 * row[0]).abs() < 1e-6);
            }
        }
    }
}
