//! Model training module
//!
//! Provides the regression algorithms the service can train:
//! - Linear models (OLS, ridge via `alpha`)
//! - CatBoost-style gradient boosting over symmetric trees
//!
//! plus the artifact codec used to persist fitted models.

pub mod artifact;
pub mod catboost;
pub mod linear_models;
mod models;

pub use artifact::ArtifactMetadata;
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use linear_models::LinearRegression;
pub use models::{ModelKind, ModelMetrics, TrainedModel};

use crate::error::{Result, ServingError};
use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::time::Instant;

/// Hyperparameter mapping as received from callers
pub type Hyperparameters = serde_json::Map<String, serde_json::Value>;

/// Linear regression hyperparameters (scikit-learn names)
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearParams {
    #[serde(default = "default_fit_intercept")]
    fit_intercept: bool,
    #[serde(default)]
    alpha: f64,
    /// Accepted for compatibility; inputs are always copied.
    #[serde(default, rename = "copy_X")]
    _copy_x: Option<bool>,
}

fn default_fit_intercept() -> bool {
    true
}

fn parse_params<T: for<'de> Deserialize<'de>>(kind: ModelKind, params: &Hyperparameters) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(params.clone())).map_err(|e| {
        ServingError::InvalidParameter {
            name: kind.to_string(),
            value: serde_json::Value::Object(params.clone()).to_string(),
            reason: e.to_string(),
        }
    })
}

/// Build an unfitted model of `kind` from default or supplied hyperparameters
pub fn build_model(kind: ModelKind, params: Option<&Hyperparameters>) -> Result<TrainedModel> {
    let empty = Hyperparameters::new();
    let params = params.unwrap_or(&empty);

    match kind {
        ModelKind::LinReg => {
            let p: LinearParams = parse_params(kind, params)?;
            if !(p.alpha >= 0.0 && p.alpha.is_finite()) {
                return Err(ServingError::InvalidParameter {
                    name: "alpha".to_string(),
                    value: p.alpha.to_string(),
                    reason: "must be non-negative".to_string(),
                });
            }
            Ok(TrainedModel::LinReg(
                LinearRegression::new()
                    .with_fit_intercept(p.fit_intercept)
                    .with_alpha(p.alpha),
            ))
        }
        ModelKind::Catboost => {
            let config: CatBoostConfig = parse_params(kind, params)?;
            config.validate()?;
            Ok(TrainedModel::Catboost(CatBoostRegressor::new(config)))
        }
    }
}

/// Convert row-major feature vectors into a matrix, rejecting ragged input
pub fn to_matrix(features: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_rows = features.len();
    let n_cols = features.first().map(Vec::len).unwrap_or(0);

    if let Some((i, row)) = features.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(ServingError::ShapeError {
            expected: format!("{} values per row", n_cols),
            actual: format!("{} values in row {}", row.len(), i),
        });
    }
    if features.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ServingError::InvalidInput(
            "features must be finite numbers".to_string(),
        ));
    }

    let flat: Vec<f64> = features.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((n_rows, n_cols), flat)?)
}

/// Fit `model` in place and report training-set metrics
pub fn fit(model: &mut TrainedModel, x: &Array2<f64>, y: &Array1<f64>) -> Result<ModelMetrics> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ServingError::InvalidInput(
            "features must contain at least one non-empty row".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(ServingError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(ServingError::InvalidInput("labels must be finite numbers".to_string()));
    }

    let start = Instant::now();
    match model {
        TrainedModel::LinReg(m) => {
            m.fit(x, y)?;
        }
        TrainedModel::Catboost(m) => m.fit(x, y)?,
    }
    let elapsed = start.elapsed().as_secs_f64();

    let y_pred = model.predict(x)?;
    let mut metrics = ModelMetrics::compute_regression(y, &y_pred);
    metrics.training_time_secs = elapsed;
    metrics.n_features = x.ncols();
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Hyperparameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_build_with_defaults() {
        assert!(matches!(build_model(ModelKind::LinReg, None).unwrap(), TrainedModel::LinReg(_)));
        assert!(matches!(build_model(ModelKind::Catboost, None).unwrap(), TrainedModel::Catboost(_)));
    }

    #[test]
    fn test_linear_params_accept_sklearn_names() {
        let p = params(json!({"fit_intercept": false, "copy_X": true}));
        match build_model(ModelKind::LinReg, Some(&p)).unwrap() {
            TrainedModel::LinReg(m) => assert!(!m.fit_intercept),
            other => panic!("unexpected model: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_param_rejected() {
        let p = params(json!({"n_jobs": 4}));
        let err = build_model(ModelKind::LinReg, Some(&p)).unwrap_err();
        assert!(matches!(err, ServingError::InvalidParameter { .. }));
    }

    #[test]
    fn test_negative_alpha_rejected() {
        let p = params(json!({"alpha": -1.0}));
        let err = build_model(ModelKind::LinReg, Some(&p)).unwrap_err();
        assert!(matches!(err, ServingError::InvalidParameter { .. }));
    }

    #[test]
    fn test_ragged_features_rejected() {
        let err = to_matrix(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, ServingError::ShapeError { .. }));
    }

    #[test]
    fn test_fit_reports_metrics() {
        let mut model = build_model(ModelKind::LinReg, None).unwrap();
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![3.0, 5.0, 7.0, 9.0];
        let metrics = fit(&mut model, &x, &y).unwrap();
        assert_eq!(metrics.n_samples, 4);
        assert_eq!(metrics.n_features, 1);
        assert!(metrics.r2 > 0.999);
    }

    #[test]
    fn test_fit_label_mismatch() {
        let mut model = build_model(ModelKind::Catboost, None).unwrap();
        let err = fit(&mut model, &array![[1.0], [2.0]], &array![1.0]).unwrap_err();
        assert!(matches!(err, ServingError::ShapeError { .. }));
    }
}
