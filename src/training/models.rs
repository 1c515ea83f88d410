//! Model kinds, trained model dispatch and regression metrics

use crate::error::{Result, ServingError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::catboost::CatBoostRegressor;
use super::linear_models::LinearRegression;

/// Regression algorithm families the service can train
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// Ordinary least squares (optionally ridge-regularized)
    LinReg,
    /// Gradient boosting over symmetric trees
    Catboost,
}

impl ModelKind {
    /// Every supported kind, in listing order
    pub const ALL: [ModelKind; 2] = [ModelKind::LinReg, ModelKind::Catboost];

    /// Canonical name, also the default artifact name
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::LinReg => "LinReg",
            ModelKind::Catboost => "Catboost",
        }
    }

    /// Canonical names of every supported kind
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(ModelKind::as_str).collect()
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ServingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linreg" | "linear" | "linear_regression" => Ok(ModelKind::LinReg),
            "catboost" | "boosted_tree" | "boosted-tree" | "gradient_boosting" => {
                Ok(ModelKind::Catboost)
            }
            _ => Err(ServingError::UnsupportedModelKind {
                kind: s.to_string(),
                available: Self::names(),
            }),
        }
    }
}

/// A fitted model of any supported kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LinReg(LinearRegression),
    Catboost(CatBoostRegressor),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LinReg(_) => ModelKind::LinReg,
            TrainedModel::Catboost(_) => ModelKind::Catboost,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LinReg(model) => model.predict(x),
            TrainedModel::Catboost(model) => model.predict(x),
        }
    }
}

/// Regression metrics computed on the training set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Training time in seconds
    pub training_time_secs: f64,
    /// Number of features
    pub n_features: usize,
    /// Number of training samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut metrics = Self {
            n_samples: y_true.len(),
            ..Self::default()
        };
        if y_true.is_empty() {
            return metrics;
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        metrics.mse = ss_res / n;
        metrics.rmse = metrics.mse.sqrt();
        metrics.mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();

        metrics.r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_kind_parsing_and_aliases() {
        assert_eq!("LinReg".parse::<ModelKind>().unwrap(), ModelKind::LinReg);
        assert_eq!("linear".parse::<ModelKind>().unwrap(), ModelKind::LinReg);
        assert_eq!("Catboost".parse::<ModelKind>().unwrap(), ModelKind::Catboost);
        assert_eq!("boosted-tree".parse::<ModelKind>().unwrap(), ModelKind::Catboost);
    }

    #[test]
    fn test_unknown_kind() {
        let err = "RandomForest".parse::<ModelKind>().unwrap_err();
        match err {
            ServingError::UnsupportedModelKind { kind, available } => {
                assert_eq!(kind, "RandomForest");
                assert_eq!(available, vec!["LinReg", "Catboost"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = ModelMetrics::compute_regression(&y_true, &y_pred);

        assert_eq!(metrics.n_samples, 5);
        assert!(metrics.mse < 0.01);
        assert!((metrics.rmse - metrics.mse.sqrt()).abs() < 1e-12);
        assert!(metrics.r2 > 0.9);
    }
}
