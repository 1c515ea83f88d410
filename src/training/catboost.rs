//! CatBoost-style gradient boosting regressor
//!
//! Boosts symmetric (oblivious) decision trees: every node at a given depth
//! shares the same split feature and threshold, so a tree is just a list of
//! `depth` splits plus `2^depth` leaf values.

use crate::error::{Result, ServingError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Deepest tree accepted; a tree stores `2^max_depth` leaves.
pub const MAX_TREE_DEPTH: usize = 16;

/// Hyperparameters, accepted under both CatBoost and scikit-learn style names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatBoostConfig {
    #[serde(alias = "iterations")]
    pub n_estimators: usize,
    #[serde(alias = "eta")]
    pub learning_rate: f64,
    #[serde(alias = "depth")]
    pub max_depth: usize,
    #[serde(alias = "l2_leaf_reg")]
    pub reg_lambda: f64,
    pub subsample: f64,
    #[serde(alias = "random_seed")]
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            reg_lambda: 3.0,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

impl CatBoostConfig {
    /// Reject values the booster cannot train with
    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &str, value: String, reason: &str| ServingError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };

        if self.n_estimators == 0 {
            return Err(invalid("n_estimators", "0".into(), "must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(invalid(
                "learning_rate",
                self.learning_rate.to_string(),
                "must be a positive finite number",
            ));
        }
        if self.max_depth == 0 || self.max_depth > MAX_TREE_DEPTH {
            return Err(invalid(
                "max_depth",
                self.max_depth.to_string(),
                &format!("must be between 1 and {}", MAX_TREE_DEPTH),
            ));
        }
        if !(self.reg_lambda >= 0.0 && self.reg_lambda.is_finite()) {
            return Err(invalid(
                "reg_lambda",
                self.reg_lambda.to_string(),
                "must be non-negative",
            ));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid(
                "subsample",
                self.subsample.to_string(),
                "must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values[idx.min(self.leaf_values.len() - 1)]
    }
}

fn build_symmetric_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    indices: &[usize],
    max_depth: usize,
    reg_lambda: f64,
) -> SymmetricTree {
    let n_features = x.ncols();
    let mut splits = Vec::with_capacity(max_depth);
    let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

    for _ in 0..max_depth {
        // Best split shared by every bucket at this level
        let best = (0..n_features)
            .into_par_iter()
            .filter_map(|feat| {
                let mut all_vals: Vec<f64> = buckets
                    .iter()
                    .flat_map(|b| b.iter().map(|&i| x[[i, feat]]))
                    .collect();
                all_vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                all_vals.dedup();

                if all_vals.len() < 2 {
                    return None;
                }

                let mut best_gain = f64::NEG_INFINITY;
                let mut best_thr = 0.0;

                // At most ~256 candidate thresholds per feature
                let step = (all_vals.len() / 256).max(1);
                for i in (0..all_vals.len() - 1).step_by(step) {
                    let thr = (all_vals[i] + all_vals[i + 1]) / 2.0;
                    let mut total_gain = 0.0;

                    for bucket in &buckets {
                        let (lg, lh, rg, rh) =
                            bucket.iter().fold((0.0, 0.0, 0.0, 0.0), |(lg, lh, rg, rh), &idx| {
                                if x[[idx, feat]] <= thr {
                                    (lg + gradients[idx], lh + hessians[idx], rg, rh)
                                } else {
                                    (lg, lh, rg + gradients[idx], rh + hessians[idx])
                                }
                            });
                        let parent_g = lg + rg;
                        let parent_h = lh + rh;
                        let parent_score = parent_g * parent_g / (parent_h + reg_lambda);
                        let left_score = lg * lg / (lh + reg_lambda);
                        let right_score = rg * rg / (rh + reg_lambda);
                        total_gain += left_score + right_score - parent_score;
                    }

                    if total_gain > best_gain {
                        best_gain = total_gain;
                        best_thr = thr;
                    }
                }

                (best_gain > 0.0).then_some((feat, best_thr, best_gain))
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        let Some((feat, thr, _)) = best else { break };

        splits.push((feat, thr));
        buckets = buckets
            .iter()
            .flat_map(|bucket| {
                let (left, right): (Vec<usize>, Vec<usize>) =
                    bucket.iter().partition(|&&i| x[[i, feat]] <= thr);
                [left, right]
            })
            .collect();
    }

    let leaf_values = buckets
        .iter()
        .map(|bucket| {
            if bucket.is_empty() {
                return 0.0;
            }
            let g: f64 = bucket.iter().map(|&i| gradients[i]).sum();
            let h: f64 = bucket.iter().map(|&i| hessians[i]).sum();
            -g / (h + reg_lambda)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

/// Gradient-boosted regressor over symmetric trees with squared loss
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;

        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(ServingError::TrainingError("Empty dataset".into()));
        }
        if n != y.len() {
            return Err(ServingError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        self.trees.clear();
        self.n_features = x.ncols();
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);

        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(&mut rng);

        let hessians = vec![1.0; n];
        for _ in 0..self.config.n_estimators {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(y.iter())
                .map(|(&p, &yi)| p - yi)
                .collect();

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = (n as f64 * self.config.subsample).ceil() as usize;
                let mut sub = perm.clone();
                sub.shuffle(&mut rng);
                sub.truncate(k.max(1));
                sub
            } else {
                (0..n).collect()
            };

            let tree = build_symmetric_tree(
                x,
                &gradients,
                &hessians,
                &indices,
                self.config.max_depth,
                self.config.reg_lambda,
            );

            for (i, row) in x.rows().into_iter().enumerate() {
                predictions[i] += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ServingError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ServingError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self
                        .trees
                        .iter()
                        .map(|t| self.config.learning_rate * t.predict(row))
                        .sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((100, 3), (0..300).map(|i| (i as f64) / 100.0).collect()).unwrap();
        let y = Array1::from_vec((0..100).map(|i| 2.0 * (i * 3) as f64 / 100.0 + 0.1).collect());
        (x, y)
    }

    #[test]
    fn test_catboost_regressor() {
        let (x, y) = make_regression_data();
        let config = CatBoostConfig { n_estimators: 20, max_depth: 4, ..Default::default() };
        let mut model = CatBoostRegressor::new(config);
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), 100);

        let mse = (&preds - &y).mapv(|e| e * e).mean().unwrap();
        let var = y.mapv(|v| (v - y.mean().unwrap()).powi(2)).mean().unwrap();
        assert!(mse < var, "boosting should beat the mean: mse={} var={}", mse, var);
    }

    #[test]
    fn test_catboost_symmetric_tree() {
        let (x, y) = make_regression_data();
        let config = CatBoostConfig { n_estimators: 5, max_depth: 3, ..Default::default() };
        let mut model = CatBoostRegressor::new(config);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 5);
        for tree in &model.trees {
            assert!(tree.leaf_values.len() <= 8);
            assert!(tree.splits.len() <= 3);
        }
    }

    #[test]
    fn test_catboost_tiny_dataset() {
        let x = ndarray::array![[1.0, 2.0], [2.0, 3.0], [3.0, 4.0]];
        let y = ndarray::array![1.0, 2.0, 3.0];
        let mut model = CatBoostRegressor::new(CatBoostConfig::default());
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&ndarray::array![[4.0, 5.0]]).unwrap();
        assert_eq!(preds.len(), 1);
        assert!(preds[0].is_finite());
    }

    #[test]
    fn test_catboost_aliases() {
        let config: CatBoostConfig = serde_json::from_value(serde_json::json!({
            "iterations": 10,
            "depth": 2,
            "l2_leaf_reg": 1.0,
            "random_seed": 7
        }))
        .unwrap();
        assert_eq!(config.n_estimators, 10);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.random_state, Some(7));
        assert!((config.learning_rate - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_catboost_rejects_unknown_and_invalid_params() {
        let unknown = serde_json::from_value::<CatBoostConfig>(serde_json::json!({"loss": "RMSE"}));
        assert!(unknown.is_err());

        let config = CatBoostConfig { max_depth: 40, ..Default::default() };
        assert!(matches!(config.validate(), Err(ServingError::InvalidParameter { .. })));
    }

    #[test]
    fn test_catboost_deterministic_with_seed() {
        let (x, y) = make_regression_data();
        let config = CatBoostConfig { n_estimators: 10, subsample: 0.5, ..Default::default() };
        let mut a = CatBoostRegressor::new(config.clone());
        let mut b = CatBoostRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }
}
