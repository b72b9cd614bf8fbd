//! Classifier seam and the class-weighted tree ensemble behind it.
//!
//! The predictor only sees the `Classifier` trait: ordered class labels, the
//! ordered feature list the model was trained on, and a probability per label.
//! Trees are fitted with linfa on row-subsampled copies of the weighted
//! dataset; a class probability is the share of trees voting for it.

use std::collections::BTreeMap;

use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis, Ix1};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PolicyConfig;
use crate::services::features::{FeatureName, FeatureRecord, MODEL_FEATURES};
use crate::services::tariff::Color;

/// Model type tag stored in the bundle.
pub const TREE_ENSEMBLE: &str = "tree_ensemble";

/// Folds used for cross-validated accuracy.
const CV_FOLDS: usize = 5;

const N_TREES: usize = 25;
const MAX_DEPTH: usize = 5;

/// Every tree leaves out one row in `SUBSAMPLE_STRIDE`, offset by its index.
const SUBSAMPLE_STRIDE: usize = 7;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("only {found} labelled rows, at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error("training data has no blue day")]
    NoBlueDays,

    #[error("expected {expected} features, got {found}")]
    FeatureMismatch { expected: usize, found: usize },

    #[error("unsupported model type '{0}'")]
    UnsupportedModel(String),

    #[error("model fitting failed: {0}")]
    Fit(String),
}

/// Anything that turns a feature vector into per-label probabilities.
pub trait Classifier {
    /// Labels in the order `predict_proba` reports them.
    fn classes(&self) -> &[String];

    /// Features expected by `predict_proba`, in order.
    fn features(&self) -> &[FeatureName];

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// Bagged decision trees over class indices `0..n_classes`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEnsemble {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree<f64, usize>>,
}

impl TreeEnsemble {
    /// Fit on rows `x` with class indices `y` and per-row `weights`.
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        weights: &[f64],
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        let n = x.nrows();
        if y.len() != n || weights.len() != n {
            return Err(ModelError::Fit(format!(
                "{} rows, {} labels, {} weights",
                n,
                y.len(),
                weights.len()
            )));
        }
        if n == 0 {
            return Err(ModelError::InsufficientData {
                found: 0,
                required: 1,
            });
        }

        let mut trees = Vec::with_capacity(N_TREES);
        for t in 0..N_TREES {
            let mut rows: Vec<usize> = (0..n).filter(|i| (i + t) % SUBSAMPLE_STRIDE != 0).collect();
            if rows.is_empty() {
                rows = (0..n).collect();
            }
            let dataset = Dataset::new(
                x.select(Axis(0), &rows),
                Array1::from_iter(rows.iter().map(|i| y[*i])),
            )
            .with_weights(Array1::from_iter(rows.iter().map(|i| weights[*i] as f32)));

            let tree = DecisionTree::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(Some(MAX_DEPTH))
                .fit(&dataset)
                .map_err(|e| ModelError::Fit(e.to_string()))?;
            trees.push(tree);
        }

        Ok(Self {
            n_features: x.ncols(),
            n_classes,
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Share of trees voting for each class, one row per input row.
    pub fn vote_shares(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                found: x.ncols(),
            });
        }
        let mut votes = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        if self.trees.is_empty() {
            return Ok(votes);
        }
        for tree in &self.trees {
            let predicted: Array1<usize> = tree.predict(x);
            for (row, class) in predicted.iter().enumerate() {
                if *class < self.n_classes {
                    votes[[row, *class]] += 1.0;
                }
            }
        }
        Ok(votes / self.trees.len() as f64)
    }

    pub fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        if x.len() != self.n_features {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                found: x.len(),
            });
        }
        let row = Array2::from_shape_vec((1, x.len()), x.to_vec())
            .map_err(|e| ModelError::Fit(e.to_string()))?;
        Ok(self.vote_shares(&row)?.row(0).to_vec())
    }

    /// Most voted class per row, lowest index first on ties.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ModelError> {
        let shares = self.vote_shares(x)?;
        Ok(shares
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |best, (i, p)| if *p > best.1 { (i, *p) } else { best })
                    .0
            })
            .collect())
    }

    /// Mean impurity-based importance per feature over all trees.
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (sum, value) in total.iter_mut().zip(tree.feature_importance()) {
                *sum += value;
            }
        }
        let n = self.trees.len().max(1) as f64;
        total.into_iter().map(|v| v / n).collect()
    }
}

/// Per-color weights that counter the blue majority.
///
/// `base = total / (n_classes · count)`; red gets `max(1.5·base, 3)`, white
/// `max(1.3·base, 2)` and blue `max(base, 1)`.
pub fn class_weights(labels: &[Color]) -> BTreeMap<Color, f64> {
    let mut counts: BTreeMap<Color, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(*label).or_default() += 1;
    }
    let total = labels.len() as f64;
    let n_classes = counts.len() as f64;

    counts
        .into_iter()
        .map(|(color, count)| {
            let base = total / (n_classes * count as f64);
            let weight = match color {
                Color::Red => (1.5 * base).max(3.0),
                Color::White => (1.3 * base).max(2.0),
                Color::Blue => base.max(1.0),
            };
            (color, weight)
        })
        .collect()
}

/// Trained model plus everything needed to use it at inference time.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBundle {
    pub model_type: String,
    pub features: Vec<FeatureName>,
    pub classes: Vec<String>,
    pub class_weights: BTreeMap<String, f64>,
    pub training_samples: usize,
    /// Mean accuracy over contiguous k-fold splits.
    pub cv_accuracy: Option<f64>,
    pub training_accuracy: f64,
    pub model: TreeEnsemble,
}

impl ModelBundle {
    /// Reject bundles this build cannot run.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.model_type != TREE_ENSEMBLE {
            return Err(ModelError::UnsupportedModel(self.model_type.clone()));
        }
        if self.classes.len() != self.model.n_classes {
            return Err(ModelError::Fit(format!(
                "{} class labels for a {}-class model",
                self.classes.len(),
                self.model.n_classes
            )));
        }
        if self.model.n_features() != self.features.len() {
            return Err(ModelError::FeatureMismatch {
                expected: self.features.len(),
                found: self.model.n_features(),
            });
        }
        Ok(())
    }
}

impl Classifier for ModelBundle {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn features(&self) -> &[FeatureName] {
        &self.features
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.model.predict_proba(x)
    }
}

fn accuracy(model: &TreeEnsemble, x: &Array2<f64>, y: &[usize]) -> Result<f64, ModelError> {
    if y.is_empty() {
        return Ok(0.0);
    }
    let predicted = model.predict(x)?;
    let hits = predicted.iter().zip(y).filter(|(p, t)| p == t).count();
    Ok(hits as f64 / y.len() as f64)
}

/// Mean accuracy over `k` contiguous folds, or `None` with fewer rows than
/// folds. Each training fold is weighted with `weights_by_class`.
pub fn cross_validate(
    dataset: &Dataset<f64, usize, Ix1>,
    weights_by_class: &[f64],
    n_classes: usize,
    k: usize,
) -> Result<Option<f64>, ModelError> {
    if k < 2 || dataset.records().nrows() < k {
        return Ok(None);
    }
    let mut scores = Vec::with_capacity(k);
    for (train, valid) in dataset.fold(k) {
        let ty: Vec<usize> = train.targets().iter().copied().collect();
        let tw: Vec<f64> = ty
            .iter()
            .map(|c| weights_by_class.get(*c).copied().unwrap_or(1.0))
            .collect();
        let model = TreeEnsemble::fit(train.records(), &ty, &tw, n_classes)?;

        let vy: Vec<usize> = valid.targets().iter().copied().collect();
        scores.push(accuracy(&model, valid.records(), &vy)?);
    }
    Ok(Some(scores.iter().sum::<f64>() / k as f64))
}

/// Feature rows in `MODEL_FEATURES` order.
fn feature_matrix(records: &[&FeatureRecord]) -> Result<Array2<f64>, ModelError> {
    let flat: Vec<f64> = records
        .iter()
        .flat_map(|r| r.vector(&MODEL_FEATURES))
        .collect();
    Array2::from_shape_vec((records.len(), MODEL_FEATURES.len()), flat)
        .map_err(|e| ModelError::Fit(format!("Failed to build feature matrix: {}", e)))
}

/// Fit the classifier on labelled feature rows.
pub fn train(records: &[FeatureRecord], policy: &PolicyConfig) -> Result<ModelBundle, ModelError> {
    let labelled: Vec<(&FeatureRecord, Color)> = records
        .iter()
        .filter_map(|r| r.color.map(|c| (r, c)))
        .collect();
    if labelled.len() < policy.min_samples {
        return Err(ModelError::InsufficientData {
            found: labelled.len(),
            required: policy.min_samples,
        });
    }
    if !labelled.iter().any(|(_, c)| *c == Color::Blue) {
        return Err(ModelError::NoBlueDays);
    }

    let labels: Vec<String> = Color::ALL.iter().map(|c| c.as_str().to_string()).collect();
    let colors: Vec<Color> = labelled.iter().map(|(_, c)| *c).collect();
    let weights_by_color = class_weights(&colors);
    let weights_by_class: Vec<f64> = Color::ALL
        .iter()
        .map(|c| weights_by_color.get(c).copied().unwrap_or(1.0))
        .collect();

    let rows: Vec<&FeatureRecord> = labelled.iter().map(|(r, _)| *r).collect();
    let x = feature_matrix(&rows)?;
    let y: Vec<usize> = colors.iter().map(|c| c.index()).collect();
    let w: Vec<f64> = y.iter().map(|c| weights_by_class[*c]).collect();

    let dataset = Dataset::new(x, Array1::from(y.clone()));
    let cv_accuracy = cross_validate(&dataset, &weights_by_class, labels.len(), CV_FOLDS)?;
    let model = TreeEnsemble::fit(dataset.records(), &y, &w, labels.len())?;
    let training_accuracy = accuracy(&model, dataset.records(), &y)?;

    for color in Color::ALL {
        let count = colors.iter().filter(|c| **c == color).count();
        tracing::info!(
            "Class {}: {} samples, weight {:.2}",
            color,
            count,
            weights_by_color.get(&color).copied().unwrap_or(0.0)
        );
    }
    match cv_accuracy {
        Some(acc) => tracing::info!("Cross-validated accuracy over {} folds: {:.3}", CV_FOLDS, acc),
        None => tracing::warn!("Too few rows for {}-fold cross-validation", CV_FOLDS),
    }
    tracing::info!("Training accuracy: {:.3}", training_accuracy);

    let mut importance: Vec<(FeatureName, f64)> = MODEL_FEATURES
        .iter()
        .copied()
        .zip(model.feature_importance())
        .collect();
    importance.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (feature, value) in importance.iter().take(5) {
        tracing::debug!("Feature importance {:?}: {:.3}", feature, value);
    }

    Ok(ModelBundle {
        model_type: TREE_ENSEMBLE.to_string(),
        features: MODEL_FEATURES.to_vec(),
        classes: labels,
        class_weights: weights_by_color
            .into_iter()
            .map(|(c, w)| (c.as_str().to_string(), w))
            .collect(),
        training_samples: labelled.len(),
        cv_accuracy,
        training_accuracy,
        model,
    })
}
