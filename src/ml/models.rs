use crate::error::{AppError, Result};
use crate::ml::encoding::UnknownCategoryPolicy;
use crate::ml::window::DEFAULT_WINDOW_SIZE;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use validator::Validate;

/// Early-prediction pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// Number of leading lifecycle events visible at prediction time
    #[serde(default = "default_window_size")]
    #[validate(range(min = 1))]
    pub window_size: u32,

    /// Share of incidents held out for evaluation
    #[serde(default = "default_test_size")]
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_size: f64,

    /// Seed for the stratified train/test split
    #[serde(default = "default_split_seed")]
    pub split_seed: u64,

    /// Number of features shown in the importance ranking
    #[serde(default = "default_top_n")]
    #[validate(range(min = 1))]
    pub top_n: usize,

    /// Seed for what-if case selection; random when unset
    #[serde(default)]
    pub probe_seed: Option<u64>,

    /// Handling of categories unseen at fit time
    #[serde(default)]
    pub unknown_category: UnknownCategoryPolicy,

    /// Gradient boosting hyperparameters
    #[serde(default)]
    #[validate(nested)]
    pub model: BoostingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            test_size: default_test_size(),
            split_seed: default_split_seed(),
            top_n: default_top_n(),
            probe_seed: None,
            unknown_category: UnknownCategoryPolicy::default(),
            model: BoostingConfig::default(),
        }
    }
}

/// Gradient-boosted tree ensemble configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BoostingConfig {
    /// Maximum number of boosting rounds
    #[serde(default = "default_n_estimators")]
    #[validate(range(min = 1))]
    pub n_estimators: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    #[validate(range(min = 1))]
    pub max_depth: usize,

    /// Shrinkage applied to every leaf value
    #[serde(default = "default_learning_rate")]
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub learning_rate: f64,

    /// L2 regularization on leaf weights
    #[serde(default = "default_lambda")]
    #[validate(range(min = 0.0))]
    pub lambda: f64,

    /// Minimum loss reduction required to split
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub gamma: f64,

    /// Minimum hessian sum in each child
    #[serde(default = "default_min_child_weight")]
    #[validate(range(min = 0.0))]
    pub min_child_weight: f64,

    /// Stop after this many rounds without held-out improvement
    #[serde(default = "default_early_stopping_rounds")]
    pub early_stopping_rounds: Option<usize>,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            lambda: default_lambda(),
            gamma: 0.0,
            min_child_weight: default_min_child_weight(),
            early_stopping_rounds: default_early_stopping_rounds(),
        }
    }
}

fn default_window_size() -> u32 {
    DEFAULT_WINDOW_SIZE
}

fn default_test_size() -> f64 {
    0.2
}

fn default_split_seed() -> u64 {
    42
}

fn default_top_n() -> usize {
    5
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_depth() -> usize {
    5
}

fn default_learning_rate() -> f64 {
    0.3
}

fn default_lambda() -> f64 {
    1.0
}

fn default_min_child_weight() -> f64 {
    1.0
}

fn default_early_stopping_rounds() -> Option<usize> {
    Some(10)
}

/// Encoded training dataset
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Class labels (0 = not breached, 1 = breached)
    pub labels: Vec<usize>,

    /// Incident identifier of every row
    pub incident_ids: Vec<String>,

    /// Column names
    pub feature_names: Vec<String>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    pub fn new(
        features: Array2<f64>,
        labels: Vec<usize>,
        incident_ids: Vec<String>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let (n_samples, n_features) = features.dim();
        if labels.len() != n_samples || incident_ids.len() != n_samples {
            return Err(AppError::Internal(format!(
                "Dataset has {} rows but {} labels and {} identifiers",
                n_samples,
                labels.len(),
                incident_ids.len()
            )));
        }
        if feature_names.len() != n_features {
            return Err(AppError::Internal(format!(
                "Dataset has {} columns but {} feature names",
                n_features,
                feature_names.len()
            )));
        }

        Ok(Self {
            features,
            labels,
            incident_ids,
            feature_names,
            n_samples,
            n_features,
        })
    }

    /// Rows at the given positions, in that order
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            incident_ids: indices.iter().map(|&i| self.incident_ids[i].clone()).collect(),
            feature_names: self.feature_names.clone(),
            n_samples: indices.len(),
            n_features: self.n_features,
        }
    }

    /// Column position of a feature
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Number of rows per class label
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Share of positive (breached) rows
    pub fn positive_rate(&self) -> f64 {
        if self.n_samples == 0 {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l == 1).count() as f64 / self.n_samples as f64
    }

    /// Split into train/test sets, preserving class proportions in both.
    ///
    /// The test set holds `ceil(test_size * n)` rows. Every class contributes
    /// in proportion to its size; leftover rows go to the classes with the
    /// largest fractional share. Deterministic for a given seed.
    pub fn stratified_split(&self, test_size: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(AppError::Validation(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }

        let n = self.n_samples;
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(AppError::InsufficientData(format!(
                "Cannot split {} samples with test_size {}",
                n, test_size
            )));
        }

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in self.labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        if let Some((label, members)) = by_class.iter().find(|(_, m)| m.len() < 2) {
            return Err(AppError::InsufficientData(format!(
                "Class {} has {} member(s); stratification needs at least 2",
                label,
                members.len()
            )));
        }

        // Proportional allocation with largest-remainder rounding
        let mut allocation: HashMap<usize, usize> = HashMap::new();
        let mut remainders: Vec<(usize, f64)> = Vec::new();
        for (&label, members) in &by_class {
            let exact = n_test as f64 * members.len() as f64 / n as f64;
            allocation.insert(label, exact.floor() as usize);
            remainders.push((label, exact - exact.floor()));
        }
        let allocated: usize = allocation.values().sum();
        remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        for (label, _) in remainders.iter().take(n_test.saturating_sub(allocated)) {
            if let Some(count) = allocation.get_mut(label) {
                *count += 1;
            }
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::with_capacity(n - n_test);
        let mut test_idx = Vec::with_capacity(n_test);

        for (label, mut members) in by_class {
            members.shuffle(&mut rng);
            let take = allocation.get(&label).copied().unwrap_or(0).min(members.len());
            test_idx.extend_from_slice(&members[..take]);
            train_idx.extend_from_slice(&members[take..]);
        }

        train_idx.shuffle(&mut rng);
        test_idx.shuffle(&mut rng);

        Ok((self.select(&train_idx), self.select(&test_idx)))
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

impl ModelMetadata {
    pub fn new(name: &str, model_type: ModelType) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0".to_string(),
            model_type,
            trained_at: chrono::Utc::now(),
            n_training_samples: 0,
            n_features: 0,
            hyperparameters: HashMap::new(),
        }
    }
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Always predicts the most frequent training class
    MajorityClass,

    /// Gradient-boosted regression trees on the logistic loss
    GradientBoosting,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::MajorityClass => write!(f, "Majority Class Baseline"),
            ModelType::GradientBoosting => write!(f, "Gradient Boosting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dataset(n_negative: usize, n_positive: usize) -> TrainingDataset {
        let n = n_negative + n_positive;
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        let labels = (0..n).map(|i| usize::from(i >= n_negative)).collect();
        let ids = (0..n).map(|i| format!("INC{:06}", i + 1)).collect();
        TrainingDataset::new(features, labels, ids, vec!["a".into(), "b".into()]).unwrap()
    }

    #[test]
    fn test_dataset_shape_checks() {
        let features = Array2::zeros((3, 2));
        let err = TrainingDataset::new(
            features,
            vec![0, 1],
            vec!["x".into(), "y".into(), "z".into()],
            vec!["a".into(), "b".into()],
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_select_keeps_rows_aligned() {
        let dataset = create_test_dataset(3, 2);
        let subset = dataset.select(&[4, 0]);

        assert_eq!(subset.n_samples, 2);
        assert_eq!(subset.labels, vec![1, 0]);
        assert_eq!(subset.incident_ids, vec!["INC000005", "INC000001"]);
        assert_eq!(subset.features[[0, 0]], 8.0);
    }

    #[test]
    fn test_stratified_split_sizes_and_proportions() {
        let dataset = create_test_dataset(750, 250);
        let (train, test) = dataset.stratified_split(0.2, 42).unwrap();

        assert_eq!(train.n_samples, 800);
        assert_eq!(test.n_samples, 200);
        assert_eq!(train.n_features, 2);
        assert_eq!(test.class_counts().get(&1), Some(&50));
        assert!((train.positive_rate() - test.positive_rate()).abs() <= 0.02);
    }

    #[test]
    fn test_stratified_split_is_disjoint_and_complete() {
        let dataset = create_test_dataset(37, 13);
        let (train, test) = dataset.stratified_split(0.2, 7).unwrap();

        let mut ids: Vec<_> = train
            .incident_ids
            .iter()
            .chain(test.incident_ids.iter())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert_eq!(test.n_samples, 10);
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let dataset = create_test_dataset(60, 40);
        let (_, first) = dataset.stratified_split(0.2, 42).unwrap();
        let (_, second) = dataset.stratified_split(0.2, 42).unwrap();
        let (_, other) = dataset.stratified_split(0.2, 43).unwrap();

        assert_eq!(first.incident_ids, second.incident_ids);
        assert_ne!(first.incident_ids, other.incident_ids);
    }

    #[test]
    fn test_stratified_split_rejects_singleton_class() {
        let dataset = create_test_dataset(20, 1);
        let err = dataset.stratified_split(0.2, 42).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");

        let err = create_test_dataset(5, 5).stratified_split(1.5, 42).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_size, 3);
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.split_seed, 42);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.model.n_estimators, 100);
        assert_eq!(config.model.early_stopping_rounds, Some(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_model_type_display() {
        assert_eq!(ModelType::MajorityClass.to_string(), "Majority Class Baseline");
        assert_eq!(ModelType::GradientBoosting.to_string(), "Gradient Boosting");
    }
}
