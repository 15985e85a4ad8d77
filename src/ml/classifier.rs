use crate::error::{AppError, Result};
use crate::ml::metrics::{log_loss, ModelMetrics};
use crate::ml::models::{BoostingConfig, ModelMetadata, ModelType, TrainingDataset};
use crate::ml::tree::{RegressionTree, TreeParams};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

/// Trait for binary classifiers
pub trait Classifier: Send + Sync {
    /// Train the classifier; `eval` is an optional held-out set for early stopping
    fn train(&mut self, dataset: &TrainingDataset, eval: Option<&TrainingDataset>)
        -> Result<ModelMetrics>;

    /// Predict class labels
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Predict class probabilities (n_samples × 2)
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;

    /// Probability of the positive (breached) class for every row
    fn predict_positive_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(features)?;
        Ok(proba.column(1).to_owned())
    }

    /// Evaluate on a labeled dataset, scoring AUC on probabilities
    fn evaluate(&self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        let predictions = self.predict(&dataset.features)?;
        let scores = self.predict_positive_proba(&dataset.features)?;
        ModelMetrics::evaluate(&dataset.labels, &predictions, &scores.to_vec())
    }
}

fn ensure_trainable(dataset: &TrainingDataset) -> Result<()> {
    if dataset.n_samples == 0 {
        return Err(AppError::InsufficientData(
            "Cannot train on an empty dataset".to_string(),
        ));
    }
    if let Some(label) = dataset.labels.iter().find(|&&l| l > 1) {
        return Err(AppError::Training(format!(
            "Binary classifier received label {}",
            label
        )));
    }
    Ok(())
}

/// Baseline that always predicts the most frequent training class
pub struct MajorityClassClassifier {
    metadata: ModelMetadata,
    majority_class: usize,
    trained: bool,
}

impl MajorityClassClassifier {
    pub fn new() -> Self {
        Self {
            metadata: ModelMetadata::new("Majority Class", ModelType::MajorityClass),
            majority_class: 0,
            trained: false,
        }
    }

    pub fn majority_class(&self) -> usize {
        self.majority_class
    }
}

impl Default for MajorityClassClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for MajorityClassClassifier {
    fn train(
        &mut self,
        dataset: &TrainingDataset,
        _eval: Option<&TrainingDataset>,
    ) -> Result<ModelMetrics> {
        ensure_trainable(dataset)?;

        let positives = dataset.labels.iter().filter(|&&l| l == 1).count();
        // Ties go to the lower class
        self.majority_class = usize::from(positives > dataset.n_samples - positives);
        self.trained = true;

        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();
        self.metadata
            .hyperparameters
            .insert("strategy".to_string(), "most_frequent".to_string());

        self.evaluate(dataset)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        if !self.trained {
            return Err(AppError::Training("Model not trained".to_string()));
        }
        Ok(vec![self.majority_class; features.nrows()])
    }

    /// One-hot probability of the majority class for every row
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.trained {
            return Err(AppError::Training("Model not trained".to_string()));
        }
        let mut proba = Array2::zeros((features.nrows(), 2));
        proba.column_mut(self.majority_class).fill(1.0);
        Ok(proba)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::MajorityClass
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// Gradient-boosted regression trees on the logistic loss.
///
/// Positive rows are weighted by `n_negative / n_positive` of the training
/// split. With an evaluation set and `early_stopping_rounds`, training stops
/// once held-out log-loss has not improved for that many rounds, and the
/// ensemble is truncated to the best round.
pub struct GradientBoostingClassifier {
    metadata: ModelMetadata,
    config: BoostingConfig,
    trees: Vec<RegressionTree>,
    base_margin: f64,
    scale_pos_weight: f64,
    best_iteration: Option<usize>,
    feature_importances: Vec<f64>,
    trained: bool,
}

impl GradientBoostingClassifier {
    pub fn new(config: BoostingConfig) -> Self {
        let mut metadata = ModelMetadata::new("Gradient Boosting", ModelType::GradientBoosting);
        metadata.hyperparameters.extend([
            ("n_estimators".to_string(), config.n_estimators.to_string()),
            ("max_depth".to_string(), config.max_depth.to_string()),
            ("learning_rate".to_string(), config.learning_rate.to_string()),
            ("lambda".to_string(), config.lambda.to_string()),
            ("gamma".to_string(), config.gamma.to_string()),
            ("min_child_weight".to_string(), config.min_child_weight.to_string()),
        ]);

        Self {
            metadata,
            config,
            trees: Vec::new(),
            base_margin: 0.0,
            scale_pos_weight: 1.0,
            best_iteration: None,
            feature_importances: Vec::new(),
            trained: false,
        }
    }

    /// Weight applied to positive rows during the last training run
    pub fn scale_pos_weight(&self) -> f64 {
        self.scale_pos_weight
    }

    /// Zero-based best round when early stopping was active
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Average split gain per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.config.max_depth,
            lambda: self.config.lambda,
            gamma: self.config.gamma,
            min_child_weight: self.config.min_child_weight,
            learning_rate: self.config.learning_rate,
        }
    }

    fn margins(&self, features: &Array2<f64>) -> Array1<f64> {
        let mut margins = Array1::from_elem(features.nrows(), self.base_margin);
        for tree in &self.trees {
            margins += &tree.predict(features);
        }
        margins
    }

    fn compute_importances(&self, n_features: usize) -> Vec<f64> {
        let mut gain_sum = vec![0.0; n_features];
        let mut split_count = vec![0usize; n_features];
        for (feature, gain) in self.trees.iter().flat_map(|tree| tree.split_gains()) {
            gain_sum[feature] += gain;
            split_count[feature] += 1;
        }

        let average: Vec<f64> = gain_sum
            .iter()
            .zip(split_count.iter())
            .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
            .collect();
        let total: f64 = average.iter().sum();
        if total > 0.0 {
            average.iter().map(|value| value / total).collect()
        } else {
            average
        }
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

impl Classifier for GradientBoostingClassifier {
    fn train(
        &mut self,
        dataset: &TrainingDataset,
        eval: Option<&TrainingDataset>,
    ) -> Result<ModelMetrics> {
        ensure_trainable(dataset)?;
        if let Some(eval_set) = eval {
            if eval_set.n_features != dataset.n_features {
                return Err(AppError::Training(format!(
                    "Evaluation set has {} features, training set has {}",
                    eval_set.n_features, dataset.n_features
                )));
            }
        }

        let positives = dataset.labels.iter().filter(|&&l| l == 1).count();
        let negatives = dataset.n_samples - positives;
        self.scale_pos_weight = if positives > 0 {
            negatives as f64 / positives as f64
        } else {
            1.0
        };

        // base_score 0.5
        self.base_margin = 0.0;
        self.trees.clear();
        self.best_iteration = None;

        let params = self.tree_params();
        let weights: Vec<f64> = dataset
            .labels
            .iter()
            .map(|&l| if l == 1 { self.scale_pos_weight } else { 1.0 })
            .collect();

        let mut margins = Array1::from_elem(dataset.n_samples, self.base_margin);
        let mut eval_margins = eval.map(|e| Array1::from_elem(e.n_samples, self.base_margin));
        let mut best_loss = f64::INFINITY;
        let mut best_round = 0;

        info!(
            n_samples = dataset.n_samples,
            n_features = dataset.n_features,
            scale_pos_weight = self.scale_pos_weight,
            "Training gradient boosting ensemble"
        );

        for round in 0..self.config.n_estimators {
            let mut gradients = Vec::with_capacity(dataset.n_samples);
            let mut hessians = Vec::with_capacity(dataset.n_samples);
            for ((&margin, &label), &weight) in
                margins.iter().zip(dataset.labels.iter()).zip(weights.iter())
            {
                let p = sigmoid(margin);
                gradients.push(weight * (p - label as f64));
                hessians.push(weight * p * (1.0 - p));
            }

            let tree = RegressionTree::fit(&dataset.features, &gradients, &hessians, &params);
            margins += &tree.predict(&dataset.features);

            let mut stop = false;
            if let (Some(eval_set), Some(eval_margins)) = (eval, eval_margins.as_mut()) {
                *eval_margins += &tree.predict(&eval_set.features);
                let probabilities: Vec<f64> = eval_margins.iter().map(|&m| sigmoid(m)).collect();
                let loss = log_loss(&eval_set.labels, &probabilities);
                debug!(round, eval_logloss = loss, "Boosting round");

                if loss < best_loss {
                    best_loss = loss;
                    best_round = round;
                } else if let Some(patience) = self.config.early_stopping_rounds {
                    stop = round - best_round >= patience;
                }
            }

            self.trees.push(tree);
            if stop {
                info!(round, best_round, best_loss, "Early stopping");
                break;
            }
        }

        let early_stopping = eval.is_some() && self.config.early_stopping_rounds.is_some();
        if early_stopping && !self.trees.is_empty() {
            self.trees.truncate(best_round + 1);
            self.best_iteration = Some(best_round);
        }

        self.feature_importances = self.compute_importances(dataset.n_features);
        self.trained = true;

        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();
        self.metadata
            .hyperparameters
            .insert("scale_pos_weight".to_string(), format!("{:.4}", self.scale_pos_weight));

        info!(n_trees = self.trees.len(), "Gradient boosting ensemble trained");

        self.evaluate(dataset)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let scores = self.predict_positive_proba(features)?;
        Ok(scores.iter().map(|&p| usize::from(p >= 0.5)).collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.trained {
            return Err(AppError::Training("Model not trained".to_string()));
        }
        if features.ncols() != self.metadata.n_features {
            return Err(AppError::Training(format!(
                "Expected {} features, got {}",
                self.metadata.n_features,
                features.ncols()
            )));
        }

        let margins = self.margins(features);
        let mut proba = Array2::zeros((features.nrows(), 2));
        for (i, &margin) in margins.iter().enumerate() {
            let p = sigmoid(margin);
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        Ok(proba)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::GradientBoosting
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}
