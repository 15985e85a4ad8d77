/// Machine Learning module for early SLA breach prediction
///
/// This module provides:
/// - Early-window filtering of incident lifecycles
/// - Per-incident feature extraction and categorical encoding
/// - Stratified train/test splitting
/// - A majority-class baseline and a gradient-boosted tree ensemble
/// - Evaluation metrics (ROC AUC, classification report, confusion matrix)
/// - Feature importance ranking and what-if probes

pub mod classifier;
pub mod encoding;
pub mod features;
pub mod interpretation;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod tree;
pub mod window;

pub use classifier::{Classifier, GradientBoostingClassifier, MajorityClassClassifier};
pub use encoding::{CategoricalEncoder, FeatureEncoder, UnknownCategoryPolicy};
pub use features::{FeatureExtractor, IncidentFeatures, FEATURE_NAMES};
pub use interpretation::{
    rank_features, FeatureImportance, WhatIfOutcome, WhatIfProbe, WhatIfScenario,
};
pub use metrics::{ClassMetrics, ModelMetrics};
pub use models::{BoostingConfig, ModelMetadata, ModelType, PipelineConfig, TrainingDataset};
pub use pipeline::{PipelineOutput, SlaPipeline, PREDICTION_TARGET};
pub use window::{EarlyWindowFilter, DEFAULT_WINDOW_SIZE};
