//! Analysis report produced by a pipeline run

use crate::dataset::DatasetSummary;
use crate::ml::interpretation::{FeatureImportance, WhatIfOutcome};
use crate::ml::metrics::{ModelMetrics, CLASS_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const RULE_WIDTH: usize = 60;

/// Evaluation of one trained model on the test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub model: String,
    pub metrics: ModelMetrics,
}

/// Step-by-step results of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,

    // Data exploration
    pub summary: DatasetSummary,
    pub prediction_target: String,

    // Preprocessing and features
    pub window_size: u32,
    pub early_window_events: usize,
    pub feature_shape: (usize, usize),
    pub feature_names: Vec<String>,

    // Model preparation
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
    pub train_breach_rate: f64,
    pub test_breach_rate: f64,

    // Model building and evaluation
    pub scale_pos_weight: f64,
    pub n_trees: usize,
    pub best_iteration: Option<usize>,
    pub baseline: ModelEvaluation,
    pub advanced: ModelEvaluation,

    // Interpretation
    pub top_features: Vec<FeatureImportance>,
    pub what_if: WhatIfOutcome,
}

impl PipelineReport {
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn section(f: &mut fmt::Formatter<'_>, step: usize, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "STEP {}: {}", step, title)?;
    writeln!(f, "{}", "-".repeat(title.len() + 8))
}

fn auc(metrics: &ModelMetrics) -> String {
    metrics
        .roc_auc
        .map(|value| format!("{:.3}", value))
        .unwrap_or_else(|| "undefined".to_string())
}

fn write_classification_report(f: &mut fmt::Formatter<'_>, metrics: &ModelMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>14} {:>10} {:>10} {:>10} {:>10}",
        "", "precision", "recall", "f1-score", "support"
    )?;
    for class in &metrics.per_class_metrics {
        writeln!(
            f,
            "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
            class.label, class.precision, class.recall, class.f1_score, class.support
        )?;
    }
    writeln!(f)?;
    writeln!(
        f,
        "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
        "accuracy", "", "", metrics.accuracy, metrics.n_samples
    )?;
    writeln!(
        f,
        "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
        "macro avg", metrics.precision, metrics.recall, metrics.f1_score, metrics.n_samples
    )?;
    writeln!(
        f,
        "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
        "weighted avg",
        metrics.weighted_precision,
        metrics.weighted_recall,
        metrics.weighted_f1_score,
        metrics.n_samples
    )
}

fn write_confusion_matrix(f: &mut fmt::Formatter<'_>, metrics: &ModelMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>22} {:>14} {:>14}",
        "actual \\ predicted", CLASS_NAMES[0], CLASS_NAMES[1]
    )?;
    for (label, row) in CLASS_NAMES.iter().zip(metrics.confusion_matrix.outer_iter()) {
        write!(f, "{:>22}", label)?;
        for count in row.iter() {
            write!(f, " {:>14}", count)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IT Incident SLA Breach Prediction Analysis")?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))?;

        section(f, 1, "DATA EXPLORATION")?;
        writeln!(f, "Events: {}", self.summary.n_events)?;
        writeln!(f, "Unique incidents: {}", self.summary.n_incidents)?;
        writeln!(
            f,
            "Data quality: missing values={}, duplicate keys={}",
            self.summary.missing_values, self.summary.duplicate_keys
        )?;

        section(f, 2, "PREDICTION PROBLEM DEFINITION")?;
        writeln!(f, "Prediction target: {}", self.prediction_target)?;
        writeln!(
            f,
            "Overall SLA breach rate: {:.1}%",
            self.summary.breach_rate * 100.0
        )?;

        section(f, 3, "DATA PREPROCESSING")?;
        writeln!(
            f,
            "Kept {} events within the first {} of each incident",
            self.early_window_events, self.window_size
        )?;

        section(f, 4, "FEATURE ENGINEERING")?;
        writeln!(
            f,
            "Feature matrix shape: ({}, {})",
            self.feature_shape.0, self.feature_shape.1
        )?;

        section(f, 5, "MODEL PREPARATION")?;
        writeln!(
            f,
            "Training set: ({}, {}), Test set: ({}, {})",
            self.train_shape.0, self.train_shape.1, self.test_shape.0, self.test_shape.1
        )?;
        writeln!(
            f,
            "Breach rate: train {:.1}%, test {:.1}%",
            self.train_breach_rate * 100.0,
            self.test_breach_rate * 100.0
        )?;

        section(f, 6, "MODEL BUILDING & EVALUATION")?;
        writeln!(f, "{} AUC: {}", self.baseline.model, auc(&self.baseline.metrics))?;
        writeln!(
            f,
            "{} AUC: {} (scale_pos_weight {:.3}, {} trees{})",
            self.advanced.model,
            auc(&self.advanced.metrics),
            self.scale_pos_weight,
            self.n_trees,
            self.best_iteration
                .map(|i| format!(", best iteration {}", i))
                .unwrap_or_default()
        )?;
        writeln!(f)?;
        writeln!(f, "Classification report:")?;
        write_classification_report(f, &self.advanced.metrics)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix:")?;
        write_confusion_matrix(f, &self.advanced.metrics)?;

        section(f, 7, "MODEL INTERPRETATION")?;
        writeln!(
            f,
            "Top {} early warning signals:",
            self.top_features.len()
        )?;
        for (rank, item) in self.top_features.iter().enumerate() {
            writeln!(f, "{:>3}. {:<28} {:.4}", rank + 1, item.feature, item.importance)?;
        }

        section(f, 8, "WHAT-IF ANALYSIS")?;
        match &self.what_if {
            WhatIfOutcome::Scenario(scenario) => {
                writeln!(
                    f,
                    "Incident {} had a {:.1}% predicted risk of SLA breach.",
                    scenario.incident_id,
                    scenario.original_probability * 100.0
                )?;
                writeln!(f, "What if: {}?", scenario.change_description)?;
                writeln!(
                    f,
                    "The predicted risk changed to {:.1}%, a {:+.1}% shift.",
                    scenario.modified_probability * 100.0,
                    scenario.shift * 100.0
                )?;
            }
            WhatIfOutcome::NoSuitableCase { reason } => {
                writeln!(f, "No suitable case for what-if analysis: {}", reason)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(RULE_WIDTH))
    }
}
