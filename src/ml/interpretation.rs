//! Feature importance ranking and single-case sensitivity probes.

use crate::error::{AppError, Result};
use crate::ml::classifier::Classifier;
use crate::ml::encoding::CategoricalEncoder;
use crate::ml::features::PRIORITY_FEATURE;
use crate::ml::models::TrainingDataset;
use ndarray::{Array2, Axis};
use ndarray_stats::QuantileExt;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Scale applied to non-ordinal features by the what-if probe
pub const PERTURBATION_FACTOR: f64 = 1.5;

/// Importance score of a single feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Sort features by importance, highest first. Ties keep column order.
pub fn rank_features(feature_names: &[String], importances: &[f64]) -> Vec<FeatureImportance> {
    let mut ranking: Vec<FeatureImportance> = feature_names
        .iter()
        .zip(importances.iter())
        .map(|(feature, &importance)| FeatureImportance {
            feature: feature.clone(),
            importance,
        })
        .collect();
    ranking.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranking
}

/// Result of a what-if probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WhatIfOutcome {
    Scenario(WhatIfScenario),
    NoSuitableCase { reason: String },
}

/// A single perturbed prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatIfScenario {
    pub incident_id: String,
    pub feature: String,
    pub original_value: f64,
    pub modified_value: f64,
    pub change_description: String,
    pub original_probability: f64,
    pub modified_probability: f64,
    pub shift: f64,
}

/// Perturbs the most important feature of one low-risk test incident and
/// measures how the predicted breach probability moves.
///
/// Candidates are test rows the model predicts as non-breach whose priority
/// code is below the highest code present in `reference`. Priority is raised
/// one level; any other feature is scaled by [`PERTURBATION_FACTOR`].
pub struct WhatIfProbe<'a> {
    seed: Option<u64>,
    priority_encoder: Option<&'a CategoricalEncoder>,
}

impl<'a> WhatIfProbe<'a> {
    /// `seed = None` draws the case with an entropy-seeded generator
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            priority_encoder: None,
        }
    }

    /// Render priority changes with category names instead of codes
    pub fn with_priority_encoder(mut self, encoder: &'a CategoricalEncoder) -> Self {
        self.priority_encoder = Some(encoder);
        self
    }

    pub fn run(
        &self,
        model: &dyn Classifier,
        test: &TrainingDataset,
        reference: &Array2<f64>,
        ranking: &[FeatureImportance],
    ) -> Result<WhatIfOutcome> {
        let Some(top) = ranking.first() else {
            return Ok(no_case("feature ranking is empty"));
        };
        let Some(priority_idx) = test.feature_index(PRIORITY_FEATURE) else {
            return Ok(no_case("dataset has no priority column"));
        };
        let feature_idx = test.feature_index(&top.feature).ok_or_else(|| {
            AppError::Internal(format!("Ranked feature '{}' not in dataset", top.feature))
        })?;

        if reference.nrows() == 0 || test.n_samples == 0 {
            return Ok(no_case("no rows to probe"));
        }
        let max_priority = *reference
            .column(priority_idx)
            .max()
            .map_err(|e| AppError::Internal(format!("Cannot compute priority maximum: {}", e)))?;

        let predictions = model.predict(&test.features)?;
        let candidates: Vec<usize> = predictions
            .iter()
            .enumerate()
            .filter(|&(row, &prediction)| {
                prediction == 0 && test.features[[row, priority_idx]] < max_priority
            })
            .map(|(row, _)| row)
            .collect();

        debug!(candidates = candidates.len(), "What-if candidates");

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let Some(&row) = candidates.choose(&mut rng) else {
            return Ok(no_case(
                "no test incident is predicted as non-breach with priority below the maximum",
            ));
        };

        let original = test.features.select(Axis(0), &[row]);
        let mut modified = original.clone();
        let original_value = original[[0, feature_idx]];
        let is_priority = feature_idx == priority_idx;
        let modified_value = if is_priority {
            (original_value + 1.0).min(max_priority)
        } else {
            original_value * PERTURBATION_FACTOR
        };
        modified[[0, feature_idx]] = modified_value;

        let original_probability = model.predict_positive_proba(&original)?[0];
        let modified_probability = model.predict_positive_proba(&modified)?[0];

        let change_description = if is_priority {
            format!(
                "Increased priority from {} to {}",
                self.priority_label(original_value),
                self.priority_label(modified_value)
            )
        } else {
            format!(
                "Increased {} by {:.0}% ({:.2} -> {:.2})",
                top.feature,
                (PERTURBATION_FACTOR - 1.0) * 100.0,
                original_value,
                modified_value
            )
        };

        let scenario = WhatIfScenario {
            incident_id: test.incident_ids[row].clone(),
            feature: top.feature.clone(),
            original_value,
            modified_value,
            change_description,
            original_probability,
            modified_probability,
            shift: modified_probability - original_probability,
        };

        info!(
            incident_id = %scenario.incident_id,
            feature = %scenario.feature,
            shift = scenario.shift,
            "What-if probe complete"
        );

        Ok(WhatIfOutcome::Scenario(scenario))
    }

    fn priority_label(&self, code: f64) -> String {
        self.priority_encoder
            .and_then(|encoder| encoder.inverse(code as usize))
            .map(str::to_string)
            .unwrap_or_else(|| format!("code {}", code))
    }
}

fn no_case(reason: &str) -> WhatIfOutcome {
    info!(reason, "What-if probe found no suitable case");
    WhatIfOutcome::NoSuitableCase {
        reason: reason.to_string(),
    }
}
