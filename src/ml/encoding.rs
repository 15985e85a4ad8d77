use crate::error::{AppError, Result};
use crate::ml::features::{IncidentFeatures, FEATURE_NAMES};
use crate::ml::models::TrainingDataset;
use crate::models::Priority;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

/// What to do with a category value that was not seen during fitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Fail with an encoding error
    #[default]
    Reject,

    /// Map every unseen value to the reserved code `n_categories`
    Reserve,
}

/// Fixed mapping from the category values of one column to integer codes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    column: String,
    categories: Vec<String>,
    codes: HashMap<String, usize>,
    policy: UnknownCategoryPolicy,
}

impl CategoricalEncoder {
    /// Fit on observed values; codes follow lexicographic order
    pub fn fit<'a, I>(column: &str, values: I, policy: UnknownCategoryPolicy) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::fit_ordered(column, values, policy, |value| value.to_string())
    }

    /// Fit on observed values; codes follow the order of `key`
    pub fn fit_ordered<'a, I, K, F>(
        column: &str,
        values: I,
        policy: UnknownCategoryPolicy,
        key: F,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
        K: Ord,
        F: Fn(&str) -> K,
    {
        let unique: BTreeSet<&str> = values.into_iter().collect();
        let mut categories: Vec<String> = unique.into_iter().map(str::to_string).collect();
        categories.sort_by_key(|value| key(value));

        let codes = categories
            .iter()
            .enumerate()
            .map(|(code, value)| (value.clone(), code))
            .collect();

        Self {
            column: column.to_string(),
            categories,
            codes,
            policy,
        }
    }

    /// Integer code of a category value
    pub fn transform(&self, value: &str) -> Result<usize> {
        match self.codes.get(value) {
            Some(&code) => Ok(code),
            None => match self.policy {
                UnknownCategoryPolicy::Reserve => Ok(self.categories.len()),
                UnknownCategoryPolicy::Reject => Err(AppError::Encoding {
                    column: self.column.clone(),
                    value: value.to_string(),
                }),
            },
        }
    }

    /// Category value for a code, if the code belongs to a fitted category
    pub fn inverse(&self, code: usize) -> Option<&str> {
        self.categories.get(code).map(String::as_str)
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn n_categories(&self) -> usize {
        self.categories.len()
    }
}

/// Ordering key for priority values: known levels by urgency, then the rest by name
fn priority_rank(value: &str) -> (usize, String) {
    let level = Priority::from_str(value)
        .map(|priority| priority.level())
        .unwrap_or(usize::MAX);
    (level, value.to_string())
}

/// Encodes incident feature rows into a numeric training dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    incident_type: CategoricalEncoder,
    priority: CategoricalEncoder,
    affected_system: CategoricalEncoder,
}

impl FeatureEncoder {
    /// Learn the category mappings from observed rows
    pub fn fit(rows: &[IncidentFeatures], policy: UnknownCategoryPolicy) -> Self {
        Self {
            incident_type: CategoricalEncoder::fit(
                "incident_type",
                rows.iter().map(|r| r.incident_type.as_str()),
                policy,
            ),
            priority: CategoricalEncoder::fit_ordered(
                "priority",
                rows.iter().map(|r| r.priority.as_str()),
                policy,
                priority_rank,
            ),
            affected_system: CategoricalEncoder::fit(
                "affected_system",
                rows.iter().map(|r| r.affected_system.as_str()),
                policy,
            ),
        }
    }

    /// Encode a single row in `FEATURE_NAMES` order
    pub fn transform_row(&self, row: &IncidentFeatures) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(FEATURE_NAMES.len());
        values.push(self.incident_type.transform(&row.incident_type)? as f64);
        values.push(self.priority.transform(&row.priority)? as f64);
        values.push(self.affected_system.transform(&row.affected_system)? as f64);
        values.extend_from_slice(&row.numeric_values());
        Ok(values)
    }

    /// Encode rows into a dataset; identifiers and labels are carried alongside
    pub fn transform(&self, rows: &[IncidentFeatures]) -> Result<TrainingDataset> {
        let n_features = FEATURE_NAMES.len();
        let mut data = Vec::with_capacity(rows.len() * n_features);
        for row in rows {
            data.extend(self.transform_row(row)?);
        }

        let features = Array2::from_shape_vec((rows.len(), n_features), data)
            .map_err(|e| AppError::Internal(format!("Failed to create feature matrix: {}", e)))?;

        TrainingDataset::new(
            features,
            rows.iter().map(IncidentFeatures::label).collect(),
            rows.iter().map(|r| r.incident_id.clone()).collect(),
            FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
        )
    }

    /// Fit and transform in one step
    pub fn fit_transform(
        rows: &[IncidentFeatures],
        policy: UnknownCategoryPolicy,
    ) -> Result<(Self, TrainingDataset)> {
        let encoder = Self::fit(rows, policy);
        let dataset = encoder.transform(rows)?;
        Ok((encoder, dataset))
    }

    /// Encoder of a categorical column
    pub fn encoder(&self, column: &str) -> Option<&CategoricalEncoder> {
        match column {
            "incident_type" => Some(&self.incident_type),
            "priority" => Some(&self.priority),
            "affected_system" => Some(&self.affected_system),
            _ => None,
        }
    }
}
