use crate::dataset::EventLog;
use crate::error::Result;
use crate::ml::classifier::{Classifier, GradientBoostingClassifier, MajorityClassClassifier};
use crate::ml::encoding::FeatureEncoder;
use crate::ml::features::{FeatureExtractor, IncidentFeatures, FEATURE_NAMES, PRIORITY_FEATURE};
use crate::ml::interpretation::{rank_features, WhatIfProbe};
use crate::ml::models::PipelineConfig;
use crate::ml::window::EarlyWindowFilter;
use crate::report::{ModelEvaluation, PipelineReport};
use tracing::{info, instrument};
use validator::Validate;

/// Name of the label column
pub const PREDICTION_TARGET: &str = "sla_breached";

/// Engineered features plus the analysis report of one run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub features: Vec<IncidentFeatures>,
    pub report: PipelineReport,
}

/// Early-warning pipeline: window, features, encoding, training, interpretation.
///
/// A run is a function of the event log and the configuration; all seeds come
/// from [`PipelineConfig`].
pub struct SlaPipeline {
    config: PipelineConfig,
}

impl SlaPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Early-window filtering and per-incident feature extraction
    pub fn engineer_features(&self, log: &EventLog) -> (usize, Vec<IncidentFeatures>) {
        let window = EarlyWindowFilter::new(self.config.window_size).apply(log.events());
        let features = FeatureExtractor::extract(&window);
        (window.len(), features)
    }

    #[instrument(skip_all, fields(events = log.len()))]
    pub fn run(&self, log: &EventLog) -> Result<PipelineOutput> {
        self.config.validate()?;

        let summary = log.summary();
        info!(
            incidents = summary.n_incidents,
            breach_rate = summary.breach_rate,
            "Explored event log"
        );

        let (early_window_events, features) = self.engineer_features(log);
        info!(
            window_size = self.config.window_size,
            early_window_events,
            rows = features.len(),
            "Engineered features"
        );

        let (encoder, dataset) =
            FeatureEncoder::fit_transform(&features, self.config.unknown_category)?;
        let (train, test) =
            dataset.stratified_split(self.config.test_size, self.config.split_seed)?;
        info!(
            train = train.n_samples,
            test = test.n_samples,
            "Prepared train/test split"
        );

        let mut baseline = MajorityClassClassifier::new();
        baseline.train(&train, None)?;
        let baseline_metrics = baseline.evaluate(&test)?;
        info!(auc = ?baseline_metrics.roc_auc, "Baseline evaluated");

        let mut advanced = GradientBoostingClassifier::new(self.config.model.clone());
        advanced.train(&train, Some(&test))?;
        let advanced_metrics = advanced.evaluate(&test)?;
        info!(auc = ?advanced_metrics.roc_auc, "Gradient boosting evaluated");

        let ranking = rank_features(&dataset.feature_names, advanced.feature_importances());
        let mut probe = WhatIfProbe::new(self.config.probe_seed);
        if let Some(priority) = encoder.encoder(PRIORITY_FEATURE) {
            probe = probe.with_priority_encoder(priority);
        }
        let what_if = probe.run(&advanced, &test, &dataset.features, &ranking)?;

        let report = PipelineReport {
            generated_at: chrono::Utc::now(),
            summary,
            prediction_target: PREDICTION_TARGET.to_string(),
            window_size: self.config.window_size,
            early_window_events,
            // Identifier and label columns included, as in the feature table
            feature_shape: (features.len(), FEATURE_NAMES.len() + 2),
            feature_names: dataset.feature_names.clone(),
            train_shape: train.features.dim(),
            test_shape: test.features.dim(),
            train_breach_rate: train.positive_rate(),
            test_breach_rate: test.positive_rate(),
            scale_pos_weight: advanced.scale_pos_weight(),
            n_trees: advanced.n_trees(),
            best_iteration: advanced.best_iteration(),
            baseline: ModelEvaluation {
                model: baseline.model_type().to_string(),
                metrics: baseline_metrics,
            },
            advanced: ModelEvaluation {
                model: advanced.model_type().to_string(),
                metrics: advanced_metrics,
            },
            top_features: ranking.into_iter().take(self.config.top_n).collect(),
            what_if,
        };

        Ok(PipelineOutput { features, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::generator::generate_incidents;
    use crate::ml::models::BoostingConfig;

    fn log(n_incidents: usize) -> EventLog {
        generate_incidents(&GeneratorConfig {
            n_incidents,
            seed: Some(42),
            ..Default::default()
        })
        .unwrap()
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            probe_seed: Some(1),
            model: BoostingConfig {
                n_estimators: 20,
                max_depth: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_engineer_features_one_row_per_incident() {
        let log = log(40);
        let (window_events, rows) = SlaPipeline::new(fast_config()).engineer_features(&log);

        // Every generated incident has at least three events
        assert_eq!(window_events, 120);
        assert_eq!(rows.len(), 40);
    }

    #[test]
    fn test_run_produces_report() {
        let output = SlaPipeline::new(fast_config()).run(&log(200)).unwrap();
        let report = &output.report;

        assert_eq!(output.features.len(), 200);
        assert_eq!(report.feature_shape, (200, 13));
        assert_eq!(report.train_shape.0 + report.test_shape.0, 200);
        assert_eq!(report.test_shape, (40, 11));
        assert_eq!(report.top_features.len(), 5);
        assert!((report.baseline.metrics.roc_auc.unwrap() - 0.5).abs() < 1e-12);
        assert!(report.n_trees >= 1 && report.n_trees <= 20);
    }

    #[test]
    fn test_run_rejects_invalid_config() {
        let config = PipelineConfig {
            window_size: 0,
            ..fast_config()
        };
        let err = SlaPipeline::new(config).run(&log(40)).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let config = PipelineConfig {
            model: BoostingConfig {
                n_estimators: 0,
                ..Default::default()
            },
            ..fast_config()
        };
        let err = SlaPipeline::new(config).run(&log(40)).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
