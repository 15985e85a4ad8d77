use crate::error::{AppError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Display names of the two outcome classes
pub const CLASS_NAMES: [&str; 2] = ["Not Breached", "Breached"];

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Number of evaluated samples
    pub n_samples: usize,

    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Support-weighted precision
    pub weighted_precision: f64,

    /// Support-weighted recall
    pub weighted_recall: f64,

    /// Support-weighted F1 score
    pub weighted_f1_score: f64,

    /// Area under the ROC curve; `None` when only one class is present
    pub roc_auc: Option<f64>,

    /// Confusion matrix (rows = actual, columns = predicted)
    pub confusion_matrix: Array2<usize>,

    /// Per-class metrics, in class order
    pub per_class_metrics: Vec<ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Evaluate binary predictions and positive-class probability scores
    pub fn evaluate(y_true: &[usize], y_pred: &[usize], y_score: &[f64]) -> Result<Self> {
        if y_true.len() != y_pred.len() || y_true.len() != y_score.len() {
            return Err(AppError::Internal(format!(
                "Metric inputs differ in length: {} labels, {} predictions, {} scores",
                y_true.len(),
                y_pred.len(),
                y_score.len()
            )));
        }

        let n_samples = y_true.len();
        let n_classes = CLASS_NAMES.len();
        let confusion_matrix = confusion_matrix(y_true, y_pred, n_classes);

        let correct: usize = (0..n_classes).map(|c| confusion_matrix[[c, c]]).sum();
        let accuracy = if n_samples > 0 {
            correct as f64 / n_samples as f64
        } else {
            0.0
        };

        let per_class_metrics: Vec<ClassMetrics> = (0..n_classes)
            .map(|class_idx| {
                let tp = confusion_matrix[[class_idx, class_idx]];
                let predicted: usize = confusion_matrix.column(class_idx).sum();
                let support: usize = confusion_matrix.row(class_idx).sum();

                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                ClassMetrics {
                    label: CLASS_NAMES[class_idx].to_string(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let macro_avg = |f: fn(&ClassMetrics) -> f64| {
            per_class_metrics.iter().map(f).sum::<f64>() / n_classes as f64
        };
        let weighted_avg = |f: fn(&ClassMetrics) -> f64| {
            if n_samples == 0 {
                return 0.0;
            }
            per_class_metrics
                .iter()
                .map(|m| f(m) * m.support as f64)
                .sum::<f64>()
                / n_samples as f64
        };

        Ok(Self {
            n_samples,
            accuracy,
            precision: macro_avg(|m| m.precision),
            recall: macro_avg(|m| m.recall),
            f1_score: macro_avg(|m| m.f1_score),
            weighted_precision: weighted_avg(|m| m.precision),
            weighted_recall: weighted_avg(|m| m.recall),
            weighted_f1_score: weighted_avg(|m| m.f1_score),
            roc_auc: roc_auc_score(y_true, y_score).ok(),
            confusion_matrix,
            per_class_metrics,
        })
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Confusion matrix with rows = actual class and columns = predicted class
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Array2<usize> {
    let mut matrix = Array2::zeros((n_classes, n_classes));
    for (&actual, &predicted) in y_true.iter().zip(y_pred.iter()) {
        if actual < n_classes && predicted < n_classes {
            matrix[[actual, predicted]] += 1;
        }
    }
    matrix
}

/// Area under the ROC curve from positive-class scores.
///
/// Uses the rank-sum formulation; tied scores share their average rank, so a
/// constant scorer yields exactly 0.5.
pub fn roc_auc_score(y_true: &[usize], y_score: &[f64]) -> Result<f64> {
    if y_true.len() != y_score.len() {
        return Err(AppError::Internal(
            "Labels and scores must have the same length".to_string(),
        ));
    }

    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(AppError::InsufficientData(
            "ROC AUC is undefined when only one class is present".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    let mut ranks = vec![0.0; y_score.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_score[order[end]] == y_score[order[start]] {
            end += 1;
        }
        // 1-based ranks start + 1 ..= end share their mean
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = mean_rank;
        }
        start = end;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(&y, _)| y == 1)
        .map(|(_, &rank)| rank)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Mean binary cross-entropy of positive-class probabilities
pub fn log_loss(y_true: &[usize], probabilities: &[f64]) -> f64 {
    const EPS: f64 = 1e-15;
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(probabilities.iter())
        .map(|(&y, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / y_true.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_ranking() {
        let auc = roc_auc_score(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);

        let auc = roc_auc_score(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn test_constant_scores_give_half() {
        let auc = roc_auc_score(&[0, 1, 0, 1, 1, 0], &[1.0; 6]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_auc_with_ties() {
        // Pairs: (0.4 vs 0.4) tie counts 0.5, (0.4 vs 0.6) win, (0.1 vs *) wins
        let auc = roc_auc_score(&[0, 0, 1, 1], &[0.1, 0.4, 0.4, 0.6]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_auc_single_class_is_error() {
        let err = roc_auc_score(&[1, 1, 1], &[0.2, 0.5, 0.9]).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_DATA");
    }

    #[test]
    fn test_confusion_matrix_layout() {
        let matrix = confusion_matrix(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0], 2);
        assert_eq!(matrix[[0, 0]], 1);
        assert_eq!(matrix[[0, 1]], 1);
        assert_eq!(matrix[[1, 0]], 1);
        assert_eq!(matrix[[1, 1]], 2);
    }

    #[test]
    fn test_classification_report() {
        let y_true = [0, 0, 0, 1, 1];
        let y_pred = [0, 0, 1, 1, 0];
        let y_score = [0.1, 0.2, 0.7, 0.9, 0.4];

        let metrics = ModelMetrics::evaluate(&y_true, &y_pred, &y_score).unwrap();
        assert_eq!(metrics.n_samples, 5);
        assert!((metrics.accuracy - 0.6).abs() < 1e-12);

        let negative = &metrics.per_class_metrics[0];
        assert_eq!(negative.label, "Not Breached");
        assert_eq!(negative.support, 3);
        assert!((negative.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((negative.recall - 2.0 / 3.0).abs() < 1e-12);

        let positive = &metrics.per_class_metrics[1];
        assert_eq!(positive.support, 2);
        assert!((positive.precision - 0.5).abs() < 1e-12);
        assert!((positive.recall - 0.5).abs() < 1e-12);

        assert!((metrics.recall - (2.0 / 3.0 + 0.5) / 2.0).abs() < 1e-12);
        assert!((metrics.weighted_recall - 0.6).abs() < 1e-12);
        assert!(metrics.roc_auc.is_some());
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let metrics = ModelMetrics::evaluate(&[0, 1], &[0, 0], &[0.3, 0.3]).unwrap();
        assert_eq!(metrics.per_class_metrics[1].precision, 0.0);
        assert_eq!(metrics.per_class_metrics[1].f1_score, 0.0);
        assert_eq!(metrics.roc_auc, Some(0.5));
    }

    #[test]
    fn test_log_loss() {
        assert!(log_loss(&[1, 0], &[1.0, 0.0]) < 1e-10);
        let loss = log_loss(&[1], &[0.5]);
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-12);
    }
}
