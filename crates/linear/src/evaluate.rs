//! Held-out evaluation metrics.
//!
//! Regression error is always reported. ROC AUC is added only when the test
//! targets are 0/1 labels.

use crate::trainer::RidgeBundle;
use ndarray::ArrayView1;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use ticklab_core::{Error, Result};
use tracing::{info, warn};

/// Metrics on the test split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Number of test rows.
    pub n_test: usize,
    /// Mean squared error.
    pub mse: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Area under the ROC curve (binary targets with both classes only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auc: Option<f64>,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_test={} mse={:.6e} rmse={:.6e}", self.n_test, self.mse, self.rmse)?;
        if let Some(auc) = self.auc {
            write!(f, " auc={:.4}", auc)?;
        }
        Ok(())
    }
}

/// Evaluate a trained bundle on its held-out rows.
pub fn evaluate(bundle: &RidgeBundle) -> Result<EvaluationReport> {
    let predictions = bundle.predict_test()?;
    let report = evaluate_predictions(bundle.y_test.view(), predictions.view())?;
    info!("Evaluation: {}", report);
    Ok(report)
}

/// Compare predictions against true targets.
pub fn evaluate_predictions(
    y_true: ArrayView1<'_, f64>,
    y_pred: ArrayView1<'_, f64>,
) -> Result<EvaluationReport> {
    if y_true.len() != y_pred.len() {
        return Err(Error::data(format!(
            "{} targets but {} predictions",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(Error::insufficient_data("no test rows to evaluate"));
    }

    let n = y_true.len() as f64;
    let mse = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n;

    let auc = if is_binary(y_true) {
        let labels: Vec<f64> = y_true.to_vec();
        let scores: Vec<f64> = y_pred.to_vec();
        let auc = roc_auc(&labels, &scores);
        if auc.is_none() {
            warn!("Test targets hold a single class; AUC omitted");
        }
        auc
    } else {
        None
    };

    Ok(EvaluationReport {
        n_test: y_true.len(),
        mse,
        rmse: mse.sqrt(),
        auc,
    })
}

/// All values are exactly 0 or 1.
fn is_binary(values: ArrayView1<'_, f64>) -> bool {
    values.iter().all(|&v| v == 0.0 || v == 1.0)
}

/// Rank-based ROC AUC (Mann-Whitney U) with average ranks for tied scores.
///
/// `labels` are 0/1. Returns `None` unless both classes are present.
pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }
    let n_pos = labels.iter().filter(|&&l| l == 1.0).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by_key(|&i| OrderedFloat(scores[i]));

    // 1-based ranks, ties share the mean of the positions they span.
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + end + 1) as f64 / 2.0;
        for &i in &order[start..end] {
            ranks[i] = avg_rank;
        }
        start = end;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l == 1.0)
        .map(|(_, r)| *r)
        .sum();
    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_known_auc() {
        let auc = roc_auc(&[0.0, 0.0, 1.0, 1.0], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert_abs_diff_eq!(auc, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_auc_extremes_and_ties() {
        let perfect = roc_auc(&[0.0, 1.0, 0.0, 1.0], &[0.1, 0.9, 0.2, 0.8]).unwrap();
        assert_abs_diff_eq!(perfect, 1.0, epsilon = 1e-12);

        let inverted = roc_auc(&[1.0, 0.0], &[0.1, 0.9]).unwrap();
        assert_abs_diff_eq!(inverted, 0.0, epsilon = 1e-12);

        // All scores tied: every pair counts half.
        let tied = roc_auc(&[0.0, 1.0, 1.0], &[0.5, 0.5, 0.5]).unwrap();
        assert_abs_diff_eq!(tied, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_single_class_has_no_auc() {
        assert!(roc_auc(&[1.0, 1.0], &[0.2, 0.3]).is_none());

        let report = evaluate_predictions(array![1.0, 1.0].view(), array![0.5, 0.7].view()).unwrap();
        assert!(report.auc.is_none());
    }

    #[test]
    fn test_regression_metrics() {
        let y = array![0.01, -0.02, 0.03];
        let p = array![0.0, 0.0, 0.0];
        let report = evaluate_predictions(y.view(), p.view()).unwrap();

        let mse = (0.0001 + 0.0004 + 0.0009) / 3.0;
        assert_abs_diff_eq!(report.mse, mse, epsilon = 1e-15);
        assert_abs_diff_eq!(report.rmse, mse.sqrt(), epsilon = 1e-12);
        // Continuous targets never get an AUC.
        assert!(report.auc.is_none());
    }

    #[test]
    fn test_binary_targets_get_auc() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.4, 0.35, 0.8];
        let report = evaluate_predictions(y.view(), p.view()).unwrap();
        assert_abs_diff_eq!(report.auc.unwrap(), 0.75, epsilon = 1e-12);
        assert_eq!(report.n_test, 4);
    }

    #[test]
    fn test_mismatched_lengths() {
        let result = evaluate_predictions(array![1.0].view(), array![1.0, 2.0].view());
        assert!(matches!(result, Err(Error::Data(_))));
    }

    #[test]
    fn test_evaluate_bundle_end_to_end() {
        use crate::trainer::train_ridge;
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use ticklab_core::Bar;
        use ticklab_features::{add_direction_label, add_forward_return, FeatureEngine};

        let mut rng = StdRng::seed_from_u64(3);
        let mut price = 100.0;
        let bars: Vec<Bar> = (0..300)
            .map(|i| {
                price += rng.gen_range(-0.3..0.3);
                Bar {
                    ts_ms: i * 60_000,
                    open: price,
                    high: price + 0.1,
                    low: price - 0.1,
                    close: price,
                    volume: rng.gen_range(1.0..50.0),
                    bid_size: None,
                    ask_size: None,
                }
            })
            .collect();

        let frame = FeatureEngine::new(10).unwrap().compute_features(&bars).unwrap();
        let frame = add_forward_return(&frame, 1, "future_return").unwrap();

        let bundle = train_ridge(&frame, "future_return", 1.0).unwrap();
        let report = evaluate(&bundle).unwrap();
        assert!(report.mse.is_finite());
        assert!(report.auc.is_none());

        let labelled = add_direction_label(&frame, "future_return", "up")
            .unwrap()
            .drop_column("future_return")
            .unwrap()
            .0;
        let bundle = train_ridge(&labelled, "up", 1.0).unwrap();
        let report = evaluate(&bundle).unwrap();
        let auc = report.auc.unwrap();
        assert!((0.0..=1.0).contains(&auc));
    }
}
