//! Diagnostic audit of the rule-based labels. Nothing here feeds back into a decision.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::EvaluationConfig;
use crate::forest::{ForestParams, RandomForest};
use crate::models::{EvaluationOutcome, EvaluationReport, InapplicableReason, Label};

const MIN_CLASS_MEMBERS: usize = 2;

/// Subject scores per student (rows) against the configured subject order (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Builds a dense matrix; a missing subject takes that column's mean so the
    /// trees never see a NaN.
    pub fn from_sparse(rows: &[Vec<Option<f64>>]) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let column_means: Vec<f64> = (0..width)
            .map(|column| {
                let present: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| row.get(column).copied().flatten())
                    .collect();
                if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                }
            })
            .collect();

        let rows = rows
            .iter()
            .map(|row| {
                (0..width)
                    .map(|column| {
                        row.get(column)
                            .copied()
                            .flatten()
                            .unwrap_or(column_means[column])
                    })
                    .collect()
            })
            .collect();

        Self { rows }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub fn applicability(labels: &[Label]) -> Result<(), InapplicableReason> {
    let passed = labels.iter().filter(|label| label.is_pass()).count();
    let failed = labels.len() - passed;
    if passed == 0 || failed == 0 {
        return Err(InapplicableReason::SingleClass);
    }
    if passed.min(failed) < MIN_CLASS_MEMBERS {
        return Err(InapplicableReason::MinorityClassTooSmall);
    }
    Ok(())
}

/// Per-class shuffle and cut. Every class keeps at least one member on each side,
/// which holds whenever each class has two or more members.
pub fn stratified_split(labels: &[Label], test_fraction: f64, seed: u64) -> StratifiedSplit {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut split = StratifiedSplit {
        train: Vec::new(),
        test: Vec::new(),
    };

    for class in [Label::Fail, Label::Pass] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(index, _)| index)
            .collect();
        if members.is_empty() {
            continue;
        }
        members.shuffle(&mut rng);

        let wanted = (members.len() as f64 * test_fraction).round() as usize;
        let test_count = if members.len() >= 2 {
            wanted.clamp(1, members.len() - 1)
        } else {
            wanted.min(members.len())
        };

        split.test.extend_from_slice(&members[..test_count]);
        split.train.extend_from_slice(&members[test_count..]);
    }

    split.train.sort_unstable();
    split.test.sort_unstable();
    split
}

/// Positive class is PASS. Undefined ratios degrade to zero.
pub fn binary_metrics(actual: &[bool], predicted: &[bool]) -> (f64, f64, f64, f64) {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    let mut correct = 0usize;

    for (&truth, &guess) in actual.iter().zip(predicted) {
        if truth == guess {
            correct += 1;
        }
        match (truth, guess) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let accuracy = ratio(correct, actual.len());
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    (accuracy, precision, recall, f1)
}

pub fn evaluate(
    features: &FeatureMatrix,
    labels: &[Label],
    config: &EvaluationConfig,
) -> EvaluationOutcome {
    if let Err(reason) = applicability(labels) {
        tracing::debug!(%reason, "evaluation not applicable");
        return EvaluationOutcome::NotApplicable { reason };
    }

    let split = stratified_split(labels, config.test_fraction, config.seed);
    let select = |indices: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
        indices
            .iter()
            .map(|&i| (features.rows[i].clone(), labels[i].is_pass()))
            .unzip()
    };
    let (train_x, train_y) = select(&split.train);
    let (test_x, test_y) = select(&split.test);

    let forest = RandomForest::fit(
        &train_x,
        &train_y,
        ForestParams {
            trees: config.trees,
            seed: config.seed,
        },
    );
    let predicted: Vec<bool> = test_x.iter().map(|row| forest.predict(row)).collect();
    let (accuracy, precision, recall, f1) = binary_metrics(&test_y, &predicted);

    let report = EvaluationReport {
        accuracy,
        precision,
        recall,
        f1,
        train_size: split.train.len(),
        test_size: split.test.len(),
    };
    tracing::debug!(
        train = report.train_size,
        test = report.test_size,
        accuracy,
        precision,
        recall,
        f1,
        "evaluation complete"
    );

    EvaluationOutcome::Evaluated(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pass: usize, fail: usize) -> Vec<Label> {
        let mut out = vec![Label::Pass; pass];
        out.extend(vec![Label::Fail; fail]);
        out
    }

    #[test]
    fn single_class_is_not_applicable() {
        assert_eq!(applicability(&labels(3, 0)), Err(InapplicableReason::SingleClass));
        assert_eq!(
            applicability(&labels(5, 1)),
            Err(InapplicableReason::MinorityClassTooSmall)
        );
        assert_eq!(applicability(&labels(2, 2)), Ok(()));
    }

    #[test]
    fn split_keeps_both_classes_on_both_sides() {
        let labels = labels(6, 4);
        let split = stratified_split(&labels, 0.3, 42);
        assert_eq!(split.train.len() + split.test.len(), 10);
        for side in [&split.train, &split.test] {
            assert!(side.iter().any(|&i| labels[i] == Label::Pass));
            assert!(side.iter().any(|&i| labels[i] == Label::Fail));
        }
    }

    #[test]
    fn split_is_reproducible() {
        let labels = labels(7, 5);
        assert_eq!(stratified_split(&labels, 0.3, 9), stratified_split(&labels, 0.3, 9));
    }

    #[test]
    fn metrics_degrade_to_zero_without_positive_predictions() {
        let (accuracy, precision, recall, f1) =
            binary_metrics(&[true, false, false], &[false, false, false]);
        assert!((accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(precision, 0.0);
        assert_eq!(recall, 0.0);
        assert_eq!(f1, 0.0);
    }

    #[test]
    fn perfect_predictions_score_one() {
        let truth = [true, false, true];
        assert_eq!(binary_metrics(&truth, &truth), (1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn missing_cells_take_column_mean() {
        let matrix = FeatureMatrix::from_sparse(&[
            vec![Some(80.0), None],
            vec![Some(60.0), Some(90.0)],
        ]);
        assert_eq!(matrix.rows[0], vec![80.0, 90.0]);
        assert_eq!(matrix.rows[1], vec![60.0, 90.0]);
    }

    #[test]
    fn evaluation_produces_bounded_metrics() {
        let rows: Vec<Vec<Option<f64>>> = (0..10)
            .map(|i| vec![Some(50.0 + i as f64 * 5.0), Some(55.0 + i as f64 * 4.0)])
            .collect();
        let labels: Vec<Label> = (0..10)
            .map(|i| if i >= 4 { Label::Pass } else { Label::Fail })
            .collect();
        let outcome = evaluate(
            &FeatureMatrix::from_sparse(&rows),
            &labels,
            &EvaluationConfig::default(),
        );
        let report = outcome.report().copied().unwrap();
        for (_, value) in report.named_metrics() {
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(report.train_size + report.test_size, 10);
    }
}
