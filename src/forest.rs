//! Bagged decision-tree ensemble (random forest) for binary labels.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub trees: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        positive_rate: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn positive_rate(&self, sample: &[f64]) -> f64 {
        match self {
            Node::Leaf { positive_rate } => *positive_rate,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] <= *threshold {
                    left.positive_rate(sample)
                } else {
                    right.positive_rate(sample)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

fn best_split_on(
    features: &[Vec<f64>],
    labels: &[bool],
    rows: &[usize],
    feature: usize,
) -> Option<SplitCandidate> {
    let mut column: Vec<(f64, bool)> = rows
        .iter()
        .map(|&row| (features[row][feature], labels[row]))
        .collect();
    column.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total = column.len();
    let total_positive = column.iter().filter(|(_, label)| *label).count();
    let mut left_positive = 0;
    let mut best: Option<SplitCandidate> = None;

    for i in 1..total {
        if column[i - 1].1 {
            left_positive += 1;
        }
        if column[i - 1].0 == column[i].0 {
            continue;
        }
        let left_total = i;
        let right_total = total - i;
        let impurity = (left_total as f64 * gini(left_positive, left_total)
            + right_total as f64 * gini(total_positive - left_positive, right_total))
            / total as f64;

        if best.as_ref().map_or(true, |b| impurity < b.impurity) {
            let (below, above) = (column[i - 1].0, column[i].0);
            // Adjacent floats have no representable midpoint strictly below `above`.
            let midpoint = (below + above) / 2.0;
            let threshold = if below < midpoint && midpoint < above {
                midpoint
            } else {
                below
            };
            best = Some(SplitCandidate {
                feature,
                threshold,
                impurity,
            });
        }
    }

    best
}

fn grow(
    features: &[Vec<f64>],
    labels: &[bool],
    rows: Vec<usize>,
    max_features: usize,
    rng: &mut ChaCha8Rng,
) -> Node {
    let positives = rows.iter().filter(|&&row| labels[row]).count();
    let leaf = Node::Leaf {
        positive_rate: positives as f64 / rows.len().max(1) as f64,
    };
    if positives == 0 || positives == rows.len() || rows.len() < 2 {
        return leaf;
    }

    let n_features = features[rows[0]].len();
    let pick_best = |candidates: &mut dyn Iterator<Item = usize>| {
        candidates
            .filter_map(|feature| best_split_on(features, labels, &rows, feature))
            .min_by(|a, b| a.impurity.total_cmp(&b.impurity))
    };

    let sampled = index::sample(rng, n_features, max_features.min(n_features));
    // Constant sampled features fall back to the full feature set.
    let split = pick_best(&mut sampled.into_iter())
        .or_else(|| pick_best(&mut (0..n_features)));

    let Some(split) = split else {
        return leaf;
    };

    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .copied()
        .partition(|&row| features[row][split.feature] <= split.threshold);
    if left.is_empty() || right.is_empty() {
        return leaf;
    }

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow(features, labels, left, max_features, rng)),
        right: Box::new(grow(features, labels, right, max_features, rng)),
    }
}

impl RandomForest {
    /// Fits fully grown trees on bootstrap samples, considering
    /// `ceil(sqrt(n_features))` candidate features per split.
    pub fn fit(features: &[Vec<f64>], labels: &[bool], params: ForestParams) -> Self {
        let n = features.len();
        if n == 0 {
            return Self { trees: Vec::new() };
        }

        let n_features = features[0].len();
        let max_features = ((n_features as f64).sqrt().ceil() as usize).max(1);
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        let trees = (0..params.trees)
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                grow(features, labels, bootstrap, max_features, &mut rng)
            })
            .collect();

        Self { trees }
    }

    pub fn predict_proba(&self, sample: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: f64 = self.trees.iter().map(|tree| tree.positive_rate(sample)).sum();
        total / self.trees.len() as f64
    }

    /// Ties go to the negative class.
    pub fn predict(&self, sample: &[f64]) -> bool {
        self.predict_proba(sample) > 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        let features = vec![
            vec![40.0, 50.0],
            vec![45.0, 55.0],
            vec![50.0, 45.0],
            vec![55.0, 60.0],
            vec![85.0, 90.0],
            vec![90.0, 80.0],
            vec![88.0, 95.0],
            vec![92.0, 85.0],
        ];
        let labels = vec![false, false, false, false, true, true, true, true];
        (features, labels)
    }

    #[test]
    fn learns_a_separable_rule() {
        let (features, labels) = separable();
        let forest = RandomForest::fit(&features, &labels, ForestParams { trees: 25, seed: 42 });
        assert!(forest.predict(&[95.0, 95.0]));
        assert!(!forest.predict(&[30.0, 35.0]));
    }

    #[test]
    fn same_seed_same_probabilities() {
        let (features, labels) = separable();
        let params = ForestParams { trees: 10, seed: 7 };
        let a = RandomForest::fit(&features, &labels, params);
        let b = RandomForest::fit(&features, &labels, params);
        for sample in &features {
            assert_eq!(a.predict_proba(sample), b.predict_proba(sample));
        }
    }

    #[test]
    fn constant_features_yield_leaf_majority() {
        let features = vec![vec![1.0], vec![1.0], vec![1.0]];
        let labels = vec![true, true, false];
        let forest = RandomForest::fit(&features, &labels, ForestParams { trees: 5, seed: 1 });
        let p = forest.predict_proba(&[1.0]);
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn adjacent_float_values_still_split() {
        let below = 74.99999999999999_f64;
        assert_eq!((below + 75.0) / 2.0, 75.0);
        let features = vec![vec![75.0], vec![75.0], vec![below], vec![below]];
        let labels = vec![true, true, false, false];

        let split = best_split_on(&features, &labels, &[0, 1, 2, 3], 0).unwrap();
        assert_eq!(split.threshold, below);
        assert_eq!(split.impurity, 0.0);

        let forest = RandomForest::fit(&features, &labels, ForestParams { trees: 25, seed: 42 });
        assert!(forest.predict(&[75.0]));
        assert!(!forest.predict(&[below]));
    }

    #[test]
    fn gini_is_zero_when_pure() {
        assert_eq!(gini(0, 4), 0.0);
        assert_eq!(gini(4, 4), 0.0);
        assert!((gini(2, 4) - 0.5).abs() < 1e-12);
    }
}
