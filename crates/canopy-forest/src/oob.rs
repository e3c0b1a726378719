//! Out-of-bag (OOB) evaluation for Random Forest.

use tracing::{debug, warn};

use crate::confusion::ConfusionMatrix;
use crate::error::RfError;
use crate::predict::ClassDistribution;
use crate::tree::DecisionTree;

/// Out-of-bag evaluation result.
#[derive(Debug, Clone)]
pub struct OobScore {
    /// Fraction of OOB-evaluated samples the OOB vote got right.
    pub accuracy: f64,
    /// OOB confusion matrix over the evaluated samples.
    pub confusion: ConfusionMatrix,
    /// Number of samples left out of at least one bootstrap.
    pub n_oob_samples: usize,
}

impl OobScore {
    /// OOB misclassification rate, `1 - accuracy`.
    ///
    /// 1.0 when no sample was ever out of bag.
    #[must_use]
    pub fn error(&self) -> f64 {
        1.0 - self.accuracy
    }
}

/// Score each sample with the trees that did not see it in training.
///
/// Votes are soft: the OOB trees' class probabilities are summed and the
/// argmax wins, lowest class on ties, as in [`RandomForest::predict`].
/// Samples that were in every bootstrap are skipped.
///
/// [`RandomForest::predict`]: crate::RandomForest::predict
pub(crate) fn compute_oob(
    trees: &[DecisionTree],
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
    oob_indices_per_tree: &[Vec<usize>],
) -> Result<OobScore, RfError> {
    let n_samples = features.len();
    let mut votes: Vec<Option<Vec<f64>>> = vec![None; n_samples];

    for (tree, oob_indices) in trees.iter().zip(oob_indices_per_tree) {
        for &sample_idx in oob_indices {
            let proba = tree.predict_proba(&features[sample_idx])?;
            let sums = votes[sample_idx].get_or_insert_with(|| vec![0.0; n_classes]);
            for (sum, p) in sums.iter_mut().zip(proba) {
                *sum += p;
            }
        }
    }

    let (true_labels, predicted): (Vec<usize>, Vec<usize>) = votes
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| {
            v.map(|sums| (labels[i], ClassDistribution::new(sums).predicted_class()))
        })
        .unzip();

    if true_labels.is_empty() {
        warn!(n_samples, "no sample was out of bag; reporting OOB error 1.0");
        return Ok(OobScore {
            accuracy: 0.0,
            confusion: ConfusionMatrix::zeros(n_classes),
            n_oob_samples: 0,
        });
    }

    let confusion = ConfusionMatrix::from_labels(&true_labels, &predicted, n_classes)?;
    let accuracy = confusion.accuracy();
    debug!(
        n_oob_samples = true_labels.len(),
        n_samples, accuracy, "oob evaluation complete"
    );

    Ok(OobScore {
        accuracy,
        confusion,
        n_oob_samples: true_labels.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::compute_oob;
    use crate::forest::RandomForest;
    use crate::tree::DecisionTreeConfig;

    fn stump_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![vec![0.0], vec![1.0], vec![10.0], vec![11.0]],
            vec![0, 0, 1, 1],
        )
    }

    #[test]
    fn perfect_tree_gives_zero_error() {
        let (features, labels) = stump_data();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let oob = compute_oob(&[tree], &features, &labels, 2, &[vec![0, 3]]).unwrap();
        assert_eq!(oob.n_oob_samples, 2);
        assert!(oob.error().abs() < f64::EPSILON);
        assert_eq!(oob.confusion.as_rows(), &[vec![1, 0], vec![0, 1]]);
    }

    #[test]
    fn no_oob_samples_reports_full_error() {
        let (features, labels) = stump_data();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let oob = compute_oob(&[tree], &features, &labels, 2, &[vec![]]).unwrap();
        assert_eq!(oob.n_oob_samples, 0);
        assert!((oob.error() - 1.0).abs() < f64::EPSILON);
        assert_eq!(oob.confusion.total(), 0);
    }

    #[test]
    fn votes_are_soft_like_forest_predict() {
        // Two near-even leaves lean to class 0, one confident leaf says class 1.
        let leaf = |counts: Vec<usize>| {
            let mut labels = vec![0; counts[0]];
            labels.extend(vec![1; counts[1]]);
            let features = vec![vec![0.0]; labels.len()];
            DecisionTreeConfig::new().fit(&features, &labels).unwrap()
        };
        let trees = vec![leaf(vec![51, 49]), leaf(vec![51, 49]), leaf(vec![0, 100])];
        let forest = RandomForest {
            trees: trees.clone(),
            n_features: 1,
            n_classes: 2,
        };
        let features = vec![vec![0.0]];
        let labels = vec![1];
        assert_eq!(forest.predict(&features[0]).unwrap(), 1);

        let oob_indices = vec![vec![0]; 3];
        let oob = compute_oob(&trees, &features, &labels, 2, &oob_indices).unwrap();
        assert_eq!(oob.n_oob_samples, 1);
        assert!(oob.error().abs() < f64::EPSILON);
    }

    #[test]
    fn error_is_complement_of_accuracy() {
        let (features, labels) = stump_data();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        // Mislabel one held-out sample so the tree gets it wrong.
        let noisy = vec![0, 1, 1, 1];
        let oob = compute_oob(&[tree], &features, &noisy, 2, &[vec![0, 1]]).unwrap();
        assert!((oob.accuracy - 0.5).abs() < f64::EPSILON);
        assert!((oob.error() - 0.5).abs() < f64::EPSILON);
    }
}
