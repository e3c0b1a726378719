//! K-fold and out-of-bag error estimation for Random Forest.

use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::confusion::ConfusionMatrix;
use crate::error::RfError;
use crate::folds::KFold;
use crate::forest::RandomForest;

/// Pairs a forest configuration with a fold splitter.
#[derive(Debug, Clone)]
pub struct Evaluator {
    config: RandomForestConfig,
    kfold: KFold,
}

/// Errors measured by [`Evaluator::evaluate`].
#[derive(Debug)]
pub struct EvaluationReport {
    /// Held-out misclassification rate of each fold, in fold order.
    pub fold_errors: Vec<f64>,
    /// Unweighted mean of `fold_errors`.
    pub mean_kfold_error: f64,
    /// `1 - OOB accuracy` of the forest fitted on all rows.
    pub oob_error: f64,
    /// OOB confusion matrix of the full-data forest.
    pub oob_confusion: ConfusionMatrix,
    pub n_samples: usize,
    pub n_features: usize,
    pub n_classes: usize,
    /// The forest fitted on all rows.
    pub forest: RandomForest,
}

impl Evaluator {
    #[must_use]
    pub fn new(config: RandomForestConfig, kfold: KFold) -> Self {
        Self { config, kfold }
    }

    #[must_use]
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    #[must_use]
    pub fn kfold(&self) -> &KFold {
        &self.kfold
    }

    /// Estimate generalization error two ways.
    ///
    /// For every fold a fresh forest is fit on the other folds and scored on
    /// the held-out rows. Then one more forest is fit on all rows with OOB
    /// scoring enabled. Fold `i` trains with seed `config.seed + i`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero samples |
    /// | [`RfError::TooFewSamplesForFolds`] | Fewer samples than folds |
    /// | [`RfError::TooFewClassSamplesForFolds`] | Stratified folds and a rare class |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(n_folds = self.kfold.n_folds(), n_samples = features.len()))]
    pub fn evaluate(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<EvaluationReport, RfError> {
        if features.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if features.len() != labels.len() {
            return Err(RfError::LabelCountMismatch {
                n_features_rows: features.len(),
                n_labels: labels.len(),
            });
        }

        let folds = self.kfold.split_labels(labels)?;
        let mut fold_errors = Vec::with_capacity(folds.len());

        for (fold, test_indices) in folds.iter().enumerate() {
            let mut in_test = vec![false; features.len()];
            for &i in test_indices {
                in_test[i] = true;
            }

            let (train_features, train_labels): (Vec<Vec<f64>>, Vec<usize>) = (0..features.len())
                .filter(|&i| !in_test[i])
                .map(|i| (features[i].clone(), labels[i]))
                .unzip();

            let fold_config = self
                .config
                .clone()
                .with_seed(self.config.seed.wrapping_add(fold as u64))
                .with_oob_mode(OobMode::Disabled);
            let forest = fold_config.fit(&train_features, &train_labels)?.into_forest();

            let mismatches = test_indices
                .iter()
                .map(|&i| forest.predict(&features[i]).map(|p| p != labels[i]))
                .collect::<Result<Vec<bool>, RfError>>()?
                .into_iter()
                .filter(|&wrong| wrong)
                .count();
            let fold_error = mismatches as f64 / test_indices.len() as f64;
            fold_errors.push(fold_error);

            debug!(
                fold,
                n_train = train_labels.len(),
                n_test = test_indices.len(),
                error = fold_error,
                "fold completed"
            );
        }

        let mean_kfold_error = fold_errors.iter().sum::<f64>() / fold_errors.len() as f64;

        let full = self
            .config
            .clone()
            .with_oob_mode(OobMode::Enabled)
            .fit(features, labels)?;
        let oob = full
            .oob_score()
            .cloned()
            .ok_or_else(|| RfError::OobEvaluationFailed {
                reason: "full-data forest returned no OOB score".to_string(),
            })?;
        let n_samples = full.metadata().n_samples;

        info!(
            mean_kfold_error,
            oob_error = oob.error(),
            "evaluation complete"
        );

        Ok(EvaluationReport {
            fold_errors,
            mean_kfold_error,
            oob_error: oob.error(),
            oob_confusion: oob.confusion,
            n_samples,
            n_features: full.forest().n_features(),
            n_classes: full.forest().n_classes(),
            forest: full.into_forest(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MaxFeatures;
    use crate::folds::FoldStrategy;

    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3 {
            for i in 0..30 {
                features.push(vec![class as f64 * 10.0 + i as f64 * 0.1, 0.5]);
                labels.push(class);
            }
        }
        (features, labels)
    }

    #[test]
    fn five_fold_separable_error() {
        let (features, labels) = make_separable_data();
        let config = RandomForestConfig::new(20)
            .unwrap()
            .with_max_features(MaxFeatures::All);
        let evaluator = Evaluator::new(config, KFold::new(5).unwrap());
        let report = evaluator.evaluate(&features, &labels).unwrap();

        assert_eq!(report.fold_errors.len(), 5);
        assert!(report.mean_kfold_error < 0.2, "{}", report.mean_kfold_error);
        assert!((0.0..=1.0).contains(&report.oob_error));
        assert_eq!(report.n_samples, 90);
        assert_eq!(report.n_features, 2);
        assert_eq!(report.n_classes, 3);
        assert_eq!(report.forest.n_trees(), 20);
    }

    #[test]
    fn mean_is_unweighted_average() {
        let (features, labels) = make_separable_data();
        let config = RandomForestConfig::new(5).unwrap().with_min_samples_leaf(10);
        let evaluator = Evaluator::new(config, KFold::new(4).unwrap());
        let report = evaluator.evaluate(&features, &labels).unwrap();
        let mean = report.fold_errors.iter().sum::<f64>() / 4.0;
        assert!((report.mean_kfold_error - mean).abs() < 1e-12);
    }

    #[test]
    fn stratified_folds_work() {
        let (features, labels) = make_separable_data();
        let kfold = KFold::new(3)
            .unwrap()
            .with_strategy(FoldStrategy::Stratified);
        let config = RandomForestConfig::new(10).unwrap();
        let report = Evaluator::new(config, kfold)
            .evaluate(&features, &labels)
            .unwrap();
        assert_eq!(report.fold_errors.len(), 3);
        assert_eq!(report.oob_confusion.n_classes(), 3);
    }

    #[test]
    fn empty_dataset_error() {
        let evaluator = Evaluator::new(
            RandomForestConfig::new(5).unwrap(),
            KFold::new(5).unwrap(),
        );
        let err = evaluator.evaluate(&[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn too_few_samples_for_folds() {
        let features = vec![vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![0, 1, 0];
        let evaluator = Evaluator::new(
            RandomForestConfig::new(5).unwrap(),
            KFold::new(5).unwrap(),
        );
        let err = evaluator.evaluate(&features, &labels).unwrap_err();
        assert!(matches!(
            err,
            RfError::TooFewSamplesForFolds {
                n_samples: 3,
                n_folds: 5
            }
        ));
    }

    #[test]
    fn deterministic_reports() {
        let (features, labels) = make_separable_data();
        let run = || {
            Evaluator::new(
                RandomForestConfig::new(8).unwrap().with_seed(5),
                KFold::new(3).unwrap().with_seed(5),
            )
            .evaluate(&features, &labels)
            .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.fold_errors, b.fold_errors);
        assert!((a.oob_error - b.oob_error).abs() < f64::EPSILON);
    }
}
