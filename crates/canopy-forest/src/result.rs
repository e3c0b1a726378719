//! What a training run hands back besides the trees.

use crate::forest::RandomForest;
use crate::oob::OobScore;

/// Bagging facts recorded while training. Tree, feature and class counts
/// live on [`RandomForest`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingMetadata {
    /// Rows in the training set.
    pub n_samples: usize,
    /// Features drawn per split once `max_features` was resolved.
    pub max_features_resolved: usize,
    /// Rows drawn with replacement for each tree's bag.
    pub bootstrap_draws: usize,
}

/// A fitted forest with its out-of-bag record.
///
/// `out_of_bag[t]` lists the rows tree `t` never saw; the OOB score is only
/// present when training ran with [`OobMode::Enabled`](crate::OobMode).
#[derive(Debug)]
pub struct RandomForestResult {
    pub(crate) forest: RandomForest,
    pub(crate) oob: Option<OobScore>,
    pub(crate) out_of_bag: Vec<Vec<usize>>,
    pub(crate) metadata: TrainingMetadata,
}

impl RandomForestResult {
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob.as_ref()
    }

    /// OOB misclassification rate, when OOB scoring ran.
    #[must_use]
    pub fn oob_error(&self) -> Option<f64> {
        self.oob.as_ref().map(OobScore::error)
    }

    /// Rows each tree left out, in tree order.
    #[must_use]
    pub fn oob_indices_per_tree(&self) -> &[Vec<usize>] {
        &self.out_of_bag
    }

    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
