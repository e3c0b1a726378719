//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::RfError;
use crate::oob::compute_oob;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, DecisionTreeConfig, validate_training_data};

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl RandomForest {
    /// Borrow one tree of the ensemble.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::TreeIndexOutOfRange`] when `index >= n_trees()`.
    pub fn tree(&self, index: usize) -> Result<&DecisionTree, RfError> {
        self.trees.get(index).ok_or(RfError::TreeIndexOutOfRange {
            index,
            n_trees: self.trees.len(),
        })
    }

    /// Borrow all trees in training order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Draw `draw_count` row indices with replacement; also return the rows never drawn.
fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bootstrap_indices = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        bootstrap_indices.push(idx);
        in_bag[idx] = true;
    }
    let oob_indices: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bootstrap_indices, oob_indices)
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<RandomForestResult, RfError> {
    let (n_samples, n_features) = validate_training_data(features, labels)?;

    let max_features = config.max_features.resolve(n_features)?;
    if config.bootstrap_fraction <= 0.0 || config.bootstrap_fraction > 1.0 {
        return Err(RfError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }
    if config.min_samples_leaf == 0 {
        return Err(RfError::InvalidMinSamplesLeaf { min_samples_leaf: 0 });
    }

    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        n_classes,
        max_features,
        min_samples_leaf = config.min_samples_leaf,
        criterion = config.criterion.name(),
        "training random forest"
    );

    // Per-tree seeds come from one master stream, so the ensemble does not
    // depend on how rayon schedules the trees.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(2 * config.min_samples_leaf)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));

    let tree_results: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (bootstrap_indices, oob_indices) =
                bootstrap_sample(n_samples, draw_count, &mut rng);

            let boot_features: Vec<Vec<f64>> = bootstrap_indices
                .iter()
                .map(|&i| features[i].clone())
                .collect();
            let boot_labels: Vec<usize> = bootstrap_indices.iter().map(|&i| labels[i]).collect();

            let tree = tree_config
                .clone()
                .with_seed(rng.r#gen())
                .fit_with_classes(&boot_features, &boot_labels, n_classes)?;
            Ok((tree, oob_indices))
        })
        .collect::<Result<_, RfError>>()?;

    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        tree_results.into_iter().unzip();

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let oob_score = match config.oob_mode {
        OobMode::Enabled => Some(compute_oob(
            &trees,
            features,
            labels,
            n_classes,
            &oob_indices_per_tree,
        )?),
        OobMode::Disabled => None,
    };

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
    };

    let metadata = TrainingMetadata {
        n_samples,
        max_features_resolved: max_features,
        bootstrap_draws: draw_count,
    };

    info!(
        oob_error = oob_score.as_ref().map(|s| s.error()),
        "random forest training complete"
    );

    Ok(RandomForestResult {
        forest,
        oob: oob_score,
        out_of_bag: oob_indices_per_tree,
        metadata,
    })
}
