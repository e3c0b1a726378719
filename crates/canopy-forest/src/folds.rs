//! Seeded k-fold partitioning of sample indices.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::RfError;

/// How samples are dealt into folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoldStrategy {
    /// Shuffle all indices, then cut into contiguous chunks.
    #[default]
    Shuffled,
    /// Shuffle within each class, then deal round-robin so every fold keeps
    /// roughly the overall class mix.
    Stratified,
}

/// K-fold splitter.
///
/// The same `(k, seed, strategy)` always yields the same partition for the
/// same input. Fold sizes differ by at most one.
#[derive(Debug, Clone)]
pub struct KFold {
    n_folds: usize,
    seed: u64,
    strategy: FoldStrategy,
}

impl KFold {
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self {
            n_folds,
            seed: 99,
            strategy: FoldStrategy::Shuffled,
        })
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: FoldStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn strategy(&self) -> FoldStrategy {
        self.strategy
    }

    /// Partition `0..n_samples` into shuffled contiguous chunks.
    ///
    /// The first `n_samples % k` folds hold one extra index.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::TooFewSamplesForFolds`] when `k > n_samples`.
    pub fn split(&self, n_samples: usize) -> Result<Vec<Vec<usize>>, RfError> {
        self.check_sample_count(n_samples)?;

        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let base = n_samples / self.n_folds;
        let extra = n_samples % self.n_folds;
        let mut folds = Vec::with_capacity(self.n_folds);
        let mut start = 0;
        for fold in 0..self.n_folds {
            let len = base + usize::from(fold < extra);
            folds.push(order[start..start + len].to_vec());
            start += len;
        }

        debug!(n_samples, n_folds = self.n_folds, "shuffled folds built");
        Ok(folds)
    }

    /// Partition the indices of `labels` using the configured strategy.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::TooFewSamplesForFolds`] | `k > labels.len()` |
    /// | [`RfError::TooFewClassSamplesForFolds`] | Stratified and a class has fewer than `k` samples |
    pub fn split_labels(&self, labels: &[usize]) -> Result<Vec<Vec<usize>>, RfError> {
        match self.strategy {
            FoldStrategy::Shuffled => self.split(labels.len()),
            FoldStrategy::Stratified => self.stratified(labels),
        }
    }

    fn stratified(&self, labels: &[usize]) -> Result<Vec<Vec<usize>>, RfError> {
        self.check_sample_count(labels.len())?;

        let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
        let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        for (class, indices) in class_indices.iter().enumerate() {
            if !indices.is_empty() && indices.len() < self.n_folds {
                return Err(RfError::TooFewClassSamplesForFolds {
                    class,
                    count: indices.len(),
                    n_folds: self.n_folds,
                });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_folds];
        // The deal position carries over between classes, keeping sizes within one.
        let mut position = 0;
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for &idx in indices.iter() {
                folds[position % self.n_folds].push(idx);
                position += 1;
            }
        }

        debug!(
            n_samples = labels.len(),
            n_folds = self.n_folds,
            n_classes,
            "stratified folds built"
        );
        Ok(folds)
    }

    fn check_sample_count(&self, n_samples: usize) -> Result<(), RfError> {
        if self.n_folds > n_samples {
            return Err(RfError::TooFewSamplesForFolds {
                n_samples,
                n_folds: self.n_folds,
            });
        }
        Ok(())
    }
}
