//! Accuracy regression tests for canopy-forest.
//!
//! These guard against algorithmic changes that degrade Random Forest error
//! estimates on deterministic synthetic datasets.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use canopy_forest::{
    Evaluator, FoldStrategy, KFold, MaxFeatures, OobMode, RandomForestConfig, RfError,
    SplitCriterion,
};

// ---------------------------------------------------------------------------
// Helpers: deterministic synthetic datasets
// ---------------------------------------------------------------------------

/// A 300-sample, 10-feature, 3-class dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-9 are pure noise in [0, 0.5]. Classes cycle round-robin.
fn make_classification() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut features = Vec::with_capacity(300);
    let mut labels = Vec::with_capacity(300);
    for i in 0..300 {
        let class = i % 3;
        labels.push(class);
        let row: Vec<f64> = (0..10)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

/// A 150-row, 4-feature, 3-class dataset shaped like the iris measurements:
/// one well separated class and two overlapping ones, 50 rows each.
fn make_iris_like() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let centers = [
        [5.0, 3.4, 1.5, 0.2],
        [5.9, 2.8, 4.3, 1.3],
        [6.6, 3.0, 5.5, 2.0],
    ];
    let mut features = Vec::with_capacity(150);
    let mut labels = Vec::with_capacity(150);
    for (class, center) in centers.iter().enumerate() {
        for _ in 0..50 {
            let row: Vec<f64> = center
                .iter()
                .map(|&c| c + (rng.r#gen::<f64>() - 0.5) * 1.2)
                .collect();
            features.push(row);
            labels.push(class);
        }
    }
    (features, labels)
}

// ---------------------------------------------------------------------------
// a) kfold_error_below_threshold
// ---------------------------------------------------------------------------

/// 5-fold mean error must stay under 0.15 on the synthetic dataset.
#[test]
fn kfold_error_below_threshold() {
    let (features, labels) = make_classification();
    let evaluator = Evaluator::new(
        RandomForestConfig::new(100).unwrap().with_seed(42),
        KFold::new(5).unwrap().with_seed(42),
    );
    let report = evaluator.evaluate(&features, &labels).unwrap();

    assert!(
        report.mean_kfold_error < 0.15,
        "kfold error {} >= 0.15",
        report.mean_kfold_error
    );
}

// ---------------------------------------------------------------------------
// b) oob_error_below_threshold
// ---------------------------------------------------------------------------

/// OOB error with 100 trees must stay under 0.20.
#[test]
fn oob_error_below_threshold() {
    let (features, labels) = make_classification();
    let result = RandomForestConfig::new(100)
        .unwrap()
        .with_seed(42)
        .with_oob_mode(OobMode::Enabled)
        .fit(&features, &labels)
        .unwrap();

    let oob = result
        .oob_score()
        .expect("OOB score must be computed when OobMode::Enabled");
    assert!(oob.error() < 0.20, "oob error {} >= 0.20", oob.error());
    assert_eq!(oob.n_oob_samples, 300);
}

// ---------------------------------------------------------------------------
// c) iris_like_evaluation
// ---------------------------------------------------------------------------

/// 20 trees, minimum leaf size 20, k = 5 on 150 rows: both errors are valid
/// rates and the forest still beats chance by a wide margin.
#[test]
fn iris_like_evaluation() {
    let (features, labels) = make_iris_like();
    let evaluator = Evaluator::new(
        RandomForestConfig::new(20)
            .unwrap()
            .with_min_samples_leaf(20)
            .with_criterion(SplitCriterion::Entropy),
        KFold::new(5).unwrap(),
    );
    let report = evaluator.evaluate(&features, &labels).unwrap();

    assert!((0.0..=1.0).contains(&report.oob_error));
    assert!((0.0..=1.0).contains(&report.mean_kfold_error));
    assert!(report.mean_kfold_error < 0.4, "kfold {}", report.mean_kfold_error);
    assert_eq!(report.fold_errors.len(), 5);
    assert_eq!(report.n_classes, 3);
    assert!(report.oob_confusion.total() <= 150);
}

// ---------------------------------------------------------------------------
// d) deterministic_reports
// ---------------------------------------------------------------------------

/// Same config and seed must produce identical errors across independent runs,
/// whatever the rayon pool size.
#[test]
fn deterministic_reports() {
    let (features, labels) = make_iris_like();
    let run = |threads: usize| {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        pool.install(|| {
            Evaluator::new(
                RandomForestConfig::new(30).unwrap().with_seed(11),
                KFold::new(3).unwrap().with_seed(11),
            )
            .evaluate(&features, &labels)
            .unwrap()
        })
    };
    let (single, multi) = (run(1), run(4));
    assert_eq!(single.fold_errors, multi.fold_errors);
    assert!((single.oob_error - multi.oob_error).abs() < f64::EPSILON);
}

// ---------------------------------------------------------------------------
// e) gini_and_stratified_variants
// ---------------------------------------------------------------------------

/// Gini splits, log2 feature sampling and stratified folds stay accurate.
#[test]
fn gini_and_stratified_variants() {
    let (features, labels) = make_classification();
    let evaluator = Evaluator::new(
        RandomForestConfig::new(50)
            .unwrap()
            .with_criterion(SplitCriterion::Gini)
            .with_max_features(MaxFeatures::Log2),
        KFold::new(4)
            .unwrap()
            .with_strategy(FoldStrategy::Stratified),
    );
    let report = evaluator.evaluate(&features, &labels).unwrap();
    assert!(report.mean_kfold_error < 0.15);
}

// ---------------------------------------------------------------------------
// f) empty_data_is_rejected
// ---------------------------------------------------------------------------

#[test]
fn empty_data_is_rejected() {
    let evaluator = Evaluator::new(
        RandomForestConfig::new(20).unwrap(),
        KFold::new(5).unwrap(),
    );
    let err = evaluator.evaluate(&[], &[]).unwrap_err();
    assert!(matches!(err, RfError::EmptyDataset));
}
