//! Random Forest classification: train, predict, estimate error.
//!
//! CART decision trees with Gini or entropy splits, bagged into a forest that
//! trains in parallel via rayon. Error is estimated out-of-bag and with
//! seeded k-fold cross-validation. Single trees export to Graphviz DOT.

mod config;
mod confusion;
mod dot;
mod error;
mod eval;
mod folds;
mod forest;
mod node;
mod oob;
mod predict;
mod result;
mod split;
mod tree;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use confusion::ConfusionMatrix;
pub use error::RfError;
pub use eval::{EvaluationReport, Evaluator};
pub use folds::{FoldStrategy, KFold};
pub use forest::RandomForest;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
