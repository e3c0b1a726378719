//! Graphviz DOT export of a fitted decision tree.

use crate::error::RfError;
use crate::node::{Node, NodeIndex};
use crate::tree::DecisionTree;

impl DecisionTree {
    /// Render the tree as Graphviz DOT text.
    ///
    /// Split nodes show the feature name, leaves (drawn as boxes) show the
    /// predicted class name. Every node also shows its training sample count
    /// `n` and impurity `E`. The left edge of a split is labelled
    /// `<= threshold`, the right edge `> threshold`. Nodes are numbered by
    /// arena position, so `n0` is the root.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::DotNameMismatch`] when `feature_names` does not hold
    /// exactly `n_features()` entries or `class_names` holds fewer than
    /// `n_classes()`.
    pub fn to_dot(&self, feature_names: &[String], class_names: &[String]) -> Result<String, RfError> {
        if feature_names.len() != self.n_features {
            return Err(RfError::DotNameMismatch {
                kind: "feature",
                expected: self.n_features,
                got: feature_names.len(),
            });
        }
        if class_names.len() < self.n_classes {
            return Err(RfError::DotNameMismatch {
                kind: "class",
                expected: self.n_classes,
                got: class_names.len(),
            });
        }

        let mut node_lines = Vec::with_capacity(self.nodes.len());
        let mut edge_lines = Vec::new();
        let mut stack = vec![NodeIndex::new(0)];

        while let Some(id) = stack.pop() {
            match &self.nodes[id.index()] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    impurity,
                    n_samples,
                } => {
                    node_lines.push(format!(
                        "n{id} [label=\"{}\\nn={n_samples}\\nE={impurity}\"];",
                        escape(&feature_names[feature.index()])
                    ));
                    edge_lines.push(format!("n{id} -> n{left} [label=\"<= {threshold:.2}\"];"));
                    edge_lines.push(format!("n{id} -> n{right} [label=\"> {threshold:.2}\"];"));
                    // Right pushed first so the left subtree is listed first.
                    stack.push(*right);
                    stack.push(*left);
                }
                Node::Leaf {
                    prediction,
                    impurity,
                    n_samples,
                    ..
                } => {
                    node_lines.push(format!(
                        "n{id} [shape=box, label=\"{}\\nn={n_samples}\\nE={impurity}\"];",
                        escape(&class_names[*prediction])
                    ));
                }
            }
        }

        let mut out = String::from("digraph Tree {\n");
        for line in node_lines.iter().chain(&edge_lines) {
            out.push('\t');
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("}\n");
        Ok(out)
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}
