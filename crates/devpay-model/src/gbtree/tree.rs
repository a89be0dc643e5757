//! Regression trees and depth-wise growth.

use serde::{Deserialize, Serialize};

use super::histogram::NodeHistogram;
use super::quantize::{BinCuts, QuantizedMatrix};
use super::split::{GainParams, SplitInfo, find_best_split, leaf_weight};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go to `left`.
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Add each split's gain to `importance[feature]`.
    pub fn accumulate_gain(&self, importance: &mut [f64]) {
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                importance[*feature] += gain;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub gain: GainParams,
    /// Shrinkage applied to every leaf weight.
    pub learning_rate: f64,
}

/// Grows one tree level by level (XGBoost's depth-wise policy).
///
/// At each level the smaller child of every split gets a fresh histogram;
/// its sibling's comes from subtracting it from the parent.
pub struct TreeGrower<'a> {
    quantized: &'a QuantizedMatrix,
    cuts: &'a BinCuts,
    params: TreeParams,
}

struct Pending {
    node: usize,
    rows: Vec<usize>,
    hist: NodeHistogram,
}

impl<'a> TreeGrower<'a> {
    pub fn new(quantized: &'a QuantizedMatrix, cuts: &'a BinCuts, params: TreeParams) -> Self {
        Self {
            quantized,
            cuts,
            params,
        }
    }

    pub fn grow(&self, grad: &[f64], hess: &[f64]) -> Tree {
        let rows: Vec<usize> = (0..self.quantized.n_rows()).collect();
        let root_hist = NodeHistogram::build(self.quantized, self.cuts, &rows, grad, hess);
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut level = vec![Pending {
            node: 0,
            rows,
            hist: root_hist,
        }];

        for depth in 0..=self.params.max_depth {
            let mut next = Vec::new();
            for pending in level {
                let split = if depth < self.params.max_depth {
                    find_best_split(&pending.hist, &self.params.gain)
                } else {
                    None
                };
                let Some(split) = split else {
                    nodes[pending.node] = self.leaf(&pending.hist);
                    continue;
                };

                let (left_rows, right_rows) = self.partition(&pending.rows, &split);
                let left_id = nodes.len();
                let right_id = left_id + 1;
                nodes.push(Node::Leaf { value: 0.0 });
                nodes.push(Node::Leaf { value: 0.0 });
                nodes[pending.node] = Node::Split {
                    feature: split.feature,
                    threshold: self.cuts.threshold(split.feature, split.bin),
                    gain: split.gain,
                    left: left_id,
                    right: right_id,
                };

                let (left_hist, right_hist) = if left_rows.len() <= right_rows.len() {
                    let small = NodeHistogram::build(self.quantized, self.cuts, &left_rows, grad, hess);
                    let other = small.sibling(&pending.hist);
                    (small, other)
                } else {
                    let small = NodeHistogram::build(self.quantized, self.cuts, &right_rows, grad, hess);
                    let other = small.sibling(&pending.hist);
                    (other, small)
                };
                next.push(Pending {
                    node: left_id,
                    rows: left_rows,
                    hist: left_hist,
                });
                next.push(Pending {
                    node: right_id,
                    rows: right_rows,
                    hist: right_hist,
                });
            }
            if next.is_empty() {
                break;
            }
            level = next;
        }

        Tree { nodes }
    }

    fn leaf(&self, hist: &NodeHistogram) -> Node {
        Node::Leaf {
            value: self.params.learning_rate * leaf_weight(hist.total(), &self.params.gain),
        }
    }

    fn partition(&self, rows: &[usize], split: &SplitInfo) -> (Vec<usize>, Vec<usize>) {
        rows.iter()
            .partition(|&&i| (self.quantized.row(i)[split.feature] as usize) <= split.bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpay_core::FeatureMatrix;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            gain: GainParams {
                reg_lambda: 0.0,
                min_child_weight: 1.0,
            },
            learning_rate: 1.0,
        }
    }

    fn fit_one(x: &[f64], y: &[f64], max_depth: usize) -> (Tree, FeatureMatrix) {
        let m = FeatureMatrix::from_rows(vec!["x".into()], x.to_vec());
        let cuts = BinCuts::fit(&m, 256);
        let q = QuantizedMatrix::new(&m, &cuts);
        // Gradients of squared error at prediction 0.
        let grad: Vec<f64> = y.iter().map(|t| -t).collect();
        let hess = vec![1.0; y.len()];
        (TreeGrower::new(&q, &cuts, params(max_depth)).grow(&grad, &hess), m)
    }

    #[test]
    fn stump_separates_two_groups() {
        let (tree, m) = fit_one(&[0.0, 1.0, 2.0, 3.0], &[10.0, 10.0, 20.0, 20.0], 1);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(m.row(0)), 10.0);
        assert_eq!(tree.predict_row(m.row(3)), 20.0);
        // Unseen values fall on the threshold's sides.
        assert_eq!(tree.predict_row(&[1.4]), 10.0);
        assert_eq!(tree.predict_row(&[100.0]), 20.0);
    }

    #[test]
    fn depth_is_bounded() {
        let x: Vec<f64> = (0..64).map(f64::from).collect();
        let (tree, _) = fit_one(&x, &x, 3);
        assert!(tree.depth() <= 3);
        assert_eq!(tree.n_leaves(), 8);
    }

    #[test]
    fn pure_node_becomes_single_leaf() {
        let (tree, _) = fit_one(&[0.0, 1.0, 2.0], &[5.0, 5.0, 5.0], 4);
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_row(&[7.0]), 5.0);
    }

    #[test]
    fn gain_accumulates_on_split_feature() {
        let (tree, _) = fit_one(&[0.0, 1.0, 2.0, 3.0], &[0.0, 0.0, 8.0, 8.0], 1);
        let mut imp = vec![0.0];
        tree.accumulate_gain(&mut imp);
        assert!(imp[0] > 0.0);
    }

    #[test]
    fn serde_round_trip() {
        let (tree, _) = fit_one(&[0.0, 1.0], &[1.0, 3.0], 1);
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"kind\":\"split\""));
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
