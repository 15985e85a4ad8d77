//! Regression trees fitted to first and second order gradients of a loss,
//! the weak learners of the boosting ensemble.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

/// Gains below this are treated as no improvement
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// Tree growth parameters
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl SplitCandidate {
    /// Higher gain wins; equal gains go to the lower feature index
    fn better(self, other: SplitCandidate) -> SplitCandidate {
        if other.gain > self.gain || (other.gain == self.gain && other.feature < self.feature) {
            other
        } else {
            self
        }
    }
}

impl RegressionTree {
    /// Grow a tree on rows of `features` with per-row gradients and hessians.
    ///
    /// Leaf values are the regularized Newton step `-G / (H + lambda)`, already
    /// scaled by the learning rate. Rows with `x < threshold` go left.
    pub fn fit(
        features: &Array2<f64>,
        gradients: &[f64],
        hessians: &[f64],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let rows: Vec<usize> = (0..features.nrows()).collect();
        tree.grow(features, gradients, hessians, params, rows, 0);
        tree
    }

    fn grow(
        &mut self,
        features: &Array2<f64>,
        gradients: &[f64],
        hessians: &[f64],
        params: &TreeParams,
        rows: Vec<usize>,
        depth: usize,
    ) -> usize {
        let node_id = self.nodes.len();
        let g_sum: f64 = rows.iter().map(|&i| gradients[i]).sum();
        let h_sum: f64 = rows.iter().map(|&i| hessians[i]).sum();
        let leaf_value = -g_sum / (h_sum + params.lambda) * params.learning_rate;
        self.nodes.push(TreeNode::Leaf { value: leaf_value });

        if depth >= params.max_depth || rows.len() < 2 {
            return node_id;
        }

        let best = (0..features.ncols())
            .into_par_iter()
            .filter_map(|feature| {
                best_split_for_feature(
                    features, gradients, hessians, params, &rows, feature, g_sum, h_sum,
                )
            })
            .reduce_with(SplitCandidate::better);

        let Some(split) = best else {
            return node_id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| features[[i, split.feature]] < split.threshold);

        let left = self.grow(features, gradients, hessians, params, left_rows, depth + 1);
        let right = self.grow(features, gradients, hessians, params, right_rows, depth + 1);

        self.nodes[node_id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            gain: split.gain,
            left,
            right,
        };
        node_id
    }

    /// Output for a single row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Outputs for every row of a matrix
    pub fn predict(&self, features: &Array2<f64>) -> Array1<f64> {
        features.outer_iter().map(|row| self.predict_row(row)).collect()
    }

    /// `(feature, gain)` of every split node
    pub fn split_gains(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            TreeNode::Split { feature, gain, .. } => Some((*feature, *gain)),
            TreeNode::Leaf { .. } => None,
        })
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }
}

/// Exact greedy search over the sorted values of one feature
#[allow(clippy::too_many_arguments)]
fn best_split_for_feature(
    features: &Array2<f64>,
    gradients: &[f64],
    hessians: &[f64],
    params: &TreeParams,
    rows: &[usize],
    feature: usize,
    g_sum: f64,
    h_sum: f64,
) -> Option<SplitCandidate> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|&a, &b| features[[a, feature]].total_cmp(&features[[b, feature]]));

    let parent_score = g_sum * g_sum / (h_sum + params.lambda);
    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best: Option<SplitCandidate> = None;

    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        g_left += gradients[current];
        h_left += hessians[current];

        let value = features[[current, feature]];
        let next_value = features[[next, feature]];
        if value == next_value {
            continue;
        }

        let g_right = g_sum - g_left;
        let h_right = h_sum - h_left;
        if h_left < params.min_child_weight || h_right < params.min_child_weight {
            continue;
        }

        let gain = 0.5
            * (g_left * g_left / (h_left + params.lambda)
                + g_right * g_right / (h_right + params.lambda)
                - parent_score)
            - params.gamma;

        if gain > MIN_SPLIT_GAIN && best.map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold: (value + next_value) / 2.0,
                gain,
            });
        }
    }

    best
}
