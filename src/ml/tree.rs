//! Decision trees: CART classification trees and second-order regression trees.
//!
//! Both trees store their nodes in a flat arena. A sample goes left when its
//! feature value is `<= threshold`. Split search sorts the node's rows by each
//! candidate feature and sweeps once, keeping running sums for the left side,
//! and only places thresholds between distinct values.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use faer::Mat;

use super::{check_training_data, check_width, Classifier, MlError};

/// Values closer than this are treated as equal during split search
const VALUE_EPS: f64 = 1e-10;

/// Impurity measure for classification splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gini,
    Entropy,
    /// Same impurity as `Entropy`
    LogLoss,
}

impl Criterion {
    pub fn parse(name: &str) -> Result<Self, MlError> {
        match name {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            "log_loss" => Ok(Criterion::LogLoss),
            other => Err(MlError::InvalidParam {
                name: "criterion".to_string(),
                reason: format!("unknown criterion '{}'", other),
            }),
        }
    }

    /// Impurity of a node with `positive` weight of class 1 out of `total`
    fn impurity(self, positive: f64, total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        let p = (positive / total).clamp(0.0, 1.0);
        match self {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy | Criterion::LogLoss => {
                let h = |q: f64| if q <= 0.0 { 0.0 } else { -q * q.log2() };
                h(p) + h(1.0 - p)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

fn leaf_of(nodes: &[Node], x: &Mat<f64>, i: usize) -> usize {
    let mut idx = 0;
    loop {
        match &nodes[idx] {
            Node::Leaf { .. } => return idx,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                idx = if x[(i, *feature)] <= *threshold { *left } else { *right };
            }
        }
    }
}

fn leaf_value(nodes: &[Node], x: &Mat<f64>, i: usize) -> f64 {
    match &nodes[leaf_of(nodes, x, i)] {
        Node::Leaf { value } => *value,
        Node::Split { .. } => unreachable!("leaf_of always stops at a leaf"),
    }
}

/// Rows of `rows` sorted by feature `feature`
fn sorted_by_feature(x: &Mat<f64>, rows: &[usize], feature: usize) -> Vec<usize> {
    let mut order = rows.to_vec();
    order.sort_by(|&a, &b| {
        x[(a, feature)]
            .partial_cmp(&x[(b, feature)])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

// ============================================================================
// Classification tree
// ============================================================================

/// CART classifier with optional sample weights.
///
/// Leaves hold the weighted fraction of class 1; prediction is 1 when that
/// fraction is above one half.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split; `None` uses all of them
    pub max_features: Option<usize>,
    pub random_state: u64,
    n_features: usize,
    nodes: Vec<Node>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new(Criterion::Gini, None)
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTree {
    pub fn new(criterion: Criterion, max_depth: Option<usize>) -> Self {
        Self {
            criterion,
            max_depth,
            min_samples_split: 2,
            max_features: None,
            random_state: 0,
            n_features: 0,
            nodes: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Fit with per-sample weights; zero-weight rows are ignored
    pub fn fit_weighted(&mut self, x: &Mat<f64>, y: &[f64], weights: &[f64]) -> Result<(), MlError> {
        check_training_data(x, y)?;
        if weights.len() != y.len() {
            return Err(MlError::ShapeMismatch(format!(
                "{} labels but {} sample weights",
                y.len(),
                weights.len()
            )));
        }

        self.n_features = x.ncols();
        self.nodes.clear();
        let rows: Vec<usize> = (0..y.len()).filter(|&i| weights[i] > 0.0).collect();
        if rows.is_empty() {
            return Err(MlError::EmptyInput);
        }

        let mut rng = StdRng::seed_from_u64(self.random_state);
        self.build(x, y, weights, rows, 0, &mut rng);
        Ok(())
    }

    fn build(
        &mut self,
        x: &Mat<f64>,
        y: &[f64],
        w: &[f64],
        rows: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let total: f64 = rows.iter().map(|&i| w[i]).sum();
        let positive: f64 = rows.iter().map(|&i| w[i] * y[i]).sum();
        let value = if total > 0.0 { positive / total } else { 0.0 };
        let impurity = self.criterion.impurity(positive, total);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value });

        let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || rows.len() < self.min_samples_split.max(2) || impurity <= 1e-12 {
            return idx;
        }

        let Some(split) = self.best_split(x, y, w, &rows, total, positive, impurity, rng) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| x[(i, split.feature)] <= split.threshold);

        let left = self.build(x, y, w, left_rows, depth + 1, rng);
        let right = self.build(x, y, w, right_rows, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    #[allow(clippy::too_many_arguments)]
    fn best_split(
        &self,
        x: &Mat<f64>,
        y: &[f64],
        w: &[f64],
        rows: &[usize],
        total: f64,
        positive: f64,
        parent_impurity: f64,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        if let Some(k) = self.max_features {
            features.shuffle(rng);
            features.truncate(k.clamp(1, x.ncols()));
        }

        let mut best: Option<BestSplit> = None;
        for feature in features {
            let order = sorted_by_feature(x, rows, feature);
            let mut left_total = 0.0;
            let mut left_positive = 0.0;

            for k in 0..order.len() - 1 {
                let i = order[k];
                left_total += w[i];
                left_positive += w[i] * y[i];

                let (here, next) = (x[(i, feature)], x[(order[k + 1], feature)]);
                if (next - here).abs() < VALUE_EPS {
                    continue;
                }

                let right_total = total - left_total;
                let right_positive = positive - left_positive;
                let child = (left_total * self.criterion.impurity(left_positive, left_total)
                    + right_total * self.criterion.impurity(right_positive, right_total))
                    / total;
                let gain = parent_impurity - child;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }

    /// Probability of class 1 for every row
    pub fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        if !self.is_fitted() {
            return Err(MlError::NotFitted);
        }
        check_width(x, self.n_features)?;
        Ok((0..x.nrows()).map(|i| leaf_value(&self.nodes, x, i)).collect())
    }
}

impl Classifier for DecisionTree {
    fn fit(&mut self, x: &Mat<f64>, y: &[f64]) -> Result<(), MlError> {
        let weights = vec![1.0; y.len()];
        self.fit_weighted(x, y, &weights)
    }

    fn predict(&self, x: &Mat<f64>) -> Result<Vec<f64>, MlError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| if p > 0.5 { 1.0 } else { 0.0 })
            .collect())
    }
}

// ============================================================================
// Regression tree on gradients
// ============================================================================

/// Regression tree grown on first and second order loss gradients.
///
/// Split gain is `G_L²/(H_L+λ) + G_R²/(H_R+λ) - G²/(H+λ)` and leaves hold
/// `-G/(H+λ)`. With unit hessians and `λ = 0` this is a least-squares tree on
/// the negative gradients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    pub max_depth: usize,
    pub lambda: f64,
    pub min_child_weight: f64,
    n_features: usize,
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn new(max_depth: usize, lambda: f64, min_child_weight: f64) -> Self {
        Self {
            max_depth,
            lambda,
            min_child_weight,
            n_features: 0,
            nodes: Vec::new(),
        }
    }

    /// Grow the tree on the given rows
    pub fn fit_gradients(&mut self, x: &Mat<f64>, grad: &[f64], hess: &[f64], rows: &[usize]) {
        self.n_features = x.ncols();
        self.nodes.clear();
        self.build(x, grad, hess, rows.to_vec(), 0);
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let den = h + self.lambda;
        if den <= 0.0 {
            0.0
        } else {
            g * g / den
        }
    }

    fn build(&mut self, x: &Mat<f64>, grad: &[f64], hess: &[f64], rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&i| grad[i]).sum();
        let h: f64 = rows.iter().map(|&i| hess[i]).sum();
        let den = h + self.lambda;
        let value = if den > 0.0 { -g / den } else { 0.0 };

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value });
        if depth >= self.max_depth || rows.len() < 2 {
            return idx;
        }

        let parent = self.score(g, h);
        let mut best: Option<BestSplit> = None;
        for feature in 0..x.ncols() {
            let order = sorted_by_feature(x, &rows, feature);
            let (mut gl, mut hl) = (0.0, 0.0);
            for k in 0..order.len() - 1 {
                let i = order[k];
                gl += grad[i];
                hl += hess[i];

                let (here, next) = (x[(i, feature)], x[(order[k + 1], feature)]);
                if (next - here).abs() < VALUE_EPS {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.min_child_weight || hr < self.min_child_weight {
                    continue;
                }

                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }

        let Some(split) = best else {
            return idx;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| x[(i, split.feature)] <= split.threshold);

        let left = self.build(x, grad, hess, left_rows, depth + 1);
        let right = self.build(x, grad, hess, right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Arena index of the leaf that row `i` falls into
    pub fn leaf_index(&self, x: &Mat<f64>, i: usize) -> usize {
        leaf_of(&self.nodes, x, i)
    }

    /// Overwrite the value stored in a leaf
    pub fn set_leaf_value(&mut self, leaf: usize, value: f64) {
        if let Some(Node::Leaf { value: v }) = self.nodes.get_mut(leaf) {
            *v = value;
        }
    }

    pub fn predict_row(&self, x: &Mat<f64>, i: usize) -> f64 {
        leaf_value(&self.nodes, x, i)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Mat<f64>, Vec<f64>) {
        let x = Mat::from_fn(8, 2, |i, j| if j == 0 { i as f64 } else { 1.0 });
        let y = vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_gini_impurity_binary() {
        assert_eq!(Criterion::Gini.impurity(5.0, 10.0), 0.5);
        assert_eq!(Criterion::Gini.impurity(0.0, 10.0), 0.0);
        assert!((Criterion::Entropy.impurity(5.0, 10.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tree_splits_between_classes() {
        let (x, y) = separable();
        let mut tree = DecisionTree::default();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.node_count(), 3, "one split, two leaves");
        match &tree.nodes[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 3.5);
            }
            Node::Leaf { .. } => panic!("expected root split"),
        }
    }

    #[test]
    fn test_depth_zero_is_a_single_leaf() {
        let (x, y) = separable();
        let mut tree = DecisionTree::new(Criterion::Entropy, Some(0));
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_weights_shift_majority() {
        let x = Mat::from_fn(3, 1, |_, _| 1.0);
        let y = vec![0.0, 1.0, 1.0];
        let mut tree = DecisionTree::default();
        tree.fit_weighted(&x, &y, &[10.0, 1.0, 1.0]).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_regression_tree_leaf_values() {
        let x = Mat::from_fn(4, 1, |i, _| i as f64);
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];
        let mut tree = RegressionTree::new(1, 0.0, 0.0);
        tree.fit_gradients(&x, &grad, &hess, &[0, 1, 2, 3]);

        assert_eq!(tree.predict_row(&x, 0), -1.0);
        assert_eq!(tree.predict_row(&x, 3), 1.0);
    }

    #[test]
    fn test_unfitted_tree_errors() {
        let tree = DecisionTree::default();
        let x = Mat::<f64>::zeros(1, 1);
        assert!(matches!(tree.predict(&x), Err(MlError::NotFitted)));
    }
}
