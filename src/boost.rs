//! Gradient-boosted decision trees for binary classification
//!
//! Newton boosting on the logistic loss: each round fits a regression tree
//! to the current gradients and hessians, grows it leaf-wise up to
//! `num_leaves`, and shrinks its contribution by `learning_rate`. A
//! stratified validation slice carved from the training data drives early
//! stopping on log-loss.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::split;

/// Booster hyperparameters.
#[derive(Clone, Debug)]
pub struct BoostParams {
    /// Maximum number of boosting rounds (trees).
    pub num_rounds: usize,
    /// Shrinkage applied to each leaf weight.
    pub learning_rate: f64,
    /// Maximum leaves per tree.
    pub num_leaves: usize,
    /// Minimum rows on each side of a split.
    pub min_leaf_samples: usize,
    /// Fraction of features sampled per round.
    pub feature_fraction: f64,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Rounds without validation improvement before stopping; 0 disables
    /// early stopping and the validation carve-out entirely.
    pub early_stopping_rounds: usize,
    /// Fraction of the training rows held out for early stopping.
    pub validation_fraction: f64,
    /// Seed for the validation carve and per-round feature sampling.
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            num_rounds: 200,
            learning_rate: 0.1,
            num_leaves: 31,
            min_leaf_samples: 20,
            feature_fraction: 0.9,
            lambda: 1.0,
            early_stopping_rounds: 20,
            validation_fraction: 0.1,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

#[derive(Clone, Debug)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn score(&self, row: ArrayView1<f64>) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf { weight } => return weight,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    at = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// A fitted boosted ensemble.
#[derive(Clone, Debug)]
pub struct BoostedModel {
    base_score: f64,
    trees: Vec<Tree>,
    feature_gain: Vec<f64>,
}

impl BoostedModel {
    /// Probability of the positive class for every row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::from_iter(x.outer_iter().map(|row| {
            let score: f64 = self.base_score + self.trees.iter().map(|t| t.score(row)).sum::<f64>();
            sigmoid(score)
        }))
    }

    /// Total split gain accumulated per feature, aligned with the encoded
    /// column order.
    pub fn split_gains(&self) -> &[f64] {
        &self.feature_gain
    }

    /// Number of trees kept after early stopping.
    pub fn num_rounds(&self) -> usize {
        self.trees.len()
    }
}

/// Fit a boosted ensemble on the training partition.
pub fn fit_boosted(
    x: &Array2<f64>,
    labels: &Array1<usize>,
    params: &BoostParams,
) -> Result<BoostedModel> {
    validate(params)?;

    // Carve a stratified validation slice when early stopping is on; fall
    // back to using every row when the data is too small to stratify.
    let (fit_idx, val_idx) = if params.early_stopping_rounds > 0 && params.validation_fraction > 0.0
    {
        match split::stratified_split(
            labels,
            1.0 - params.validation_fraction,
            params.seed.wrapping_add(1),
        ) {
            Ok(s) => (s.train, Some(s.test)),
            Err(_) => ((0..labels.len()).collect(), None),
        }
    } else {
        ((0..labels.len()).collect(), None)
    };

    let x_fit = split::take_rows(x, &fit_idx);
    let y_fit = split::take_labels(labels, &fit_idx);
    let rows = x_fit.nrows();
    let n_features = x_fit.ncols();

    let positives = y_fit.iter().filter(|&&y| y == 1).count();
    if rows == 0 || positives == 0 || positives == rows {
        return Err(PipelineError::insufficient(
            "boosted fit needs both classes in its training slice",
        ));
    }

    let prior = positives as f64 / rows as f64;
    let base_score = (prior / (1.0 - prior)).ln();

    let validation = val_idx.map(|idx| {
        let xv = split::take_rows(x, &idx);
        let yv = split::take_labels(labels, &idx);
        (xv, yv)
    });

    let mut scores = vec![base_score; rows];
    let mut val_scores = validation
        .as_ref()
        .map(|(xv, _)| vec![base_score; xv.nrows()]);

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut trees: Vec<Tree> = Vec::new();
    let mut best_loss = f64::INFINITY;
    let mut best_round = 0;
    let mut stale = 0;

    for round in 0..params.num_rounds {
        let grad: Vec<f64> = scores
            .iter()
            .zip(y_fit.iter())
            .map(|(&s, &y)| sigmoid(s) - y as f64)
            .collect();
        let hess: Vec<f64> = scores
            .iter()
            .map(|&s| {
                let p = sigmoid(s);
                (p * (1.0 - p)).max(1e-12)
            })
            .collect();

        let features = sample_features(n_features, params.feature_fraction, &mut rng);
        let tree = grow_tree(&x_fit, &grad, &hess, &features, params);

        for (i, score) in scores.iter_mut().enumerate() {
            *score += tree.score(x_fit.row(i));
        }

        match (&validation, &mut val_scores) {
            (Some((xv, yv)), Some(vs)) => {
                for (i, score) in vs.iter_mut().enumerate() {
                    *score += tree.score(xv.row(i));
                }
                trees.push(tree);

                let loss = log_loss(vs, yv);
                if loss + 1e-12 < best_loss {
                    best_loss = loss;
                    best_round = trees.len();
                    stale = 0;
                } else {
                    stale += 1;
                    if stale >= params.early_stopping_rounds {
                        debug!(round, best_round, best_loss, "early stopping");
                        break;
                    }
                }
            }
            _ => {
                trees.push(tree);
                best_round = trees.len();
            }
        }
    }

    trees.truncate(best_round);
    let feature_gain = accumulate_gains(&trees, n_features);
    debug!(rounds = trees.len(), "boosted fit complete");

    Ok(BoostedModel {
        base_score,
        trees,
        feature_gain,
    })
}

fn validate(params: &BoostParams) -> Result<()> {
    if params.num_rounds == 0 {
        return Err(PipelineError::insufficient("num_rounds must be at least 1"));
    }
    if params.num_leaves < 2 {
        return Err(PipelineError::insufficient("num_leaves must be at least 2"));
    }
    if params.learning_rate <= 0.0 {
        return Err(PipelineError::insufficient("learning_rate must be positive"));
    }
    if !(params.feature_fraction > 0.0 && params.feature_fraction <= 1.0) {
        return Err(PipelineError::insufficient(
            "feature_fraction must lie in (0, 1]",
        ));
    }
    Ok(())
}

struct SplitPlan {
    feature: usize,
    threshold: f64,
    gain: f64,
    left_rows: Vec<usize>,
    right_rows: Vec<usize>,
    grad_left: f64,
    hess_left: f64,
    grad_right: f64,
    hess_right: f64,
}

struct OpenLeaf {
    slot: usize,
    plan: Option<SplitPlan>,
}

fn grow_tree(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    features: &[usize],
    params: &BoostParams,
) -> Tree {
    let rows: Vec<usize> = (0..x.nrows()).collect();
    let grad_total: f64 = grad.iter().sum();
    let hess_total: f64 = hess.iter().sum();

    let mut nodes = vec![Node::Leaf {
        weight: leaf_weight(grad_total, hess_total, params),
    }];
    let mut open = vec![OpenLeaf {
        slot: 0,
        plan: best_split(x, grad, hess, &rows, features, params, grad_total, hess_total),
    }];
    let mut n_leaves = 1;

    while n_leaves < params.num_leaves {
        // Split the open leaf with the largest gain; earlier leaves win ties.
        let best = open
            .iter()
            .enumerate()
            .filter_map(|(i, leaf)| leaf.plan.as_ref().map(|p| (i, p.gain)))
            .max_by(|(ai, ag), (bi, bg)| {
                ag.partial_cmp(bg).unwrap_or(Ordering::Equal).then(bi.cmp(ai))
            });

        let Some((index, _)) = best else { break };
        let leaf = open.swap_remove(index);
        let Some(plan) = leaf.plan else { break };

        let left_slot = nodes.len();
        let right_slot = nodes.len() + 1;
        nodes.push(Node::Leaf {
            weight: leaf_weight(plan.grad_left, plan.hess_left, params),
        });
        nodes.push(Node::Leaf {
            weight: leaf_weight(plan.grad_right, plan.hess_right, params),
        });
        nodes[leaf.slot] = Node::Split {
            feature: plan.feature,
            threshold: plan.threshold,
            gain: plan.gain,
            left: left_slot,
            right: right_slot,
        };

        open.push(OpenLeaf {
            slot: left_slot,
            plan: best_split(
                x,
                grad,
                hess,
                &plan.left_rows,
                features,
                params,
                plan.grad_left,
                plan.hess_left,
            ),
        });
        open.push(OpenLeaf {
            slot: right_slot,
            plan: best_split(
                x,
                grad,
                hess,
                &plan.right_rows,
                features,
                params,
                plan.grad_right,
                plan.hess_right,
            ),
        });
        n_leaves += 1;
    }

    Tree { nodes }
}

#[allow(clippy::too_many_arguments)]
fn best_split(
    x: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &BoostParams,
    grad_total: f64,
    hess_total: f64,
) -> Option<SplitPlan> {
    if rows.len() < 2 * params.min_leaf_samples {
        return None;
    }

    let parent_score = gain_term(grad_total, hess_total, params.lambda);
    let mut best: Option<SplitPlan> = None;

    for &feature in features {
        let mut order = rows.to_vec();
        order.sort_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(Ordering::Equal)
        });

        let mut grad_left = 0.0;
        let mut hess_left = 0.0;
        for k in 0..order.len() - 1 {
            let i = order[k];
            grad_left += grad[i];
            hess_left += hess[i];

            let left_count = k + 1;
            let right_count = order.len() - left_count;
            if left_count < params.min_leaf_samples || right_count < params.min_leaf_samples {
                continue;
            }

            let value = x[[order[k], feature]];
            let next = x[[order[k + 1], feature]];
            if next <= value {
                continue; // no boundary between equal values
            }

            let grad_right = grad_total - grad_left;
            let hess_right = hess_total - hess_left;
            let gain = 0.5
                * (gain_term(grad_left, hess_left, params.lambda)
                    + gain_term(grad_right, hess_right, params.lambda)
                    - parent_score);

            if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitPlan {
                    feature,
                    threshold: (value + next) / 2.0,
                    gain,
                    left_rows: order[..=k].to_vec(),
                    right_rows: order[k + 1..].to_vec(),
                    grad_left,
                    hess_left,
                    grad_right,
                    hess_right,
                });
            }
        }
    }

    best
}

fn gain_term(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn leaf_weight(g: f64, h: f64, params: &BoostParams) -> f64 {
    -params.learning_rate * g / (h + params.lambda)
}

fn sample_features(n_features: usize, fraction: f64, rng: &mut StdRng) -> Vec<usize> {
    let take = (((n_features as f64) * fraction).ceil() as usize).clamp(1, n_features);
    let mut all: Vec<usize> = (0..n_features).collect();
    if take == n_features {
        return all;
    }
    all.shuffle(rng);
    all.truncate(take);
    all.sort_unstable();
    all
}

fn log_loss(scores: &[f64], labels: &Array1<usize>) -> f64 {
    let total: f64 = scores
        .iter()
        .zip(labels.iter())
        .map(|(&s, &y)| {
            let p = sigmoid(s).clamp(1e-7, 1.0 - 1e-7);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    total / scores.len() as f64
}

fn accumulate_gains(trees: &[Tree], n_features: usize) -> Vec<f64> {
    let mut gains = vec![0.0; n_features];
    for tree in trees {
        for node in &tree.nodes {
            if let Node::Split { feature, gain, .. } = node {
                gains[*feature] += *gain;
            }
        }
    }
    gains
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data(rows: usize) -> (Array2<f64>, Array1<usize>) {
        // One informative feature, one constant distractor.
        let x = Array2::from_shape_fn((rows, 2), |(i, j)| if j == 0 { i as f64 } else { 3.0 });
        let labels = Array1::from_iter((0..rows).map(|i| usize::from(i >= rows / 2)));
        (x, labels)
    }

    fn test_params() -> BoostParams {
        BoostParams {
            num_rounds: 25,
            learning_rate: 0.3,
            num_leaves: 4,
            min_leaf_samples: 2,
            feature_fraction: 1.0,
            early_stopping_rounds: 0,
            ..BoostParams::default()
        }
    }

    #[test]
    fn test_fit_separable_data() {
        let (x, labels) = separable_data(30);
        let model = fit_boosted(&x, &labels, &test_params()).unwrap();

        let probabilities = model.predict_proba(&x);
        for (i, &p) in probabilities.iter().enumerate() {
            assert!((0.0..=1.0).contains(&p));
            let predicted = usize::from(p > 0.5);
            assert_eq!(predicted, labels[i], "row {i} misclassified (p = {p})");
        }
    }

    #[test]
    fn test_gains_land_on_informative_feature() {
        let (x, labels) = separable_data(30);
        let model = fit_boosted(&x, &labels, &test_params()).unwrap();

        let gains = model.split_gains();
        assert_eq!(gains.len(), 2);
        assert!(gains[0] > 0.0);
        // The constant column can never host a split.
        assert_eq!(gains[1], 0.0);
    }

    #[test]
    fn test_fit_deterministic() {
        let (x, labels) = separable_data(40);
        let mut params = test_params();
        params.feature_fraction = 0.5;

        let a = fit_boosted(&x, &labels, &params).unwrap();
        let b = fit_boosted(&x, &labels, &params).unwrap();
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
        assert_eq!(a.split_gains(), b.split_gains());
    }

    #[test]
    fn test_early_stopping_bounds_rounds() {
        let (x, labels) = separable_data(60);
        let params = BoostParams {
            num_rounds: 100,
            learning_rate: 0.3,
            num_leaves: 4,
            min_leaf_samples: 2,
            feature_fraction: 1.0,
            early_stopping_rounds: 5,
            validation_fraction: 0.2,
            ..BoostParams::default()
        };

        let model = fit_boosted(&x, &labels, &params).unwrap();
        assert!(model.num_rounds() >= 1);
        assert!(model.num_rounds() <= params.num_rounds);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::zeros((10, 2));
        let labels = Array1::from_elem(10, 0usize);
        let result = fit_boosted(&x, &labels, &test_params());
        assert!(matches!(result, Err(PipelineError::InsufficientData { .. })));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, labels) = separable_data(10);
        let mut params = test_params();
        params.num_leaves = 1;
        assert!(fit_boosted(&x, &labels, &params).is_err());

        let mut params = test_params();
        params.feature_fraction = 0.0;
        assert!(fit_boosted(&x, &labels, &params).is_err());
    }
}
