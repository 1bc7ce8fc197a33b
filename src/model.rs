//! Classifier selection and training

use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use tracing::debug;

use crate::boost::{self, BoostParams, BoostedModel};
use crate::error::{PipelineError, Result};

/// Which classifier the pipeline fits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    Logistic,
    Boosted,
}

/// Hyperparameters for the logistic baseline.
#[derive(Clone, Debug)]
pub struct LogisticParams {
    /// Iteration bound for the solver.
    pub max_iterations: u64,
    /// Ridge penalty strength.
    pub l2_penalty: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            l2_penalty: 1.0,
        }
    }
}

/// A fitted classifier, consumed by the evaluator through `predict_proba`.
pub enum TrainedModel {
    Logistic(FittedLogisticRegression<f64, usize>),
    Boosted(BoostedModel),
}

impl TrainedModel {
    /// Probability of the positive class for every row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        match self {
            TrainedModel::Logistic(model) => model.predict_probabilities(x),
            TrainedModel::Boosted(model) => model.predict_proba(x),
        }
    }

    /// Raw per-feature importance values, aligned with the encoded column
    /// order: absolute coefficient magnitude for the linear model, total
    /// split gain for the boosted ensemble.
    pub fn importances(&self) -> Vec<f64> {
        match self {
            TrainedModel::Logistic(model) => model.params().iter().map(|c| c.abs()).collect(),
            TrainedModel::Boosted(model) => model.split_gains().to_vec(),
        }
    }
}

/// Fit the ridge-penalized logistic baseline on scaled features.
pub fn fit_logistic(
    x: &Array2<f64>,
    labels: &Array1<usize>,
    params: &LogisticParams,
) -> Result<TrainedModel> {
    let dataset = Dataset::new(x.clone(), labels.clone());

    let fitted = LogisticRegression::default()
        .alpha(params.l2_penalty)
        .max_iterations(params.max_iterations)
        .fit(&dataset)
        .map_err(|e| PipelineError::Convergence {
            iterations: params.max_iterations,
            reason: e.to_string(),
        })?;

    debug!(
        features = x.ncols(),
        rows = x.nrows(),
        "logistic fit complete"
    );
    Ok(TrainedModel::Logistic(fitted))
}

/// Fit the gradient-boosted ensemble.
pub fn fit_boosted(
    x: &Array2<f64>,
    labels: &Array1<usize>,
    params: &BoostParams,
) -> Result<TrainedModel> {
    Ok(TrainedModel::Boosted(boost::fit_boosted(x, labels, params)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f64>, Array1<usize>) {
        // Scaled-looking single informative feature plus noise-free second.
        let x = Array2::from_shape_fn((20, 2), |(i, j)| {
            if j == 0 {
                (i as f64 - 9.5) / 5.77
            } else if i % 2 == 0 {
                0.5
            } else {
                -0.5
            }
        });
        let labels = Array1::from_iter((0..20).map(|i| usize::from(i >= 10)));
        (x, labels)
    }

    #[test]
    fn test_fit_logistic_probabilities_track_feature() {
        let (x, labels) = separable_data();
        let model = fit_logistic(&x, &labels, &LogisticParams::default()).unwrap();

        let probabilities = model.predict_proba(&x);
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        // The first (low-feature) row must look far less churn-prone than
        // the last (high-feature) row.
        assert!(probabilities[0] < probabilities[19]);
        assert!(probabilities[0] < 0.5);
        assert!(probabilities[19] > 0.5);
    }

    #[test]
    fn test_logistic_importances_match_width() {
        let (x, labels) = separable_data();
        let model = fit_logistic(&x, &labels, &LogisticParams::default()).unwrap();

        let importances = model.importances();
        assert_eq!(importances.len(), 2);
        assert!(importances.iter().all(|v| *v >= 0.0));
        // The informative feature dominates the distractor.
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fit_boosted_wrapper() {
        let (x, labels) = separable_data();
        let params = BoostParams {
            num_rounds: 10,
            num_leaves: 4,
            min_leaf_samples: 2,
            feature_fraction: 1.0,
            early_stopping_rounds: 0,
            ..BoostParams::default()
        };

        let model = fit_boosted(&x, &labels, &params).unwrap();
        assert_eq!(model.importances().len(), 2);
        assert!(model
            .predict_proba(&x)
            .iter()
            .all(|p| (0.0..=1.0).contains(p)));
    }
}
