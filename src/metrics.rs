//! Evaluation: confusion-derived metrics, ROC analysis, importance ranking
//! and business figures
//!
//! The business summary and the correlation matrix are computed over the
//! full dataset, before the split. That is fine for reporting, which is all
//! they feed here; reusing them for model selection would leak test
//! information.

use ndarray::{Array1, Array2};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::model::TrainedModel;

/// Confusion-matrix counts at a fixed threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    /// Count predictions: a row is called positive when its probability
    /// strictly exceeds the threshold.
    pub fn from_predictions(
        probabilities: &Array1<f64>,
        labels: &Array1<usize>,
        threshold: f64,
    ) -> Self {
        let mut counts = Self {
            true_positives: 0,
            false_positives: 0,
            true_negatives: 0,
            false_negatives: 0,
        };
        for (&p, &y) in probabilities.iter().zip(labels.iter()) {
            let predicted = p > threshold;
            let actual = y == 1;
            match (predicted, actual) {
                (true, true) => counts.true_positives += 1,
                (true, false) => counts.false_positives += 1,
                (false, false) => counts.true_negatives += 1,
                (false, true) => counts.false_negatives += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.true_positives + self.true_negatives) as f64 / self.total() as f64
    }

    /// TP / (TP + FP); 0 when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        let called = self.true_positives + self.false_positives;
        if called == 0 {
            return 0.0;
        }
        self.true_positives as f64 / called as f64
    }

    /// TP / (TP + FN); 0 when no positives exist.
    pub fn recall(&self) -> f64 {
        let actual = self.true_positives + self.false_negatives;
        if actual == 0 {
            return 0.0;
        }
        self.true_positives as f64 / actual as f64
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

/// One feature with its importance value.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureImportance {
    pub name: String,
    pub value: f64,
}

/// Churn economics over the full dataset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BusinessSummary {
    pub customers: usize,
    pub churn_rate: f64,
    /// Average revenue per user: mean monthly charge.
    pub arpu: f64,
    /// churn rate x customer count x ARPU.
    pub revenue_loss: f64,
}

/// Everything the report prints and the charts consume. Purely derived,
/// never mutated after construction.
#[derive(Clone, Debug)]
pub struct EvaluationReport {
    pub confusion: ConfusionCounts,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
    /// (false positive rate, true positive rate) from (0,0) to (1,1).
    pub roc_curve: Vec<(f64, f64)>,
    /// Importances sorted descending; ties keep the original column order.
    pub importances: Vec<FeatureImportance>,
    pub business: BusinessSummary,
}

/// Score the held-out partition into a report.
pub fn evaluate(
    model: &TrainedModel,
    x_test: &Array2<f64>,
    y_test: &Array1<usize>,
    threshold: f64,
    columns: &[String],
    business: BusinessSummary,
) -> Result<EvaluationReport> {
    if x_test.nrows() == 0 {
        return Err(PipelineError::insufficient("empty test partition"));
    }
    if x_test.nrows() != y_test.len() {
        return Err(PipelineError::insufficient(format!(
            "test rows ({}) and labels ({}) disagree",
            x_test.nrows(),
            y_test.len()
        )));
    }

    let probabilities = model.predict_proba(x_test);
    let confusion = ConfusionCounts::from_predictions(&probabilities, y_test, threshold);

    Ok(EvaluationReport {
        accuracy: confusion.accuracy(),
        precision: confusion.precision(),
        recall: confusion.recall(),
        f1: confusion.f1(),
        roc_auc: roc_auc(&probabilities, y_test),
        roc_curve: roc_curve(&probabilities, y_test),
        importances: rank_importances(columns, &model.importances()),
        confusion,
        business,
    })
}

/// ROC-AUC via the Mann-Whitney rank statistic, with midranks for tied
/// probabilities. Degenerate single-class inputs score 0.5.
pub fn roc_auc(probabilities: &Array1<f64>, labels: &Array1<usize>) -> f64 {
    let n = probabilities.len();
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut pairs: Vec<(f64, usize)> = probabilities
        .iter()
        .copied()
        .zip(labels.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let value = pairs[i].0;
        let mut j = i;
        while j < n && pairs[j].0 == value {
            j += 1;
        }
        // Average rank for this tie group (1-indexed).
        let avg_rank = (i + j + 1) as f64 / 2.0;
        for pair in &pairs[i..j] {
            if pair.1 == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j;
    }

    let u = rank_sum_pos - (n_pos as f64 * (n_pos as f64 + 1.0)) / 2.0;
    u / (n_pos as f64 * n_neg as f64)
}

/// ROC curve points swept over every distinct probability, descending.
pub fn roc_curve(probabilities: &Array1<f64>, labels: &Array1<usize>) -> Vec<(f64, f64)> {
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return vec![(0.0, 0.0), (1.0, 1.0)];
    }

    let mut pairs: Vec<(f64, usize)> = probabilities
        .iter()
        .copied()
        .zip(labels.iter().copied())
        .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let mut points = vec![(0.0, 0.0)];
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < pairs.len() {
        let value = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == value {
            if pairs[i].1 == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push((fp as f64 / n_neg as f64, tp as f64 / n_pos as f64));
    }
    points
}

/// Sort features by importance, descending. The sort is stable, so tied
/// values keep their original column order.
pub fn rank_importances(columns: &[String], values: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = columns
        .iter()
        .zip(values.iter())
        .map(|(name, &value)| FeatureImportance {
            name: name.clone(),
            value,
        })
        .collect();
    ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    ranked
}

/// Churn economics over the full dataset.
pub fn business_summary(labels: &[usize], monthly_charges: &[f64]) -> BusinessSummary {
    let customers = labels.len();
    let churn_rate = if customers == 0 {
        0.0
    } else {
        labels.iter().filter(|&&y| y == 1).count() as f64 / customers as f64
    };
    let arpu = if monthly_charges.is_empty() {
        0.0
    } else {
        monthly_charges.iter().sum::<f64>() / monthly_charges.len() as f64
    };

    BusinessSummary {
        customers,
        churn_rate,
        arpu,
        revenue_loss: churn_rate * customers as f64 * arpu,
    }
}

/// Pearson correlation between every pair of columns. Zero-variance columns
/// correlate 0 with everything else and 1 with themselves.
pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let (rows, cols) = x.dim();
    let mut out = Array2::zeros((cols, cols));
    if rows == 0 {
        return out;
    }

    let means: Vec<f64> = (0..cols).map(|j| x.column(j).sum() / rows as f64).collect();
    let sds: Vec<f64> = (0..cols)
        .map(|j| {
            let var = x
                .column(j)
                .iter()
                .map(|v| (v - means[j]) * (v - means[j]))
                .sum::<f64>()
                / rows as f64;
            var.sqrt()
        })
        .collect();

    for a in 0..cols {
        for b in a..cols {
            let r = if a == b {
                1.0
            } else if sds[a] == 0.0 || sds[b] == 0.0 {
                0.0
            } else {
                let cov = (0..rows)
                    .map(|i| (x[[i, a]] - means[a]) * (x[[i, b]] - means[b]))
                    .sum::<f64>()
                    / rows as f64;
                cov / (sds[a] * sds[b])
            };
            out[[a, b]] = r;
            out[[b, a]] = r;
        }
    }
    out
}

/// Per-category churn rate and count for one categorical field, sorted by
/// category name. Feeds the categorical bar charts.
pub fn category_churn_rates(categories: &[String], labels: &[usize]) -> Vec<(String, f64, usize)> {
    let mut acc: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (category, &y) in categories.iter().zip(labels.iter()) {
        let entry = acc.entry(category.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += usize::from(y == 1);
    }
    acc.into_iter()
        .map(|(category, (count, churned))| {
            (category.to_string(), churned as f64 / count as f64, count)
        })
        .collect()
}
