//! Stratified partitioning, feature scaling and class rebalancing

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Disjoint train/test row-index sets covering the full dataset.
#[derive(Clone, Debug)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Per-column mean and standard deviation, fit on the training partition
/// only and applied identically everywhere afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalingStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Partition row indices deterministically, stratified by label.
///
/// Each class is shuffled with the seeded generator and allocated
/// proportionally, so the positive-label ratio of both partitions tracks the
/// full dataset. Every class needs at least two examples so that neither
/// partition ends up without it.
pub fn stratified_split(labels: &Array1<usize>, train_fraction: f64, seed: u64) -> Result<Split> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(PipelineError::insufficient(format!(
            "train fraction {train_fraction} must lie strictly between 0 and 1"
        )));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    if by_class.len() < 2 {
        return Err(PipelineError::insufficient(
            "both classes must be present to stratify the split",
        ));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (class, mut indices) in by_class {
        if indices.len() < 2 {
            return Err(PipelineError::insufficient(format!(
                "class {class} has fewer than 2 examples; cannot keep it in both partitions"
            )));
        }

        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64) * (1.0 - train_fraction)).round() as usize;
        let n_test = n_test.clamp(1, indices.len() - 1);

        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    debug!(train = train.len(), test = test.len(), "stratified split");

    Ok(Split { train, test })
}

/// Gather the given rows of a matrix into a new matrix, preserving order.
pub fn take_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((indices.len(), x.ncols()), |(i, j)| x[[indices[i], j]])
}

/// Gather the given entries of a label vector, preserving order.
pub fn take_labels(labels: &Array1<usize>, indices: &[usize]) -> Array1<usize> {
    Array1::from_iter(indices.iter().map(|&i| labels[i]))
}

/// Compute per-column mean and population standard deviation.
pub fn fit_scaler(x: &Array2<f64>) -> ScalingStats {
    let rows = x.nrows();
    let cols = x.ncols();
    if rows == 0 {
        return ScalingStats {
            mean: vec![0.0; cols],
            std: vec![0.0; cols],
        };
    }

    let mut mean = Vec::with_capacity(cols);
    let mut std = Vec::with_capacity(cols);
    for j in 0..cols {
        let column = x.column(j);
        let m = column.sum() / rows as f64;
        let var = column.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / rows as f64;
        mean.push(m);
        std.push(var.sqrt());
    }

    ScalingStats { mean, std }
}

/// Center and scale each column with the given statistics.
///
/// Zero-variance columns are left untouched so no NaN or infinity can enter
/// the matrix.
pub fn apply_scaler(x: &Array2<f64>, stats: &ScalingStats) -> Array2<f64> {
    Array2::from_shape_fn(x.dim(), |(i, j)| {
        if stats.std[j] > 0.0 {
            (x[[i, j]] - stats.mean[j]) / stats.std[j]
        } else {
            x[[i, j]]
        }
    })
}

/// Resample the training partition toward `target_ratio` positive examples.
///
/// The under-represented side is over-sampled by duplicating rows (drawn with
/// replacement), the other side under-sampled without replacement; the total
/// row count is preserved and the combined order reshuffled. Must never be
/// applied to the test partition.
pub fn rebalance(
    x: &Array2<f64>,
    labels: &Array1<usize>,
    target_ratio: f64,
    seed: u64,
) -> Result<(Array2<f64>, Array1<usize>)> {
    if !(target_ratio > 0.0 && target_ratio < 1.0) {
        return Err(PipelineError::insufficient(format!(
            "target ratio {target_ratio} must lie strictly between 0 and 1"
        )));
    }

    let positives: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &y)| y == 1)
        .map(|(i, _)| i)
        .collect();
    let negatives: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &y)| y != 1)
        .map(|(i, _)| i)
        .collect();

    if positives.is_empty() || negatives.is_empty() {
        return Err(PipelineError::insufficient(
            "rebalancing needs both classes in the training partition",
        ));
    }

    let total = labels.len();
    let n_pos = (((total as f64) * target_ratio).round() as usize).clamp(1, total - 1);
    let n_neg = total - n_pos;

    let mut rng = StdRng::seed_from_u64(seed);
    let chosen_pos = resample(&positives, n_pos, &mut rng);
    let chosen_neg = resample(&negatives, n_neg, &mut rng);

    let mut order: Vec<usize> = chosen_pos.into_iter().chain(chosen_neg).collect();
    order.shuffle(&mut rng);

    debug!(
        rows = order.len(),
        positives = n_pos,
        "rebalanced training partition"
    );
    Ok((take_rows(x, &order), take_labels(labels, &order)))
}

fn resample(indices: &[usize], target: usize, rng: &mut StdRng) -> Vec<usize> {
    if target <= indices.len() {
        let mut pool = indices.to_vec();
        pool.shuffle(rng);
        pool.truncate(target);
        pool
    } else {
        // Keep every original row, then duplicate draws until the target.
        let mut out = indices.to_vec();
        for _ in indices.len()..target {
            out.push(indices[rng.gen_range(0..indices.len())]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::BTreeSet;

    fn labels_with(pos: usize, neg: usize) -> Array1<usize> {
        let mut v = vec![1usize; pos];
        v.extend(std::iter::repeat(0).take(neg));
        Array1::from_vec(v)
    }

    #[test]
    fn test_split_disjoint_and_covering() {
        let labels = labels_with(6, 14);
        let split = stratified_split(&labels, 0.8, 7).unwrap();

        let train: BTreeSet<usize> = split.train.iter().copied().collect();
        let test: BTreeSet<usize> = split.test.iter().copied().collect();

        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 20);
        let all: BTreeSet<usize> = train.union(&test).copied().collect();
        assert_eq!(all, (0..20).collect());
    }

    #[test]
    fn test_split_keeps_both_classes_everywhere() {
        let labels = labels_with(2, 18);
        let split = stratified_split(&labels, 0.8, 3).unwrap();

        for partition in [&split.train, &split.test] {
            let pos = partition.iter().filter(|&&i| labels[i] == 1).count();
            let neg = partition.iter().filter(|&&i| labels[i] == 0).count();
            assert!(pos >= 1, "partition lost the positive class");
            assert!(neg >= 1, "partition lost the negative class");
        }
    }

    #[test]
    fn test_split_proportions() {
        let labels = labels_with(30, 70);
        let split = stratified_split(&labels, 0.8, 42).unwrap();

        let pos_test = split.test.iter().filter(|&&i| labels[i] == 1).count();
        // 30 positives at 20% test share
        assert_eq!(pos_test, 6);
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
    }

    #[test]
    fn test_split_deterministic() {
        let labels = labels_with(10, 30);
        let a = stratified_split(&labels, 0.75, 11).unwrap();
        let b = stratified_split(&labels, 0.75, 11).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_split_rejects_singleton_class() {
        let labels = labels_with(1, 10);
        let result = stratified_split(&labels, 0.8, 1);
        assert!(matches!(result, Err(PipelineError::InsufficientData { .. })));
    }

    #[test]
    fn test_split_rejects_single_class() {
        let labels = labels_with(0, 10);
        let result = stratified_split(&labels, 0.8, 1);
        assert!(matches!(result, Err(PipelineError::InsufficientData { .. })));
    }

    #[test]
    fn test_scaler_standardizes_training_columns() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let stats = fit_scaler(&x);
        let scaled = apply_scaler(&x, &stats);

        // Column 0 has spread: mean ~0, population std ~1 afterwards.
        let mean0 = scaled.column(0).sum() / 4.0;
        let var0 = scaled.column(0).iter().map(|v| (v - mean0).powi(2)).sum::<f64>() / 4.0;
        assert!(mean0.abs() < 1e-12);
        assert!((var0.sqrt() - 1.0).abs() < 1e-12);

        // Column 1 is zero-variance: left exactly unchanged.
        assert_eq!(scaled.column(1).to_vec(), vec![5.0, 5.0, 5.0, 5.0]);
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_scaler_no_leakage() {
        let train = array![[0.0], [20.0]];
        let test = array![[10.0], [30.0]];

        let stats = fit_scaler(&train);
        assert_eq!(stats.mean, vec![10.0]);

        // The test transform uses the train statistics, bit for bit.
        let scaled_test = apply_scaler(&test, &stats);
        assert_eq!(scaled_test[[0, 0]], 0.0);
        assert_eq!(scaled_test[[1, 0]], (30.0 - 10.0) / 10.0);
    }

    #[test]
    fn test_take_rows_preserves_order() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let taken = take_rows(&x, &[3, 0, 2]);
        assert_eq!(taken.column(0).to_vec(), vec![3.0, 0.0, 2.0]);
    }

    #[test]
    fn test_rebalance_reaches_target_ratio() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i * 2 + j) as f64);
        let labels = labels_with(2, 8);

        let (bx, by) = rebalance(&x, &labels, 0.5, 9).unwrap();
        assert_eq!(bx.nrows(), 10);
        assert_eq!(by.len(), 10);
        assert_eq!(by.iter().filter(|&&y| y == 1).count(), 5);
    }

    #[test]
    fn test_rebalance_deterministic() {
        let x = Array2::from_shape_fn((12, 3), |(i, j)| (i + j) as f64);
        let labels = labels_with(3, 9);

        let (ax, ay) = rebalance(&x, &labels, 0.5, 21).unwrap();
        let (bx, by) = rebalance(&x, &labels, 0.5, 21).unwrap();
        assert_eq!(ax, bx);
        assert_eq!(ay, by);
    }

    #[test]
    fn test_rebalance_rejects_single_class() {
        let x = Array2::zeros((4, 1));
        let labels = labels_with(0, 4);
        let result = rebalance(&x, &labels, 0.5, 1);
        assert!(matches!(result, Err(PipelineError::InsufficientData { .. })));
    }
}
