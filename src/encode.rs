//! Categorical encoding: cleaned records to a numeric feature matrix

use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// How categorical fields become numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeScheme {
    /// One indicator column per category, named `field=category`. All k
    /// indicators are kept (no reference level is dropped) so every category
    /// stays nameable in the importance ranking.
    OneHot,
    /// One column per field holding a stable integer 0..k-1, assigned by
    /// sorted category name.
    Ordinal,
}

/// The encoded dataset: a dense matrix plus the column names that map each
/// column back to its feature semantics.
#[derive(Clone, Debug)]
pub struct FeatureMatrix {
    pub values: Array2<f64>,
    pub columns: Vec<String>,
}

impl FeatureMatrix {
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }
}

/// Encode every non-target column of `df` numerically.
///
/// String columns are treated as categoricals with a sorted, deterministic
/// category-to-index assignment; numeric columns pass through as `f64`. Row
/// count and row order are preserved. Any remaining missing value is an
/// [`PipelineError::Encoding`]: cleaning must have run first.
pub fn encode(
    df: &DataFrame,
    target: &str,
    scheme: EncodeScheme,
) -> Result<(FeatureMatrix, Array1<usize>)> {
    let labels = extract_labels(df, target)?;
    let height = df.height();

    let mut names: Vec<String> = Vec::new();
    let mut cols: Vec<Vec<f64>> = Vec::new();

    for series in df.get_columns() {
        let name = series.name();
        if name == target {
            continue;
        }

        match series.dtype() {
            DataType::Utf8 => {
                let ca = series
                    .utf8()
                    .map_err(|_| PipelineError::schema(name, "unreadable string column"))?;
                if ca.null_count() > 0 {
                    return Err(PipelineError::encoding(name, "missing categorical value"));
                }

                let categories: Vec<&str> = ca
                    .into_iter()
                    .flatten()
                    .collect::<BTreeSet<&str>>()
                    .into_iter()
                    .collect();

                match scheme {
                    EncodeScheme::OneHot => {
                        for category in &categories {
                            names.push(format!("{name}={category}"));
                            cols.push(
                                ca.into_iter()
                                    .flatten()
                                    .map(|v| if v == *category { 1.0 } else { 0.0 })
                                    .collect(),
                            );
                        }
                    }
                    EncodeScheme::Ordinal => {
                        let index: HashMap<&str, usize> = categories
                            .iter()
                            .enumerate()
                            .map(|(i, c)| (*c, i))
                            .collect();
                        names.push(name.to_string());
                        cols.push(ca.into_iter().flatten().map(|v| index[v] as f64).collect());
                    }
                }
            }
            dtype if dtype.is_numeric() => {
                let casted = series
                    .cast(&DataType::Float64)
                    .map_err(|e| PipelineError::encoding(name, e.to_string()))?;
                let ca = casted
                    .f64()
                    .map_err(|e| PipelineError::encoding(name, e.to_string()))?;
                if ca.null_count() > 0 {
                    return Err(PipelineError::encoding(name, "unimputed missing value"));
                }
                names.push(name.to_string());
                cols.push(ca.into_no_null_iter().collect());
            }
            other => {
                return Err(PipelineError::encoding(
                    name,
                    format!("unsupported column type {other}"),
                ));
            }
        }
    }

    if names.is_empty() {
        return Err(PipelineError::insufficient(
            "no feature columns left after encoding",
        ));
    }

    let width = names.len();
    let values = Array2::from_shape_fn((height, width), |(i, j)| cols[j][i]);
    debug!(rows = height, columns = width, "encoded feature matrix");

    Ok((
        FeatureMatrix {
            values,
            columns: names,
        },
        Array1::from_vec(labels),
    ))
}

fn extract_labels(df: &DataFrame, target: &str) -> Result<Vec<usize>> {
    let series = df
        .column(target)
        .map_err(|_| PipelineError::schema(target, "target column is absent"))?;
    let casted = series
        .cast(&DataType::UInt32)
        .map_err(|_| PipelineError::schema(target, "target is not a binary indicator"))?;
    let ca = casted
        .u32()
        .map_err(|_| PipelineError::schema(target, "target is not a binary indicator"))?;

    ca.into_iter()
        .map(|cell| {
            cell.map(|v| v as usize)
                .ok_or_else(|| PipelineError::encoding(target, "missing label"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        let contract = Series::new("Contract", &["Two year", "Month-to-month", "Two year"]);
        let tenure = Series::new("tenure", &[10.0f64, 2.0, 60.0]);
        let churn = Series::new("Churn", &[0u32, 1, 0]);
        DataFrame::new(vec![contract, tenure, churn]).unwrap()
    }

    #[test]
    fn test_one_hot_sorted_categories() {
        let (matrix, labels) = encode(&sample_frame(), "Churn", EncodeScheme::OneHot).unwrap();

        assert_eq!(
            matrix.columns,
            vec![
                "Contract=Month-to-month".to_string(),
                "Contract=Two year".to_string(),
                "tenure".to_string(),
            ]
        );
        assert_eq!(matrix.nrows(), 3);
        assert_eq!(labels.to_vec(), vec![0, 1, 0]);

        // Row 0 is "Two year": indicator pattern [0, 1]
        assert_eq!(matrix.values[[0, 0]], 0.0);
        assert_eq!(matrix.values[[0, 1]], 1.0);
        // Row 1 is "Month-to-month": [1, 0]
        assert_eq!(matrix.values[[1, 0]], 1.0);
        assert_eq!(matrix.values[[1, 1]], 0.0);
        // Numeric passthrough
        assert_eq!(matrix.values[[2, 2]], 60.0);
    }

    #[test]
    fn test_ordinal_sorted_indices() {
        let (matrix, _) = encode(&sample_frame(), "Churn", EncodeScheme::Ordinal).unwrap();

        assert_eq!(matrix.columns, vec!["Contract".to_string(), "tenure".to_string()]);
        // Sorted names: "Month-to-month" -> 0, "Two year" -> 1
        assert_eq!(matrix.values[[0, 0]], 1.0);
        assert_eq!(matrix.values[[1, 0]], 0.0);
        assert_eq!(matrix.values[[2, 0]], 1.0);
    }

    #[test]
    fn test_missing_numeric_cell_rejected() {
        let tenure = Series::new("tenure", &[Some(10.0f64), None, Some(60.0)]);
        let churn = Series::new("Churn", &[0u32, 1, 0]);
        let df = DataFrame::new(vec![tenure, churn]).unwrap();

        let result = encode(&df, "Churn", EncodeScheme::OneHot);
        assert!(matches!(result, Err(PipelineError::Encoding { .. })));
    }

    #[test]
    fn test_missing_categorical_cell_rejected() {
        let contract = Series::new("Contract", &[Some("One year"), None, Some("One year")]);
        let churn = Series::new("Churn", &[0u32, 1, 0]);
        let df = DataFrame::new(vec![contract, churn]).unwrap();

        let result = encode(&df, "Churn", EncodeScheme::OneHot);
        assert!(matches!(result, Err(PipelineError::Encoding { .. })));
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let tenure = Series::new("tenure", &[10.0f64, 2.0]);
        let df = DataFrame::new(vec![tenure]).unwrap();

        let result = encode(&df, "Churn", EncodeScheme::OneHot);
        assert!(matches!(result, Err(PipelineError::Schema { .. })));
    }

    #[test]
    fn test_row_order_preserved() {
        let (matrix, labels) = encode(&sample_frame(), "Churn", EncodeScheme::OneHot).unwrap();
        assert_eq!(matrix.values.column(2).to_vec(), vec![10.0, 2.0, 60.0]);
        assert_eq!(labels.len(), matrix.nrows());
    }
}
