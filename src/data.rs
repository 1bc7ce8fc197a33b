//! Data loading and cleaning using Polars

use polars::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Statistic used to fill missing numeric cells.
///
/// The statistic is computed over the non-missing values of the full column
/// at imputation time, so the result is deterministic for identical input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImputeStrategy {
    Median,
    Mean,
}

/// Load customer records from a delimited file with a header row.
///
/// Fails if the file is missing, unreadable, or contains no data rows. The
/// file handle only lives for the duration of the read.
pub fn load_csv(path: &str) -> Result<DataFrame> {
    if !Path::new(path).exists() {
        return Err(PipelineError::Load {
            path: path.to_string(),
            reason: "file not found".to_string(),
        });
    }

    let df = CsvReader::from_path(path)
        .map_err(|e| PipelineError::Load {
            path: path.to_string(),
            reason: e.to_string(),
        })?
        .has_header(true)
        .finish()
        .map_err(|e| PipelineError::Load {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    if df.height() == 0 {
        return Err(PipelineError::Load {
            path: path.to_string(),
            reason: "no data rows".to_string(),
        });
    }

    debug!(rows = df.height(), columns = df.width(), "loaded dataset");
    Ok(df)
}

fn column<'a>(df: &'a DataFrame, field: &str) -> Result<&'a Series> {
    df.column(field)
        .map_err(|_| PipelineError::schema(field, "column is absent"))
}

/// Map the target field's positive marker to 1 and every other value to 0.
pub fn normalize_target(mut df: DataFrame, field: &str, positive: &str) -> Result<DataFrame> {
    let series = column(&df, field)?;
    let ca = series
        .utf8()
        .map_err(|_| PipelineError::schema(field, "expected a string-typed target"))?;

    let encoded: UInt32Chunked = ca
        .into_iter()
        .map(|cell| Some(u32::from(cell == Some(positive))))
        .collect();
    let mut encoded = encoded.into_series();
    encoded.rename(field);

    df.with_column(encoded)
        .map_err(|e| PipelineError::schema(field, e.to_string()))?;
    Ok(df)
}

/// Parse a field as `f64`, turning unparseable cells into missing values
/// rather than raising.
pub fn coerce_numeric(mut df: DataFrame, field: &str) -> Result<DataFrame> {
    let casted = column(&df, field)?
        .cast(&DataType::Float64)
        .map_err(|e| PipelineError::schema(field, e.to_string()))?;

    df.with_column(casted)
        .map_err(|e| PipelineError::schema(field, e.to_string()))?;
    Ok(df)
}

/// Fill missing cells of a numeric field with a column statistic.
pub fn impute_numeric(mut df: DataFrame, field: &str, strategy: ImputeStrategy) -> Result<DataFrame> {
    let series = column(&df, field)?;
    let ca = series
        .f64()
        .map_err(|_| PipelineError::schema(field, "expected a float column; coerce it first"))?;

    let missing = ca.null_count();
    if missing == 0 {
        return Ok(df);
    }

    let fill = match strategy {
        ImputeStrategy::Median => ca.median(),
        ImputeStrategy::Mean => ca.mean(),
    }
    .ok_or_else(|| {
        PipelineError::insufficient(format!("column '{field}' has no observed values to impute from"))
    })?;

    let filled: Float64Chunked = ca
        .into_iter()
        .map(|cell| Some(cell.unwrap_or(fill)))
        .collect();
    let mut filled = filled.into_series();
    filled.rename(field);

    df.with_column(filled)
        .map_err(|e| PipelineError::schema(field, e.to_string()))?;

    debug!(field, missing, fill, "imputed missing numeric cells");
    Ok(df)
}

/// Remove an identifier column that carries no predictive signal.
///
/// Must run before encoding; a unique customer key would otherwise explode
/// the categorical cardinality.
pub fn drop_column(df: DataFrame, field: &str) -> Result<DataFrame> {
    df.drop(field)
        .map_err(|_| PipelineError::schema(field, "column is absent"))
}

/// Extract a fully-observed numeric column as a plain vector.
pub fn numeric_column(df: &DataFrame, field: &str) -> Result<Vec<f64>> {
    let casted = column(df, field)?
        .cast(&DataType::Float64)
        .map_err(|_| PipelineError::schema(field, "column is not numeric"))?;
    let ca = casted
        .f64()
        .map_err(|_| PipelineError::schema(field, "column is not numeric"))?;

    ca.into_iter()
        .map(|cell| cell.ok_or_else(|| PipelineError::encoding(field, "missing value")))
        .collect()
}

/// Extract a fully-observed string column as owned values.
pub fn string_column(df: &DataFrame, field: &str) -> Result<Vec<String>> {
    let ca = column(df, field)?
        .utf8()
        .map_err(|_| PipelineError::schema(field, "column is not string-typed"))?;

    ca.into_iter()
        .map(|cell| {
            cell.map(str::to_string)
                .ok_or_else(|| PipelineError::encoding(field, "missing value"))
        })
        .collect()
}

/// Extract the normalized binary target as 0/1 labels.
pub fn target_labels(df: &DataFrame, field: &str) -> Result<Vec<usize>> {
    let casted = column(df, field)?
        .cast(&DataType::UInt32)
        .map_err(|_| PipelineError::schema(field, "target is not a binary indicator"))?;
    let ca = casted
        .u32()
        .map_err(|_| PipelineError::schema(field, "target is not a binary indicator"))?;

    ca.into_iter()
        .map(|cell| {
            cell.map(|v| v as usize)
                .ok_or_else(|| PipelineError::encoding(field, "missing label"))
        })
        .collect()
}
