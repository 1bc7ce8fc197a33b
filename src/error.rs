//! Error taxonomy for the churn pipeline.
//!
//! Every failure is fatal: the pipeline is a one-shot batch job, so any error
//! aborts the run with a diagnostic naming the offending path or field.

use thiserror::Error;

/// Errors raised by the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input file missing, unreadable, or containing no data rows.
    #[error("failed to load '{path}': {reason}")]
    Load { path: String, reason: String },

    /// An expected column is absent or has an unusable type.
    #[error("schema error on column '{field}': {reason}")]
    Schema { field: String, reason: String },

    /// A column cannot be turned into numeric features.
    #[error("cannot encode column '{field}': {reason}")]
    Encoding { field: String, reason: String },

    /// A partition or resampling request cannot be satisfied by the data.
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// The linear fit did not produce a solution within its iteration bound.
    #[error("logistic fit failed to converge within {iterations} iterations: {reason}")]
    Convergence { iterations: u64, reason: String },
}

impl PipelineError {
    pub fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn encoding(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoding {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }
}

/// Common result type used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
