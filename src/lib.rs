//! ChurnForge: a batch report generator for telecom customer churn.
//!
//! The library implements one pipeline, executed once per run: load a
//! customer CSV, repair and impute its numeric fields, encode categoricals,
//! split and scale, fit a binary classifier (logistic baseline or
//! gradient-boosted trees with optional class rebalancing), then score the
//! held-out partition into an [`metrics::EvaluationReport`]. Chart rendering
//! lives in [`viz`] and consumes only numeric summaries.

pub mod boost;
pub mod cli;
pub mod data;
pub mod encode;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod split;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::ImputeStrategy;
pub use encode::{encode, EncodeScheme, FeatureMatrix};
pub use error::{PipelineError, Result};
pub use metrics::{evaluate, BusinessSummary, EvaluationReport};
pub use model::{ModelKind, TrainedModel};
pub use pipeline::{run, PipelineConfig, PipelineOutput};
