//! The one-pass pipeline: load, clean, encode, split, scale, fit, evaluate
//!
//! Each run executes this DAG exactly once and produces an immutable
//! [`EvaluationReport`]. The stages are the pure functions of the sibling
//! modules; this module only wires them together.

use ndarray::Array1;
use polars::prelude::DataFrame;
use tracing::info;

use crate::boost::BoostParams;
use crate::data::{self, ImputeStrategy};
use crate::encode::{self, EncodeScheme, FeatureMatrix};
use crate::error::Result;
use crate::metrics::{self, EvaluationReport};
use crate::model::{self, LogisticParams, ModelKind};
use crate::split;

/// Everything a run needs. Field names default to the telco churn schema
/// but stay configurable so the pipeline works for any binary-target table.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub input: String,
    pub model: ModelKind,
    pub impute: ImputeStrategy,
    pub encoding: EncodeScheme,
    pub train_fraction: f64,
    pub seed: u64,
    pub threshold: f64,
    /// Target positive ratio for training-set rebalancing; `None` skips it.
    /// Only honored on the boosted path.
    pub balance: Option<f64>,
    pub logistic: LogisticParams,
    pub boost: BoostParams,
    /// Identifier column dropped before encoding.
    pub id_field: String,
    pub target_field: String,
    pub positive_label: String,
    /// Columns repaired and imputed as numbers.
    pub numeric_fields: Vec<String>,
    /// Column averaged into the ARPU figure.
    pub revenue_field: String,
}

impl PipelineConfig {
    /// Defaults for the telco churn table.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            model: ModelKind::Logistic,
            impute: ImputeStrategy::Median,
            encoding: EncodeScheme::OneHot,
            train_fraction: 0.8,
            seed: 42,
            threshold: 0.5,
            balance: Some(0.5),
            logistic: LogisticParams::default(),
            boost: BoostParams::default(),
            id_field: "customerID".to_string(),
            target_field: "Churn".to_string(),
            positive_label: "Yes".to_string(),
            numeric_fields: vec![
                "tenure".to_string(),
                "MonthlyCharges".to_string(),
                "TotalCharges".to_string(),
            ],
            revenue_field: "MonthlyCharges".to_string(),
        }
    }
}

/// The report plus the full-dataset artifacts the charts consume.
pub struct PipelineOutput {
    pub report: EvaluationReport,
    /// Encoded, unscaled feature matrix over all rows (heatmap input).
    pub matrix: FeatureMatrix,
    /// Binary labels over all rows, in row order.
    pub labels: Array1<usize>,
    /// The cleaned dataframe (histogram and scatter input).
    pub frame: DataFrame,
    pub test_rows: usize,
}

/// Execute the full pipeline once.
pub fn run(cfg: &PipelineConfig) -> Result<PipelineOutput> {
    let mut df = data::load_csv(&cfg.input)?;
    df = data::drop_column(df, &cfg.id_field)?;
    for field in &cfg.numeric_fields {
        df = data::coerce_numeric(df, field)?;
        df = data::impute_numeric(df, field, cfg.impute)?;
    }
    df = data::normalize_target(df, &cfg.target_field, &cfg.positive_label)?;
    info!(rows = df.height(), "dataset cleaned");

    let all_labels = data::target_labels(&df, &cfg.target_field)?;
    let monthly = data::numeric_column(&df, &cfg.revenue_field)?;
    let business = metrics::business_summary(&all_labels, &monthly);

    let (matrix, labels) = encode::encode(&df, &cfg.target_field, cfg.encoding)?;

    let partition = split::stratified_split(&labels, cfg.train_fraction, cfg.seed)?;
    let x_train = split::take_rows(&matrix.values, &partition.train);
    let y_train = split::take_labels(&labels, &partition.train);
    let x_test = split::take_rows(&matrix.values, &partition.test);
    let y_test = split::take_labels(&labels, &partition.test);

    let stats = split::fit_scaler(&x_train);
    let x_train = split::apply_scaler(&x_train, &stats);
    let x_test = split::apply_scaler(&x_test, &stats);

    // Rebalancing happens after the split and never touches the test rows.
    let (x_train, y_train) = match (cfg.model, cfg.balance) {
        (ModelKind::Boosted, Some(ratio)) => split::rebalance(&x_train, &y_train, ratio, cfg.seed)?,
        _ => (x_train, y_train),
    };

    let trained = match cfg.model {
        ModelKind::Logistic => model::fit_logistic(&x_train, &y_train, &cfg.logistic)?,
        ModelKind::Boosted => model::fit_boosted(&x_train, &y_train, &cfg.boost)?,
    };
    info!(test_rows = x_test.nrows(), "model fitted, scoring held-out rows");

    let report = metrics::evaluate(
        &trained,
        &x_test,
        &y_test,
        cfg.threshold,
        &matrix.columns,
        business,
    )?;

    Ok(PipelineOutput {
        report,
        matrix,
        labels,
        frame: df,
        test_rows: partition.test.len(),
    })
}
