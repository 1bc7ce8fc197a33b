//! Command-line interface definitions and argument parsing

use clap::{Parser, ValueEnum};

use crate::boost::BoostParams;
use crate::data::ImputeStrategy;
use crate::encode::EncodeScheme;
use crate::model::ModelKind;

/// Churn report CLI: fits a classifier on customer records and prints metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "telco_churn.csv")]
    pub input: String,

    /// Classifier to fit
    #[arg(short, long, value_enum, default_value = "logistic")]
    pub model: ModelChoice,

    /// Fraction of rows assigned to the training partition
    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    /// Seed driving the split shuffle, resampling and feature subsampling
    #[arg(short, long, default_value_t = 42)]
    pub seed: u64,

    /// Probability threshold for calling a customer churned
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Statistic used to fill missing numeric cells
    #[arg(long, value_enum, default_value = "median")]
    pub impute: ImputeChoice,

    /// Categorical encoding scheme
    #[arg(long, value_enum, default_value = "one-hot")]
    pub encoding: EncodeChoice,

    /// Target positive-class fraction after training-set rebalancing
    /// (boosted model only)
    #[arg(long, default_value_t = 0.5)]
    pub balance_ratio: f64,

    /// Skip training-set rebalancing on the boosted path
    #[arg(long)]
    pub no_balance: bool,

    /// Maximum boosting rounds
    #[arg(long, default_value_t = 200)]
    pub num_rounds: usize,

    /// Shrinkage applied to each tree's contribution
    #[arg(long, default_value_t = 0.1)]
    pub learning_rate: f64,

    /// Maximum leaves per tree
    #[arg(long, default_value_t = 31)]
    pub num_leaves: usize,

    /// Fraction of features sampled for each boosting round
    #[arg(long, default_value_t = 0.9)]
    pub feature_fraction: f64,

    /// Rounds without validation improvement before stopping (0 disables)
    #[arg(long, default_value_t = 20)]
    pub early_stopping_rounds: usize,

    /// Prefix for the emitted PNG charts
    #[arg(short, long, default_value = "churn_report")]
    pub output: String,

    /// Skip chart rendering
    #[arg(long)]
    pub no_plots: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelChoice {
    Logistic,
    Boosted,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImputeChoice {
    Median,
    Mean,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeChoice {
    OneHot,
    Ordinal,
}

impl From<ModelChoice> for ModelKind {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Logistic => ModelKind::Logistic,
            ModelChoice::Boosted => ModelKind::Boosted,
        }
    }
}

impl From<ImputeChoice> for ImputeStrategy {
    fn from(choice: ImputeChoice) -> Self {
        match choice {
            ImputeChoice::Median => ImputeStrategy::Median,
            ImputeChoice::Mean => ImputeStrategy::Mean,
        }
    }
}

impl From<EncodeChoice> for EncodeScheme {
    fn from(choice: EncodeChoice) -> Self {
        match choice {
            EncodeChoice::OneHot => EncodeScheme::OneHot,
            EncodeChoice::Ordinal => EncodeScheme::Ordinal,
        }
    }
}

impl Args {
    /// Assemble booster hyperparameters from the individual flags.
    pub fn boost_params(&self) -> BoostParams {
        BoostParams {
            num_rounds: self.num_rounds,
            learning_rate: self.learning_rate,
            num_leaves: self.num_leaves,
            feature_fraction: self.feature_fraction,
            early_stopping_rounds: self.early_stopping_rounds,
            seed: self.seed,
            ..BoostParams::default()
        }
    }
}
