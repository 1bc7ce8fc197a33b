//! ChurnForge: churn report CLI
//!
//! This is the main entrypoint: it runs the pipeline once, prints the
//! evaluation and business report, and renders the charts.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use churnforge::cli::ModelChoice;
use churnforge::{data, metrics, pipeline, viz, Args, PipelineConfig, PipelineOutput};

const CATEGORY_CHART_FIELDS: [&str; 2] = ["Contract", "InternetService"];

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let start = Instant::now();
    let cfg = build_config(&args);
    let output = pipeline::run(&cfg)?;

    print_report(&args, &output);

    if !args.no_plots {
        render_charts(&args, &output)?;
        println!("\nCharts written with prefix: {}", args.output);
    }

    println!("Total processing time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> PipelineConfig {
    let mut cfg = PipelineConfig::new(&args.input);
    cfg.model = args.model.into();
    cfg.impute = args.impute.into();
    cfg.encoding = args.encoding.into();
    cfg.train_fraction = args.train_fraction;
    cfg.seed = args.seed;
    cfg.threshold = args.threshold;
    cfg.balance = if args.no_balance {
        None
    } else {
        Some(args.balance_ratio)
    };
    cfg.boost = args.boost_params();
    cfg
}

fn print_report(args: &Args, output: &PipelineOutput) {
    let report = &output.report;
    let model_name = match args.model {
        ModelChoice::Logistic => "logistic regression",
        ModelChoice::Boosted => "gradient-boosted trees",
    };

    println!("=== Churn Report ({model_name}) ===");
    println!("Test partition: {} customers", output.test_rows);
    println!(
        "Confusion: TP={} FP={} TN={} FN={}",
        report.confusion.true_positives,
        report.confusion.false_positives,
        report.confusion.true_negatives,
        report.confusion.false_negatives,
    );
    println!("Accuracy : {:.3}", report.accuracy);
    println!("Precision: {:.3}", report.precision);
    println!("Recall   : {:.3}", report.recall);
    println!("F1       : {:.3}", report.f1);
    println!("ROC-AUC  : {:.3}", report.roc_auc);

    let business = &report.business;
    println!("\n=== Business Summary ===");
    println!("Customers            : {}", business.customers);
    println!("Churn rate           : {:.1}%", business.churn_rate * 100.0);
    println!("ARPU                 : ${:.2}", business.arpu);
    println!("Est. revenue at risk : ${:.2}", business.revenue_loss);

    println!("\n=== Top Features ===");
    for (rank, feature) in report.importances.iter().take(10).enumerate() {
        println!("{:2}. {:<35} {:.4}", rank + 1, feature.name, feature.value);
    }
}

fn render_charts(args: &Args, output: &PipelineOutput) -> Result<()> {
    let prefix = &args.output;
    let report = &output.report;

    viz::plot_roc_curve(&report.roc_curve, report.roc_auc, &format!("{prefix}_roc.png"))?;
    viz::plot_importances(&report.importances, 10, &format!("{prefix}_importance.png"))?;

    let labels: Vec<usize> = output.labels.to_vec();
    for field in ["tenure", "MonthlyCharges", "TotalCharges"] {
        let values = data::numeric_column(&output.frame, field)?;
        viz::plot_histogram(&values, field, &format!("{prefix}_{field}_hist.png"))?;
    }

    let tenure = data::numeric_column(&output.frame, "tenure")?;
    let total_charges = data::numeric_column(&output.frame, "TotalCharges")?;
    viz::plot_churn_scatter(
        &tenure,
        &total_charges,
        &labels,
        &format!("{prefix}_scatter.png"),
    )?;

    let correlation = metrics::correlation_matrix(&output.matrix.values);
    viz::plot_correlation_heatmap(
        &correlation,
        &output.matrix.columns,
        &format!("{prefix}_heatmap.png"),
    )?;

    for field in CATEGORY_CHART_FIELDS {
        // Not every input carries these columns; skip the chart when absent.
        if let Ok(categories) = data::string_column(&output.frame, field) {
            let rates = metrics::category_churn_rates(&categories, &labels);
            viz::plot_category_churn(&rates, field, &format!("{prefix}_{field}_churn.png"))?;
        }
    }

    Ok(())
}
