//! Integration tests for ChurnForge

use churnforge::boost::BoostParams;
use churnforge::model::ModelKind;
use churnforge::{pipeline, EncodeScheme, EvaluationReport, PipelineConfig};
use std::io::Write;
use tempfile::NamedTempFile;

/// Ten customers, three churned, one malformed TotalCharges cell.
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "customerID,gender,Contract,InternetService,tenure,MonthlyCharges,TotalCharges,Churn"
    )
    .unwrap();

    writeln!(file, "0001,Female,Month-to-month,Fiber optic,2,85.0,170.0,Yes").unwrap();
    writeln!(file, "0002,Male,Two year,DSL,60,55.0,3300.0,No").unwrap();
    writeln!(file, "0003,Female,Month-to-month,Fiber optic,1,90.5, ,Yes").unwrap();
    writeln!(file, "0004,Male,One year,DSL,34,56.0,1904.0,No").unwrap();
    writeln!(file, "0005,Female,Two year,No,70,20.0,1400.0,No").unwrap();
    writeln!(file, "0006,Male,Month-to-month,Fiber optic,5,99.0,495.0,Yes").unwrap();
    writeln!(file, "0007,Female,One year,DSL,45,53.5,2407.5,No").unwrap();
    writeln!(file, "0008,Male,Two year,No,72,19.5,1404.0,No").unwrap();
    writeln!(file, "0009,Female,One year,DSL,30,58.0,1740.0,No").unwrap();
    writeln!(file, "0010,Male,Two year,DSL,68,54.0,3672.0,No").unwrap();

    file
}

fn test_config(path: &str) -> PipelineConfig {
    let mut cfg = PipelineConfig::new(path);
    cfg.train_fraction = 0.8;
    cfg.seed = 42;
    cfg
}

fn boosted_config(path: &str) -> PipelineConfig {
    let mut cfg = test_config(path);
    cfg.model = ModelKind::Boosted;
    cfg.balance = Some(0.5);
    cfg.boost = BoostParams {
        num_rounds: 30,
        learning_rate: 0.3,
        num_leaves: 4,
        min_leaf_samples: 1,
        feature_fraction: 1.0,
        early_stopping_rounds: 0,
        ..BoostParams::default()
    };
    cfg
}

fn assert_reports_identical(a: &EvaluationReport, b: &EvaluationReport) {
    assert_eq!(a.confusion, b.confusion);
    assert_eq!(a.accuracy, b.accuracy);
    assert_eq!(a.precision, b.precision);
    assert_eq!(a.recall, b.recall);
    assert_eq!(a.f1, b.f1);
    assert_eq!(a.roc_auc, b.roc_auc);
    assert_eq!(a.roc_curve, b.roc_curve);
    assert_eq!(a.importances, b.importances);
    assert_eq!(a.business, b.business);
}

#[test]
fn test_logistic_end_to_end() {
    let file = create_test_csv();
    let path = file.path().to_str().unwrap();

    let output = pipeline::run(&test_config(path)).unwrap();
    let report = &output.report;

    // 3 positives and 7 negatives at an 80/20 stratified split: one of each
    // class lands in the test partition.
    assert_eq!(output.test_rows, 2);
    assert_eq!(report.confusion.total(), output.test_rows);

    // One importance entry per encoded column.
    assert_eq!(report.importances.len(), output.matrix.columns.len());

    // All headline metrics must be well-defined numbers.
    for value in [
        report.accuracy,
        report.precision,
        report.recall,
        report.f1,
        report.roc_auc,
    ] {
        assert!(value.is_finite());
        assert!((0.0..=1.0).contains(&value));
    }

    // The malformed TotalCharges cell was repaired, not dropped.
    assert_eq!(output.matrix.nrows(), 10);
    assert!(output.matrix.values.iter().all(|v| v.is_finite()));
}

#[test]
fn test_business_summary_uses_full_dataset() {
    let file = create_test_csv();
    let path = file.path().to_str().unwrap();

    let output = pipeline::run(&test_config(path)).unwrap();
    let business = &output.report.business;

    assert_eq!(business.customers, 10);
    assert!((business.churn_rate - 0.3).abs() < 1e-12);

    let expected_arpu =
        (85.0 + 55.0 + 90.5 + 56.0 + 20.0 + 99.0 + 53.5 + 19.5 + 58.0 + 54.0) / 10.0;
    assert!((business.arpu - expected_arpu).abs() < 1e-9);
    assert!((business.revenue_loss - 0.3 * 10.0 * expected_arpu).abs() < 1e-9);
}

#[test]
fn test_boosted_end_to_end_with_rebalancing() {
    let file = create_test_csv();
    let path = file.path().to_str().unwrap();

    let output = pipeline::run(&boosted_config(path)).unwrap();
    let report = &output.report;

    // Rebalancing only touches the training partition: the held-out size
    // and its confusion total are unchanged.
    assert_eq!(output.test_rows, 2);
    assert_eq!(report.confusion.total(), 2);
    assert_eq!(report.importances.len(), output.matrix.columns.len());
    assert!(report.roc_auc.is_finite());
}

#[test]
fn test_rerun_is_bit_identical() {
    let file = create_test_csv();
    let path = file.path().to_str().unwrap();

    let first = pipeline::run(&test_config(path)).unwrap();
    let second = pipeline::run(&test_config(path)).unwrap();
    assert_reports_identical(&first.report, &second.report);

    let first = pipeline::run(&boosted_config(path)).unwrap();
    let second = pipeline::run(&boosted_config(path)).unwrap();
    assert_reports_identical(&first.report, &second.report);
}

#[test]
fn test_ordinal_encoding_end_to_end() {
    let file = create_test_csv();
    let path = file.path().to_str().unwrap();

    let mut cfg = test_config(path);
    cfg.encoding = EncodeScheme::Ordinal;
    let output = pipeline::run(&cfg).unwrap();

    // Ordinal encoding: one column per input field (3 categoricals + 3
    // numerics).
    assert_eq!(output.matrix.columns.len(), 6);
    assert_eq!(output.report.importances.len(), 6);
}

#[test]
fn test_missing_input_fails() {
    let cfg = test_config("/definitely/not/here.csv");
    assert!(pipeline::run(&cfg).is_err());
}

#[test]
fn test_missing_target_column_fails() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "customerID,tenure,MonthlyCharges,TotalCharges").unwrap();
    writeln!(file, "0001,2,85.0,170.0").unwrap();
    writeln!(file, "0002,60,55.0,3300.0").unwrap();

    let cfg = test_config(file.path().to_str().unwrap());
    assert!(pipeline::run(&cfg).is_err());
}
