//! Chart rendering with Plotters
//!
//! Every function here consumes numeric summaries only (curve points,
//! ranked importances, raw column values, a correlation matrix), so the
//! pipeline itself stays free of rendering concerns.

use plotters::prelude::*;

use crate::metrics::FeatureImportance;

const POSITIVE_COLOR: RGBColor = RED;
const NEGATIVE_COLOR: RGBColor = BLUE;

/// Plot the ROC curve with its AUC in the caption.
pub fn plot_roc_curve(points: &[(f64, f64)], auc: f64, output_path: &str) -> anyhow::Result<()> {
    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("ROC Curve (AUC = {auc:.3})"), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..1.0, 0.0..1.0)?;

    chart
        .configure_mesh()
        .x_desc("False Positive Rate")
        .y_desc("True Positive Rate")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    // Chance diagonal for reference
    chart.draw_series(LineSeries::new([(0.0, 0.0), (1.0, 1.0)], &BLACK.mix(0.3)))?;
    chart.draw_series(LineSeries::new(points.iter().copied(), &NEGATIVE_COLOR))?;

    root.present()?;
    Ok(())
}

/// Horizontal bars for the top-ranked features.
pub fn plot_importances(
    importances: &[FeatureImportance],
    top_n: usize,
    output_path: &str,
) -> anyhow::Result<()> {
    let shown = &importances[..importances.len().min(top_n)];
    let max_value = shown
        .iter()
        .map(|f| f.value)
        .fold(0.0f64, f64::max)
        .max(1e-12);

    let root = BitMapBackend::new(output_path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Importance", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(220)
        .build_cartesian_2d(0.0..max_value * 1.1, 0i32..shown.len() as i32)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("Importance")
        .y_labels(shown.len())
        .y_label_formatter(&|&index| {
            shown
                .get(index as usize)
                .map(|f| f.name.clone())
                .unwrap_or_default()
        })
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (rank, feature) in shown.iter().enumerate() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, rank as i32), (feature.value, rank as i32 + 1)],
            NEGATIVE_COLOR.mix(0.6).filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Histogram of one numeric field.
pub fn plot_histogram(values: &[f64], field: &str, output_path: &str) -> anyhow::Result<()> {
    if values.is_empty() {
        anyhow::bail!("no values to plot for '{field}'");
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // Degenerate single-value columns still get a visible bucket.
    let (min, max) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };

    let bins = 20usize;
    let width = (max - min) / bins as f64;
    let mut counts = vec![0i32; bins];
    for &v in values {
        let bin = (((v - min) / width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let tallest = *counts.iter().max().unwrap_or(&1);

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Distribution of {field}"), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(min..max, 0i32..tallest + 1)?;

    chart
        .configure_mesh()
        .x_desc(field)
        .y_desc("Customers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (bin, &count) in counts.iter().enumerate() {
        let lo = min + bin as f64 * width;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(lo, 0), (lo + width, count)],
            NEGATIVE_COLOR.mix(0.5).filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Scatter of tenure against total charges, colored by churn label.
pub fn plot_churn_scatter(
    tenure: &[f64],
    total_charges: &[f64],
    labels: &[usize],
    output_path: &str,
) -> anyhow::Result<()> {
    let x_max = tenure.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 1.0;
    let y_max = total_charges.iter().copied().fold(f64::NEG_INFINITY, f64::max) * 1.05;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Tenure vs Total Charges by Churn", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..x_max, 0.0..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Tenure (months)")
        .y_desc("Total Charges")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (label_value, color, name) in [
        (0usize, NEGATIVE_COLOR, "Retained"),
        (1usize, POSITIVE_COLOR, "Churned"),
    ] {
        chart
            .draw_series(
                tenure
                    .iter()
                    .zip(total_charges.iter())
                    .zip(labels.iter())
                    .filter(|&(_, &y)| y == label_value)
                    .map(|((&t, &c), _)| Circle::new((t, c), 3, color.filled())),
            )?
            .label(name)
            .legend(move |(x, y)| Circle::new((x, y), 3, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Churn rate per category for one categorical field.
pub fn plot_category_churn(
    rates: &[(String, f64, usize)],
    field: &str,
    output_path: &str,
) -> anyhow::Result<()> {
    if rates.is_empty() {
        anyhow::bail!("no categories to plot for '{field}'");
    }

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("Churn Rate by {field}"), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0i32..rates.len() as i32, 0.0..1.0)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(rates.len())
        .x_label_formatter(&|&index| {
            rates
                .get(index as usize)
                .map(|(name, _, _)| name.clone())
                .unwrap_or_default()
        })
        .y_desc("Churn Rate")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (index, (_, rate, _)) in rates.iter().enumerate() {
        chart.draw_series(std::iter::once(Rectangle::new(
            [(index as i32, 0.0), (index as i32 + 1, *rate)],
            POSITIVE_COLOR.mix(0.6).filled(),
        )))?;
    }

    root.present()?;
    Ok(())
}

/// Correlation heatmap over the encoded feature columns.
pub fn plot_correlation_heatmap(
    correlation: &ndarray::Array2<f64>,
    columns: &[String],
    output_path: &str,
) -> anyhow::Result<()> {
    let n = columns.len() as i32;

    let root = BitMapBackend::new(output_path, (900, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Correlation", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(120)
        .y_label_area_size(160)
        .build_cartesian_2d(0i32..n, 0i32..n)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(columns.len().min(30))
        .y_labels(columns.len().min(30))
        .x_label_formatter(&|&i| columns.get(i as usize).cloned().unwrap_or_default())
        .y_label_formatter(&|&i| columns.get(i as usize).cloned().unwrap_or_default())
        .label_style(("sans-serif", 9))
        .draw()?;

    for row in 0..n {
        for col in 0..n {
            let value = correlation[[row as usize, col as usize]];
            chart.draw_series(std::iter::once(Rectangle::new(
                [(col, row), (col + 1, row + 1)],
                heat_color(value).filled(),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

// Blue for negative correlation, white for none, red for positive.
fn heat_color(value: f64) -> RGBColor {
    let v = value.clamp(-1.0, 1.0);
    if v >= 0.0 {
        let t = 1.0 - v;
        RGBColor(255, (255.0 * t) as u8, (255.0 * t) as u8)
    } else {
        let t = 1.0 + v;
        RGBColor((255.0 * t) as u8, (255.0 * t) as u8, 255)
    }
}
