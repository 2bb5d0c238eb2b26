use crate::config::AppConfig;
use crate::summary::SummaryRow;
use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::fs;
use tracing::info;

const CHART_WIDTH: u32 = 1024;
const CHART_HEIGHT: u32 = 640;

/// Render the static "fires per year" trend chart consumed by the dashboard.
///
/// Only year-labelled groups are charted; the null-year group has no place
/// on a year axis.
pub fn render_trend(config: &AppConfig, rows: &[SummaryRow]) -> Result<()> {
    let labelled: Vec<(i32, u32)> = rows
        .iter()
        .filter_map(|row| row.year.map(|year| (year, row.total_fires as u32)))
        .collect();
    if labelled.is_empty() {
        return Err(anyhow!("no year-labelled records to chart"));
    }

    if let Some(parent) = config.trend.output.parent() {
        fs::create_dir_all(parent).context("Failed to create trend output directory")?;
    }

    let min_year = labelled.iter().map(|(year, _)| *year).min().unwrap_or(0);
    let max_year = labelled.iter().map(|(year, _)| *year).max().unwrap_or(0);
    let max_count = labelled.iter().map(|(_, count)| *count).max().unwrap_or(1);

    let root = BitMapBackend::new(&config.trend.output, (CHART_WIDTH, CHART_HEIGHT))
        .into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Wildfires per Year", ("sans-serif", 32))
        .margin(24)
        .x_label_area_size(48)
        .y_label_area_size(64)
        .build_cartesian_2d(
            (min_year..max_year).into_segmented(),
            0u32..max_count + max_count / 5 + 1,
        )
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Year")
        .y_desc("Fires")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(RED.mix(0.7).filled())
                .margin(8)
                .data(labelled.iter().copied()),
        )
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    info!("trend chart written to {:?}", config.trend.output);
    Ok(())
}

fn chart_err<E: std::fmt::Debug>(e: E) -> anyhow::Error {
    anyhow!("chart rendering failed: {:?}", e)
}
