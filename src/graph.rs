#![cfg(feature = "web")]
use plotters::prelude::*;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::City;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: String::new(),
            y_label: "Amount".to_string(),
            width: 640,
            height: 360,
        }
    }
}

/// Revenue per city as a bar chart, returned as SVG markup
///
/// One bar per city, in the map's order. An empty map still renders a
/// chart, captioned "(no data)".
///
/// # Arguments
/// * `totals` - Amount per city, as produced by `report::totals_by_city`
/// * `options` - Title, axis labels and size
///
/// # Returns
/// * `AppResult<String>` - The SVG document
///
/// # Errors
/// * `AppError::Export` if plotting fails
pub fn city_bar_chart(totals: &BTreeMap<City, f64>, options: &ChartOptions) -> AppResult<String> {
    let labels: Vec<String> = totals.keys().map(|c| c.to_string()).collect();
    let values: Vec<f64> = totals.values().copied().collect();
    draw_bars(&labels, &values, options).map_err(|e| AppError::Export(e.to_string()))
}

/// Revenue per month as a line chart, returned as SVG markup
///
/// Months are plotted left to right in key order, so `YYYY-MM` keys come out
/// chronological.
///
/// # Arguments
/// * `totals` - Amount per paid month, as produced by `report::totals_by_month`
/// * `options` - Title, axis labels and size
///
/// # Returns
/// * `AppResult<String>` - The SVG document
///
/// # Errors
/// * `AppError::Export` if plotting fails
pub fn month_line_chart(totals: &BTreeMap<String, f64>, options: &ChartOptions) -> AppResult<String> {
    let labels: Vec<String> = totals.keys().cloned().collect();
    let values: Vec<f64> = totals.values().copied().collect();
    draw_line(&labels, &values, options).map_err(|e| AppError::Export(e.to_string()))
}

fn caption(options: &ChartOptions, empty: bool) -> String {
    if empty {
        format!("{} (no data)", options.title)
    } else {
        options.title.clone()
    }
}

/// Upper bound of the y axis: 10% headroom above the largest value
fn y_top(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(0.0, f64::max);
    if max > 0.0 { max * 1.1 } else { 1.0 }
}

fn draw_bars(
    labels: &[String],
    values: &[f64],
    options: &ChartOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let n = values.len().max(1) as i32;
        let mut chart = ChartBuilder::on(&root)
            .caption(caption(options, values.is_empty()), ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d((0..n).into_segmented(), 0f64..y_top(values))?;

        let label_of = |v: &SegmentValue<i32>| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len().max(1))
            .x_label_formatter(&label_of)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        chart.draw_series(values.iter().enumerate().map(|(i, v)| {
            let x = i as i32;
            Rectangle::new(
                [(SegmentValue::Exact(x), 0.0), (SegmentValue::Exact(x + 1), *v)],
                BLUE.mix(0.8).filled(),
            )
        }))?;

        root.present()?;
    }
    Ok(svg)
}

fn draw_line(
    labels: &[String],
    values: &[f64],
    options: &ChartOptions,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let last = (values.len() as i32 - 1).max(1);
        let mut chart = ChartBuilder::on(&root)
            .caption(caption(options, values.is_empty()), ("sans-serif", 24).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0..last, 0f64..y_top(values))?;

        let label_of = |x: &i32| labels.get(*x as usize).cloned().unwrap_or_default();

        chart
            .configure_mesh()
            .x_labels(labels.len().max(2))
            .x_label_formatter(&label_of)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;

        let points: Vec<(i32, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as i32, *v))
            .collect();

        chart.draw_series(LineSeries::new(points.iter().copied(), &RED))?;
        chart.draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, RED.filled())))?;

        root.present()?;
    }
    Ok(svg)
}
