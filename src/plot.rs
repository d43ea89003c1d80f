//! Grouped bar chart of sensitivity and specificity per variant file

use crate::{MetricsError, MetricsResult, MetricsRow};
use anyhow::Result;
use plotters::prelude::*;
use plotters::style::FontTransform;
use std::path::Path;

pub const COLOR_POWDER_BLUE: RGBColor = RGBColor(176, 224, 230); // #b0e0e6
pub const COLOR_SKY_BLUE: RGBColor = RGBColor(135, 206, 250); // #87cefa
pub const COLOR_STEEL_BLUE: RGBColor = RGBColor(70, 130, 180); // #4682b4
pub const COLOR_MEDIUM_BLUE: RGBColor = RGBColor(0, 0, 205); // #0000cd

/// Share of each x slot covered by its group of bars
const GROUP_WIDTH: f64 = 0.8;

/// Output format for plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlotFormat::Png => "png",
            PlotFormat::Svg => "svg",
        }
    }

    /// SVG for `.svg` paths, PNG otherwise
    pub fn from_path(path: &Path) -> Self {
        if crate::utils::has_extension(path, "svg") {
            PlotFormat::Svg
        } else {
            PlotFormat::Png
        }
    }
}

/// Configuration for plot generation.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub format: PlotFormat,
    pub title: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1500,
            height: 1000,
            format: PlotFormat::Png,
            title: "Specificity/Sensitivity Analysis".to_string(),
        }
    }
}

/// One coloured bar per file
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub label: &'static str,
    pub color: RGBColor,
    pub values: Vec<f64>,
}

/// Bar series for the chart, with the germline-filtered pair when given
pub fn bar_series(
    rows: &[MetricsRow],
    filtered_rows: Option<&[MetricsRow]>,
) -> MetricsResult<Vec<BarSeries>> {
    let mut series = vec![
        BarSeries {
            label: "Sensitivity",
            color: COLOR_POWDER_BLUE,
            values: rows.iter().map(|r| r.sensitivity).collect(),
        },
        BarSeries {
            label: "Specificity",
            color: COLOR_SKY_BLUE,
            values: rows.iter().map(|r| r.specificity).collect(),
        },
    ];

    if let Some(filtered) = filtered_rows {
        if filtered.len() != rows.len() {
            return Err(MetricsError::Plot(format!(
                "{} germline-filtered rows for {} unfiltered rows",
                filtered.len(),
                rows.len()
            )));
        }
        series.push(BarSeries {
            label: "Germline-filtering Sensitivity",
            color: COLOR_STEEL_BLUE,
            values: filtered.iter().map(|r| r.sensitivity).collect(),
        });
        series.push(BarSeries {
            label: "Germline-filtering Specificity",
            color: COLOR_MEDIUM_BLUE,
            values: filtered.iter().map(|r| r.specificity).collect(),
        });
    }

    Ok(series)
}

/// Left edge and width of bar `series_idx` within the slot of file `file_idx`
pub fn bar_span(file_idx: usize, series_idx: usize, n_series: usize) -> (f64, f64) {
    let width = GROUP_WIDTH / n_series as f64;
    let left = file_idx as f64 - GROUP_WIDTH / 2.0 + series_idx as f64 * width;
    (left, width)
}

/// Top of the y axis: 1.05, raised to fit values above 1
pub fn y_upper_bound(series: &[BarSeries]) -> f64 {
    series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(1.0, f64::max)
        * 1.05
}

/// File name for an x-axis key point, blank between slots
fn slot_label(labels: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

fn draw_metrics<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    labels: &[String],
    series: &[BarSeries],
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let n_files = labels.len();
    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24).into_font().color(&BLACK))
        .margin(15)
        .x_label_area_size(160)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n_files as f64 - 0.5), 0.0..y_upper_bound(series))?;

    let formatter = |x: &f64| slot_label(labels, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_files + 1)
        .x_label_formatter(&formatter)
        .x_label_style(
            ("sans-serif", 12)
                .into_font()
                .transform(FontTransform::Rotate90),
        )
        .y_desc("Metrics")
        .draw()?;

    for (series_idx, s) in series.iter().enumerate() {
        let color = s.color;
        chart
            .draw_series(s.values.iter().enumerate().map(|(file_idx, value)| {
                let (left, width) = bar_span(file_idx, series_idx, series.len());
                Rectangle::new([(left, 0.0), (left + width, *value)], color.filled())
            }))?
            .label(s.label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}

/// Render the sensitivity/specificity chart, optionally beside germline-filtered metrics
pub fn plot_metrics(
    rows: &[MetricsRow],
    filtered_rows: Option<&[MetricsRow]>,
    path: &Path,
    config: &PlotConfig,
) -> MetricsResult<()> {
    if rows.is_empty() {
        return Err(MetricsError::Plot("No data to plot".to_string()));
    }

    let series = bar_series(rows, filtered_rows)?;
    let labels: Vec<String> = rows.iter().map(|r| r.file_name.clone()).collect();
    let size = (config.width, config.height);

    let drawn = match config.format {
        PlotFormat::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_metrics(&root, &labels, &series, &config.title)
                .and_then(|_| root.present().map_err(anyhow::Error::from))
        }
        PlotFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_metrics(&root, &labels, &series, &config.title)
                .and_then(|_| root.present().map_err(anyhow::Error::from))
        }
    };
    drawn.map_err(|e| MetricsError::Plot(e.to_string()))?;

    log::info!("Plot saved to: {} ({})", path.display(), config.format.extension());
    Ok(())
}
