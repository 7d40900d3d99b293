use std::collections::HashSet;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontStyle;
use plotters_backend::DrawingBackend;
use tracing::debug;

use crate::config::Config;
use crate::error::{draw_err, Result};
use crate::models::{ClusteringResult, Droplet, NEGATIVE_LABEL, UNKNOWN_LABEL};
use crate::visualization::{grid_ticks, hex_color};

const NOISE_COLOR: RGBColor = RGBColor(211, 211, 211);
const RAW_COLOR: RGBColor = RGBColor(128, 128, 128);
const DARK_RED: RGBColor = RGBColor(139, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotMode {
    /// Full-size plot with title and legend, saved into `Graphs/`
    Standalone,
    /// Square plot embedded in the plate overview
    Composite,
}

pub fn plot_title(well: &str, sample_name: Option<&str>) -> String {
    match sample_name {
        Some(name) if !name.is_empty() => format!("Well {well} - {name}"),
        _ => format!("Well {well}"),
    }
}

/// Legend rows for a standalone plot: targets with droplets, in label
/// order, with their copy number. `Unknown` is never listed.
pub fn legend_entries(clustering: &ClusteringResult, config: &Config) -> Vec<(String, String)> {
    config
        .ordered_labels()
        .into_iter()
        .filter(|label| label != UNKNOWN_LABEL)
        .filter(|label| clustering.counts.get(label).copied().unwrap_or(0) > 0)
        .map(|label| {
            let text = if label == NEGATIVE_LABEL {
                label.clone()
            } else {
                match clustering.copy_numbers.get(&label) {
                    Some(cn) => format!("{label} ({cn:.2})"),
                    None => format!("{label} (N/A)"),
                }
            };
            (label, text)
        })
        .collect()
}

/// Mean (HEX, FAM) position of each chromosome cluster that has a copy number
fn chromosome_centroids(clustering: &ClusteringResult) -> Vec<(String, (f64, f64))> {
    let Some(filtered) = &clustering.filtered else {
        return Vec::new();
    };
    clustering
        .copy_numbers
        .keys()
        .filter_map(|chrom| {
            let points: Vec<&Droplet> = filtered
                .iter()
                .filter(|d| &d.label == chrom)
                .map(|d| &d.droplet)
                .collect();
            if points.is_empty() {
                return None;
            }
            let n = points.len() as f64;
            let x = points.iter().map(|d| d.ch2).sum::<f64>() / n;
            let y = points.iter().map(|d| d.ch1).sum::<f64>() / n;
            Some((chrom.clone(), (x, y)))
        })
        .collect()
}

/// Scatter plot of one well: HEX on x, FAM on y, droplets coloured by target.
pub fn create_well_plot(
    droplets: &[Droplet],
    clustering: &ClusteringResult,
    well: &str,
    path: &Path,
    mode: PlotMode,
    sample_name: Option<&str>,
    config: &Config,
) -> Result<()> {
    let composite = mode == PlotMode::Composite;
    let (width, height) = config.plot_dimensions(composite);
    let err = draw_err(path);

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    let (plot_area, legend_area) = if composite {
        (root.clone(), None)
    } else {
        let (plot, legend) = root.split_horizontally(width * 3 / 4);
        (plot, Some(legend))
    };

    let limits = config.axis_limits();
    let (x_step, y_step) = config.grid_intervals();
    let x_ticks = grid_ticks(limits.x.0, limits.x.1, x_step);
    let y_ticks = grid_ticks(limits.y.0, limits.y.1, y_step);
    let (label_font, point_size) = if composite { (12, 2) } else { (14, 2) };

    let mut builder = ChartBuilder::on(&plot_area);
    builder
        .margin(10)
        .x_label_area_size(if composite { 30 } else { 40 })
        .y_label_area_size(if composite { 40 } else { 55 });
    if !composite {
        builder.caption(plot_title(well, sample_name), ("sans-serif", 20));
    }
    let mut chart = builder
        .build_cartesian_2d(limits.x.0..limits.x.1, limits.y.0..limits.y.1)
        .map_err(&err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(x_ticks.len())
        .y_labels(y_ticks.len())
        .x_desc("HEX Amplitude")
        .y_desc("FAM Amplitude")
        .label_style(("sans-serif", label_font))
        .axis_desc_style(("sans-serif", label_font + 2))
        .axis_style(BLACK.stroke_width(1))
        .draw()
        .map_err(&err)?;

    let grid_style = BLACK.mix(0.15).stroke_width(1);
    for &x in &x_ticks {
        chart
            .draw_series(LineSeries::new(vec![(x, limits.y.0), (x, limits.y.1)], grid_style))
            .map_err(&err)?;
    }
    for &y in &y_ticks {
        chart
            .draw_series(LineSeries::new(vec![(limits.x.0, y), (limits.x.1, y)], grid_style))
            .map_err(&err)?;
    }

    if clustering.is_empty() {
        debug!("No clusters for well {}, drawing raw droplets", well);
        chart
            .draw_series(
                droplets
                    .iter()
                    .map(|d| Circle::new((d.ch2, d.ch1), point_size, RAW_COLOR.mix(0.5).filled())),
            )
            .map_err(&err)?;
    } else {
        let filtered = clustering.filtered.as_deref().unwrap_or_default();
        let kept: HashSet<usize> = filtered.iter().map(|d| d.droplet.index).collect();
        chart
            .draw_series(
                droplets
                    .iter()
                    .filter(|d| !kept.contains(&d.index))
                    .map(|d| Circle::new((d.ch2, d.ch1), 1, NOISE_COLOR.mix(0.3).filled())),
            )
            .map_err(&err)?;

        chart
            .draw_series(filtered.iter().map(|d| {
                let color = hex_color(config.target_color(&d.label));
                Circle::new((d.droplet.ch2, d.droplet.ch1), point_size, color.mix(0.6).filled())
            }))
            .map_err(&err)?;
    }

    if composite {
        for (chrom, (x, y)) in chromosome_centroids(clustering) {
            let cn = clustering.copy_numbers[&chrom];
            let flagged =
                clustering.has_aneuploidy && (cn - 1.0).abs() > config.aneuploidy_deviation_threshold;
            let color = if flagged { DARK_RED } else { BLACK };
            let weight = if flagged { FontStyle::Bold } else { FontStyle::Normal };
            let style = ("sans-serif", 13, weight)
                .into_font()
                .color(&color)
                .pos(Pos::new(HPos::Center, VPos::Center));
            chart
                .draw_series(std::iter::once(Text::new(format!("{cn:.2}"), (x, y), style)))
                .map_err(&err)?;
        }
    }

    if let Some(legend_area) = legend_area {
        draw_legend(&legend_area, &legend_entries(clustering, config), config).map_err(&err)?;
    }

    root.present().map_err(&err)?;
    debug!("Saved well plot {}", path.display());
    Ok(())
}

fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entries: &[(String, String)],
    config: &Config,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    if entries.is_empty() {
        return Ok(());
    }
    area.draw(&Text::new(
        "Target (copy number)",
        (10, 40),
        ("sans-serif", 15, FontStyle::Bold).into_font().color(&BLACK),
    ))?;
    for (i, (label, text)) in entries.iter().enumerate() {
        let y = 70 + i as i32 * 24;
        let color = hex_color(config.target_color(label));
        area.draw(&Circle::new((18, y), 5, color.filled()))?;
        area.draw(&Text::new(
            text.clone(),
            (30, y),
            ("sans-serif", 14)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Left, VPos::Center)),
        ))?;
    }
    Ok(())
}

/// Blank figure carrying an error message, used in place of a well plot.
pub fn create_error_plot(message: &str, path: &Path, config: &Config) -> Result<()> {
    let (width, height) = config.plot_dimensions(false);
    let err = draw_err(path);

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;
    root.draw(&Text::new(
        format!("Error: {message}"),
        ((width / 2) as i32, (height / 2) as i32),
        ("sans-serif", 18)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center)),
    ))
    .map_err(&err)?;
    root.present().map_err(&err)?;
    Ok(())
}
