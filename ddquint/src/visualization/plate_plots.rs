//! The 96-well overview image.
//!
//! Every well with a result gets a small composite-mode scatter plot,
//! rendered to `Graphs/<well>_temp.png` from the stored clustering output
//! (clustering is never re-run here) and pasted into its grid cell.
//! Wells without a result get an empty placeholder. Temp images are
//! removed and `temp_graph_path` cleared on every exit path.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use plotters::coord::Shift;
use plotters::element::BitMapElement;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontStyle;
use plotters_backend::DrawingBackend;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::data_handling::droplet_csv::load_droplets;
use crate::error::{draw_err, DdQuintError, Result};
use crate::helper_functions::ensure_directory;
use crate::models::WellResult;
use crate::visualization::well_plots::{create_well_plot, PlotMode};
use crate::visualization::{grid_ticks, hex_color};

/// Outer margin of the figure as a fraction of its size
const MARGIN_FRACTION: f64 = 0.04;
/// Gap between cells as a fraction of the cell size
const GAP_FRACTION: f64 = 0.02;
/// Row and column labels sit this far in from the figure edge
const LABEL_FRACTION: f64 = 0.02;

/// Wells between progress lines while rendering temp plots
const PROGRESS_EVERY: usize = 10;

const EMPTY_BACKGROUND: RGBColor = RGBColor(0xf5, 0xf5, 0xf5);
const EMPTY_TEXT: RGBColor = RGBColor(128, 128, 128);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderStyle {
    pub color: &'static str,
    pub width: u32,
}

pub const BUFFER_ZONE_BORDER: BorderStyle = BorderStyle { color: "#000000", width: 1 };
pub const ANEUPLOIDY_BORDER: BorderStyle = BorderStyle { color: "#E6B8E6", width: 3 };
pub const EUPLOID_BORDER: BorderStyle = BorderStyle { color: "#B0B0B0", width: 1 };
pub const EMPTY_BORDER: BorderStyle = BorderStyle { color: "#cccccc", width: 1 };

/// Border for a well with data. A buffer zone outranks aneuploidy.
pub fn border_style(result: &WellResult) -> BorderStyle {
    if result.has_buffer_zone() {
        BUFFER_ZONE_BORDER
    } else if result.has_aneuploidy() {
        ANEUPLOIDY_BORDER
    } else {
        EUPLOID_BORDER
    }
}

/// Pixel layout of the plate figure.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateGeometry {
    pub width: u32,
    pub height: u32,
    pub rows: usize,
    pub cols: usize,
    left: f64,
    top: f64,
    cell_w: f64,
    cell_h: f64,
    gap_w: f64,
    gap_h: f64,
}

impl PlateGeometry {
    pub fn new(width: u32, height: u32, rows: usize, cols: usize) -> Self {
        let (w, h) = (width as f64, height as f64);
        let span = |n: usize| n.max(1) as f64 + n.saturating_sub(1) as f64 * GAP_FRACTION;
        let cell_w = w * (1.0 - 2.0 * MARGIN_FRACTION) / span(cols);
        let cell_h = h * (1.0 - 2.0 * MARGIN_FRACTION) / span(rows);
        Self {
            width,
            height,
            rows,
            cols,
            left: w * MARGIN_FRACTION,
            top: h * MARGIN_FRACTION,
            cell_w,
            cell_h,
            gap_w: cell_w * GAP_FRACTION,
            gap_h: cell_h * GAP_FRACTION,
        }
    }

    /// Upper-left corner and size of the cell at `(row, col)`
    pub fn cell_rect(&self, row: usize, col: usize) -> ((i32, i32), (u32, u32)) {
        let x = self.left + col as f64 * (self.cell_w + self.gap_w);
        let y = self.top + row as f64 * (self.cell_h + self.gap_h);
        (
            (x.round() as i32, y.round() as i32),
            (self.cell_w.floor().max(1.0) as u32, self.cell_h.floor().max(1.0) as u32),
        )
    }

    /// Centre of a row label in the left margin
    pub fn row_label_position(&self, row: usize) -> (i32, i32) {
        let y = self.top + row as f64 * (self.cell_h + self.gap_h) + self.cell_h / 2.0;
        ((self.width as f64 * LABEL_FRACTION).round() as i32, y.round() as i32)
    }

    /// Centre of a column label in the top margin
    pub fn col_label_position(&self, col: usize) -> (i32, i32) {
        let x = self.left + col as f64 * (self.cell_w + self.gap_w) + self.cell_w / 2.0;
        (x.round() as i32, (self.height as f64 * LABEL_FRACTION).round() as i32)
    }
}

/// What goes into one grid cell
#[derive(Debug, Clone)]
pub enum Cell {
    Image { image: DynamicImage, title: String, border: BorderStyle },
    /// The well has a result but its image could not be decoded
    ImageError,
    /// The well has a result but no image on disk
    NoImage,
    Empty { well: String },
}

/// Decide the content of a cell, loading the well image when there is one.
/// The temp composite plot is preferred over the stored standalone graph.
pub fn prepare_cell(well: &str, result: Option<&WellResult>) -> Cell {
    let Some(result) = result else {
        return Cell::Empty { well: well.to_string() };
    };
    let path = result
        .temp_graph_path
        .as_deref()
        .filter(|p| p.exists())
        .or_else(|| Some(result.graph_path.as_path()).filter(|p| p.exists()));
    let Some(path) = path else {
        return Cell::NoImage;
    };

    match image::open(path) {
        Ok(image) => Cell::Image {
            image,
            title: result.display_name().to_string(),
            border: border_style(result),
        },
        Err(e) => {
            debug!("Error displaying image for well {}: {}", well, e);
            Cell::ImageError
        }
    }
}

/// Pixel offsets of the placeholder grid lines inside a `width` × `height` cell
pub fn placeholder_grid(width: u32, height: u32, config: &Config) -> (Vec<i32>, Vec<i32>) {
    let limits = config.axis_limits();
    let (x_step, y_step) = config.grid_intervals();
    let scale = |v: f64, (lo, hi): (f64, f64), px: u32| -> i32 {
        if hi <= lo {
            return 0;
        }
        ((v - lo) / (hi - lo) * (px.saturating_sub(1)) as f64).round() as i32
    };
    let xs = grid_ticks(limits.x.0, limits.x.1, x_step)
        .into_iter()
        .map(|x| scale(x, limits.x, width))
        .collect();
    // y grows downwards on screen
    let ys = grid_ticks(limits.y.0, limits.y.1, y_step)
        .into_iter()
        .map(|y| height.saturating_sub(1) as i32 - scale(y, limits.y, height))
        .collect();
    (xs, ys)
}

fn pt_to_px(points: f64, dpi: u32) -> f64 {
    points * dpi as f64 / 72.0
}

/// `<graph dir>/../<raw data dir>/<file name>`
pub fn raw_data_path(result: &WellResult, config: &Config) -> Option<PathBuf> {
    let graphs_dir = result.graph_path.parent()?;
    Some(
        graphs_dir
            .join("..")
            .join(&config.raw_data_dir_name)
            .join(&result.filename),
    )
}

fn draw_border<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    (x0, y0): (i32, i32),
    (w, h): (u32, u32),
    border: BorderStyle,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let color = hex_color(border.color);
    let (x1, y1) = (x0 + w as i32 - 1, y0 + h as i32 - 1);
    // inset so thick borders stay inside the cell
    for i in 0..border.width as i32 {
        area.draw(&Rectangle::new([(x0 + i, y0 + i), (x1 - i, y1 - i)], color.stroke_width(1)))?;
    }
    Ok(())
}

/// Largest size with the image's aspect ratio that fits the box, and the
/// offset that centres it there.
fn fit_within((iw, ih): (u32, u32), (bw, bh): (u32, u32)) -> ((i32, i32), (u32, u32)) {
    if iw == 0 || ih == 0 {
        return ((0, 0), (bw.max(1), bh.max(1)));
    }
    let scale = (bw as f64 / iw as f64).min(bh as f64 / ih as f64);
    let w = ((iw as f64 * scale).round() as u32).clamp(1, bw.max(1));
    let h = ((ih as f64 * scale).round() as u32).clamp(1, bh.max(1));
    (((bw.saturating_sub(w) / 2) as i32, (bh.saturating_sub(h) / 2) as i32), (w, h))
}

fn draw_cell<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    cell: Cell,
    config: &Config,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let (w, h) = area.dim_in_pixel();
    let dpi = config.composite_dpi;
    let center = ((w / 2) as i32, (h / 2) as i32);
    let centred = Pos::new(HPos::Center, VPos::Center);

    match cell {
        Cell::Image { image, title, border } => {
            let title_px = pt_to_px(6.0, dpi);
            let strip = (title_px * 1.4).round() as u32;
            let image_h = h.saturating_sub(strip).max(1);
            area.draw(&Text::new(
                title,
                ((w / 2) as i32, (strip / 2) as i32),
                ("sans-serif", title_px).into_font().color(&BLACK).pos(centred),
            ))?;

            let ((dx, dy), fitted) = fit_within(image.dimensions(), (w, image_h));
            let resized = image.resize(fitted.0, fitted.1, FilterType::Triangle);
            let origin = (dx, strip as i32 + dy);
            let element: BitMapElement<_> = (origin, resized).into();
            area.draw(&element)?;
            draw_border(area, origin, fitted, border)?;
        }
        Cell::ImageError => {
            area.fill(&EMPTY_BACKGROUND)?;
            area.draw(&Text::new(
                "Image Error",
                center,
                ("sans-serif", pt_to_px(8.0, dpi)).into_font().color(&RED).pos(centred),
            ))?;
        }
        Cell::NoImage => {
            area.fill(&EMPTY_BACKGROUND)?;
            area.draw(&Text::new(
                "No Image",
                center,
                ("sans-serif", pt_to_px(8.0, dpi)).into_font().color(&BLACK).pos(centred),
            ))?;
        }
        Cell::Empty { well } => {
            area.fill(&EMPTY_BACKGROUND)?;
            let grid = BLACK.mix(0.1).stroke_width(1);
            let (xs, ys) = placeholder_grid(w, h, config);
            for x in xs {
                area.draw(&PathElement::new(vec![(x, 0), (x, h as i32 - 1)], grid))?;
            }
            for y in ys {
                area.draw(&PathElement::new(vec![(0, y), (w as i32 - 1, y)], grid))?;
            }
            area.draw(&Text::new(
                well,
                center,
                ("sans-serif", pt_to_px(8.0, dpi)).into_font().color(&EMPTY_TEXT).pos(centred),
            ))?;
            draw_border(area, (0, 0), (w, h), EMPTY_BORDER)?;
        }
    }
    Ok(())
}

/// Render composite-mode temp plots for every well whose raw data and
/// clustering output are available. Wells that fail are skipped.
fn generate_well_images(
    results: &mut [WellResult],
    output_path: &Path,
    config: &Config,
    temp_files: &mut Vec<PathBuf>,
) -> Result<()> {
    let output_dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    let graphs_dir = output_dir.join(&config.graphs_dir_name);
    ensure_directory(&graphs_dir)?;

    let total = results.len();
    for (i, result) in results.iter_mut().enumerate() {
        if result.well.is_empty() {
            continue;
        }
        debug!("Creating Plate image: well {} ({}/{})", result.well, i + 1, total);
        if (i + 1) % PROGRESS_EVERY == 0 || i + 1 == total {
            info!("Rendering plate image: {}/{} wells", i + 1, total);
        }

        let Some(data_path) = raw_data_path(result, config).filter(|p| p.exists()) else {
            debug!("Raw data file not found for well {}", result.well);
            continue;
        };
        let droplets = match load_droplets(&data_path) {
            Ok(droplets) => droplets,
            Err(e) => {
                debug!("Error loading data file {}: {}", data_path.display(), e);
                continue;
            }
        };
        if result.clustering.filtered.is_none() || result.clustering.target_mapping.is_none() {
            debug!("Missing clustering data for well {}", result.well);
            continue;
        }

        let temp_path = graphs_dir.join(format!("{}_temp.png", result.well));
        let outcome = create_well_plot(
            &droplets,
            &result.clustering,
            &result.well,
            &temp_path,
            PlotMode::Composite,
            None,
            config,
        );
        if temp_path.exists() {
            temp_files.push(temp_path.clone());
        }
        match outcome {
            Ok(()) => result.temp_graph_path = Some(temp_path),
            Err(e) => debug!("Error creating temp plot for well {}: {}", result.well, e),
        }
    }
    info!("Rendered {} well images for the plate overview", temp_files.len());
    Ok(())
}

fn draw_composite(results: &[WellResult], output_path: &Path, config: &Config) -> Result<()> {
    let (width, height) = config.composite_dimensions();
    debug!("Creating composite figure of {}x{} px", width, height);
    let err = draw_err(output_path);

    let cols = config.plate_col_numbers();
    let geometry = PlateGeometry::new(width, height, config.plate_rows.len(), cols.len());
    let by_well: HashMap<&str, &WellResult> = results
        .iter()
        .filter(|r| !r.well.is_empty())
        .map(|r| (r.well.as_str(), r))
        .collect();

    let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    for (i, row) in config.plate_rows.iter().enumerate() {
        for (j, &col) in cols.iter().enumerate() {
            let well = config.format_well(row, col);
            let cell = prepare_cell(&well, by_well.get(well.as_str()).copied());
            let (origin, size) = geometry.cell_rect(i, j);
            let area = root.clone().shrink(origin, size);
            draw_cell(&area, cell, config).map_err(&err)?;
        }
    }

    let label_style = ("sans-serif", pt_to_px(12.0, config.composite_dpi), FontStyle::Bold)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    for (i, row) in config.plate_rows.iter().enumerate() {
        root.draw(&Text::new(row.as_str(), geometry.row_label_position(i), label_style.clone()))
            .map_err(&err)?;
    }
    for (j, col) in config.plate_cols.iter().enumerate().take(cols.len()) {
        root.draw(&Text::new(col.as_str(), geometry.col_label_position(j), label_style.clone()))
            .map_err(&err)?;
    }

    root.present().map_err(&err)?;
    Ok(())
}

fn cleanup_temp_files(temp_files: &[PathBuf], results: &mut [WellResult]) {
    for temp in temp_files {
        if temp.exists() {
            match fs::remove_file(temp) {
                Ok(()) => debug!("Removed temporary file: {}", temp.display()),
                Err(e) => debug!("Error deleting temporary file {}: {}", temp.display(), e),
            }
        }
    }
    for result in results.iter_mut() {
        result.temp_graph_path = None;
    }
}

/// Build the plate overview image at `output_path` from processed wells.
///
/// Returns an error when `results` is empty or the figure cannot be drawn.
/// Per-well problems only degrade that well's cell.
pub fn create_composite_image(
    results: &mut [WellResult],
    output_path: &Path,
    config: &Config,
) -> Result<PathBuf> {
    if results.is_empty() {
        error!("No results provided for composite image creation");
        return Err(DdQuintError::visualization(
            "No results provided for composite image creation",
            output_path,
        ));
    }
    debug!("Creating composite image for {} wells at {}", results.len(), output_path.display());

    let mut temp_files = Vec::new();
    let outcome = generate_well_images(results, output_path, config, &mut temp_files)
        .and_then(|()| draw_composite(results, output_path, config));
    cleanup_temp_files(&temp_files, results);

    match outcome {
        Ok(()) => {
            debug!("Composite image saved to: {}", output_path.display());
            Ok(output_path.to_path_buf())
        }
        Err(e) => {
            let message = match e {
                DdQuintError::Visualization { message, .. } => message,
                other => other.to_string(),
            };
            let e = DdQuintError::visualization(format!("Error creating composite image: {message}"), output_path);
            error!("{}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::clustering::analyze_droplets;
    use crate::analysis::clustering::tests::synthetic_droplets;
    use crate::models::ClusteringResult;

    fn result(well: &str, graph_path: PathBuf) -> WellResult {
        WellResult {
            well: well.into(),
            filename: format!("{well}.csv"),
            sample_name: None,
            graph_path,
            clustering: ClusteringResult::default(),
            error: None,
            temp_graph_path: None,
        }
    }

    #[test]
    fn buffer_zone_border_outranks_aneuploidy() {
        let mut r = result("A01", PathBuf::from("A01.png"));
        assert_eq!(border_style(&r), EUPLOID_BORDER);

        r.clustering.has_aneuploidy = true;
        assert_eq!(border_style(&r), BorderStyle { color: "#E6B8E6", width: 3 });

        r.clustering.has_buffer_zone = true;
        assert_eq!(border_style(&r), BorderStyle { color: "#000000", width: 1 });

        r.clustering.has_aneuploidy = false;
        assert_eq!(border_style(&r), BUFFER_ZONE_BORDER);
        assert_eq!(EUPLOID_BORDER, BorderStyle { color: "#B0B0B0", width: 1 });
    }

    #[test]
    fn cells_fall_back_to_placeholders() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(prepare_cell("C03", None), Cell::Empty { well } if well == "C03"));

        let missing = result("A01", dir.path().join("A01.png"));
        assert!(matches!(prepare_cell("A01", Some(&missing)), Cell::NoImage));

        let garbage = dir.path().join("B01.png");
        fs::write(&garbage, b"not a png").unwrap();
        let broken = result("B01", garbage);
        assert!(matches!(prepare_cell("B01", Some(&broken)), Cell::ImageError));

        let good = dir.path().join("D01.png");
        image::RgbImage::new(4, 4).save(&good).unwrap();
        let mut ok = result("D01", dir.path().join("gone.png"));
        ok.temp_graph_path = Some(good);
        ok.sample_name = Some("Patient 3".into());
        ok.clustering.has_aneuploidy = true;
        match prepare_cell("D01", Some(&ok)) {
            Cell::Image { title, border, .. } => {
                assert_eq!(title, "Patient 3");
                assert_eq!(border, ANEUPLOIDY_BORDER);
            }
            other => panic!("expected image cell, got {other:?}"),
        }
    }

    #[test]
    fn labels_centre_on_rows_and_columns() {
        let g = PlateGeometry::new(3200, 2200, 8, 12);

        for row in 0..8 {
            let ((_, y), (_, h)) = g.cell_rect(row, 0);
            let (lx, ly) = g.row_label_position(row);
            assert_eq!(lx, 64);
            assert!((ly - (y + h as i32 / 2)).abs() <= 1);
        }
        for col in 0..12 {
            let ((x, _), (w, _)) = g.cell_rect(0, col);
            let (lx, ly) = g.col_label_position(col);
            assert_eq!(ly, 44);
            assert!((lx - (x + w as i32 / 2)).abs() <= 1);
        }

        // cells stay inside the figure and do not overlap
        let ((x0, _), (w0, _)) = g.cell_rect(0, 0);
        let ((x1, _), _) = g.cell_rect(0, 1);
        assert!(x0 + w0 as i32 <= x1);
        let ((xl, yl), (wl, hl)) = g.cell_rect(7, 11);
        assert!(xl + wl as i32 <= 3200);
        assert!(yl + hl as i32 <= 2200);
        assert!(g.row_label_position(0).0 < x0);
    }

    #[test]
    fn placeholder_grid_matches_intervals() {
        let config = Config::default();
        let (xs, ys) = placeholder_grid(301, 201, &config);
        assert_eq!(xs, vec![0, 50, 100, 150, 200, 250, 300]);
        assert_eq!(ys, vec![200, 160, 120, 80, 40, 0]);
    }

    #[test]
    fn raw_data_lives_beside_graphs() {
        let config = Config::default();
        let r = result("A01", PathBuf::from("/out/Graphs/A01.png"));
        assert_eq!(
            raw_data_path(&r, &config).unwrap(),
            PathBuf::from("/out/Graphs/../Raw Data/A01.csv")
        );
    }

    #[test]
    fn empty_results_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_composite_image(&mut [], &dir.path().join("x.png"), &Config::default()).unwrap_err();
        assert!(matches!(err, DdQuintError::Visualization { .. }));
    }

    #[test]
    fn images_keep_aspect_ratio_in_cells() {
        assert_eq!(fit_within((100, 100), (200, 100)), ((50, 0), (100, 100)));
        assert_eq!(fit_within((400, 200), (100, 100)), ((0, 25), (100, 50)));
        assert_eq!(fit_within((300, 200), (300, 200)), ((0, 0), (300, 200)));
    }

    /// Two wells with raw data and clustering output, one without
    fn plate_fixture(out: &Path, config: &Config) -> Vec<WellResult> {
        let graphs = out.join("Graphs");
        let raw = out.join("Raw Data");
        fs::create_dir_all(&graphs).unwrap();
        fs::create_dir_all(&raw).unwrap();

        let droplets = synthetic_droplets(
            config,
            &[("Negative", 120), ("Chrom1", 120), ("Chrom2", 120)],
            3,
        );
        let mut csv = String::from("Ch1Amplitude,Ch2Amplitude\n");
        for d in &droplets {
            csv.push_str(&format!("{},{}\n", d.ch1, d.ch2));
        }

        let mut results = Vec::new();
        for well in ["A01", "B02"] {
            fs::write(raw.join(format!("{well}.csv")), &csv).unwrap();
            let mut r = result(well, graphs.join(format!("{well}.png")));
            r.clustering = analyze_droplets(&droplets, config, Some(well)).unwrap();
            results.push(r);
        }
        // no raw data: skipped, never gets a temp image
        results.push(result("C03", graphs.join("C03.png")));
        results
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.composite_dpi = 20;
        config.composite_plot_dpi = 20;
        config
    }

    fn temp_leftovers(graphs: &Path) -> Vec<PathBuf> {
        fs::read_dir(graphs)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with("_temp.png"))
            .collect()
    }

    #[test]
    fn temp_images_exist_until_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config();
        let mut results = plate_fixture(dir.path(), &config);

        let mut temp_files = Vec::new();
        generate_well_images(&mut results, &dir.path().join("Graph_Overview.png"), &config, &mut temp_files)
            .unwrap();
        let graphs = dir.path().join("Graphs");
        assert_eq!(temp_files, vec![graphs.join("A01_temp.png"), graphs.join("B02_temp.png")]);
        assert!(temp_files.iter().all(|p| p.exists()));
        assert_eq!(results[0].temp_graph_path.as_deref(), Some(graphs.join("A01_temp.png").as_path()));
        assert!(results[2].temp_graph_path.is_none());

        cleanup_temp_files(&temp_files, &mut results);
        assert!(temp_leftovers(&graphs).is_empty());
        assert!(results.iter().all(|r| r.temp_graph_path.is_none()));
    }

    #[test]
    fn composite_is_written_and_temp_images_removed() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config();
        let mut results = plate_fixture(dir.path(), &config);
        let out = dir.path().join("Graph_Overview.png");

        let written = create_composite_image(&mut results, &out, &config).unwrap();
        assert_eq!(written, out);
        let (w, h) = config.composite_dimensions();
        assert_eq!(image::open(&out).unwrap().dimensions(), (w, h));

        assert!(temp_leftovers(&dir.path().join("Graphs")).is_empty());
        assert!(results.iter().all(|r| r.temp_graph_path.is_none()));
    }

    #[test]
    fn failed_composite_still_removes_temp_images() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config();
        let mut results = plate_fixture(dir.path(), &config);
        // a directory where the PNG should go makes the final save fail
        let out = dir.path().join("Graph_Overview.png");
        fs::create_dir(&out).unwrap();

        let err = create_composite_image(&mut results, &out, &config).unwrap_err();
        match &err {
            DdQuintError::Visualization { message, .. } => {
                assert!(message.starts_with("Error creating composite image"));
            }
            other => panic!("expected visualization error, got {other:?}"),
        }
        assert_eq!(err.to_string().matches("(output_path:").count(), 1);

        assert!(temp_leftovers(&dir.path().join("Graphs")).is_empty());
        assert!(results.iter().all(|r| r.temp_graph_path.is_none()));
    }
}
