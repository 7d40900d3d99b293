//! Pipeline configuration.
//!
//! Every tunable of the pipeline lives on [`Config`]. Defaults are compiled in;
//! a JSON file can override any subset of keys. Keys use the upper-case names
//! of the settings (`EXPECTED_CENTROIDS`, `X_AXIS_MAX`, ...), keys starting with
//! `#` are treated as comments and unknown keys are ignored.

pub mod display;
pub mod template;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::{DdQuintError, Result};
use crate::models::{CopyNumberState, NEGATIVE_LABEL, UNKNOWN_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AneuploidyTargets {
    /// Deletion target relative to the expected copy number
    pub low: f64,
    /// Duplication target relative to the expected copy number
    pub high: f64,
}

/// Inclusive copy-number ranges for one chromosome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyNumberRanges {
    pub euploid: (f64, f64),
    pub deletion: (f64, f64),
    pub duplication: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // ── performance ─────────────────────────────────────────────
    /// Worker threads for `--parallel`; 0 lets rayon decide
    pub num_processes: usize,

    // ── clustering ──────────────────────────────────────────────
    /// DBSCAN neighbourhood radius on z-scored amplitudes
    pub cluster_epsilon: f64,
    /// DBSCAN core-point threshold
    pub cluster_min_points: usize,
    pub min_points_for_clustering: usize,
    /// Wells with fewer clean droplets than this are reported as errors
    pub min_data_points: usize,

    // ── expected centroids, [Ch1Amplitude, Ch2Amplitude] ────────
    pub expected_centroids: BTreeMap<String, [f64; 2]>,
    pub base_target_tolerance: f64,
    pub scale_factor_min: f64,
    pub scale_factor_max: f64,

    // ── copy number ─────────────────────────────────────────────
    pub copy_number_median_deviation_threshold: f64,
    pub copy_number_baseline_min_chroms: usize,
    pub aneuploidy_deviation_threshold: f64,
    pub expected_copy_numbers: BTreeMap<String, f64>,
    pub euploid_tolerance: f64,
    pub aneuploidy_tolerance: f64,
    pub aneuploidy_targets: AneuploidyTargets,

    // ── visualization ───────────────────────────────────────────
    /// Inches
    pub composite_figure_size: (f64, f64),
    pub composite_dpi: u32,
    /// Inches
    pub individual_figure_size: (f64, f64),
    pub individual_dpi: u32,
    /// Inches, per-well temp plots embedded in the composite
    pub composite_plot_size: (f64, f64),
    pub composite_plot_dpi: u32,
    pub x_axis_min: f64,
    pub x_axis_max: f64,
    pub y_axis_min: f64,
    pub y_axis_max: f64,
    pub x_grid_interval: f64,
    pub y_grid_interval: f64,
    pub target_colors: BTreeMap<String, String>,

    // ── file management ─────────────────────────────────────────
    pub graphs_dir_name: String,
    pub raw_data_dir_name: String,
    pub csv_extension: String,
    pub composite_image_filename: String,
    pub plate_report_filename: String,
    pub list_report_filename: String,

    // ── template parsing ────────────────────────────────────────
    pub template_search_parent_levels: usize,
    /// `{dir_name}` is replaced by the input directory name
    pub template_patterns: Vec<String>,

    // ── wells ───────────────────────────────────────────────────
    pub plate_rows: Vec<String>,
    pub plate_cols: Vec<String>,
    /// Supports `{row}`, `{col}` and `{col:02d}`
    pub well_format: String,
}

impl Default for Config {
    fn default() -> Self {
        let expected_centroids = [
            ("Negative", [900.0, 700.0]),
            ("Chrom1", [900.0, 2300.0]),
            ("Chrom2", [1700.0, 2000.0]),
            ("Chrom3", [2400.0, 1750.0]),
            ("Chrom4", [2900.0, 1250.0]),
            ("Chrom5", [3400.0, 700.0]),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let expected_copy_numbers = [
            ("Chrom1", 0.9688),
            ("Chrom2", 1.0066),
            ("Chrom3", 1.0300),
            ("Chrom4", 0.9890),
            ("Chrom5", 1.0056),
            ("Chrom6", 1.00),
            ("Chrom7", 1.00),
            ("Chrom8", 1.00),
            ("Chrom9", 1.00),
            ("Chrom10", 1.00),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let target_colors = [
            ("Negative", "#1f77b4"),
            ("Chrom1", "#f59a23"),
            ("Chrom2", "#7ec638"),
            ("Chrom3", "#16d9ff"),
            ("Chrom4", "#f65352"),
            ("Chrom5", "#82218b"),
            ("Chrom6", "#8c564b"),
            ("Chrom7", "#e377c2"),
            ("Chrom8", "#7f7f7f"),
            ("Chrom9", "#bcbd22"),
            ("Chrom10", "#9edae5"),
            ("Unknown", "#c7c7c7"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            num_processes: 0,

            cluster_epsilon: 0.06,
            cluster_min_points: 10,
            min_points_for_clustering: 50,
            min_data_points: 10,

            expected_centroids,
            base_target_tolerance: 500.0,
            scale_factor_min: 0.5,
            scale_factor_max: 1.0,

            copy_number_median_deviation_threshold: 0.15,
            copy_number_baseline_min_chroms: 3,
            aneuploidy_deviation_threshold: 0.15,
            expected_copy_numbers,
            euploid_tolerance: 0.08,
            aneuploidy_tolerance: 0.08,
            aneuploidy_targets: AneuploidyTargets { low: 0.75, high: 1.25 },

            composite_figure_size: (16.0, 11.0),
            composite_dpi: 200,
            individual_figure_size: (6.0, 5.0),
            individual_dpi: 150,
            composite_plot_size: (5.0, 5.0),
            composite_plot_dpi: 60,
            x_axis_min: 0.0,
            x_axis_max: 3000.0,
            y_axis_min: 0.0,
            y_axis_max: 5000.0,
            x_grid_interval: 500.0,
            y_grid_interval: 1000.0,
            target_colors,

            graphs_dir_name: "Graphs".into(),
            raw_data_dir_name: "Raw Data".into(),
            csv_extension: ".csv".into(),
            composite_image_filename: "Graph_Overview.png".into(),
            plate_report_filename: "Plate_Results.csv".into(),
            list_report_filename: "List_Results.csv".into(),

            template_search_parent_levels: 2,
            template_patterns: vec!["{dir_name}.csv".into(), "{dir_name}.xlsx".into()],

            plate_rows: "ABCDEFGH".chars().map(String::from).collect(),
            plate_cols: (1..=12).map(|c| c.to_string()).collect(),
            well_format: "{row}{col:02d}".into(),
        }
    }
}

impl Config {
    /// Chromosome keys from the expected centroids, sorted numerically
    /// (`Chrom2` before `Chrom10`).
    pub fn chromosome_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .expected_centroids
            .keys()
            .filter(|k| k.starts_with("Chrom"))
            .cloned()
            .collect();
        keys.sort_by_key(|k| k.trim_start_matches("Chrom").parse::<u32>().unwrap_or(u32::MAX));
        keys
    }

    /// Labels in processing order: Negative, chromosomes, Unknown
    pub fn ordered_labels(&self) -> Vec<String> {
        let mut labels = vec![NEGATIVE_LABEL.to_string()];
        labels.extend(self.chromosome_keys());
        labels.push(UNKNOWN_LABEL.to_string());
        labels
    }

    pub fn copy_number_ranges(&self, chrom: &str) -> Result<CopyNumberRanges> {
        let expected = *self.expected_copy_numbers.get(chrom).ok_or_else(|| {
            error!("Unknown chromosome: {chrom}");
            DdQuintError::copy_number("No expected copy number configured", chrom)
        })?;

        let deletion_target = expected + (self.aneuploidy_targets.low - 1.0);
        let duplication_target = expected + (self.aneuploidy_targets.high - 1.0);

        Ok(CopyNumberRanges {
            euploid: (expected - self.euploid_tolerance, expected + self.euploid_tolerance),
            deletion: (
                deletion_target - self.aneuploidy_tolerance,
                deletion_target + self.aneuploidy_tolerance,
            ),
            duplication: (
                duplication_target - self.aneuploidy_tolerance,
                duplication_target + self.aneuploidy_tolerance,
            ),
        })
    }

    /// Euploid when inside the euploid range, aneuploidy when inside the
    /// deletion or duplication range, buffer zone otherwise.
    pub fn classify_copy_number_state(&self, chrom: &str, copy_number: f64) -> Result<CopyNumberState> {
        let ranges = self.copy_number_ranges(chrom)?;
        let within = |(lo, hi): (f64, f64)| lo <= copy_number && copy_number <= hi;

        if within(ranges.euploid) {
            Ok(CopyNumberState::Euploid)
        } else if within(ranges.deletion) || within(ranges.duplication) {
            Ok(CopyNumberState::Aneuploidy)
        } else {
            Ok(CopyNumberState::BufferZone)
        }
    }

    /// Per-target matching tolerance with the scale factor clamped into
    /// `[scale_factor_min, scale_factor_max]`.
    pub fn target_tolerance(&self, scale_factor: f64) -> BTreeMap<String, f64> {
        let scale = scale_factor.clamp(self.scale_factor_min, self.scale_factor_max);
        self.expected_centroids
            .keys()
            .map(|k| (k.clone(), self.base_target_tolerance * scale))
            .collect()
    }

    pub fn axis_limits(&self) -> AxisLimits {
        AxisLimits {
            x: (self.x_axis_min, self.x_axis_max),
            y: (self.y_axis_min, self.y_axis_max),
        }
    }

    pub fn grid_intervals(&self) -> (f64, f64) {
        (self.x_grid_interval, self.y_grid_interval)
    }

    /// Figure size in pixels for a per-well plot
    pub fn plot_dimensions(&self, for_composite: bool) -> (u32, u32) {
        if for_composite {
            to_pixels(self.composite_plot_size, self.composite_plot_dpi)
        } else {
            to_pixels(self.individual_figure_size, self.individual_dpi)
        }
    }

    pub fn composite_dimensions(&self) -> (u32, u32) {
        to_pixels(self.composite_figure_size, self.composite_dpi)
    }

    /// Render a well id through `well_format`, e.g. `("A", 1)` → `A01`
    pub fn format_well(&self, row: &str, col: u32) -> String {
        self.well_format
            .replace("{row}", row)
            .replace("{col:02d}", &format!("{col:02}"))
            .replace("{col}", &col.to_string())
    }

    /// Column numbers of the plate, parsed from `plate_cols`
    pub fn plate_col_numbers(&self) -> Vec<u32> {
        self.plate_cols.iter().filter_map(|c| c.trim().parse().ok()).collect()
    }

    /// Every well of the plate in row-major order
    pub fn all_wells(&self) -> Vec<String> {
        let cols = self.plate_col_numbers();
        self.plate_rows
            .iter()
            .flat_map(|row| cols.iter().map(move |&col| self.format_well(row, col)))
            .collect()
    }

    pub fn target_color(&self, label: &str) -> &str {
        self.target_colors
            .get(label)
            .or_else(|| self.target_colors.get(UNKNOWN_LABEL))
            .map(String::as_str)
            .unwrap_or("#c7c7c7")
    }

    /// All settings keyed by their upper-case names
    pub fn all_settings(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Load a JSON config, starting from the defaults and overriding every
    /// known key present in the file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            error!("Configuration file not found: {}", path.display());
            return Err(DdQuintError::config(
                format!("Configuration file not found: {}", path.display()),
                "filepath",
            ));
        }

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        if !is_json {
            error!("Unsupported config file format: {}", path.display());
            return Err(DdQuintError::config(
                format!("Unsupported config file format: {}", path.display()),
                "file_format",
            ));
        }

        debug!("Loading configuration from JSON file: {}", path.display());
        let text = fs::read_to_string(path)?;
        let loaded = Self::from_json_str(&text).map_err(|e| {
            error!("Error loading settings from {}: {e}", path.display());
            e
        })?;
        debug!("Successfully loaded configuration from {}", path.display());
        Ok(loaded)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(text).map_err(|e| {
            DdQuintError::config(format!("Invalid JSON format: {e}"), "json_format")
        })?;
        let Value::Object(overrides) = parsed else {
            return Err(DdQuintError::config(
                "Configuration root must be a JSON object",
                "json_format",
            ));
        };

        let mut merged = Self::default().all_settings();
        for (key, value) in overrides {
            if key.is_empty() || key.starts_with('#') {
                continue;
            }
            match merged.get_mut(&key) {
                Some(slot) => {
                    debug!("Updated config: {key} = {value} (was: {slot})");
                    *slot = value;
                }
                None => debug!("Ignoring unknown config key: {key}"),
            }
        }

        serde_json::from_value(Value::Object(merged)).map_err(|e| {
            DdQuintError::config(format!("Invalid configuration value: {e}"), "json_format")
        })
    }
}

fn to_pixels((w, h): (f64, f64), dpi: u32) -> (u32, u32) {
    let dpi = dpi as f64;
    ((w * dpi).round().max(1.0) as u32, (h * dpi).round().max(1.0) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromosome_keys_sort_numerically() {
        let mut config = Config::default();
        config.expected_centroids.insert("Chrom10".into(), [100.0, 100.0]);
        config.expected_centroids.insert("Chrom6".into(), [100.0, 100.0]);

        let keys = config.chromosome_keys();
        assert_eq!(
            keys,
            vec!["Chrom1", "Chrom2", "Chrom3", "Chrom4", "Chrom5", "Chrom6", "Chrom10"]
        );
        let labels = config.ordered_labels();
        assert_eq!(labels.first().map(String::as_str), Some("Negative"));
        assert_eq!(labels.last().map(String::as_str), Some("Unknown"));
    }

    #[test]
    fn classification_uses_chromosome_specific_ranges() {
        let config = Config::default();
        // Chrom1 expected 0.9688
        assert_eq!(config.classify_copy_number_state("Chrom1", 0.97).unwrap(), CopyNumberState::Euploid);
        assert_eq!(config.classify_copy_number_state("Chrom1", 0.72).unwrap(), CopyNumberState::Aneuploidy);
        assert_eq!(config.classify_copy_number_state("Chrom1", 1.22).unwrap(), CopyNumberState::Aneuploidy);
        assert_eq!(config.classify_copy_number_state("Chrom1", 0.85).unwrap(), CopyNumberState::BufferZone);
        assert_eq!(config.classify_copy_number_state("Chrom1", 1.60).unwrap(), CopyNumberState::BufferZone);
        let err = config.classify_copy_number_state("Chrom42", 1.0).unwrap_err();
        assert!(matches!(err, DdQuintError::CopyNumber { ref chromosome, .. } if chromosome == "Chrom42"));
    }

    #[test]
    fn ranges_for_chrom1() {
        let ranges = Config::default().copy_number_ranges("Chrom1").unwrap();
        assert!((ranges.euploid.0 - 0.8888).abs() < 1e-9);
        assert!((ranges.euploid.1 - 1.0488).abs() < 1e-9);
        assert!((ranges.deletion.0 - 0.6388).abs() < 1e-9);
        assert!((ranges.duplication.1 - 1.2988).abs() < 1e-9);
    }

    #[test]
    fn tolerance_scale_is_clamped() {
        let config = Config::default();
        assert_eq!(config.target_tolerance(0.1)["Chrom1"], 250.0);
        assert_eq!(config.target_tolerance(3.0)["Chrom1"], 500.0);
        assert_eq!(config.target_tolerance(0.8)["Negative"], 400.0);
    }

    #[test]
    fn well_format_and_plate_layout() {
        let config = Config::default();
        assert_eq!(config.format_well("A", 1), "A01");
        assert_eq!(config.format_well("H", 12), "H12");

        let wells = config.all_wells();
        assert_eq!(wells.len(), 96);
        assert_eq!(wells[0], "A01");
        assert_eq!(wells[12], "B01");
        assert_eq!(wells[95], "H12");
    }

    #[test]
    fn json_overrides_known_keys_and_skips_comments() {
        let json = r##"{
            "# Note": "comment",
            "X_AXIS_MAX": 4000,
            "BASE_TARGET_TOLERANCE": 350,
            "EXPECTED_CENTROIDS": {"Negative": [800, 700], "Chrom1": [800, 2300]},
            "NOT_A_SETTING": true
        }"##;
        let config = Config::from_json_str(json).unwrap();
        assert_eq!(config.x_axis_max, 4000.0);
        assert_eq!(config.base_target_tolerance, 350.0);
        assert_eq!(config.chromosome_keys(), vec!["Chrom1"]);
        // untouched keys keep defaults
        assert_eq!(config.y_axis_max, 5000.0);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = Config::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, DdQuintError::Config { .. }));

        let err = Config::from_json_str(r#"{"X_AXIS_MAX": "wide"}"#).unwrap_err();
        assert!(matches!(err, DdQuintError::Config { .. }));
    }

    #[test]
    fn full_settings_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut config = Config::default();
        config.composite_dpi = 123;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);

        let bad = dir.path().join("settings.yaml");
        std::fs::write(&bad, "X_AXIS_MAX: 1").unwrap();
        assert!(Config::load_from_file(&bad).is_err());
    }
}
