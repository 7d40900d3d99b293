use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::analysis::clustering::analyze_droplets;
use crate::config::Config;
use crate::data_handling::droplet_csv::load_droplets;
use crate::data_handling::well_utils::{
    column_first_key, extract_well_coordinate, format_well_id, plate_well_id,
};
use crate::error::{DdQuintError, Result};
use crate::helper_functions::{copy_files, ensure_directory, list_csv_files, move_files};
use crate::models::{ClusteringResult, WellResult};
use crate::visualization::well_plots::{create_error_plot, create_well_plot, PlotMode};

/// Result for a well that could not be analysed, with an error plot in
/// place of its graph.
pub fn create_error_result(
    well: &str,
    filename: &str,
    message: &str,
    graphs_dir: &Path,
    sample_name: Option<&str>,
    config: &Config,
) -> WellResult {
    let graph_path = graphs_dir.join(format!("{well}.png"));
    if let Err(e) = create_error_plot(message, &graph_path, config) {
        warn!("Could not draw error plot for {}: {}", well, e);
    }
    WellResult {
        well: well.to_string(),
        filename: filename.to_string(),
        sample_name: sample_name.map(str::to_owned),
        graph_path,
        clustering: ClusteringResult::default(),
        error: Some(message.to_string()),
        temp_graph_path: None,
    }
}

/// Analyse one amplitude CSV.
///
/// Returns `None` when no well id can be read from the file name. Every
/// failure past that point becomes an error result rather than an `Err`.
pub fn process_csv_file(
    path: &Path,
    graphs_dir: &Path,
    sample_names: &HashMap<String, String>,
    config: &Config,
) -> Option<WellResult> {
    let filename = path.file_name()?.to_string_lossy().to_string();
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let Some(coordinate) = extract_well_coordinate(&stem) else {
        debug!("No well coordinate in {}, skipping", filename);
        return None;
    };
    let Some(canonical) = format_well_id(&coordinate) else {
        let e = DdQuintError::WellProcessing {
            message: format!("Invalid well coordinate in {filename}"),
            well: Some(coordinate),
        };
        warn!("{}", e);
        return None;
    };
    let well = plate_well_id(&canonical, config);
    let sample_name = sample_names
        .get(&canonical)
        .or_else(|| sample_names.get(&well))
        .map(String::as_str);

    let outcome = analyse_well(path, graphs_dir, &well, &filename, sample_name, config);
    Some(outcome.unwrap_or_else(|e| {
        debug!("Error processing {}: {}", filename, e);
        create_error_result(&well, &filename, &e.to_string(), graphs_dir, sample_name, config)
    }))
}

fn analyse_well(
    path: &Path,
    graphs_dir: &Path,
    well: &str,
    filename: &str,
    sample_name: Option<&str>,
    config: &Config,
) -> Result<WellResult> {
    let droplets = load_droplets(path)?;
    if droplets.len() < config.min_data_points {
        return Ok(create_error_result(
            well,
            filename,
            &format!("Not enough data points: {}", droplets.len()),
            graphs_dir,
            sample_name,
            config,
        ));
    }

    let clustering = analyze_droplets(&droplets, config, Some(well))?;
    let graph_path = graphs_dir.join(format!("{well}.png"));
    create_well_plot(
        &droplets,
        &clustering,
        well,
        &graph_path,
        PlotMode::Standalone,
        sample_name,
        config,
    )?;

    Ok(WellResult {
        well: well.to_string(),
        filename: filename.to_string(),
        sample_name: sample_name.map(str::to_owned),
        graph_path,
        clustering,
        error: None,
        temp_graph_path: None,
    })
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Process every CSV in `input_dir`, writing graphs under `output_dir` and
/// filing the raw files into the raw data directory (moved when output and
/// input are the same directory, copied otherwise).
///
/// Results come back in column-first plate order.
pub fn process_directory(
    input_dir: &Path,
    output_dir: &Path,
    sample_names: &HashMap<String, String>,
    parallel: bool,
    config: &Config,
) -> Result<Vec<WellResult>> {
    let graphs_dir = output_dir.join(&config.graphs_dir_name);
    let raw_data_dir = output_dir.join(&config.raw_data_dir_name);
    ensure_directory(&graphs_dir)?;
    ensure_directory(&raw_data_dir)?;

    let csv_files = list_csv_files(input_dir, &config.csv_extension);
    if csv_files.is_empty() {
        warn!("No CSV files found in {}", input_dir.display());
        return Ok(Vec::new());
    }
    info!("Processing {} CSV files from {}", csv_files.len(), input_dir.display());

    let process = |file: &PathBuf| {
        let result = process_csv_file(file, &graphs_dir, sample_names, config);
        if let Some(r) = &result {
            debug!("Processed well {} from {}", r.well, r.filename);
        }
        result
    };

    let mut results: Vec<WellResult> = if parallel {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if config.num_processes > 0 {
            builder = builder.num_threads(config.num_processes);
        }
        match builder.build() {
            Ok(pool) => pool.install(|| csv_files.par_iter().filter_map(process).collect()),
            Err(e) => {
                error!("Could not start worker pool, processing sequentially: {}", e);
                csv_files.iter().filter_map(process).collect()
            }
        }
    } else {
        csv_files.iter().filter_map(process).collect()
    };
    info!("Processed {} of {} files", results.len(), csv_files.len());

    // input files stay put when results go to a separate output directory
    if same_directory(input_dir, output_dir) {
        move_files(&csv_files, &raw_data_dir)?;
    } else {
        copy_files(&csv_files, &raw_data_dir)?;
    }

    results.sort_by_key(|r| column_first_key(&r.well));
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn unnamed_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        fs::write(&path, "Ch1Amplitude,Ch2Amplitude\n1,2\n").unwrap();
        let out = process_csv_file(&path, dir.path(), &HashMap::new(), &Config::default());
        assert!(out.is_none());
    }

    #[test]
    fn off_plate_coordinates_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_A13_Amplitude.csv");
        fs::write(&path, "Ch1Amplitude,Ch2Amplitude\n1,2\n").unwrap();
        assert!(process_csv_file(&path, dir.path(), &HashMap::new(), &Config::default()).is_none());
    }

    #[test]
    fn well_ids_use_configured_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_A03_Amplitude.csv");
        fs::write(&path, "Ch1Amplitude,Ch2Amplitude\n100,200\n").unwrap();

        let mut config = Config::default();
        config.well_format = "{row}{col}".into();
        let names: HashMap<String, String> = [("A03".to_string(), "Ctrl".to_string())].into_iter().collect();
        let result = process_csv_file(&path, dir.path(), &names, &config).unwrap();
        assert_eq!(result.well, "A3");
        assert_eq!(result.sample_name.as_deref(), Some("Ctrl"));
        assert!(config.all_wells().contains(&result.well));
    }

    #[test]
    fn short_files_become_error_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_A03_Amplitude.csv");
        fs::write(&path, "Ch1Amplitude,Ch2Amplitude\n100,200\n110,210\n120,220\n").unwrap();

        let names: HashMap<String, String> = [("A03".to_string(), "Ctrl".to_string())].into_iter().collect();
        let result = process_csv_file(&path, dir.path(), &names, &Config::default()).unwrap();
        assert_eq!(result.well, "A03");
        assert_eq!(result.error.as_deref(), Some("Not enough data points: 3"));
        assert_eq!(result.sample_name.as_deref(), Some("Ctrl"));
        assert!(result.clustering.copy_numbers.is_empty());
        assert_eq!(result.graph_path, dir.path().join("A03.png"));
    }

    #[test]
    fn missing_header_becomes_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_B05_Amplitude.csv");
        fs::write(&path, "x,y\n1,2\n").unwrap();
        let result = process_csv_file(&path, dir.path(), &HashMap::new(), &Config::default()).unwrap();
        assert!(result.error.unwrap().contains("Could not find header row"));
    }

    #[test]
    fn directory_run_files_raw_data_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        fs::create_dir_all(&input).unwrap();
        for name in ["run_B01_Amplitude.csv", "run_A02_Amplitude.csv", "run_A01_Amplitude.csv"] {
            fs::write(input.join(name), "Ch1Amplitude,Ch2Amplitude\n100,200\n").unwrap();
        }
        fs::write(input.join("notes.txt"), "keep").unwrap();

        let results =
            process_directory(&input, &output, &HashMap::new(), true, &Config::default()).unwrap();
        let wells: Vec<&str> = results.iter().map(|r| r.well.as_str()).collect();
        assert_eq!(wells, vec!["A01", "B01", "A02"]);
        assert!(results.iter().all(|r| r.error.is_some()));

        assert!(output.join("Raw Data").join("run_A01_Amplitude.csv").exists());
        assert!(input.join("run_A01_Amplitude.csv").exists());
        assert!(input.join("notes.txt").exists());
    }

    #[test]
    fn in_place_run_moves_raw_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path();
        fs::write(input.join("run_C07_Amplitude.csv"), "Ch1Amplitude,Ch2Amplitude\n100,200\n").unwrap();

        let results = process_directory(input, input, &HashMap::new(), false, &Config::default()).unwrap();
        assert_eq!(results.len(), 1);
        assert!(!input.join("run_C07_Amplitude.csv").exists());
        assert!(input.join("Raw Data").join("run_C07_Amplitude.csv").exists());
        assert_eq!(results[0].error.as_deref(), Some("Not enough data points: 1"));
    }
}
