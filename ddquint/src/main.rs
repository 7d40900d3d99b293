use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::copy_number::{calculate_statistics, detect_aneuploidies};
use crate::analysis::file_processor::process_directory;
use crate::config::display::display_config;
use crate::config::template::generate_config_template;
use crate::config::Config;
use crate::data_handling::ddplt_parser::{extract_sample_names, find_ddplt_file};
use crate::data_handling::template_parser::get_sample_names;
use crate::reporting::list_report::create_list_report;
use crate::reporting::plate_report::create_plate_report;
use crate::visualization::plate_plots::create_composite_image;

mod analysis;
mod config;
mod data_handling;
mod error;
mod helper_functions;
mod models;
mod reporting;
mod visualization;

#[derive(Parser)]
#[command(name = "ddquint")]
#[command(about = "ddQuint: digital droplet PCR multiplex analysis", long_about = None)]
struct Args {
    /// Directory containing the per-well amplitude CSV files.
    #[arg(long, value_name = "DIR", help_heading = "Input/Output")]
    dir: Option<PathBuf>,

    /// Output directory for results (defaults to the input directory).
    #[arg(long, value_name = "DIR", help_heading = "Input/Output")]
    output: Option<PathBuf>,

    /// Debug logging for ddquint modules.
    #[arg(long, help_heading = "Logging")]
    verbose: bool,

    /// Trace logging for ddquint modules.
    #[arg(long, help_heading = "Logging")]
    debug: bool,

    /// Process wells on a thread pool.
    #[arg(long)]
    parallel: bool,

    /// JSON file overriding the default settings.
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    config: Option<PathBuf>,

    /// Write a configuration template, optionally into DIR, and exit.
    #[arg(long = "config-template", value_name = "DIR", num_args = 0..=1, default_missing_value = ".", help_heading = "Configuration")]
    config_template: Option<PathBuf>,

    /// Print the active configuration and exit.
    #[arg(long = "show-config", help_heading = "Configuration")]
    show_config: bool,

    /// Plate report with columns 1-12 down the side and relative values only.
    #[arg(long)]
    rotated: bool,
}

fn init_logging(args: &Args) {
    let default_filter = if args.debug {
        "info,ddquint=trace"
    } else if args.verbose {
        "info,ddquint=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

/// Template names first; a `.ddplt` plate file in the input directory is
/// the fallback.
fn resolve_sample_names(input_dir: &Path, config: &Config) -> HashMap<String, String> {
    let names = get_sample_names(input_dir, config);
    if !names.is_empty() {
        info!("Loaded {} sample names from template", names.len());
        return names;
    }
    let Some(ddplt) = find_ddplt_file(input_dir) else {
        return names;
    };
    match extract_sample_names(&ddplt, config) {
        Ok(names) => {
            info!("Loaded {} sample names from {}", names.len(), ddplt.display());
            names
        }
        Err(e) => {
            warn!("Could not read sample names from {}: {}", ddplt.display(), e);
            HashMap::new()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = match &args.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if args.show_config {
        display_config(&config);
        return Ok(());
    }
    if let Some(dir) = &args.config_template {
        let path = generate_config_template(&config, None, Some(dir))?;
        println!("Configuration template saved to {}", path.display());
        return Ok(());
    }

    let Some(input_dir) = args.dir.clone() else {
        bail!("No input directory given, use --dir");
    };
    if !input_dir.is_dir() {
        bail!("Input directory does not exist: {}", input_dir.display());
    }
    let output_dir = args.output.clone().unwrap_or_else(|| input_dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Could not create output directory {}", output_dir.display()))?;

    info!("=== ddPCR Quintuplex Analysis ===");
    let sample_names = resolve_sample_names(&input_dir, &config);

    let mut results = process_directory(&input_dir, &output_dir, &sample_names, args.parallel, &config)?;
    if results.is_empty() {
        bail!("No valid results were generated from {}", input_dir.display());
    }

    let composite_path = output_dir.join(&config.composite_image_filename);
    match create_composite_image(&mut results, &composite_path, &config) {
        Ok(path) => info!("Composite image saved to {}", path.display()),
        Err(e) => error!("{}", e),
    }

    let plate_path = output_dir.join(&config.plate_report_filename);
    if let Err(e) = create_plate_report(&results, &plate_path, args.rotated, &config) {
        error!("Error creating plate report: {}", e);
    }
    let list_path = output_dir.join(&config.list_report_filename);
    if let Err(e) = create_list_report(&results, &list_path, &config) {
        error!("Error creating list report: {}", e);
    }

    for result in results.iter().filter(|r| r.has_aneuploidy()) {
        let aberrations = detect_aneuploidies(&result.clustering.copy_numbers, config.aneuploidy_deviation_threshold);
        let summary: Vec<String> = aberrations
            .iter()
            .map(|(chrom, a)| format!("{} {:?} ({:.2})", chrom, a.kind, a.copy_number))
            .collect();
        info!("{} ({}): {}", result.well, result.display_name(), summary.join(", "));
    }

    let stats = calculate_statistics(&results, &config);
    for (chrom, s) in &stats.chromosomes {
        debug!(
            "{}: n={} mean={:.3} median={:.3} sd={:.3} range=[{:.3}, {:.3}]",
            chrom, s.count, s.mean, s.median, s.std, s.min, s.max
        );
    }
    info!(
        "Processed {} files ({} potential aneuploidies, {:.1}%)",
        stats.sample_count, stats.abnormal_count, stats.abnormal_percent
    );
    let shown = output_dir.canonicalize().unwrap_or(output_dir);
    info!("Results saved to: {}", shown.display());
    info!("=== Analysis complete ===");
    Ok(())
}
