use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::Config;
use crate::error::{DdQuintError, Result};
use crate::models::WellResult;
use crate::reporting::list_report::well_status;
use crate::reporting::{chromosome_label, format_copy_number, format_count, format_state, report_sample_name};

const REPORT_TYPE: &str = "plate";

/// Plain cell grid, written out as CSV once filled
struct Grid {
    cells: Vec<Vec<String>>,
}

impl Grid {
    fn new(rows: usize, cols: usize) -> Self {
        Self { cells: vec![vec![String::new(); cols]; rows] }
    }

    fn set(&mut self, row: usize, col: usize, value: impl Into<String>) {
        self.cells[row][col] = value.into();
    }
}

/// Axis labels of the plate for either orientation.
///
/// Default: plate columns (1-12) across, plate rows (A-H) down, four cells
/// per well (chromosome, absolute, relative, state). Rotated: plate rows
/// across, plate columns down, relative value and state only.
struct Layout {
    across: Vec<String>,
    down: Vec<String>,
    well_width: usize,
    rotated: bool,
}

impl Layout {
    fn new(config: &Config, rotated: bool) -> Self {
        let cols: Vec<String> = config.plate_col_numbers().iter().map(u32::to_string).collect();
        let rows = config.plate_rows.clone();
        if rotated {
            Self { across: rows, down: cols, well_width: 2, rotated }
        } else {
            Self { across: cols, down: rows, well_width: 4, rotated }
        }
    }

    fn well_id(&self, down: &str, across: &str, config: &Config) -> String {
        let (row, col) = if self.rotated { (across, down) } else { (down, across) };
        config.format_well(row, col.parse().unwrap_or(0))
    }
}

/// Write the 8×12 plate report.
///
/// Each plate row takes one line for the sample name and well status
/// followed by one line per chromosome. Empty wells show their well id.
pub fn create_plate_report(
    results: &[WellResult],
    output_path: &Path,
    rotated: bool,
    config: &Config,
) -> Result<PathBuf> {
    if results.is_empty() {
        return Err(DdQuintError::report("No results to report", REPORT_TYPE));
    }
    let chromosomes = config.chromosome_keys();
    let block = chromosomes.len() + 1;
    let layout = Layout::new(config, rotated);
    let by_well: HashMap<&str, &WellResult> = results.iter().map(|r| (r.well.as_str(), r)).collect();

    let mut grid = Grid::new(2 + layout.down.len() * block, 1 + layout.across.len() * layout.well_width);

    for (i, label) in layout.across.iter().enumerate() {
        let col = 1 + i * layout.well_width;
        grid.set(0, col, label.as_str());
        if rotated {
            grid.set(1, col, "rel.");
        } else {
            grid.set(1, col + 1, "abs.");
            grid.set(1, col + 2, "rel.");
        }
        grid.set(1, col + layout.well_width - 1, "state");
    }

    for (d, down_label) in layout.down.iter().enumerate() {
        let start_row = 2 + d * block;
        grid.set(start_row, 0, down_label.as_str());

        for (a, across_label) in layout.across.iter().enumerate() {
            let start_col = 1 + a * layout.well_width;
            let well = layout.well_id(down_label, across_label, config);
            let result = by_well.get(well.as_str()).copied();

            let state_col = start_col + layout.well_width - 1;
            match result {
                Some(r) => {
                    grid.set(start_row, start_col, report_sample_name(r));
                    grid.set(start_row, state_col, well_status(r));
                }
                None => grid.set(start_row, start_col, well.as_str()),
            }

            for (c, chrom) in chromosomes.iter().enumerate() {
                let row = start_row + 1 + c;
                let copy_numbers = result.map(|r| &r.clustering.copy_numbers);
                if rotated {
                    grid.set(row, start_col, format_copy_number(copy_numbers.and_then(|m| m.get(chrom))));
                } else {
                    grid.set(row, start_col, chromosome_label(chrom));
                    let counts = result.map(|r| &r.clustering.counts);
                    grid.set(row, start_col + 1, format_count(counts.and_then(|m| m.get(chrom))));
                    grid.set(row, start_col + 2, format_copy_number(copy_numbers.and_then(|m| m.get(chrom))));
                }
                let states = result.map(|r| &r.clustering.copy_number_states);
                grid.set(row, state_col, format_state(states.and_then(|m| m.get(chrom))));
            }
        }
    }
    debug!("Plate grid is {} x {}", grid.cells.len(), grid.cells[0].len());

    let mut wtr = csv::Writer::from_path(output_path)?;
    for line in &grid.cells {
        wtr.write_record(line)?;
    }
    wtr.flush()?;
    info!("Plate report saved to {}", output_path.display());
    Ok(output_path.to_path_buf())
}
