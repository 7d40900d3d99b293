use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, error};

use crate::error::{DdQuintError, Result};
use crate::models::Droplet;

pub const CH1_COLUMN: &str = "Ch1Amplitude";
pub const CH2_COLUMN: &str = "Ch2Amplitude";

/// Index of the first line naming both amplitude columns, spaced or not.
pub fn find_header_row(path: &Path) -> Option<usize> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Error finding header row in {}: {}", path.display(), e);
            return None;
        }
    };
    String::from_utf8_lossy(&bytes).lines().position(|line| {
        (line.contains("Ch1Amplitude") || line.contains("Ch1 Amplitude"))
            && (line.contains("Ch2Amplitude") || line.contains("Ch2 Amplitude"))
    })
}

/// Read the amplitude table below the detected header, with both
/// amplitude columns normalised to their unspaced names.
pub fn read_amplitude_frame(path: &Path) -> Result<DataFrame> {
    let header_row = find_header_row(path)
        .ok_or_else(|| DdQuintError::file("Could not find header row", path))?;
    debug!("Header row for {} at line {}", path.display(), header_row);

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(header_row)
        .map_parse_options(|mut opts| {
            opts.truncate_ragged_lines = true;
            opts.encoding = CsvEncoding::LossyUtf8;
            opts
        })
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let renames: Vec<(String, &str)> = df
        .get_column_names()
        .iter()
        .filter_map(|name| {
            let compact: String = name.as_str().split_whitespace().collect();
            match compact.as_str() {
                CH1_COLUMN if name.as_str() != CH1_COLUMN => Some((name.to_string(), CH1_COLUMN)),
                CH2_COLUMN if name.as_str() != CH2_COLUMN => Some((name.to_string(), CH2_COLUMN)),
                _ => None,
            }
        })
        .collect();
    for (old, new) in renames {
        df.rename(&old, new.into())?;
    }

    let has_columns = [CH1_COLUMN, CH2_COLUMN]
        .iter()
        .all(|c| df.get_column_names().iter().any(|n| n.as_str() == *c));
    if !has_columns {
        return Err(DdQuintError::file("Required columns not found", path));
    }
    Ok(df)
}

/// Load the droplets of one well, dropping rows with a missing amplitude.
pub fn load_droplets(path: &Path) -> Result<Vec<Droplet>> {
    let df = read_amplitude_frame(path)?;
    let ch1 = df.column(CH1_COLUMN)?.cast(&DataType::Float64)?;
    let ch2 = df.column(CH2_COLUMN)?.cast(&DataType::Float64)?;

    let droplets = ch1
        .f64()?
        .into_iter()
        .zip(ch2.f64()?.into_iter())
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((a, b)),
            _ => None,
        })
        .enumerate()
        .map(|(index, (ch1, ch2))| Droplet { index, ch1, ch2 })
        .collect::<Vec<_>>();

    debug!("Loaded {} droplets from {}", droplets.len(), path.display());
    Ok(droplets)
}
