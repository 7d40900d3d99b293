use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{DdQuintError, Result};

const WELL_HEADER: &str = "Well";
const DESCRIPTION_COLUMNS: usize = 4;

/// Search the directory `template_search_parent_levels` above `input_dir`
/// (recursively) for a template named after the input directory.
pub fn find_template_file(input_dir: &Path, config: &Config) -> Option<PathBuf> {
    let input_dir = fs::canonicalize(input_dir).unwrap_or_else(|_| input_dir.to_path_buf());
    let dir_name = input_dir.file_name()?.to_string_lossy().to_string();
    let candidates: Vec<String> = config
        .template_patterns
        .iter()
        .map(|p| p.replace("{dir_name}", &dir_name))
        .collect();
    debug!("Looking for template files: {:?}", candidates);

    let search_root = input_dir
        .ancestors()
        .nth(config.template_search_parent_levels)
        .unwrap_or(&input_dir);
    debug!("Searching in parent directory: {}", search_root.display());

    let found = search_dir(search_root, &candidates);
    match &found {
        Some(path) => debug!("Template file found: {}", path.display()),
        None => debug!("Template file for {} not found", dir_name),
    }
    found
}

fn search_dir(dir: &Path, candidates: &[String]) -> Option<PathBuf> {
    for name in candidates {
        let path = dir.join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs.iter().find_map(|sub| search_dir(sub, candidates))
}

fn read_csv_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).trim().to_string())
                .collect(),
        );
    }
    Ok(rows)
}

fn cell_to_string(cell: &calamine::DataType) -> String {
    use calamine::DataType as Ct;
    match cell {
        Ct::String(s) => s.trim().to_string(),
        Ct::Empty => String::new(),
        Ct::Bool(b) => b.to_string(),
        Ct::Error(e) => format!("ERR({e:?})"),
        Ct::Float(n) | Ct::Duration(n) => n.to_string(),
        Ct::Int(i) => i.to_string(),
        Ct::DateTime(f) => f.to_string(),
        Ct::DateTimeIso(s) | Ct::DurationIso(s) => s.clone(),
    }
}

fn read_xlsx_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    use calamine::{open_workbook_auto, Reader};

    let template_err = |message: String| DdQuintError::Template {
        message,
        template: path.to_path_buf(),
    };
    let mut wb = open_workbook_auto(path).map_err(|e| template_err(e.to_string()))?;
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| template_err("worksheet missing".into()))?
        .map_err(|e| template_err(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

/// Map well ids to sample names from rows of a plate-setup sheet.
///
/// Rows above the first one holding a `Well` cell are preamble. A sample
/// name joins the non-empty `Sample description 1..4` cells with `" - "`.
pub fn sample_names_from_rows(rows: &[Vec<String>]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    let Some(header_idx) = rows
        .iter()
        .position(|row| row.iter().any(|c| c == WELL_HEADER))
    else {
        error!("Could not find header row in template file");
        return names;
    };
    let header = &rows[header_idx];
    debug!("Header row found at index: {}", header_idx);

    let column = |name: &str| header.iter().position(|c| c == name);
    let Some(well_col) = column(WELL_HEADER) else {
        return names;
    };
    let description_cols: Vec<usize> = (1..=DESCRIPTION_COLUMNS)
        .filter_map(|i| {
            let name = format!("Sample description {i}");
            let idx = column(&name);
            if idx.is_none() {
                warn!("Column '{}' not found. Available columns: {:?}", name, header);
            }
            idx
        })
        .collect();

    for (offset, row) in rows[header_idx + 1..].iter().enumerate() {
        let line = header_idx + offset + 2;
        let well = row.get(well_col).map(|w| w.trim()).unwrap_or_default();
        if well.is_empty() {
            debug!("Row {}: Empty well identifier", line);
            continue;
        }

        let parts: Vec<&str> = description_cols
            .iter()
            .filter_map(|&i| row.get(i).map(|s| s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            debug!("Row {}: Well {} has no sample description", line, well);
            continue;
        }

        let sample = parts.join(" - ");
        match names.get(well) {
            Some(existing) if existing != &sample => warn!(
                "Multiple descriptions for well {}: '{}' vs '{}'",
                well, existing, sample
            ),
            Some(_) => {}
            None => {
                debug!("Row {}: Well {} -> sample '{}'", line, well, sample);
                names.insert(well.to_string(), sample);
            }
        }
    }
    names
}

pub fn parse_template_file(path: &Path) -> Result<HashMap<String, String>> {
    debug!("Parsing template file: {}", path.display());
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xls"));
    let rows = if is_xlsx { read_xlsx_rows(path)? } else { read_csv_rows(path)? };

    let names = sample_names_from_rows(&rows);
    debug!("Found {} unique well-sample mappings", names.len());
    Ok(names)
}

/// Sample names for the wells of `input_dir`, empty when no template exists.
pub fn get_sample_names(input_dir: &Path, config: &Config) -> HashMap<String, String> {
    let Some(template) = find_template_file(input_dir, config) else {
        info!("No template file found for {}", input_dir.display());
        return HashMap::new();
    };
    match parse_template_file(&template) {
        Ok(names) => names,
        Err(e) => {
            error!("Error parsing template file: {}", e);
            HashMap::new()
        }
    }
}
