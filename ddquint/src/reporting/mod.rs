pub mod list_report;
pub mod plate_report;

use std::path::Path;

use crate::models::{CopyNumberState, WellResult};

/// `Chrom3` → `Chr3`
pub fn chromosome_label(key: &str) -> String {
    format!("Chr{}", key.trim_start_matches("Chrom"))
}

/// Name shown for a well in the reports: sample name, then the CSV file
/// stem, then the well id.
pub fn report_sample_name(result: &WellResult) -> String {
    if let Some(name) = result.sample_name.as_deref().filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    Path::new(&result.filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| result.well.clone())
}

pub(crate) fn format_copy_number(value: Option<&f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Absolute counts of zero are left blank
pub(crate) fn format_count(value: Option<&usize>) -> String {
    match value {
        Some(&n) if n > 0 => n.to_string(),
        _ => String::new(),
    }
}

/// Chromosomes without a classification (error wells) stay blank
pub(crate) fn format_state(value: Option<&CopyNumberState>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}
