use std::path::PathBuf;

use thiserror::Error;

/// Errors raised anywhere in the ddQuint pipeline
#[derive(Debug, Error)]
pub enum DdQuintError {
    /// Invalid or unreadable configuration
    #[error("{message}{}", key_suffix(.key))]
    Config { message: String, key: Option<String> },

    /// Not enough droplets, DBSCAN failure or target assignment problems
    #[error("{message}{}", well_suffix(.well))]
    Clustering { message: String, well: Option<String> },

    /// CSV reading or header detection failures
    #[error("{message} (file: {})", .file.display())]
    FileProcessing { message: String, file: PathBuf },

    /// Invalid coordinates or well-specific analysis failures
    #[error("{message}{}", well_suffix(.well))]
    WellProcessing { message: String, well: Option<String> },

    /// Normalisation or classification failures
    #[error("{message} (chromosome: {chromosome})")]
    CopyNumber { message: String, chromosome: String },

    /// Plot generation or image saving failures
    #[error("{message} (output_path: {})", .output_path.display())]
    Visualization { message: String, output_path: PathBuf },

    /// Report writing failures
    #[error("{message} (report_type: {report_type})")]
    ReportGeneration { message: String, report_type: String },

    /// Template lookup or parsing failures
    #[error("{message} (template: {})", .template.display())]
    Template { message: String, template: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref()
        .map(|k| format!(" (config key: {k})"))
        .unwrap_or_default()
}

fn well_suffix(well: &Option<String>) -> String {
    well.as_ref()
        .map(|w| format!(" (well: {w})"))
        .unwrap_or_default()
}

impl DdQuintError {
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Config { message: message.into(), key: Some(key.into()) }
    }

    pub fn clustering(message: impl Into<String>, well: Option<&str>) -> Self {
        Self::Clustering { message: message.into(), well: well.map(str::to_owned) }
    }

    pub fn copy_number(message: impl Into<String>, chromosome: impl Into<String>) -> Self {
        Self::CopyNumber { message: message.into(), chromosome: chromosome.into() }
    }

    pub fn file(message: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self::FileProcessing { message: message.into(), file: file.into() }
    }

    pub fn visualization(message: impl Into<String>, output_path: impl Into<PathBuf>) -> Self {
        Self::Visualization { message: message.into(), output_path: output_path.into() }
    }

    pub fn report(message: impl Into<String>, report_type: impl Into<String>) -> Self {
        Self::ReportGeneration { message: message.into(), report_type: report_type.into() }
    }
}

/// Type alias for Results using DdQuintError
pub type Result<T> = std::result::Result<T, DdQuintError>;

/// Wrap any plotters drawing error into a visualization error for `path`.
pub fn draw_err<E: std::fmt::Display>(path: &std::path::Path) -> impl Fn(E) -> DdQuintError + '_ {
    move |e| DdQuintError::visualization(format!("Drawing failed: {e}"), path)
}
