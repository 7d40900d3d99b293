use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::error::Result;

/// Create `dir` (and parents) when missing, returning it for chaining.
pub fn ensure_directory(dir: &Path) -> Result<&Path> {
    if !dir.exists() {
        debug!("Creating directory {}", dir.display());
        fs::create_dir_all(dir)?;
    }
    Ok(dir)
}

/// All files in `dir` whose name ends in `extension` (any case, with or
/// without the leading dot), sorted by name.
pub fn list_csv_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Error listing CSV files in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.to_lowercase().ends_with(&suffix))
        })
        .collect();
    files.sort();
    files
}

/// Copy each existing file into `destination`, returning the new paths.
/// Failures are logged and skipped.
pub fn copy_files(files: &[PathBuf], destination: &Path) -> Result<Vec<PathBuf>> {
    ensure_directory(destination)?;
    let mut copied = Vec::with_capacity(files.len());
    for file in files.iter().filter(|f| f.exists()) {
        let Some(name) = file.file_name() else { continue };
        let target = destination.join(name);
        match fs::copy(file, &target) {
            Ok(_) => copied.push(target),
            Err(e) => error!("Error copying {}: {}", file.display(), e),
        }
    }
    Ok(copied)
}

/// Move each existing file into `destination`. Falls back to copy + remove
/// when a rename crosses filesystems.
pub fn move_files(files: &[PathBuf], destination: &Path) -> Result<Vec<PathBuf>> {
    ensure_directory(destination)?;
    let mut moved = Vec::with_capacity(files.len());
    for file in files.iter().filter(|f| f.exists()) {
        let Some(name) = file.file_name() else { continue };
        let target = destination.join(name);
        let outcome = fs::rename(file, &target).or_else(|_| {
            fs::copy(file, &target)?;
            fs::remove_file(file)
        });
        match outcome {
            Ok(()) => moved.push(target),
            Err(e) => error!("Error moving {}: {}", file.display(), e),
        }
    }
    Ok(moved)
}
