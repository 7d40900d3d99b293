//! Sample names from QuantaSoft `.ddplt` plate files.
//!
//! The format is binary and undocumented, so the parser only scans its
//! printable text runs for `<well><separator><name>` pairs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

const MIN_CHUNK_LEN: usize = 4;

fn well_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        RegexBuilder::new(r"([A-H](?:1[0-2]|0?[1-9]))[\s_-]*([\w\s-]+)")
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
}

fn plate_name_patterns() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r"^[A-Za-z0-9_-]+\d{6,8}$").expect("valid regex"),
            RegexBuilder::new(r"^[A-Za-z0-9_-]+_plate$")
                .case_insensitive(true)
                .build()
                .expect("valid regex"),
        ]
    })
}

/// Printable ASCII runs of at least four characters containing a letter
pub fn extract_text_chunks(data: &[u8]) -> Vec<String> {
    data.split(|b| !(0x20..0x7f).contains(b))
        .filter_map(|run| std::str::from_utf8(run).ok())
        .map(str::trim)
        .filter(|chunk| chunk.len() >= MIN_CHUNK_LEN)
        .filter(|chunk| chunk.chars().any(|c| c.is_ascii_alphabetic()))
        .map(str::to_string)
        .collect()
}

/// `a1` → `A01`; anything that does not start with a well id is returned as is.
pub fn standardize_well_id(well: &str) -> String {
    let mut chars = well.chars();
    let Some(row) = chars.next().map(|c| c.to_ascii_uppercase()) else {
        return well.to_string();
    };
    let digits: String = chars.take_while(|c| c.is_ascii_digit()).take(2).collect();
    match digits.parse::<u32>() {
        Ok(col) if ('A'..='H').contains(&row) => format!("{row}{col:02}"),
        _ => well.to_string(),
    }
}

fn plate_name(chunks: &[String]) -> Option<&str> {
    let [dated, suffixed] = plate_name_patterns();
    chunks
        .iter()
        .map(String::as_str)
        .find(|c| dated.is_match(c) || suffixed.is_match(c))
}

/// Parse well → sample name pairs out of raw `.ddplt` bytes.
///
/// When no pair is found but a plate name is, every well of the configured
/// plate is named `<plate>_<well>`.
pub fn parse_sample_names(data: &[u8], config: &Config) -> HashMap<String, String> {
    let chunks = extract_text_chunks(data);
    let mut names = HashMap::new();

    for chunk in &chunks {
        for caps in well_name_pattern().captures_iter(chunk) {
            let name = caps[2].trim();
            if !name.is_empty() {
                names.insert(standardize_well_id(&caps[1]), name.to_string());
            }
        }
    }

    if names.is_empty() {
        if let Some(plate) = plate_name(&chunks) {
            debug!("Falling back to plate name {}", plate);
            for well in config.all_wells() {
                names.insert(well.clone(), format!("{plate}_{well}"));
            }
        }
    }
    names
}

pub fn extract_sample_names(path: &Path, config: &Config) -> Result<HashMap<String, String>> {
    let is_ddplt = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("ddplt"));
    if !is_ddplt {
        warn!("{} does not have .ddplt extension", path.display());
    }
    let data = fs::read(path)?;
    Ok(parse_sample_names(&data, config))
}

/// First `.ddplt` file in `dir`, by name
pub fn find_ddplt_file(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case("ddplt"))
        })
        .collect();
    files.sort();
    files.into_iter().next()
}
