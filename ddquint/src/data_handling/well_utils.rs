use std::sync::OnceLock;

use regex::Regex;

use crate::config::Config;

const ROWS: &str = "ABCDEFGH";

struct WellPatterns {
    explicit: Regex,
    ordered: Vec<Regex>,
    general: Regex,
    valid: Regex,
    loose: Regex,
}

fn patterns() -> &'static WellPatterns {
    static PATTERNS: OnceLock<WellPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| WellPatterns {
        explicit: Regex::new(r"_([A-H][0-9]{2})_").expect("valid regex"),
        ordered: [
            r"_([A-H][0-9]{2})",
            r"([A-H][0-9]{2})_",
            r"_([A-H][0-9]{1,2})[_.]",
            r"([A-H][0-9]{1,2})[_.]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect(),
        general: Regex::new(r"([A-H][0-9]{1,2})").expect("valid regex"),
        valid: Regex::new(r"^[A-H](0[1-9]|1[0-2])$").expect("valid regex"),
        loose: Regex::new(r"^([A-H])(\d{1,2})$").expect("valid regex"),
    })
}

fn pad(well: &str) -> String {
    if well.len() == 2 {
        format!("{}0{}", &well[..1], &well[1..])
    } else {
        well.to_string()
    }
}

fn last_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .last()
        .map(|m| m.as_str().to_string())
}

/// Pull a well coordinate such as `A01` out of an exported file name.
///
/// An underscore-delimited id (`_A01_`) wins outright; otherwise the
/// looser patterns are tried in order and the last match of the first
/// pattern that hits is used, zero-padded to two digits.
pub fn extract_well_coordinate(filename: &str) -> Option<String> {
    let p = patterns();
    if let Some(c) = p.explicit.captures(filename) {
        return c.get(1).map(|m| m.as_str().to_string());
    }
    p.ordered
        .iter()
        .find_map(|re| last_capture(re, filename))
        .or_else(|| last_capture(&p.general, filename))
        .map(|w| pad(&w))
}

pub fn is_valid_well(well: &str) -> bool {
    patterns().valid.is_match(well)
}

/// `A1` → `A01`; `None` when the id is outside the 96-well plate.
pub fn format_well_id(well: &str) -> Option<String> {
    if is_valid_well(well) {
        return Some(well.to_string());
    }
    let caps = patterns().loose.captures(well)?;
    let col: u32 = caps[2].parse().ok()?;
    (1..=12).contains(&col).then(|| format!("{}{:02}", &caps[1], col))
}

/// Render a canonical id (`A01`) through the configured `well_format`.
pub fn plate_well_id(canonical: &str, config: &Config) -> String {
    let (row, col) = canonical.split_at(canonical.len().min(1));
    match col.parse::<u32>() {
        Ok(col) => config.format_well(row, col),
        Err(_) => canonical.to_string(),
    }
}

/// Sort key giving column-first plate order (`A01`, `B01`, …, `H12`).
/// Ids that do not parse sort last.
pub fn column_first_key(well: &str) -> (u32, u32) {
    let mut chars = well.chars();
    let row = chars
        .next()
        .and_then(|c| ROWS.find(c.to_ascii_uppercase()))
        .map_or(u32::MAX, |i| i as u32);
    let col = chars.as_str().parse().unwrap_or(u32::MAX);
    (col, row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_coordinate_wins() {
        assert_eq!(
            extract_well_coordinate("Plate1_B03_Amplitude.csv").as_deref(),
            Some("B03")
        );
        assert_eq!(extract_well_coordinate("run_C07_x_D08_y.csv").as_deref(), Some("C07"));
    }

    #[test]
    fn looser_patterns_pad_and_prefer_last_match() {
        assert_eq!(extract_well_coordinate("sample_A1.csv").as_deref(), Some("A01"));
        assert_eq!(extract_well_coordinate("run_E05.csv").as_deref(), Some("E05"));
        assert_eq!(extract_well_coordinate("A02 and B4").as_deref(), Some("B04"));
        assert_eq!(extract_well_coordinate("nothing here.csv"), None);
    }

    #[test]
    fn validates_and_formats() {
        assert!(is_valid_well("A01"));
        assert!(is_valid_well("H12"));
        assert!(!is_valid_well("A13"));
        assert!(!is_valid_well("I01"));
        assert_eq!(format_well_id("C5").as_deref(), Some("C05"));
        assert_eq!(format_well_id("C13"), None);
    }

    #[test]
    fn plate_ids_follow_well_format() {
        let mut config = Config::default();
        assert_eq!(plate_well_id("A03", &config), "A03");
        config.well_format = "{row}{col}".into();
        assert_eq!(plate_well_id("A03", &config), "A3");
        assert_eq!(plate_well_id("H12", &config), "H12");
    }

    #[test]
    fn column_first_order() {
        let mut wells = vec!["B01", "A02", "A01", "H12", "C01"];
        wells.sort_by_key(|w| column_first_key(w));
        assert_eq!(wells, vec!["A01", "B01", "C01", "A02", "H12"]);
    }
}
