use serde_json::Value;
use tracing::warn;

use super::Config;

const CATEGORIES: &[(&str, &[&str])] = &[
    ("Performance Settings", &["NUM_PROCESSES"]),
    (
        "Clustering Settings",
        &["CLUSTER_EPSILON", "CLUSTER_MIN_POINTS", "MIN_POINTS_FOR_CLUSTERING", "MIN_DATA_POINTS"],
    ),
    ("Expected Centroids", &["EXPECTED_CENTROIDS"]),
    ("Centroid Matching", &["BASE_TARGET_TOLERANCE", "SCALE_FACTOR_MIN", "SCALE_FACTOR_MAX"]),
    (
        "Copy Number Settings",
        &[
            "COPY_NUMBER_MEDIAN_DEVIATION_THRESHOLD",
            "COPY_NUMBER_BASELINE_MIN_CHROMS",
            "ANEUPLOIDY_DEVIATION_THRESHOLD",
            "EXPECTED_COPY_NUMBERS",
            "EUPLOID_TOLERANCE",
            "ANEUPLOIDY_TOLERANCE",
            "ANEUPLOIDY_TARGETS",
        ],
    ),
    (
        "Visualization Settings",
        &[
            "COMPOSITE_FIGURE_SIZE",
            "COMPOSITE_DPI",
            "INDIVIDUAL_FIGURE_SIZE",
            "INDIVIDUAL_DPI",
            "COMPOSITE_PLOT_SIZE",
            "COMPOSITE_PLOT_DPI",
            "X_AXIS_MIN",
            "X_AXIS_MAX",
            "Y_AXIS_MIN",
            "Y_AXIS_MAX",
            "X_GRID_INTERVAL",
            "Y_GRID_INTERVAL",
            "TARGET_COLORS",
        ],
    ),
    (
        "File Management",
        &[
            "GRAPHS_DIR_NAME",
            "RAW_DATA_DIR_NAME",
            "CSV_EXTENSION",
            "COMPOSITE_IMAGE_FILENAME",
            "PLATE_REPORT_FILENAME",
            "LIST_REPORT_FILENAME",
        ],
    ),
    ("Template Parsing", &["TEMPLATE_SEARCH_PARENT_LEVELS", "TEMPLATE_PATTERNS"]),
    ("Well Management", &["PLATE_ROWS", "PLATE_COLS", "WELL_FORMAT"]),
];

/// Render every setting grouped by category.
pub fn render_config(config: &Config) -> String {
    let settings = config.all_settings();
    let rule = "=".repeat(80);
    let mut out = format!("{rule}\n{:^80}\n{rule}\n\n", "ddQuint Configuration Settings");

    for (category, keys) in CATEGORIES {
        out.push_str(category);
        out.push('\n');
        out.push_str(&"-".repeat(category.len()));
        out.push('\n');
        for key in *keys {
            match settings.get(*key) {
                Some(value) => out.push_str(&format!("{key}: {}\n", format_value(value))),
                None => warn!("Setting key not found in configuration: {key}"),
            }
        }
        out.push('\n');
    }

    out.push_str(&rule);
    out.push_str("\nConfiguration options:\n");
    out.push_str("- View settings:        ddquint --show-config\n");
    out.push_str("- Generate a template:  ddquint --config-template [DIR]\n");
    out.push_str("- Use a custom config:  ddquint --config your_config.json\n");
    out
}

pub fn display_config(config: &Config) {
    print!("{}", render_config(config));
}

fn format_value(value: &Value) -> String {
    let compact = value.to_string();
    if compact.len() > 60 && (value.is_object() || value.is_array()) {
        let pretty = serde_json::to_string_pretty(value).unwrap_or(compact);
        let indented: Vec<String> = pretty.lines().map(|l| format!("    {l}")).collect();
        format!("\n{}", indented.join("\n"))
    } else {
        compact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_key_exists() {
        let settings = Config::default().all_settings();
        for (_, keys) in CATEGORIES {
            for key in *keys {
                assert!(settings.contains_key(*key), "missing {key}");
            }
        }
    }

    #[test]
    fn long_maps_are_indented() {
        let text = render_config(&Config::default());
        assert!(text.contains("Clustering Settings"));
        assert!(text.contains("X_AXIS_MAX: 3000.0"));
        assert!(text.contains("EXPECTED_CENTROIDS: \n    {"));
    }
}
