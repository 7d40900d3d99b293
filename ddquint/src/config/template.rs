use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use super::Config;
use crate::error::{DdQuintError, Result};

const DEFAULT_TEMPLATE_NAME: &str = "ddquint_config_template.json";

/// Keys users most often adjust for a new assay
const TEMPLATE_KEYS: &[&str] = &[
    "NUM_PROCESSES",
    "CLUSTER_EPSILON",
    "CLUSTER_MIN_POINTS",
    "MIN_POINTS_FOR_CLUSTERING",
    "EXPECTED_CENTROIDS",
    "BASE_TARGET_TOLERANCE",
    "SCALE_FACTOR_MIN",
    "SCALE_FACTOR_MAX",
    "COPY_NUMBER_MEDIAN_DEVIATION_THRESHOLD",
    "COPY_NUMBER_BASELINE_MIN_CHROMS",
    "ANEUPLOIDY_DEVIATION_THRESHOLD",
    "EXPECTED_COPY_NUMBERS",
    "EUPLOID_TOLERANCE",
    "ANEUPLOIDY_TOLERANCE",
    "ANEUPLOIDY_TARGETS",
    "TARGET_COLORS",
];

/// Write a commented JSON template of the commonly modified settings.
///
/// Comment entries use `#`-prefixed keys, which the loader skips, so the
/// generated file can be passed straight back with `--config`.
pub fn generate_config_template(
    config: &Config,
    filename: Option<&str>,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let output_dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&output_dir)?;

    let mut filename = filename.unwrap_or(DEFAULT_TEMPLATE_NAME).to_string();
    if !filename.to_lowercase().ends_with(".json") {
        filename.push_str(".json");
    }
    let path = output_dir.join(filename);
    debug!("Template will be saved to: {}", path.display());

    let template = template_value(config);
    let text = serde_json::to_string_pretty(&template)?;
    fs::write(&path, text).map_err(|e| {
        error!("Failed to write template file: {}", path.display());
        DdQuintError::Config {
            message: format!("Failed to write template file {}: {e}", path.display()),
            key: None,
        }
    })?;

    info!("Configuration template generated: {}", path.display());
    Ok(path)
}

fn template_value(config: &Config) -> Value {
    let settings = config.all_settings();
    let mut template = Map::new();

    let comments = json!({
        "# ddQuint Configuration Template": "Modify the values below and run: ddquint --config <file>",
        "# Classification": "Each chromosome is euploid, aneuploidy or buffer zone",
        "# - Euploid": "Copy number within EUPLOID_TOLERANCE of its expected value",
        "# - Aneuploidy": "Within ANEUPLOIDY_TOLERANCE of the deletion or duplication target",
        "# - Buffer Zone": "Anything between the euploid and aneuploidy ranges",
    });
    if let Value::Object(comments) = comments {
        template.extend(comments);
    }

    for key in TEMPLATE_KEYS {
        if let Some(value) = settings.get(*key) {
            template.insert((*key).to_string(), value.clone());
        }
    }
    Value::Object(template)
}
