use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const NEGATIVE_LABEL: &str = "Negative";
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One droplet read from an amplitude CSV.
///
/// `index` is the row position in the cleaned droplet list so that
/// clustered droplets can be matched back against the raw data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Droplet {
    pub index: usize,
    /// FAM amplitude
    pub ch1: f64,
    /// HEX amplitude
    pub ch2: f64,
}

/// A droplet that survived noise filtering, with its cluster and target label
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledDroplet {
    pub droplet: Droplet,
    pub cluster: usize,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyNumberState {
    Euploid,
    BufferZone,
    Aneuploidy,
}

impl fmt::Display for CopyNumberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CopyNumberState::Euploid => "euploid",
            CopyNumberState::BufferZone => "buffer_zone",
            CopyNumberState::Aneuploidy => "aneuploidy",
        };
        write!(f, "{s}")
    }
}

/// Output of the clustering stage for one well
#[derive(Debug, Clone, Default)]
pub struct ClusteringResult {
    /// Droplets with noise removed; `None` when clustering never ran
    pub filtered: Option<Vec<LabelledDroplet>>,
    /// Cluster id → target label; `None` when clustering never ran
    pub target_mapping: Option<HashMap<usize, String>>,
    pub counts: BTreeMap<String, usize>,
    pub copy_numbers: BTreeMap<String, f64>,
    pub copy_number_states: BTreeMap<String, CopyNumberState>,
    pub has_aneuploidy: bool,
    pub has_buffer_zone: bool,
}

impl ClusteringResult {
    /// Result for a well where no cluster survived noise filtering
    pub fn empty() -> Self {
        Self {
            filtered: Some(Vec::new()),
            target_mapping: Some(HashMap::new()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.as_ref().map_or(true, |f| f.is_empty())
    }
}

/// Per-well result record handed from processing to plotting and reporting
#[derive(Debug, Clone)]
pub struct WellResult {
    pub well: String,
    pub filename: String,
    pub sample_name: Option<String>,
    pub graph_path: PathBuf,
    pub clustering: ClusteringResult,
    pub error: Option<String>,
    /// Set only while the composite image is being assembled
    pub temp_graph_path: Option<PathBuf>,
}

impl WellResult {
    pub fn has_aneuploidy(&self) -> bool {
        self.clustering.has_aneuploidy
    }

    pub fn has_buffer_zone(&self) -> bool {
        self.clustering.has_buffer_zone
    }

    /// Title used on plots: sample name when known, else the well id
    pub fn display_name(&self) -> &str {
        self.sample_name.as_deref().unwrap_or(&self.well)
    }
}
