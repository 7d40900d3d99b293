use std::collections::BTreeMap;

use serde::Serialize;
use statrs::statistics::{Data, Median, Statistics};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{CopyNumberState, WellResult};

fn median(values: &[f64]) -> f64 {
    Data::new(values.to_vec()).median()
}

/// Relative copy numbers for every chromosome with a non-zero count.
///
/// The baseline is the mean of the counts lying within the median
/// deviation threshold of the median non-zero count, provided at least
/// `copy_number_baseline_min_chroms` of them do; otherwise the median.
pub fn calculate_copy_numbers(
    counts: &BTreeMap<String, usize>,
    chromosomes: &[String],
    config: &Config,
) -> BTreeMap<String, f64> {
    let raw: Vec<(&String, f64)> = chromosomes
        .iter()
        .map(|c| (c, counts.get(c).copied().unwrap_or(0) as f64))
        .collect();

    let non_zero: Vec<f64> = raw.iter().map(|(_, v)| *v).filter(|v| *v > 0.0).collect();
    if non_zero.is_empty() {
        return BTreeMap::new();
    }
    let median_val = median(&non_zero);

    let close: Vec<f64> = raw
        .iter()
        .map(|(_, v)| *v)
        .filter(|v| (v - median_val).abs() / median_val < config.copy_number_median_deviation_threshold)
        .collect();
    let baseline = if close.len() >= config.copy_number_baseline_min_chroms {
        close.iter().mean()
    } else {
        median_val
    };
    debug!("Copy number baseline {:.2} from {} close counts", baseline, close.len());

    if baseline <= 0.0 {
        return BTreeMap::new();
    }
    raw.into_iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(c, v)| (c.clone(), v / baseline))
        .collect()
}

/// Per-chromosome states plus the well-level aneuploidy and buffer-zone flags.
pub fn classify_states(
    copy_numbers: &BTreeMap<String, f64>,
    config: &Config,
) -> (BTreeMap<String, CopyNumberState>, bool, bool) {
    let mut states = BTreeMap::new();
    for (chrom, &value) in copy_numbers {
        match config.classify_copy_number_state(chrom, value) {
            Ok(state) => {
                states.insert(chrom.clone(), state);
            }
            Err(e) => warn!("Skipping classification of {}: {}", chrom, e),
        }
    }
    let has_aneuploidy = states.values().any(|s| *s == CopyNumberState::Aneuploidy);
    let has_buffer_zone = states.values().any(|s| *s == CopyNumberState::BufferZone);
    (states, has_aneuploidy, has_buffer_zone)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AberrationKind {
    Gain,
    Loss,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aberration {
    pub copy_number: f64,
    pub deviation: f64,
    pub kind: AberrationKind,
}

/// Chromosomes whose copy number deviates from 1.0 by more than `threshold`
pub fn detect_aneuploidies(
    copy_numbers: &BTreeMap<String, f64>,
    threshold: f64,
) -> BTreeMap<String, Aberration> {
    copy_numbers
        .iter()
        .filter_map(|(chrom, &copy_number)| {
            let deviation = (copy_number - 1.0).abs();
            (deviation > threshold).then(|| {
                let kind = if copy_number > 1.0 { AberrationKind::Gain } else { AberrationKind::Loss };
                (chrom.clone(), Aberration { copy_number, deviation, kind })
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChromosomeStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateStatistics {
    pub sample_count: usize,
    pub abnormal_count: usize,
    pub abnormal_percent: f64,
    pub chromosomes: BTreeMap<String, ChromosomeStats>,
}

/// Copy-number summary across all wells of a run
pub fn calculate_statistics(results: &[WellResult], config: &Config) -> PlateStatistics {
    let sample_count = results.len();
    let abnormal_count = results.iter().filter(|r| r.has_aneuploidy()).count();
    let abnormal_percent = if sample_count > 0 {
        abnormal_count as f64 / sample_count as f64 * 100.0
    } else {
        0.0
    };

    let mut chromosomes = BTreeMap::new();
    for chrom in config.chromosome_keys() {
        let values: Vec<f64> = results
            .iter()
            .filter_map(|r| r.clustering.copy_numbers.get(&chrom).copied())
            .collect();
        if values.is_empty() {
            continue;
        }
        chromosomes.insert(
            chrom,
            ChromosomeStats {
                count: values.len(),
                mean: values.iter().mean(),
                median: median(&values),
                std: values.iter().population_std_dev(),
                min: Statistics::min(values.iter()),
                max: Statistics::max(values.iter()),
            },
        );
    }

    PlateStatistics { sample_count, abnormal_count, abnormal_percent, chromosomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClusteringResult;
    use std::path::PathBuf;

    fn counts(values: &[(&str, usize)]) -> BTreeMap<String, usize> {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn chroms() -> Vec<String> {
        Config::default().chromosome_keys()
    }

    #[test]
    fn baseline_is_mean_of_close_counts() {
        let config = Config::default();
        let c = counts(&[
            ("Chrom1", 1000),
            ("Chrom2", 1000),
            ("Chrom3", 1100),
            ("Chrom4", 1500),
            ("Chrom5", 500),
        ]);
        let cn = calculate_copy_numbers(&c, &chroms(), &config);
        // median 1000; close set {1000, 1000, 1100}, baseline 1033.33
        let baseline = 3100.0 / 3.0;
        assert!((cn["Chrom1"] - 1000.0 / baseline).abs() < 1e-9);
        assert!((cn["Chrom4"] - 1500.0 / baseline).abs() < 1e-9);
        assert_eq!(cn.len(), 5);
    }

    #[test]
    fn baseline_falls_back_to_median() {
        let config = Config::default();
        let c = counts(&[("Chrom1", 400), ("Chrom2", 1000), ("Chrom3", 2000)]);
        let cn = calculate_copy_numbers(&c, &chroms(), &config);
        // only 1000 is close to the median of 1000
        assert_eq!(cn["Chrom2"], 1.0);
        assert_eq!(cn["Chrom1"], 0.4);
        assert!(!cn.contains_key("Chrom4"));
    }

    #[test]
    fn all_zero_counts_give_nothing() {
        let config = Config::default();
        assert!(calculate_copy_numbers(&counts(&[("Chrom1", 0)]), &chroms(), &config).is_empty());
    }

    #[test]
    fn states_set_well_flags() {
        let config = Config::default();
        let cn: BTreeMap<String, f64> =
            [("Chrom1".to_string(), 0.97), ("Chrom2".to_string(), 1.25)].into_iter().collect();
        let (states, aneuploid, buffer) = classify_states(&cn, &config);
        assert_eq!(states["Chrom1"], CopyNumberState::Euploid);
        assert_eq!(states["Chrom2"], CopyNumberState::Aneuploidy);
        assert!(aneuploid);
        assert!(!buffer);
    }

    #[test]
    fn aneuploidies_are_tagged() {
        let cn: BTreeMap<String, f64> =
            [("Chrom1".to_string(), 1.3), ("Chrom2".to_string(), 0.7), ("Chrom3".to_string(), 1.05)]
                .into_iter()
                .collect();
        let found = detect_aneuploidies(&cn, 0.15);
        assert_eq!(found.len(), 2);
        assert_eq!(found["Chrom1"].kind, AberrationKind::Gain);
        assert_eq!(found["Chrom2"].kind, AberrationKind::Loss);
    }

    #[test]
    fn statistics_summarise_wells() {
        let config = Config::default();
        let well = |name: &str, cn: f64, aneuploid: bool| WellResult {
            well: name.into(),
            filename: format!("{name}.csv"),
            sample_name: None,
            graph_path: PathBuf::new(),
            clustering: ClusteringResult {
                copy_numbers: [("Chrom1".to_string(), cn)].into_iter().collect(),
                has_aneuploidy: aneuploid,
                ..Default::default()
            },
            error: None,
            temp_graph_path: None,
        };
        let results = vec![well("A01", 1.0, false), well("B01", 1.2, true)];
        let stats = calculate_statistics(&results, &config);
        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.abnormal_count, 1);
        assert_eq!(stats.abnormal_percent, 50.0);
        let c1 = &stats.chromosomes["Chrom1"];
        assert_eq!(c1.count, 2);
        assert!((c1.mean - 1.1).abs() < 1e-9);
        assert!((c1.std - 0.1).abs() < 1e-9);
        assert_eq!(c1.max, 1.2);
    }
}
