use std::collections::{BTreeMap, HashMap};

use linfa::traits::Transformer;
use linfa_clustering::Dbscan;
use ndarray::Array2;
use tracing::{debug, info};

use crate::analysis::copy_number::{calculate_copy_numbers, classify_states};
use crate::config::Config;
use crate::error::{DdQuintError, Result};
use crate::models::{ClusteringResult, Droplet, LabelledDroplet, UNKNOWN_LABEL};

/// Z-score both channels; a flat channel is only centred.
fn standardize(droplets: &[Droplet]) -> Array2<f64> {
    let n = droplets.len() as f64;
    let stats = |f: fn(&Droplet) -> f64| {
        let mean = droplets.iter().map(f).sum::<f64>() / n;
        let var = droplets.iter().map(|d| (f(d) - mean).powi(2)).sum::<f64>() / n;
        let std = if var > 0.0 { var.sqrt() } else { 1.0 };
        (mean, std)
    };
    let (m1, s1) = stats(|d| d.ch1);
    let (m2, s2) = stats(|d| d.ch2);

    let mut x = Array2::<f64>::zeros((droplets.len(), 2));
    for (i, d) in droplets.iter().enumerate() {
        x[[i, 0]] = (d.ch1 - m1) / s1;
        x[[i, 1]] = (d.ch2 - m2) / s2;
    }
    x
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Spread of the observed FAM amplitudes relative to the spread of the
/// expected centroids; used to shrink matching tolerance on compressed runs.
pub fn estimate_scale_factor(droplets: &[Droplet], config: &Config) -> f64 {
    let expected: Vec<f64> = config.expected_centroids.values().map(|c| c[0]).collect();
    let expected_span = expected.iter().cloned().fold(f64::MIN, f64::max)
        - expected.iter().cloned().fold(f64::MAX, f64::min);
    if droplets.is_empty() || expected_span <= 0.0 {
        return 1.0;
    }

    let mut ch1: Vec<f64> = droplets.iter().map(|d| d.ch1).collect();
    ch1.sort_by(|a, b| a.total_cmp(b));
    let observed = percentile(&ch1, 0.99) - percentile(&ch1, 0.01);
    observed / expected_span
}

/// Mean raw amplitudes per cluster id
pub fn cluster_centroids(droplets: &[Droplet], labels: &[Option<usize>]) -> BTreeMap<usize, [f64; 2]> {
    let mut sums: BTreeMap<usize, ([f64; 2], usize)> = BTreeMap::new();
    for (d, label) in droplets.iter().zip(labels) {
        if let Some(cluster) = label {
            let entry = sums.entry(*cluster).or_insert(([0.0, 0.0], 0));
            entry.0[0] += d.ch1;
            entry.0[1] += d.ch2;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(c, (s, n))| (c, [s[0] / n as f64, s[1] / n as f64]))
        .collect()
}

/// Greedy target assignment.
///
/// Targets are visited in label order (Negative, then chromosomes in
/// numeric order). Each takes the nearest still-unassigned cluster when it
/// lies within that target's tolerance. Clusters left over are `Unknown`.
pub fn assign_targets(
    centroids: &BTreeMap<usize, [f64; 2]>,
    tolerance: &BTreeMap<String, f64>,
    config: &Config,
) -> HashMap<usize, String> {
    let mut mapping: HashMap<usize, String> =
        centroids.keys().map(|c| (*c, UNKNOWN_LABEL.to_string())).collect();
    let mut remaining: Vec<usize> = centroids.keys().copied().collect();

    let targets = config.ordered_labels();
    for target in targets.iter().filter(|t| t.as_str() != UNKNOWN_LABEL) {
        if remaining.is_empty() {
            break;
        }
        let Some(expected) = config.expected_centroids.get(target) else {
            continue;
        };
        let nearest = remaining
            .iter()
            .enumerate()
            .map(|(pos, c)| {
                let centroid = centroids[c];
                let d = (centroid[0] - expected[0]).hypot(centroid[1] - expected[1]);
                (pos, *c, d)
            })
            .min_by(|a, b| a.2.total_cmp(&b.2));

        let tol = tolerance.get(target).copied().unwrap_or(config.base_target_tolerance);
        if let Some((pos, cluster, distance)) = nearest {
            if distance < tol {
                debug!("Cluster {} -> {} (distance {:.1})", cluster, target, distance);
                mapping.insert(cluster, target.clone());
                remaining.remove(pos);
            }
        }
    }
    mapping
}

/// Cluster one well's droplets and derive counts, copy numbers and states.
pub fn analyze_droplets(droplets: &[Droplet], config: &Config, well: Option<&str>) -> Result<ClusteringResult> {
    if droplets.len() < config.min_points_for_clustering {
        return Err(DdQuintError::clustering(
            format!(
                "Not enough data points for clustering: {} < {}",
                droplets.len(),
                config.min_points_for_clustering
            ),
            well,
        ));
    }

    let x = standardize(droplets);
    let labels = Dbscan::params(config.cluster_min_points)
        .tolerance(config.cluster_epsilon)
        .transform(&x)
        .map_err(|e| DdQuintError::clustering(format!("DBSCAN failed: {e}"), well))?;
    let labels: Vec<Option<usize>> = labels.to_vec();

    let centroids = cluster_centroids(droplets, &labels);
    if centroids.is_empty() {
        info!("No clusters found{}", well.map(|w| format!(" in well {w}")).unwrap_or_default());
        return Ok(ClusteringResult::empty());
    }

    let scale = estimate_scale_factor(droplets, config);
    let tolerance = config.target_tolerance(scale);
    let mapping = assign_targets(&centroids, &tolerance, config);

    let filtered: Vec<LabelledDroplet> = droplets
        .iter()
        .zip(&labels)
        .filter_map(|(d, label)| {
            label.map(|cluster| LabelledDroplet {
                droplet: *d,
                cluster,
                label: mapping
                    .get(&cluster)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
            })
        })
        .collect();

    let counts: BTreeMap<String, usize> = config
        .ordered_labels()
        .into_iter()
        .map(|label| {
            let n = filtered.iter().filter(|d| d.label == label).count();
            (label, n)
        })
        .collect();

    let copy_numbers = calculate_copy_numbers(&counts, &config.chromosome_keys(), config);
    let (copy_number_states, has_aneuploidy, has_buffer_zone) = classify_states(&copy_numbers, config);
    debug!(
        "{} clusters, {} droplets kept, aneuploidy={}, buffer_zone={}",
        centroids.len(),
        filtered.len(),
        has_aneuploidy,
        has_buffer_zone
    );

    Ok(ClusteringResult {
        filtered: Some(filtered),
        target_mapping: Some(mapping),
        counts,
        copy_numbers,
        copy_number_states,
        has_aneuploidy,
        has_buffer_zone,
    })
}
