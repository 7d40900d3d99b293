use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::data_handling::well_utils::column_first_key;
use crate::error::{DdQuintError, Result};
use crate::models::WellResult;
use crate::reporting::{chromosome_label, format_copy_number, format_count, format_state, report_sample_name};

const REPORT_TYPE: &str = "list";

pub fn well_status(result: &WellResult) -> &'static str {
    if result.error.is_some() {
        "Error"
    } else if result.has_buffer_zone() {
        "Buffer zone"
    } else if result.has_aneuploidy() {
        "Aneuploidy"
    } else {
        "Euploid"
    }
}

/// Write one line per well, column-first (A01, B01, …, H12).
///
/// Two header lines: section titles, then chromosome labels under the
/// relative, absolute and state sections.
pub fn create_list_report(results: &[WellResult], output_path: &Path, config: &Config) -> Result<PathBuf> {
    if results.is_empty() {
        return Err(DdQuintError::report("No results to report", REPORT_TYPE));
    }
    let chromosomes = config.chromosome_keys();
    let n = chromosomes.len();

    let mut sections = vec!["Well".to_string(), "Sample".to_string(), "Status".to_string()];
    sections.push("Relative Copy Number".to_string());
    sections.extend(std::iter::repeat(String::new()).take(n.saturating_sub(1)));
    sections.push("Absolute Copy Number".to_string());
    sections.extend(std::iter::repeat(String::new()).take(n.saturating_sub(1)));
    sections.push("Copy Number State".to_string());
    sections.extend(std::iter::repeat(String::new()).take(n.saturating_sub(1)));

    let labels: Vec<String> = chromosomes.iter().map(|c| chromosome_label(c)).collect();
    let mut subheader = vec![String::new(); 3];
    subheader.extend(labels.iter().cloned());
    subheader.extend(labels.iter().cloned());
    subheader.extend(labels);

    let mut sorted: Vec<&WellResult> = results.iter().collect();
    sorted.sort_by_key(|r| column_first_key(&r.well));

    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(&sections)?;
    wtr.write_record(&subheader)?;
    for r in sorted {
        let mut line = vec![r.well.clone(), report_sample_name(r), well_status(r).to_string()];
        line.extend(chromosomes.iter().map(|c| format_copy_number(r.clustering.copy_numbers.get(c))));
        line.extend(chromosomes.iter().map(|c| format_count(r.clustering.counts.get(c))));
        line.extend(chromosomes.iter().map(|c| format_state(r.clustering.copy_number_states.get(c))));
        wtr.write_record(&line)?;
    }
    wtr.flush()?;
    info!("List report saved to {}", output_path.display());
    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CopyNumberState;
    use crate::reporting::tests::{result_with, with_state};

    #[test]
    fn status_precedence() {
        let mut r = result_with("A01", None, &[]);
        assert_eq!(well_status(&r), "Euploid");
        r.clustering.has_aneuploidy = true;
        assert_eq!(well_status(&r), "Aneuploidy");
        r.clustering.has_buffer_zone = true;
        assert_eq!(well_status(&r), "Buffer zone");
        r.error = Some("Not enough data points: 3".into());
        assert_eq!(well_status(&r), "Error");
    }

    #[test]
    fn lines_are_sorted_column_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("List_Results.csv");
        let config = Config::default();
        let gained = result_with("A02", Some("Trisomy"), &[("Chrom1", 1.0), ("Chrom2", 1.52)]);
        let gained = with_state(gained, "Chrom1", CopyNumberState::Euploid);
        let gained = with_state(gained, "Chrom2", CopyNumberState::Aneuploidy);
        let results = vec![gained, result_with("B01", None, &[("Chrom1", 0.99)]), result_with("A01", Some("Ctrl"), &[])];
        create_list_report(&results, &path, &config).unwrap();

        let lines: Vec<Vec<String>> = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .unwrap()
            .records()
            .map(|r| r.unwrap().iter().map(str::to_owned).collect())
            .collect();
        let n = config.chromosome_keys().len();

        assert_eq!(lines[0][..4], ["Well", "Sample", "Status", "Relative Copy Number"]);
        assert_eq!(lines[0][3 + n], "Absolute Copy Number");
        assert_eq!(lines[1][3], "Chr1");
        assert_eq!(lines[1][3 + n], "Chr1");
        assert_eq!(lines[0][3 + 2 * n], "Copy Number State");
        assert_eq!(lines[1][3 + 2 * n + 1], "Chr2");
        assert!(lines.iter().all(|l| l.len() == 3 + 3 * n));

        let wells: Vec<&str> = lines[2..].iter().map(|l| l[0].as_str()).collect();
        assert_eq!(wells, vec!["A01", "B01", "A02"]);

        let a02 = &lines[4];
        assert_eq!(a02[1], "Trisomy");
        assert_eq!(a02[2], "Aneuploidy");
        assert_eq!(a02[4], "1.52");
        assert_eq!(a02[3 + n + 1], "100");
        assert_eq!(a02[3 + n + 2], "");
        assert_eq!(a02[3 + 2 * n], "euploid");
        assert_eq!(a02[3 + 2 * n + 1], "aneuploidy");
        assert_eq!(a02[3 + 2 * n + 2], "");
        // no classification recorded
        assert_eq!(lines[2][3 + 2 * n], "");
        assert_eq!(lines[3][1], "run_B01_Amplitude");
    }

    #[test]
    fn no_results_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_list_report(&[], &dir.path().join("l.csv"), &Config::default()).is_err());
    }
}
