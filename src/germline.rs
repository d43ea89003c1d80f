//! Removing germline loci from expectation sets using a baseline call set

use crate::vcf::{open_variant_file, VariantSource};
use crate::{ExpectedMutation, MetricsError, MetricsResult};
use std::path::Path;

/// Drop expectations confirmed as germline by PASS records of a baseline.
///
/// Each PASS baseline record removes the first remaining expectation at the
/// same chromosome and position, if any. The input is left untouched and the
/// surviving expectations are returned in their original order.
pub fn filter_germline(
    expectations: &[ExpectedMutation],
    baseline: &mut dyn VariantSource,
) -> MetricsResult<Vec<ExpectedMutation>> {
    let mut remaining = expectations.to_vec();
    let mut removed = 0;

    for record in baseline.records() {
        let record = record?;
        if !record.is_pass() {
            continue;
        }

        let chrom = record.normalized_chrom();
        let pos = record.pos.to_string();
        if let Some(idx) = remaining.iter().position(|e| e.matches(chrom, &pos)) {
            let germline = remaining.remove(idx);
            log::debug!(
                "Germline locus {}:{} removed from expectations of {}",
                germline.chromosome,
                germline.position,
                germline.sample_id
            );
            removed += 1;
        }
    }

    log::info!(
        "Germline filtering removed {} of {} expectations",
        removed,
        expectations.len()
    );

    Ok(remaining)
}

/// Open a baseline variant file and filter expectations against it
pub fn filter_germline_file<P: AsRef<Path>>(
    expectations: &[ExpectedMutation],
    baseline_path: P,
) -> MetricsResult<Vec<ExpectedMutation>> {
    let path = baseline_path.as_ref();
    let mut baseline =
        open_variant_file(path).map_err(|e| MetricsError::variant_file(path, e))?;
    filter_germline(expectations, baseline.as_mut()).map_err(|e| MetricsError::variant_file(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcf::VariantRecord;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn expectation(chrom: &str, pos: &str) -> ExpectedMutation {
        ExpectedMutation::new("S1".to_string(), chrom.to_string(), pos.to_string())
    }

    fn record(line: &str) -> VariantRecord {
        VariantRecord::from_line(line).unwrap()
    }

    #[test]
    fn test_filter_removes_pass_matches_only() {
        let expectations = vec![
            expectation("1", "100"),
            expectation("2", "200"),
            expectation("3", "300"),
        ];
        let mut baseline = vec![
            record("chr1\t100\t.\tA\tT\t.\tPASS\t."),
            record("chr2\t200\t.\tA\tT\t.\tLowQual\t."),
            record("chr9\t900\t.\tA\tT\t.\tPASS\t."),
        ];

        let filtered = filter_germline(&expectations, &mut baseline).unwrap();
        assert_eq!(filtered, vec![expectation("2", "200"), expectation("3", "300")]);
        // The caller's list is unchanged
        assert_eq!(expectations.len(), 3);
    }

    #[test]
    fn test_filter_removes_one_duplicate_per_record() {
        let expectations = vec![
            expectation("1", "100"),
            expectation("1", "100"),
            expectation("5", "500"),
        ];
        let mut baseline = vec![record("1\t100\t.\tA\tT\t.\tPASS\t.")];
        let filtered = filter_germline(&expectations, &mut baseline).unwrap();
        assert_eq!(filtered, vec![expectation("1", "100"), expectation("5", "500")]);

        let mut baseline = vec![
            record("1\t100\t.\tA\tT\t.\tPASS\t."),
            record("1\t100\t.\tA\tG\t.\tPASS\t."),
            record("1\t100\t.\tA\tC\t.\tPASS\t."),
        ];
        let filtered = filter_germline(&expectations, &mut baseline).unwrap();
        assert_eq!(filtered, vec![expectation("5", "500")]);
    }

    #[test]
    fn test_filter_never_grows() {
        let expectations = vec![expectation("1", "100")];
        let mut baseline: Vec<VariantRecord> = Vec::new();
        assert_eq!(
            filter_germline(&expectations, &mut baseline).unwrap(),
            expectations
        );

        let mut baseline = vec![record("1\t0100\t.\tA\tT\t.\tPASS\t.")];
        // Positions are stringified from integers, so "0100" parses to 100 and matches
        assert!(filter_germline(&expectations, &mut baseline)
            .unwrap()
            .is_empty());

        let padded = vec![expectation("1", "0100")];
        let mut baseline = vec![record("1\t100\t.\tA\tT\t.\tPASS\t.")];
        assert_eq!(filter_germline(&padded, &mut baseline).unwrap(), padded);
    }

    #[test]
    fn test_filter_germline_file() {
        let mut baseline = NamedTempFile::new().unwrap();
        writeln!(baseline, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        writeln!(baseline, "chr1\t100\t.\tA\tT\t.\tPASS\tMAF=0.5").unwrap();
        writeln!(baseline, "chr2\t200\t.\tA\tT\t.\tPASS\tMAF=0.5").unwrap();

        let expectations = vec![expectation("1", "100"), expectation("2", "200")];
        let filtered = filter_germline_file(&expectations, baseline.path()).unwrap();
        assert!(filtered.is_empty());

        match filter_germline_file(&expectations, "/nonexistent/baseline.vcf") {
            Err(MetricsError::VariantFile { path, .. }) => {
                assert_eq!(path, "/nonexistent/baseline.vcf")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_fully_germline_sample_has_undefined_metrics() {
        let expectations = vec![expectation("1", "100")];
        let mut baseline = vec![record("chr1\t100\t.\tA\tT\t.\tPASS\tMAF=0.5")];
        let filtered = filter_germline(&expectations, &mut baseline).unwrap();
        assert!(filtered.is_empty());

        let mut calls = vec![record("chr1\t100\t.\tA\tT\t.\tPASS\tMAF=0.05")];
        let result = crate::metrics::compute_metrics_from_source(
            "tumour.vcf",
            &mut calls,
            &filtered,
            &crate::MetricsConfig::default(),
        );
        assert!(matches!(result, Err(MetricsError::UndefinedMetric(_))));
    }
}
