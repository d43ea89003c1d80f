//! Sensitivity and specificity of somatic calls against expected mutations

use crate::utils::round3;
use crate::vcf::{open_variant_file, VariantRecord, VariantSource};
use crate::{ExpectedMutation, MetricsConfig, MetricsError, MetricsResult, MetricsRow};
use std::path::Path;

/// Validate metrics configuration parameters
pub fn validate_metrics_config(config: &MetricsConfig) -> MetricsResult<()> {
    if config.assumed_total_negatives == 0 {
        return Err(MetricsError::InvalidConfig(
            "assumed_total_negatives must be greater than 0".to_string(),
        ));
    }

    if !(config.max_allele_frequency > 0.0 && config.max_allele_frequency <= 1.0) {
        return Err(MetricsError::InvalidConfig(
            "max_allele_frequency must be in (0, 1]".to_string(),
        ));
    }

    if config.frequency_field.is_empty() {
        return Err(MetricsError::InvalidConfig(
            "frequency_field must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Outcome of classifying one admitted call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    TruePositive,
    FalsePositive,
}

/// Whether a call takes part in the scan: PASS and below the frequency cap
pub fn is_admitted(record: &VariantRecord, config: &MetricsConfig) -> bool {
    if !record.is_pass() {
        return false;
    }

    match record.first_info_float(&config.frequency_field) {
        Some(freq) => freq < config.max_allele_frequency,
        None => {
            log::debug!(
                "{}:{} has no usable {} value, skipping",
                record.chrom,
                record.pos,
                config.frequency_field
            );
            false
        }
    }
}

/// Classify a call by membership of its locus in the expectation set
pub fn classify(record: &VariantRecord, expectations: &[ExpectedMutation]) -> CallClass {
    let chrom = record.normalized_chrom();
    let pos = record.pos.to_string();

    if expectations.iter().any(|e| e.matches(chrom, &pos)) {
        CallClass::TruePositive
    } else {
        CallClass::FalsePositive
    }
}

/// Trimmed indel representation of a multi-base call as (ref, alt).
///
/// Returns `None` for single-base alleles. Matching is positional only, so
/// this representation is reported but not applied.
pub fn indel_representation(record: &VariantRecord) -> Option<(String, String)> {
    let ref_allele = record.ref_allele()?;
    let alt_allele = record.alt_allele().unwrap_or(".");

    if let Some(deleted) = allele_tail(ref_allele) {
        Some((deleted, "-".to_string()))
    } else {
        allele_tail(alt_allele).map(|inserted| ("-".to_string(), inserted))
    }
}

/// Allele after its anchor base, split on a char boundary
fn allele_tail(allele: &str) -> Option<String> {
    let mut chars = allele.chars();
    chars.next()?;
    let rest = chars.as_str();
    (!rest.is_empty()).then(|| rest.to_string())
}

/// Derive a metrics row from call counts
pub fn derive_metrics(
    file_name: &str,
    expectation_count: usize,
    true_positive: u32,
    false_positive: u32,
    config: &MetricsConfig,
) -> MetricsResult<MetricsRow> {
    if expectation_count == 0 {
        return Err(MetricsError::UndefinedMetric(format!(
            "sensitivity of {} has no expected mutations to divide by",
            file_name
        )));
    }

    let called = true_positive + false_positive;
    if called > config.assumed_total_negatives {
        return Err(MetricsError::UndefinedMetric(format!(
            "{} admitted calls in {} exceed the assumed {} total negatives",
            called, file_name, config.assumed_total_negatives
        )));
    }

    let true_negative = config.assumed_total_negatives - called;
    if true_negative + false_positive == 0 {
        return Err(MetricsError::UndefinedMetric(format!(
            "specificity of {} has no negatives to divide by",
            file_name
        )));
    }

    let sensitivity = round3(true_positive as f64 / expectation_count as f64);
    let specificity =
        round3(true_negative as f64 / (true_negative + false_positive) as f64);

    Ok(MetricsRow {
        file_name: file_name.to_string(),
        expectation_count,
        true_positive,
        false_positive,
        sensitivity,
        specificity,
    })
}

/// Scan any variant source and compute its metrics row
pub fn compute_metrics_from_source(
    file_name: &str,
    source: &mut dyn VariantSource,
    expectations: &[ExpectedMutation],
    config: &MetricsConfig,
) -> MetricsResult<MetricsRow> {
    if expectations.is_empty() {
        log::warn!(
            "No expected mutations for {}, sensitivity will be undefined",
            file_name
        );
    }

    let mut true_positive = 0u32;
    let mut false_positive = 0u32;
    let mut scanned = 0usize;

    for record in source.records() {
        let record = record?;
        scanned += 1;
        if !is_admitted(&record, config) {
            continue;
        }

        if let Some((ref_allele, alt_allele)) = indel_representation(&record) {
            log::debug!(
                "{}:{} is a multi-base call ({} > {}); matched on position only",
                record.chrom,
                record.pos,
                ref_allele,
                alt_allele
            );
        }

        match classify(&record, expectations) {
            CallClass::TruePositive => true_positive += 1,
            CallClass::FalsePositive => false_positive += 1,
        }
    }

    log::debug!(
        "{}: {} records scanned, TP={} FP={}",
        file_name,
        scanned,
        true_positive,
        false_positive
    );

    derive_metrics(
        file_name,
        expectations.len(),
        true_positive,
        false_positive,
        config,
    )
}

/// Compute the metrics row of one variant file.
///
/// Open and parse failures surface as [`MetricsError::VariantFile`]; an empty
/// expectation set or a zero denominator as [`MetricsError::UndefinedMetric`].
pub fn compute_metrics<P: AsRef<Path>>(
    file_path: P,
    expectations: &[ExpectedMutation],
    config: &MetricsConfig,
) -> MetricsResult<MetricsRow> {
    let path = file_path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut source = open_variant_file(path).map_err(|e| MetricsError::variant_file(path, e))?;

    compute_metrics_from_source(&file_name, source.as_mut(), expectations, config).map_err(
        |e| match e {
            MetricsError::UndefinedMetric(_) => e,
            other => MetricsError::variant_file(path, other),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn expectation(chrom: &str, pos: &str) -> ExpectedMutation {
        ExpectedMutation::new("S1".to_string(), chrom.to_string(), pos.to_string())
    }

    fn write_vcf(lines: &[String]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".vcf").tempfile().unwrap();
        writeln!(file, "##fileformat=VCFv4.2").unwrap();
        writeln!(file, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO").unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn call(chrom: &str, pos: u64, filter: &str, maf: f64) -> String {
        format!("{}\t{}\t.\tA\tT\t.\t{}\tMAF={}", chrom, pos, filter, maf)
    }

    /// Ten admitted calls, three of them at expected loci
    fn scenario_file() -> NamedTempFile {
        let mut lines: Vec<String> = (1..=10)
            .map(|i| call("chr1", i * 1000, "PASS", 0.05))
            .collect();
        // Not admitted: filtered, or at/above the frequency cap
        lines.push(call("chr1", 1000, "LowQual", 0.05));
        lines.push(call("chr1", 2000, "PASS", 0.1));
        lines.push(call("chr1", 3000, "PASS", 0.45));
        write_vcf(&lines)
    }

    fn scenario_expectations() -> Vec<ExpectedMutation> {
        vec![
            expectation("1", "1000"),
            expectation("1", "2000"),
            expectation("1", "3000"),
            expectation("2", "555"),
            expectation("3", "777"),
        ]
    }

    #[test]
    fn test_compute_metrics_scenario() {
        let file = scenario_file();
        let config = MetricsConfig::default();
        let row = compute_metrics(file.path(), &scenario_expectations(), &config).unwrap();

        assert_eq!(row.expectation_count, 5);
        assert_eq!(row.true_positive, 3);
        assert_eq!(row.false_positive, 7);
        assert_eq!(row.sensitivity, 0.6);
        assert_eq!(row.specificity, 0.958);
        assert_eq!(
            row.file_name,
            file.path().file_name().unwrap().to_string_lossy()
        );
    }

    #[test]
    fn test_compute_metrics_is_idempotent() {
        let file = scenario_file();
        let config = MetricsConfig::default();
        let expectations = scenario_expectations();
        let first = compute_metrics(file.path(), &expectations, &config).unwrap();
        let second = compute_metrics(file.path(), &expectations, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_expectations_is_undefined() {
        let file = scenario_file();
        match compute_metrics(file.path(), &[], &MetricsConfig::default()) {
            Err(MetricsError::UndefinedMetric(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_no_admitted_calls() {
        let file = write_vcf(&[call("chr1", 1000, "LowQual", 0.01)]);
        let row = compute_metrics(
            file.path(),
            &[expectation("1", "1000")],
            &MetricsConfig::default(),
        )
        .unwrap();

        assert_eq!(row.true_positive, 0);
        assert_eq!(row.false_positive, 0);
        assert_eq!(row.sensitivity, 0.0);
        assert_eq!(row.specificity, 1.0);
    }

    #[test]
    fn test_one_expectation_matches_many_calls() {
        let file = write_vcf(&[
            call("chr1", 1000, "PASS", 0.01),
            call("1", 1000, "PASS", 0.02),
        ]);
        let row = compute_metrics(
            file.path(),
            &[expectation("1", "1000"), expectation("1", "2000")],
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_eq!(row.true_positive, 2);
        assert_eq!(row.false_positive, 0);
        assert_eq!(row.sensitivity, 1.0);
    }

    #[test]
    fn test_missing_file_is_variant_file_error() {
        match compute_metrics(
            "/nonexistent/S1.vcf",
            &[expectation("1", "1")],
            &MetricsConfig::default(),
        ) {
            Err(MetricsError::VariantFile { path, .. }) => assert_eq!(path, "/nonexistent/S1.vcf"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_file_is_variant_file_error() {
        let file = write_vcf(&["chr1\tnot_a_position\t.\tA\tT\t.\tPASS\tMAF=0.01".to_string()]);
        let result = compute_metrics(
            file.path(),
            &[expectation("1", "1")],
            &MetricsConfig::default(),
        );
        assert!(matches!(result, Err(MetricsError::VariantFile { .. })));
    }

    #[test]
    fn test_missing_frequency_is_not_admitted() {
        let config = MetricsConfig::default();
        let record = VariantRecord::from_line("1\t5\t.\tA\tT\t.\tPASS\tDP=10").unwrap();
        assert!(!is_admitted(&record, &config));

        let record = VariantRecord::from_line("1\t5\t.\tA\tT\t.\tPASS\tMAF=.").unwrap();
        assert!(!is_admitted(&record, &config));

        let record = VariantRecord::from_line("1\t5\t.\tA\tT\t.\tPASS\tMAF=0.09,0.5").unwrap();
        assert!(is_admitted(&record, &config));
    }

    #[test]
    fn test_custom_frequency_field() {
        let config = MetricsConfig {
            frequency_field: "AF".to_string(),
            max_allele_frequency: 0.5,
            ..Default::default()
        };
        let record = VariantRecord::from_line("1\t5\t.\tA\tT\t.\tPASS\tAF=0.3").unwrap();
        assert!(is_admitted(&record, &config));
    }

    #[test]
    fn test_compute_metrics_on_bcf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tumour.bcf");
        crate::vcf::tests::write_bcf(
            &path,
            &[
                ("chr1", 1000, "PASS", 0.05),
                ("chr1", 2000, "PASS", 0.05),
                ("chr1", 5000, "LowQual", 0.05),
                ("chr1", 6000, "PASS", 0.5),
                ("chr2", 555, "PASS", 0.01),
                ("chr2", 900, "PASS", 0.01),
            ],
        );

        let row = compute_metrics(&path, &scenario_expectations(), &MetricsConfig::default())
            .unwrap();
        assert_eq!(row.file_name, "tumour.bcf");
        assert_eq!(row.true_positive, 3);
        assert_eq!(row.false_positive, 1);
        assert_eq!(row.sensitivity, 0.6);
        assert_eq!(row.specificity, 0.994);
    }

    #[test]
    fn test_indel_representation() {
        let snv = VariantRecord::from_line("1\t5\t.\tA\tT\t.\tPASS\t.").unwrap();
        assert_eq!(indel_representation(&snv), None);

        let deletion = VariantRecord::from_line("1\t5\t.\tACG\tA\t.\tPASS\t.").unwrap();
        assert_eq!(
            indel_representation(&deletion),
            Some(("CG".to_string(), "-".to_string()))
        );

        let insertion = VariantRecord::from_line("1\t5\t.\tA\tATT\t.\tPASS\t.").unwrap();
        assert_eq!(
            indel_representation(&insertion),
            Some(("-".to_string(), "TT".to_string()))
        );
    }

    #[test]
    fn test_non_ascii_alleles_do_not_panic() {
        let single = VariantRecord::from_line("1\t5\t.\té\tT\t.\tPASS\t.").unwrap();
        assert_eq!(indel_representation(&single), None);

        let multi = VariantRecord::from_line("1\t5\t.\téA\tT\t.\tPASS\t.").unwrap();
        assert_eq!(
            indel_representation(&multi),
            Some(("A".to_string(), "-".to_string()))
        );

        let file = write_vcf(&[
            "chr1\t1000\t.\té\tT\t.\tPASS\tMAF=0.01".to_string(),
            "chr1\t2000\t.\tA\téé\t.\tPASS\tMAF=0.01".to_string(),
        ]);
        let row =
            compute_metrics(file.path(), &scenario_expectations(), &MetricsConfig::default())
                .unwrap();
        assert_eq!(row.true_positive, 2);
        assert_eq!(row.false_positive, 0);
    }

    #[test]
    fn test_derive_metrics_denominators() {
        let config = MetricsConfig {
            assumed_total_negatives: 10,
            ..Default::default()
        };
        let row = derive_metrics("f.vcf", 4, 2, 3, &config).unwrap();
        assert_eq!(row.sensitivity, 0.5);
        assert_eq!(row.specificity, 0.625);

        assert!(matches!(
            derive_metrics("f.vcf", 4, 10, 0, &config),
            Err(MetricsError::UndefinedMetric(_))
        ));
        assert!(matches!(
            derive_metrics("f.vcf", 4, 8, 3, &config),
            Err(MetricsError::UndefinedMetric(_))
        ));
        assert!(derive_metrics("f.vcf", 4, 7, 3, &config).is_ok());
    }

    #[test]
    fn test_validate_metrics_config() {
        assert!(validate_metrics_config(&MetricsConfig::default()).is_ok());

        let invalid = MetricsConfig {
            assumed_total_negatives: 0,
            ..Default::default()
        };
        assert!(validate_metrics_config(&invalid).is_err());

        let invalid = MetricsConfig {
            max_allele_frequency: 0.0,
            ..Default::default()
        };
        assert!(validate_metrics_config(&invalid).is_err());

        let invalid = MetricsConfig {
            frequency_field: String::new(),
            ..Default::default()
        };
        assert!(validate_metrics_config(&invalid).is_err());
    }
}
