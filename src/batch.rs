//! Running the metrics calculation over every variant file of a project

use crate::expectations::load_sample_expectations;
use crate::germline::filter_germline_file;
use crate::metadata::MetadataSource;
use crate::metrics::compute_metrics;
use crate::report::{ResultsTable, SkippedFile};
use crate::utils::{log_progress, Timer};
use crate::{MetricsConfig, MetricsError, MetricsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File label used when a sample's expectation records cannot be loaded
pub const EXPECTATION_SOURCE: &str = "(expectation records)";

/// Variant files belonging to one sample, in processing order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleFiles {
    pub sample_id: String,
    pub files: Vec<String>,
}

impl SampleFiles {
    pub fn new(sample_id: &str, files: &[&str]) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            files: files.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Read a batch manifest: a JSON list of `{sample_id, files}` entries
pub fn read_manifest<P: AsRef<Path>>(path: P) -> MetricsResult<Vec<SampleFiles>> {
    let file = std::fs::File::open(&path)
        .map_err(|_| MetricsError::FileNotFound(path.as_ref().display().to_string()))?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Compute metrics for every file of every sample.
///
/// Samples and files are processed in the given order. Expectations are
/// loaded and, when a baseline is given, germline-filtered once per sample,
/// then shared by all of that sample's files. Files are resolved against
/// `data_dir`, as is the baseline.
///
/// Unreadable or malformed variant files, and metadata failures, abort the batch. Files whose
/// metrics are undefined (no expectations, zero denominators) are logged and
/// listed in [`ResultsTable::skipped`].
pub fn run_batch(
    client: &dyn MetadataSource,
    project_id: &str,
    data_dir: &Path,
    files_by_sample: &[SampleFiles],
    baseline: Option<&Path>,
    config: &MetricsConfig,
) -> MetricsResult<ResultsTable> {
    let _timer = Timer::new("Computing batch metrics");
    let total: usize = files_by_sample.iter().map(|s| s.files.len()).sum();
    let baseline_path = baseline.map(|b| data_dir.join(b));

    log::info!(
        "Processing {} files from {} samples of project {}",
        total,
        files_by_sample.len(),
        project_id
    );

    let mut table = ResultsTable::new();
    let mut done = 0;

    for sample in files_by_sample {
        let item_error = |file_name: &str, source: MetricsError| MetricsError::BatchItem {
            project_id: project_id.to_string(),
            sample_id: sample.sample_id.clone(),
            file_name: file_name.to_string(),
            source: Box::new(source),
        };

        let mut expectations = load_sample_expectations(client, project_id, &sample.sample_id)
            .map_err(|e| item_error(EXPECTATION_SOURCE, e))?;

        if let Some(baseline_path) = &baseline_path {
            if !expectations.is_empty() {
                let baseline_name = baseline_path.display().to_string();
                expectations = filter_germline_file(&expectations, baseline_path)
                    .map_err(|e| item_error(&baseline_name, e))?;
            }
        }

        log::info!(
            "Sample {}: {} expectations for {} files",
            sample.sample_id,
            expectations.len(),
            sample.files.len()
        );

        for file_name in &sample.files {
            match compute_metrics(data_dir.join(file_name), &expectations, config) {
                Ok(row) => table.push(row),
                Err(MetricsError::UndefinedMetric(reason)) => {
                    log::warn!(
                        "Skipping {} of sample {}: {}",
                        file_name,
                        sample.sample_id,
                        reason
                    );
                    table.push_skipped(SkippedFile {
                        sample_id: sample.sample_id.clone(),
                        file_name: file_name.clone(),
                        reason,
                    });
                }
                Err(e) => return Err(item_error(file_name, e)),
            }

            done += 1;
            log_progress(done, total, "Files processed");
        }
    }

    Ok(table)
}
