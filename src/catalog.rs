//! Listing samples and submitted files of a project

use crate::batch::SampleFiles;
use crate::metadata::{FileType, MetadataSource, SampleNode};
use crate::utils::file_type_suffix;
use crate::MetricsResult;
use std::collections::BTreeMap;

/// Submitter ids of every sample in a project
pub fn list_samples(client: &dyn MetadataSource, project_id: &str) -> MetricsResult<Vec<String>> {
    Ok(client
        .project_samples(project_id)?
        .into_iter()
        .map(|s| s.submitter_id)
        .collect())
}

/// Full hierarchies of one sample, or of every sample in the project
fn sample_hierarchies(
    client: &dyn MetadataSource,
    project_id: &str,
    sample_id: Option<&str>,
) -> MetricsResult<Vec<SampleNode>> {
    match sample_id {
        Some(sample_id) => client.sample(project_id, sample_id),
        None => {
            let mut samples = Vec::new();
            for sample_id in list_samples(client, project_id)? {
                samples.extend(client.sample(project_id, &sample_id)?);
            }
            Ok(samples)
        }
    }
}

fn experiment_file_names(client: &dyn MetadataSource, project_id: &str) -> MetricsResult<Vec<String>> {
    Ok(client
        .experiments(project_id)?
        .into_iter()
        .flat_map(|e| e.experiment_metadata_files)
        .filter_map(|f| f.file_name)
        .collect())
}

/// Files of one type grouped by sample, in sample order.
///
/// Experiment metadata files are not tied to a sample and come back as a
/// single group with an empty sample id.
pub fn list_files_by_type(
    client: &dyn MetadataSource,
    project_id: &str,
    file_type: FileType,
    sample_id: Option<&str>,
) -> MetricsResult<Vec<SampleFiles>> {
    if file_type == FileType::Metadata {
        return Ok(vec![SampleFiles {
            sample_id: String::new(),
            files: experiment_file_names(client, project_id)?,
        }]);
    }

    let mut grouped: Vec<SampleFiles> = Vec::new();
    for sample in sample_hierarchies(client, project_id, sample_id)? {
        let files = sample.file_names(file_type);
        match grouped.iter_mut().find(|g| g.sample_id == sample.submitter_id) {
            Some(group) => group.files.extend(files),
            None => grouped.push(SampleFiles {
                sample_id: sample.submitter_id,
                files,
            }),
        }
    }

    Ok(grouped)
}

/// Every file name of a sample, or of a whole project including experiment metadata
pub fn list_files(
    client: &dyn MetadataSource,
    project_id: &str,
    sample_id: Option<&str>,
) -> MetricsResult<Vec<String>> {
    let samples = sample_hierarchies(client, project_id, sample_id)?;

    let mut files = Vec::new();
    for file_type in FileType::DATA_TYPES {
        for sample in &samples {
            files.extend(sample.file_names(file_type));
        }
    }

    if sample_id.is_none() {
        files.extend(experiment_file_names(client, project_id)?);
    }

    Ok(files)
}

/// Number of files per extension (text after the last '.')
pub fn count_file_types(
    client: &dyn MetadataSource,
    project_id: &str,
    sample_id: Option<&str>,
) -> MetricsResult<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for file in list_files(client, project_id, sample_id)? {
        *counts.entry(file_type_suffix(&file).to_string()).or_insert(0) += 1;
    }
    Ok(counts)
}
