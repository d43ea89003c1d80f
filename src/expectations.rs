//! Loading expected mutation loci from the metadata repository

use crate::metadata::MetadataSource;
use crate::utils::normalize_chromosome;
use crate::{ExpectedMutation, MetricsError, MetricsResult};

/// Load the expected mutations of a project, or of a single sample.
///
/// Chromosomes lose any leading "chr"; positions are kept verbatim so they
/// compare exactly against stringified call positions. An empty scope is
/// reported as [`MetricsError::NoExpectations`].
pub fn load_expectations(
    client: &dyn MetadataSource,
    project_id: &str,
    sample_id: Option<&str>,
) -> MetricsResult<Vec<ExpectedMutation>> {
    let samples = client.expectations(project_id, sample_id)?;

    let expectations: Vec<ExpectedMutation> = samples
        .iter()
        .flat_map(|sample| {
            sample.sample_expectations.iter().map(move |e| {
                ExpectedMutation::new(
                    sample.submitter_id.clone(),
                    normalize_chromosome(&e.expected_mutation_chromosome).to_string(),
                    e.expected_mutation_position.clone(),
                )
            })
        })
        .collect();

    if expectations.is_empty() {
        return Err(MetricsError::NoExpectations {
            project_id: project_id.to_string(),
            sample_id: sample_id.map(str::to_string),
        });
    }

    log::debug!(
        "Loaded {} expected mutations for project {} ({})",
        expectations.len(),
        project_id,
        sample_id.unwrap_or("all samples")
    );

    Ok(expectations)
}

/// Load expectations for one sample, logging and tolerating an empty scope
pub fn load_sample_expectations(
    client: &dyn MetadataSource,
    project_id: &str,
    sample_id: &str,
) -> MetricsResult<Vec<ExpectedMutation>> {
    match load_expectations(client, project_id, Some(sample_id)) {
        Ok(expectations) => Ok(expectations
            .into_iter()
            .filter(|e| e.sample_id == sample_id)
            .collect()),
        Err(e @ MetricsError::NoExpectations { .. }) => {
            log::warn!("{}", e);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::fixture;

    #[test]
    fn test_load_project_expectations() {
        let metadata = fixture();
        let expectations = load_expectations(&metadata, "bpa-test", None).unwrap();

        assert_eq!(expectations.len(), 3);
        assert_eq!(
            expectations[0],
            ExpectedMutation::new("S1".to_string(), "1".to_string(), "100".to_string())
        );
        assert_eq!(expectations[1].chromosome, "2");
        assert_eq!(expectations[1].position, "200");
        assert_eq!(expectations[2].chromosome, "7");
    }

    #[test]
    fn test_load_expectations_empty_scope() {
        let metadata = fixture();
        match load_expectations(&metadata, "bpa-test", Some("S2")) {
            Err(MetricsError::NoExpectations {
                project_id,
                sample_id,
            }) => {
                assert_eq!(project_id, "bpa-test");
                assert_eq!(sample_id.as_deref(), Some("S2"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_load_sample_expectations_tolerates_empty() {
        let metadata = fixture();
        assert!(load_sample_expectations(&metadata, "bpa-test", "S2")
            .unwrap()
            .is_empty());
        assert_eq!(
            load_sample_expectations(&metadata, "bpa-test", "S1")
                .unwrap()
                .len(),
            3
        );
        assert!(load_sample_expectations(&metadata, "bpa-unknown", "S1").is_err());
    }

    #[test]
    fn test_positions_are_kept_verbatim() {
        let metadata: crate::metadata::StaticMetadata = serde_json::from_str(
            r#"{"projects": {"p": {"samples": [{
                "submitter_id": "A",
                "sample_expectations": [
                    {"expected_mutation_chromosome": "chr3", "expected_mutation_position": " 42"}
                ]
            }]}}}"#,
        )
        .unwrap();

        let expectations = load_expectations(&metadata, "p", None).unwrap();
        assert_eq!(expectations[0].chromosome, "3");
        assert_eq!(expectations[0].position, " 42");
        assert!(!expectations[0].matches("3", "42"));
    }
}
