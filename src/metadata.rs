//! Metadata repository access: sample hierarchies, file listings and expectation records

use crate::{MetricsError, MetricsResult};
use curl::easy::{Easy, List};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Kinds of submitted files tracked by the metadata repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileType {
    Vcf,
    Fastq,
    Bam,
    Cnv,
    Metadata,
}

impl FileType {
    /// File types attached to read groups
    pub const DATA_TYPES: [FileType; 4] = [FileType::Vcf, FileType::Fastq, FileType::Bam, FileType::Cnv];

    /// Node name used by the metadata schema
    pub fn node_name(&self) -> &'static str {
        match self {
            FileType::Vcf => "submitted_somatic_mutations",
            FileType::Fastq => "submitted_unaligned_reads_files",
            FileType::Bam => "submitted_aligned_reads_files",
            FileType::Cnv => "submitted_copy_number",
            FileType::Metadata => "experiment_metadata_files",
        }
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VCF" => Ok(FileType::Vcf),
            "FASTQ" => Ok(FileType::Fastq),
            "BAM" => Ok(FileType::Bam),
            "CNV" => Ok(FileType::Cnv),
            "METADATA" => Ok(FileType::Metadata),
            other => Err(format!(
                "unknown file type '{}' (expected VCF, FASTQ, BAM, CNV or METADATA)",
                other
            )),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Vcf => "VCF",
            FileType::Fastq => "FASTQ",
            FileType::Bam => "BAM",
            FileType::Cnv => "CNV",
            FileType::Metadata => "METADATA",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadGroupNode {
    #[serde(default)]
    pub submitted_somatic_mutations: Vec<FileNode>,
    #[serde(default)]
    pub submitted_unaligned_reads_files: Vec<FileNode>,
    #[serde(default)]
    pub submitted_aligned_reads_files: Vec<FileNode>,
    #[serde(default)]
    pub submitted_copy_number: Vec<FileNode>,
}

impl ReadGroupNode {
    pub fn files(&self, file_type: FileType) -> &[FileNode] {
        match file_type {
            FileType::Vcf => &self.submitted_somatic_mutations,
            FileType::Fastq => &self.submitted_unaligned_reads_files,
            FileType::Bam => &self.submitted_aligned_reads_files,
            FileType::Cnv => &self.submitted_copy_number,
            FileType::Metadata => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliquotNode {
    #[serde(default)]
    pub aliquot_concentration: Option<f64>,
    #[serde(default)]
    pub read_groups: Vec<ReadGroupNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationNode {
    pub expected_mutation_chromosome: String,
    #[serde(deserialize_with = "string_or_number")]
    pub expected_mutation_position: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleNode {
    pub submitter_id: String,
    #[serde(default)]
    pub aliquots: Vec<AliquotNode>,
    #[serde(default)]
    pub sample_expectations: Vec<ExpectationNode>,
}

impl SampleNode {
    /// Names of all files of one type below this sample
    pub fn file_names(&self, file_type: FileType) -> Vec<String> {
        self.aliquots
            .iter()
            .flat_map(|aliquot| aliquot.read_groups.iter())
            .flat_map(|rg| rg.files(file_type).iter())
            .filter_map(|f| f.file_name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentNode {
    #[serde(default)]
    pub experiment_metadata_files: Vec<FileNode>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

/// Queries the expectation loader, file catalog and batch runner need
pub trait MetadataSource {
    /// Samples of a project, submitter ids only
    fn project_samples(&self, project_id: &str) -> MetricsResult<Vec<SampleNode>>;

    /// One sample with its aliquot/read-group/file hierarchy
    fn sample(&self, project_id: &str, sample_id: &str) -> MetricsResult<Vec<SampleNode>>;

    fn experiments(&self, project_id: &str) -> MetricsResult<Vec<ExperimentNode>>;

    /// Samples with their expectation records, for one sample or the whole project
    fn expectations(&self, project_id: &str, sample_id: Option<&str>)
        -> MetricsResult<Vec<SampleNode>>;
}

/// Connection settings for the GraphQL metadata service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Maximum samples returned by a project listing
    pub sample_limit: usize,
    /// Maximum expectation records returned per sample
    pub expectation_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://api.internal.io".to_string(),
            token: None,
            timeout_secs: 60,
            sample_limit: 1000,
            expectation_limit: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct SampleData {
    #[serde(default)]
    sample: Vec<SampleNode>,
}

#[derive(Debug, Deserialize)]
struct ExperimentData {
    #[serde(default)]
    experiment: Vec<ExperimentNode>,
}

/// GraphQL string literal for an identifier
fn literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub fn project_samples_query(project_id: &str, limit: usize) -> String {
    format!(
        "query Samples {{ sample (first: {}, project_id: {}) {{ submitter_id }} }}",
        limit,
        literal(project_id)
    )
}

pub fn sample_query(project_id: &str, sample_id: &str) -> String {
    let file_nodes: Vec<String> = FileType::DATA_TYPES
        .iter()
        .map(|ft| format!("{} {{ file_name }}", ft.node_name()))
        .collect();
    format!(
        "query Sample {{ sample (project_id: {}, submitter_id: {}) {{ submitter_id aliquots {{ aliquot_concentration read_groups {{ {} }} }} }} }}",
        literal(project_id),
        literal(sample_id),
        file_nodes.join(" ")
    )
}

pub fn experiments_query(project_id: &str) -> String {
    format!(
        "query Experiments {{ experiment (project_id: {}) {{ experiment_metadata_files {{ file_name }} }} }}",
        literal(project_id)
    )
}

pub fn expectations_query(project_id: &str, sample_id: Option<&str>, limit: usize) -> String {
    let scope = match sample_id {
        Some(sample_id) => format!(
            "project_id: {}, submitter_id: {}",
            literal(project_id),
            literal(sample_id)
        ),
        None => format!("project_id: {}", literal(project_id)),
    };
    format!(
        "query Expectations {{ sample ({}) {{ submitter_id sample_expectations (first: {}) {{ expected_mutation_chromosome expected_mutation_position }} }} }}",
        scope, limit
    )
}

fn parse_response<T: DeserializeOwned>(body: &[u8]) -> MetricsResult<T> {
    let response: GraphQlResponse<T> = serde_json::from_slice(body)?;
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(MetricsError::Metadata(messages.join("; ")));
    }
    response
        .data
        .ok_or_else(|| MetricsError::Metadata("response carried no data".to_string()))
}

/// Session-scoped client for the GraphQL metadata service
pub struct GraphQlClient {
    config: ClientConfig,
}

impl GraphQlClient {
    pub fn new(config: ClientConfig) -> MetricsResult<Self> {
        if config.endpoint.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "metadata endpoint must not be empty".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v0/submission/graphql/",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn post<T: DeserializeOwned>(&self, query: String) -> MetricsResult<T> {
        log::debug!("Metadata query: {}", query);
        let payload = serde_json::json!({ "query": query }).to_string();

        let mut headers = List::new();
        headers.append("Content-Type: application/json")?;
        if let Some(token) = &self.config.token {
            headers.append(&format!("Authorization: bearer {}", token))?;
        }

        let mut easy = Easy::new();
        easy.url(&self.url())?;
        easy.post(true)?;
        easy.post_fields_copy(payload.as_bytes())?;
        easy.http_headers(headers)?;
        easy.timeout(Duration::from_secs(self.config.timeout_secs))?;
        easy.fail_on_error(true)?;

        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        parse_response(&body)
    }
}

impl MetadataSource for GraphQlClient {
    fn project_samples(&self, project_id: &str) -> MetricsResult<Vec<SampleNode>> {
        let data: SampleData =
            self.post(project_samples_query(project_id, self.config.sample_limit))?;
        Ok(data.sample)
    }

    fn sample(&self, project_id: &str, sample_id: &str) -> MetricsResult<Vec<SampleNode>> {
        let data: SampleData = self.post(sample_query(project_id, sample_id))?;
        Ok(data.sample)
    }

    fn experiments(&self, project_id: &str) -> MetricsResult<Vec<ExperimentNode>> {
        let data: ExperimentData = self.post(experiments_query(project_id))?;
        Ok(data.experiment)
    }

    fn expectations(
        &self,
        project_id: &str,
        sample_id: Option<&str>,
    ) -> MetricsResult<Vec<SampleNode>> {
        let data: SampleData = self.post(expectations_query(
            project_id,
            sample_id,
            self.config.expectation_limit,
        ))?;
        Ok(data.sample)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub samples: Vec<SampleNode>,
    #[serde(default)]
    pub experiments: Vec<ExperimentNode>,
}

/// Metadata held in memory, typically loaded from a JSON export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticMetadata {
    pub projects: BTreeMap<String, ProjectMetadata>,
}

impl StaticMetadata {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> MetricsResult<Self> {
        let file = std::fs::File::open(&path)
            .map_err(|_| MetricsError::FileNotFound(path.as_ref().display().to_string()))?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    fn project(&self, project_id: &str) -> MetricsResult<&ProjectMetadata> {
        self.projects
            .get(project_id)
            .ok_or_else(|| MetricsError::Metadata(format!("unknown project {}", project_id)))
    }
}

impl MetadataSource for StaticMetadata {
    fn project_samples(&self, project_id: &str) -> MetricsResult<Vec<SampleNode>> {
        Ok(self
            .project(project_id)?
            .samples
            .iter()
            .map(|s| SampleNode {
                submitter_id: s.submitter_id.clone(),
                ..Default::default()
            })
            .collect())
    }

    fn sample(&self, project_id: &str, sample_id: &str) -> MetricsResult<Vec<SampleNode>> {
        Ok(self
            .project(project_id)?
            .samples
            .iter()
            .filter(|s| s.submitter_id == sample_id)
            .map(|s| SampleNode {
                sample_expectations: Vec::new(),
                ..s.clone()
            })
            .collect())
    }

    fn experiments(&self, project_id: &str) -> MetricsResult<Vec<ExperimentNode>> {
        Ok(self.project(project_id)?.experiments.clone())
    }

    fn expectations(
        &self,
        project_id: &str,
        sample_id: Option<&str>,
    ) -> MetricsResult<Vec<SampleNode>> {
        Ok(self
            .project(project_id)?
            .samples
            .iter()
            .filter(|s| sample_id.map_or(true, |id| s.submitter_id == id))
            .map(|s| SampleNode {
                submitter_id: s.submitter_id.clone(),
                sample_expectations: s.sample_expectations.clone(),
                ..Default::default()
            })
            .collect())
    }
}

/// A JSON export when `json_path` is given, the metadata service otherwise
pub fn open_metadata_source(
    json_path: Option<&Path>,
    config: ClientConfig,
) -> MetricsResult<Box<dyn MetadataSource>> {
    match json_path {
        Some(path) => {
            log::info!("Reading metadata from {:?}", path);
            Ok(Box::new(StaticMetadata::from_json_path(path)?))
        }
        None => {
            log::info!("Querying metadata service at {}", config.endpoint);
            Ok(Box::new(GraphQlClient::new(config)?))
        }
    }
}
