//! # svmetrics - Somatic Variant Call Validation Metrics
//!
//! Computes sensitivity and specificity of somatic-mutation calls in VCF/BCF
//! files against curated expectation records from a metadata repository,
//! optionally removing germline expectations confirmed by a baseline file.

pub mod batch;
pub mod catalog;
pub mod expectations;
pub mod germline;
pub mod metadata;
pub mod metrics;
pub mod plot;
pub mod report;
pub mod transfer;
pub mod utils;
pub mod vcf;

use serde::{Deserialize, Serialize};

/// A curated mutation locus expected to be called for a sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedMutation {
    pub sample_id: String,
    /// Chromosome without a leading "chr"
    pub chromosome: String,
    /// Position as reported by the metadata service, compared verbatim
    pub position: String,
}

impl ExpectedMutation {
    pub fn new(sample_id: String, chromosome: String, position: String) -> Self {
        Self {
            sample_id,
            chromosome,
            position,
        }
    }

    /// True if this expectation sits at the given normalized locus
    pub fn matches(&self, chromosome: &str, position: &str) -> bool {
        self.chromosome == chromosome && self.position == position
    }
}

/// Metrics for a single variant file of a sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    pub file_name: String,
    pub expectation_count: usize,
    pub true_positive: u32,
    pub false_positive: u32,
    pub sensitivity: f64,
    pub specificity: f64,
}

/// Configuration parameters for metrics calculation
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Assumed number of negative sites covered by the assay
    pub assumed_total_negatives: u32,
    /// Calls at or above this allele frequency are not scanned
    pub max_allele_frequency: f64,
    /// INFO field holding the allele frequency
    pub frequency_field: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            assumed_total_negatives: 169,
            max_allele_frequency: 0.1,
            frequency_field: "MAF".to_string(),
        }
    }
}

/// Error types for the svmetrics library
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTSlib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] curl::Error),

    #[error("No expected mutations for project {project_id}{}", sample_suffix(.sample_id))]
    NoExpectations {
        project_id: String,
        sample_id: Option<String>,
    },

    #[error("Undefined metric: {0}")]
    UndefinedMetric(String),

    #[error("Variant file {path}: {reason}")]
    VariantFile { path: String, reason: String },

    #[error("Invalid variant format: {0}")]
    InvalidVariant(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metadata query failed: {0}")]
    Metadata(String),

    #[error("Plotting error: {0}")]
    Plot(String),

    #[error("project {project_id}, sample {sample_id}, file {file_name}: {source}")]
    BatchItem {
        project_id: String,
        sample_id: String,
        file_name: String,
        #[source]
        source: Box<MetricsError>,
    },
}

impl MetricsError {
    /// Wrap any error raised while opening or reading a variant file
    pub fn variant_file<P: AsRef<std::path::Path>>(path: P, error: MetricsError) -> Self {
        match error {
            MetricsError::VariantFile { .. } => error,
            other => MetricsError::VariantFile {
                path: path.as_ref().display().to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type MetricsResult<T> = Result<T, MetricsError>;

fn sample_suffix(sample_id: &Option<String>) -> String {
    sample_id
        .as_ref()
        .map(|s| format!(", sample {}", s))
        .unwrap_or_default()
}
