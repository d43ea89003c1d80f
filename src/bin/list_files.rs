//! CLI binary listing the samples and submitted files of a project

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use svmetrics_rs::{
    catalog::{count_file_types, list_files, list_files_by_type, list_samples},
    metadata::{open_metadata_source, ClientConfig, FileType},
};

#[derive(Parser)]
#[command(name = "list_files")]
#[command(about = "List samples and submitted files of a project")]
#[command(long_about = "
Lists what the metadata repository holds for a project.

Without further options every file name of the project is printed, sample
files first (by type: VCF, FASTQ, BAM, CNV) followed by experiment metadata
files. --file-type restricts the listing to one type and groups it by sample,
--samples prints the sample ids and --count prints the number of files per
extension.
")]
struct Args {
    /// Project identifier in the metadata repository
    #[arg(long)]
    project: String,

    /// Restrict the listing to one sample
    #[arg(long)]
    sample: Option<String>,

    /// Only list files of this type (VCF, FASTQ, BAM, CNV, METADATA)
    #[arg(long, conflicts_with_all = ["samples", "count"])]
    file_type: Option<FileType>,

    /// List sample ids instead of files
    #[arg(long, conflicts_with = "count")]
    samples: bool,

    /// Count files per extension
    #[arg(long)]
    count: bool,

    /// Read metadata from a JSON export instead of the metadata service
    #[arg(long, value_name = "FILE", conflicts_with = "endpoint")]
    metadata_json: Option<PathBuf>,

    /// Base URL of the metadata service
    #[arg(long)]
    endpoint: Option<String>,

    /// Access token for the metadata service
    #[arg(long)]
    token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let mut config = ClientConfig {
        token: args.token.clone(),
        ..Default::default()
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    let client = open_metadata_source(args.metadata_json.as_deref(), config)
        .context("Failed to open metadata source")?;
    let client = client.as_ref();
    let project = args.project.as_str();
    let sample = args.sample.as_deref();

    if args.samples {
        let samples = list_samples(client, project)
            .with_context(|| format!("Failed to list samples of {}", project))?;
        for sample_id in samples {
            println!("{}", sample_id);
        }
    } else if args.count {
        let counts = count_file_types(client, project, sample)
            .with_context(|| format!("Failed to count files of {}", project))?;
        for (extension, count) in counts {
            println!("{}\t{}", extension, count);
        }
    } else if let Some(file_type) = args.file_type {
        let groups = list_files_by_type(client, project, file_type, sample)
            .with_context(|| format!("Failed to list {} files of {}", file_type, project))?;
        for group in groups {
            for file in group.files {
                if group.sample_id.is_empty() {
                    println!("{}", file);
                } else {
                    println!("{}\t{}", group.sample_id, file);
                }
            }
        }
    } else {
        let files = list_files(client, project, sample)
            .with_context(|| format!("Failed to list files of {}", project))?;
        for file in files {
            println!("{}", file);
        }
    }

    Ok(())
}
