//! CLI binary downloading project files from object storage

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use svmetrics_rs::{
    catalog::list_files,
    metadata::{open_metadata_source, ClientConfig},
    transfer::{fetch_files, remote_path, TransferConfig},
};

#[derive(Parser)]
#[command(name = "fetch_files")]
#[command(about = "Download project files from object storage")]
#[command(long_about = "
Downloads the files of a project through the `aws s3` command line tool.

With --file the named files are copied one by one. With --sample the files
registered for that sample in the metadata repository are copied. Otherwise
the whole project collection is synchronised into the destination directory.

Failed copies are reported at the end; the tool exits non-zero when any
transfer failed.
")]
struct Args {
    /// Project identifier, e.g. bpa-melanoma
    #[arg(long)]
    project: String,

    /// Destination directory
    #[arg(long, value_name = "DIR")]
    destination: PathBuf,

    /// File to copy (repeatable)
    #[arg(long = "file", value_name = "NAME", conflicts_with = "sample")]
    files: Vec<String>,

    /// Copy the files the metadata repository lists for this sample
    #[arg(long)]
    sample: Option<String>,

    /// Read metadata from a JSON export instead of the metadata service
    #[arg(long, value_name = "FILE", requires = "sample", conflicts_with = "endpoint")]
    metadata_json: Option<PathBuf>,

    /// Base URL of the metadata service
    #[arg(long, requires = "sample")]
    endpoint: Option<String>,

    /// Access token for the metadata service
    #[arg(long)]
    token: Option<String>,

    /// Object-storage bucket
    #[arg(long, default_value = "bpa-data")]
    bucket: String,

    /// AWS CLI profile
    #[arg(long, default_value = "default")]
    profile: String,

    /// Run without the HTTP(S) proxy
    #[arg(long)]
    no_proxy: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn transfer_config(args: &Args) -> TransferConfig {
    let mut config = TransferConfig {
        bucket: args.bucket.clone(),
        profile: args.profile.clone(),
        ..Default::default()
    };
    if args.no_proxy {
        config.http_proxy = None;
        config.https_proxy = None;
    }
    config
}

fn metadata_config(args: &Args) -> ClientConfig {
    let mut config = ClientConfig {
        token: args.token.clone(),
        ..Default::default()
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    config
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let files = match &args.sample {
        Some(sample) => {
            let config = metadata_config(&args);
            let client = open_metadata_source(args.metadata_json.as_deref(), config)
                .context("Failed to open metadata source")?;
            let files = list_files(client.as_ref(), &args.project, Some(sample))
                .with_context(|| format!("Failed to list files of sample {}", sample))?;
            Some(files)
        }
        None if !args.files.is_empty() => Some(args.files.clone()),
        None => None,
    };

    let config = transfer_config(&args);
    println!(
        "Fetching {} from {}",
        files
            .as_ref()
            .map_or("all files".to_string(), |f| format!("{} files", f.len())),
        remote_path(&config.bucket, &args.project)
    );

    let report = fetch_files(&config, &args.project, &args.destination, files.as_deref());
    for source in &report.transferred {
        println!("ok\t{}", source);
    }
    for error in &report.errors {
        eprintln!("failed\t{}\t{}", error.source, error.message);
    }

    if !report.is_success() {
        bail!("{} transfers failed", report.errors.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_transfer_config_from_args() {
        let args = Args::try_parse_from([
            "fetch_files",
            "--project",
            "bpa-test",
            "--destination",
            "out",
            "--file",
            "a.vcf",
            "--file",
            "b.vcf",
            "--no-proxy",
        ])
        .unwrap();
        assert_eq!(args.files, vec!["a.vcf", "b.vcf"]);

        let config = transfer_config(&args);
        assert_eq!(config.bucket, "bpa-data");
        assert!(config.http_proxy.is_none());
        assert!(config.https_proxy.is_none());
    }

    #[test]
    fn test_endpoint_reaches_metadata_config() {
        let args = Args::try_parse_from([
            "fetch_files",
            "--project",
            "bpa-test",
            "--destination",
            "out",
            "--sample",
            "S1",
            "--endpoint",
            "http://metadata.example.org",
        ])
        .unwrap();
        assert_eq!(metadata_config(&args).endpoint, "http://metadata.example.org");

        let args = Args::try_parse_from([
            "fetch_files",
            "--project",
            "bpa-test",
            "--destination",
            "out",
            "--sample",
            "S1",
        ])
        .unwrap();
        assert_eq!(metadata_config(&args).endpoint, ClientConfig::default().endpoint);
    }
}
