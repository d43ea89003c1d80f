//! CLI binary for svmetrics - validates somatic calls of a project against expected mutations

use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use svmetrics_rs::{
    batch::{read_manifest, run_batch, SampleFiles},
    catalog::list_files_by_type,
    metadata::{open_metadata_source, ClientConfig, FileType, MetadataSource},
    metrics::validate_metrics_config,
    plot::{plot_metrics, PlotConfig, PlotFormat},
    report::{write_results, ResultsTable},
    utils::{ensure_parent_dirs, validate_file_readable},
    MetricsConfig, MetricsError, MetricsResult,
};

#[derive(Parser)]
#[command(name = "svmetrics")]
#[command(about = "Sensitivity/specificity of somatic variant calls against expected mutations")]
#[command(long_about = "
svmetrics validates the somatic mutation calls of a project against the expected
mutations curated in the metadata repository.

For every sample it loads the expected mutation loci once, optionally removes
loci found as PASS calls in a germline baseline file, and then scans each of the
sample's variant files. Calls that PASS and have an allele frequency below the
admission threshold count as true positives when their chromosome and position
match an expected locus, and as false positives otherwise.

Variant files are read from --data-dir. The sample-to-file mapping comes from
--manifest (a JSON list of {\"sample_id\", \"files\"}) or, when absent, from the
somatic-mutation files registered in the metadata repository.

When a baseline is given, the metrics are computed both with and without
germline filtering, and the chart shows both pairs side by side.
")]
struct Args {
    /// Project identifier in the metadata repository
    #[arg(long)]
    project: String,

    /// Directory holding the variant files
    #[arg(long, value_name = "DIR")]
    data_dir: PathBuf,

    /// JSON manifest mapping samples to variant files
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Restrict the run to one sample (metadata-derived file lists only)
    #[arg(long)]
    sample: Option<String>,

    /// Germline baseline variant file, relative to --data-dir
    #[arg(long, value_name = "FILE")]
    baseline: Option<PathBuf>,

    /// Read metadata from a JSON export instead of the metadata service
    #[arg(long, value_name = "FILE", conflicts_with = "endpoint")]
    metadata_json: Option<PathBuf>,

    /// Base URL of the metadata service
    #[arg(long)]
    endpoint: Option<String>,

    /// Access token for the metadata service
    #[arg(long)]
    token: Option<String>,

    /// Assumed number of negative sites covered by the assay
    #[arg(long, default_value_t = 169)]
    assumed_negatives: u32,

    /// Calls at or above this allele frequency are not scanned
    #[arg(long, default_value_t = 0.1)]
    max_af: f64,

    /// INFO field holding the allele frequency
    #[arg(long, default_value = "MAF")]
    af_field: String,

    /// Write the results table as CSV (or TSV for .tsv, gzipped for .gz)
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the results table as HTML
    #[arg(long, value_name = "FILE")]
    html: Option<PathBuf>,

    /// Write the bar chart (.png or .svg)
    #[arg(long, value_name = "FILE")]
    plot: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn metadata_client(args: &Args) -> MetricsResult<Box<dyn MetadataSource>> {
    let mut config = ClientConfig {
        token: args.token.clone(),
        ..Default::default()
    };
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }
    open_metadata_source(args.metadata_json.as_deref(), config)
}

fn files_by_sample(args: &Args, client: &dyn MetadataSource) -> MetricsResult<Vec<SampleFiles>> {
    match &args.manifest {
        Some(path) => read_manifest(path),
        None => list_files_by_type(client, &args.project, FileType::Vcf, args.sample.as_deref()),
    }
}

fn print_table(title: &str, table: &ResultsTable) {
    println!("{}", title);
    print!("{}", table.to_text_table());
    for skipped in table.skipped() {
        println!(
            "skipped {} ({}): {}",
            skipped.file_name, skipped.sample_id, skipped.reason
        );
    }
    println!();
}

fn run() -> MetricsResult<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    log::info!("Starting svmetrics for project {}", args.project);
    log::info!("Data directory: {:?}", args.data_dir);

    let config = MetricsConfig {
        assumed_total_negatives: args.assumed_negatives,
        max_allele_frequency: args.max_af,
        frequency_field: args.af_field.clone(),
    };
    validate_metrics_config(&config)?;
    log::info!(
        "Configuration: negatives={}, max AF={}, AF field={}",
        config.assumed_total_negatives,
        config.max_allele_frequency,
        config.frequency_field
    );

    if let Some(baseline) = &args.baseline {
        validate_file_readable(args.data_dir.join(baseline))?;
    }

    let client = metadata_client(&args)?;
    let samples = files_by_sample(&args, client.as_ref())?;
    if samples.iter().all(|s| s.files.is_empty()) {
        log::warn!("No variant files to process for project {}", args.project);
        return Ok(());
    }

    let table = run_batch(
        client.as_ref(),
        &args.project,
        &args.data_dir,
        &samples,
        None,
        &config,
    )?;
    print_table("Metrics", &table);

    let filtered = match &args.baseline {
        Some(baseline) => {
            let filtered = run_batch(
                client.as_ref(),
                &args.project,
                &args.data_dir,
                &samples,
                Some(baseline.as_path()),
                &config,
            )?;
            print_table("Germline-filtered metrics", &filtered);
            Some(filtered)
        }
        None => None,
    };

    if let Some(output) = &args.output {
        ensure_parent_dirs(output)?;
        write_results(&table, output)?;
        if let Some(filtered) = &filtered {
            let name = format!(
                "germline_filtered_{}",
                output.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
            );
            write_results(filtered, &output.with_file_name(name))?;
        }
    }

    if let Some(html) = &args.html {
        ensure_parent_dirs(html)?;
        let mut content = table.to_html();
        if let Some(filtered) = &filtered {
            content.push_str(&filtered.to_html());
        }
        std::fs::write(html, content)?;
        log::info!("HTML table written to: {:?}", html);
    }

    if let Some(plot) = &args.plot {
        ensure_parent_dirs(plot)?;
        let plot_config = PlotConfig {
            format: PlotFormat::from_path(plot),
            ..Default::default()
        };
        let filtered_rows = match &filtered {
            Some(filtered) if filtered.len() == table.len() => Some(filtered.rows()),
            Some(_) => {
                log::warn!("Germline filtering changed which files have metrics; plotting unfiltered metrics only");
                None
            }
            None => None,
        };
        plot_metrics(table.rows(), filtered_rows, plot, &plot_config)?;
    }

    log::info!("Analysis completed successfully");
    Ok(())
}

/// Handle application errors and provide user-friendly messages
fn handle_error(error: MetricsError) -> ! {
    match error {
        MetricsError::BatchItem {
            project_id,
            sample_id,
            file_name,
            source,
        } => {
            eprintln!(
                "Error: batch stopped at project {}, sample {}, file {}",
                project_id, sample_id, file_name
            );
            eprintln!("Cause: {}", source);
            eprintln!("Fix or remove the file and rerun the batch.");
        }
        MetricsError::FileNotFound(path) => {
            eprintln!("Error: File not found: {}", path);
            eprintln!("Please check that the file exists and is readable.");
        }
        MetricsError::VariantFile { path, reason } => {
            eprintln!("Error: Cannot read variant file {}: {}", path, reason);
            eprintln!("Please check that your VCF/BCF file is properly formatted.");
        }
        MetricsError::InvalidConfig(msg) => {
            eprintln!("Error: Invalid configuration: {}", msg);
            eprintln!("Please check --assumed-negatives, --max-af and --af-field.");
        }
        MetricsError::Metadata(msg) => {
            eprintln!("Error: Metadata query failed: {}", msg);
            eprintln!("Please check the project identifier and your access token.");
        }
        MetricsError::Http(ref e) => {
            eprintln!("Error: Metadata service unreachable: {}", e);
            eprintln!("Please check --endpoint and your network connection.");
        }
        MetricsError::Json(ref e) => {
            eprintln!("Error: Malformed JSON: {}", e);
            eprintln!("Please check the manifest or metadata export.");
        }
        MetricsError::Io(ref e) => {
            eprintln!("Error: I/O error: {}", e);
            eprintln!("Please check file permissions and disk space.");
        }
        other => {
            eprintln!("Error: {}", other);
        }
    }
    std::process::exit(1);
}

fn main() {
    if let Err(e) = run() {
        handle_error(e);
    }
}
