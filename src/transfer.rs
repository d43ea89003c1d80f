//! Bulk download of project files from object storage through the `aws` CLI

use std::path::Path;
use std::process::Command;

/// Settings for object-storage transfers
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub program: String,
    pub bucket: String,
    pub profile: String,
    /// Proxy applied to the transfer process only
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            bucket: "bpa-data".to_string(),
            profile: "default".to_string(),
            http_proxy: Some("http://cloud-proxy.internal.io:3128".to_string()),
            https_proxy: Some("https://cloud-proxy.internal.io:3128".to_string()),
        }
    }
}

/// A failed copy or sync, captured rather than raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferError {
    pub source: String,
    pub message: String,
}

/// Outcome of a bulk transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub transferred: Vec<String>,
    pub errors: Vec<TransferError>,
}

impl TransferReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Remote collection of a project, e.g. `bpa-foo` → `s3://bpa-data/BPA_foo`
pub fn remote_path(bucket: &str, project_id: &str) -> String {
    format!("s3://{}/{}", bucket, project_id.replace("bpa-", "BPA_"))
}

fn build_command(config: &TransferConfig, args: &[&str], destination: &Path) -> Command {
    let mut cmd = Command::new(&config.program);
    cmd.arg("s3")
        .args(args)
        .arg(destination)
        .arg("--profile")
        .arg(&config.profile);
    if let Some(proxy) = &config.http_proxy {
        cmd.env("http_proxy", proxy);
    }
    if let Some(proxy) = &config.https_proxy {
        cmd.env("https_proxy", proxy);
    }
    cmd
}

fn run_transfer(mut cmd: Command, source: &str, report: &mut TransferReport) {
    log::debug!("Running {:?}", cmd);
    match cmd.output() {
        Ok(output) if output.status.success() => {
            report.transferred.push(source.to_string());
        }
        Ok(output) => {
            let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if message.is_empty() {
                message = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            if message.is_empty() {
                message = format!("exited with {}", output.status);
            }
            log::error!("Transfer of {} failed: {}", source, message);
            report.errors.push(TransferError {
                source: source.to_string(),
                message,
            });
        }
        Err(e) => {
            log::error!("Transfer of {} could not start: {}", source, e);
            report.errors.push(TransferError {
                source: source.to_string(),
                message: e.to_string(),
            });
        }
    }
}

/// Copy the listed files of a project, or sync the whole collection, into `destination`.
///
/// Failures are collected into the returned report; this never fails itself.
pub fn fetch_files(
    config: &TransferConfig,
    project_id: &str,
    destination: &Path,
    files: Option<&[String]>,
) -> TransferReport {
    let mut report = TransferReport::default();
    let remote = remote_path(&config.bucket, project_id);

    if let Err(e) = std::fs::create_dir_all(destination) {
        log::error!("Cannot create {:?}: {}", destination, e);
        report.errors.push(TransferError {
            source: destination.display().to_string(),
            message: e.to_string(),
        });
        return report;
    }

    log::info!("Getting files from {} into {:?}", remote, destination);
    match files {
        Some(files) => {
            for file in files {
                let source = format!("{}/{}", remote, file);
                let cmd = build_command(config, &["cp", &source], destination);
                run_transfer(cmd, &source, &mut report);
            }
        }
        None => {
            let cmd = build_command(config, &["sync", &remote], destination);
            run_transfer(cmd, &remote, &mut report);
        }
    }

    log::info!(
        "Finished: {} transferred, {} failed",
        report.transferred.len(),
        report.errors.len()
    );
    report
}
