//! Utility functions for file handling and common operations

use crate::{MetricsError, MetricsResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Check if a file is gzip (or BGZF) compressed
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> MetricsResult<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0; 2];

    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1f, 0x8b]),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(MetricsError::Io(e)),
    }
}

/// Strip a leading "chr" from a chromosome name
pub fn normalize_chromosome(chrom: &str) -> &str {
    chrom.strip_prefix("chr").unwrap_or(chrom)
}

/// Validate file paths and check if they exist
pub fn validate_file_exists<P: AsRef<Path>>(path: P) -> MetricsResult<()> {
    if !path.as_ref().exists() {
        return Err(MetricsError::FileNotFound(
            path.as_ref().to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

/// Validate that a file is readable
pub fn validate_file_readable<P: AsRef<Path>>(path: P) -> MetricsResult<()> {
    validate_file_exists(&path)?;

    File::open(&path)
        .map_err(|_| MetricsError::FileNotFound(path.as_ref().to_string_lossy().to_string()))?;

    Ok(())
}

/// Check if a path has a specific extension
pub fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Text after the last '.' of a file name, or the whole name if there is none
pub fn file_type_suffix(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

/// Create parent directories if they don't exist
pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> MetricsResult<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Log progress information
pub fn log_progress(current: usize, total: usize, message: &str) {
    if total > 0 {
        let percentage = (current as f64 / total as f64) * 100.0;
        log::info!("{}: {} / {} ({:.1}%)", message, current, total, percentage);
    }
}

/// Round to three decimal places
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Timer utility for measuring execution time
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::info!("Starting timer: {}", name);
        Timer {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    pub fn log_elapsed(&self) {
        let duration = self.elapsed();
        log::info!("Timer '{}' elapsed: {:.2?}", self.name, duration);
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}
