//! Variant file reading for VCF, compressed VCF and BCF inputs

use crate::utils::{has_extension, is_gzipped, normalize_chromosome};
use crate::{MetricsError, MetricsResult};
use flate2::read::MultiGzDecoder;
use rust_htslib::bcf::{self, record::Numeric, Read as BcfRead};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A single variant call with the fields needed for validation
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    /// Reference allele first, then alternates
    pub alleles: Vec<String>,
    pub filters: Vec<String>,
    pub info: HashMap<String, Vec<String>>,
}

impl VariantRecord {
    pub fn is_pass(&self) -> bool {
        self.filters.iter().any(|f| f == "PASS")
    }

    pub fn normalized_chrom(&self) -> &str {
        normalize_chromosome(&self.chrom)
    }

    pub fn ref_allele(&self) -> Option<&str> {
        self.alleles.first().map(String::as_str)
    }

    pub fn alt_allele(&self) -> Option<&str> {
        self.alleles.get(1).map(String::as_str)
    }

    pub fn info_values(&self, key: &str) -> Option<&[String]> {
        self.info.get(key).map(Vec::as_slice)
    }

    /// First value of an INFO field parsed as a float
    pub fn first_info_float(&self, key: &str) -> Option<f64> {
        self.info_values(key)
            .and_then(|values| values.first())
            .and_then(|value| value.parse::<f64>().ok())
    }
}

/// Column indices for VCF parsing
#[derive(Debug, Clone)]
pub struct VcfColumnIndices {
    pub chrom: usize,
    pub pos: usize,
    pub ref_allele: usize,
    pub alt: usize,
    pub filter: usize,
    pub info: usize,
}

impl Default for VcfColumnIndices {
    fn default() -> Self {
        Self {
            chrom: 0,
            pos: 1,
            ref_allele: 3,
            alt: 4,
            filter: 6,
            info: 7,
        }
    }
}

impl VcfColumnIndices {
    pub fn from_header(header_line: &str) -> MetricsResult<Self> {
        let fields: Vec<&str> = header_line.trim().split('\t').collect();
        let find = |names: &[&str]| {
            fields
                .iter()
                .position(|col| names.contains(col))
                .ok_or_else(|| {
                    MetricsError::InvalidVariant(format!(
                        "{} column not found in VCF header",
                        names[0]
                    ))
                })
        };

        Ok(VcfColumnIndices {
            chrom: find(&["CHROM", "#CHROM"])?,
            pos: find(&["POS"])?,
            ref_allele: find(&["REF"])?,
            alt: find(&["ALT"])?,
            filter: find(&["FILTER"])?,
            info: find(&["INFO"])?,
        })
    }

    fn max_index(&self) -> usize {
        [
            self.chrom,
            self.pos,
            self.ref_allele,
            self.alt,
            self.filter,
            self.info,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

impl VariantRecord {
    pub fn from_line_with_indices(line: &str, indices: &VcfColumnIndices) -> MetricsResult<Self> {
        let fields: Vec<&str> = line.split('\t').collect();

        if fields.len() <= indices.max_index() {
            return Err(MetricsError::InvalidVariant(format!(
                "Invalid VCF line format - not enough columns: {}",
                line
            )));
        }

        let chrom = fields[indices.chrom].to_string();
        let pos = fields[indices.pos].parse::<u64>().map_err(|_| {
            MetricsError::InvalidVariant(format!("Invalid position: {}", fields[indices.pos]))
        })?;

        let mut alleles = vec![fields[indices.ref_allele].to_string()];
        alleles.extend(
            fields[indices.alt]
                .split(',')
                .filter(|alt| *alt != ".")
                .map(str::to_string),
        );

        Ok(VariantRecord {
            chrom,
            pos,
            alleles,
            filters: parse_filters(fields[indices.filter]),
            info: parse_info(fields[indices.info]),
        })
    }

    /// Parse a data line assuming the standard VCF column order
    pub fn from_line(line: &str) -> MetricsResult<Self> {
        Self::from_line_with_indices(line, &VcfColumnIndices::default())
    }
}

fn parse_filters(field: &str) -> Vec<String> {
    if field == "." || field.is_empty() {
        return Vec::new();
    }
    field.split(';').map(str::to_string).collect()
}

fn parse_info(field: &str) -> HashMap<String, Vec<String>> {
    let mut info = HashMap::new();
    if field == "." || field.is_empty() {
        return info;
    }

    for entry in field.split(';') {
        match entry.split_once('=') {
            Some((key, values)) => {
                info.insert(
                    key.to_string(),
                    values.split(',').map(str::to_string).collect(),
                );
            }
            // Flags carry no values
            None => {
                info.insert(entry.to_string(), Vec::new());
            }
        }
    }

    info
}

/// A single-pass source of variant records
pub trait VariantSource {
    fn records<'a>(&'a mut self) -> Box<dyn Iterator<Item = MetricsResult<VariantRecord>> + 'a>;
}

/// In-memory records are drained on iteration, like a file reader
impl VariantSource for Vec<VariantRecord> {
    fn records<'a>(&'a mut self) -> Box<dyn Iterator<Item = MetricsResult<VariantRecord>> + 'a> {
        Box::new(self.drain(..).map(Ok))
    }
}

/// VCF text reader that handles both compressed and uncompressed files
pub struct VcfReader {
    reader: Box<dyn BufRead>,
}

impl VcfReader {
    pub fn new<P: AsRef<Path>>(path: P) -> MetricsResult<Self> {
        let file = File::open(&path)
            .map_err(|_| MetricsError::FileNotFound(path.as_ref().display().to_string()))?;

        let reader: Box<dyn BufRead> = if is_gzipped(&path)? {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Ok(VcfReader { reader })
    }
}

impl VariantSource for VcfReader {
    fn records<'a>(&'a mut self) -> Box<dyn Iterator<Item = MetricsResult<VariantRecord>> + 'a> {
        Box::new(VcfRecordIterator {
            reader: &mut self.reader,
            indices: None,
            line_number: 0,
        })
    }
}

/// Iterator over VCF text records
pub struct VcfRecordIterator<'a> {
    reader: &'a mut Box<dyn BufRead>,
    indices: Option<VcfColumnIndices>,
    line_number: usize,
}

impl<'a> Iterator for VcfRecordIterator<'a> {
    type Item = MetricsResult<VariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();

        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let line = line.trim_end();
                    if line.starts_with("##") || line.is_empty() {
                        continue;
                    }
                    if line.starts_with('#') {
                        match VcfColumnIndices::from_header(line) {
                            Ok(indices) => self.indices = Some(indices),
                            Err(e) => return Some(Err(e)),
                        }
                        continue;
                    }

                    let indices = self.indices.clone().unwrap_or_default();
                    let line_number = self.line_number;
                    return Some(
                        VariantRecord::from_line_with_indices(line, &indices).map_err(|e| {
                            MetricsError::InvalidVariant(format!("line {}: {}", line_number, e))
                        }),
                    );
                }
                Err(e) => return Some(Err(MetricsError::Io(e))),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfoType {
    Flag,
    Integer,
    Float,
    String,
}

/// BCF reader backed by HTSlib
pub struct BcfReader {
    reader: bcf::Reader,
    info_fields: Vec<(String, InfoType)>,
}

impl BcfReader {
    pub fn from_path<P: AsRef<Path>>(path: P) -> MetricsResult<Self> {
        let reader = bcf::Reader::from_path(path.as_ref())?;

        let info_fields = reader
            .header()
            .header_records()
            .into_iter()
            .filter_map(|rec| match rec {
                bcf::header::HeaderRecord::Info { values, .. } => {
                    let id = values.get("ID")?.clone();
                    let info_type = match values.get("Type").map(String::as_str) {
                        Some("Flag") => InfoType::Flag,
                        Some("Integer") => InfoType::Integer,
                        Some("Float") => InfoType::Float,
                        _ => InfoType::String,
                    };
                    Some((id, info_type))
                }
                _ => None,
            })
            .collect();

        Ok(BcfReader {
            reader,
            info_fields,
        })
    }
}

impl VariantSource for BcfReader {
    fn records<'a>(&'a mut self) -> Box<dyn Iterator<Item = MetricsResult<VariantRecord>> + 'a> {
        let info_fields = &self.info_fields;
        Box::new(
            self.reader
                .records()
                .map(move |record| convert_bcf_record(&record?, info_fields)),
        )
    }
}

fn convert_bcf_record(
    record: &bcf::Record,
    info_fields: &[(String, InfoType)],
) -> MetricsResult<VariantRecord> {
    let header = record.header();
    let rid = record
        .rid()
        .ok_or_else(|| MetricsError::InvalidVariant("record without contig".to_string()))?;
    let chrom = String::from_utf8_lossy(header.rid2name(rid)?).into_owned();

    let alleles = record
        .alleles()
        .into_iter()
        .map(|allele| String::from_utf8_lossy(allele).into_owned())
        .collect();

    let filters = record
        .filters()
        .map(|id| String::from_utf8_lossy(&header.id_to_name(id)).into_owned())
        .collect();

    let mut info = HashMap::new();
    for (key, info_type) in info_fields {
        let tag = key.as_bytes();
        let values: Option<Vec<String>> = match info_type {
            InfoType::Flag => record.info(tag).flag()?.then(Vec::new),
            InfoType::Integer => record.info(tag).integer()?.map(|values| {
                values
                    .iter()
                    .filter(|v| !v.is_missing())
                    .map(|v| v.to_string())
                    .collect()
            }),
            InfoType::Float => record.info(tag).float()?.map(|values| {
                values
                    .iter()
                    .filter(|v| !v.is_missing())
                    .map(|v| v.to_string())
                    .collect()
            }),
            InfoType::String => record.info(tag).string()?.map(|values| {
                values
                    .iter()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .collect()
            }),
        };
        if let Some(values) = values {
            info.insert(key.clone(), values);
        }
    }

    Ok(VariantRecord {
        chrom,
        pos: record.pos() as u64 + 1,
        alleles,
        filters,
        info,
    })
}

/// Open a variant file, choosing the reader by extension
pub fn open_variant_file<P: AsRef<Path>>(path: P) -> MetricsResult<Box<dyn VariantSource>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MetricsError::FileNotFound(path.display().to_string()));
    }

    if has_extension(path, "bcf") {
        log::debug!("Opening {:?} as BCF", path);
        Ok(Box::new(BcfReader::from_path(path)?))
    } else {
        log::debug!("Opening {:?} as VCF text", path);
        Ok(Box::new(VcfReader::new(path)?))
    }
}
