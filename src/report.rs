//! Results table and its text, HTML and delimited renderings

use crate::{MetricsResult, MetricsRow};
use flate2::write::GzEncoder;
use flate2::Compression;
use prettytable::{format::Alignment, Cell, Row, Table};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column order shared by every rendering
pub const HEADER: [&str; 6] = [
    "VCF File",
    "Expectations",
    "True-Positive",
    "False-Positive",
    "Sensitivity",
    "Specificity",
];

/// A file whose metrics could not be computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub sample_id: String,
    pub file_name: String,
    pub reason: String,
}

/// Metrics rows in processing order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    rows: Vec<MetricsRow>,
    skipped: Vec<SkippedFile>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: MetricsRow) {
        self.rows.push(row);
    }

    pub fn push_skipped(&mut self, skipped: SkippedFile) {
        self.skipped.push(skipped);
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bordered text table for terminal output
    pub fn to_text_table(&self) -> String {
        let mut table = Table::new();
        table.set_titles(Row::new(HEADER.iter().map(|h| Cell::new(h)).collect()));

        for row in &self.rows {
            let cells = row_cells(row)
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    // File names left-aligned, numbers right-aligned
                    if i == 0 {
                        Cell::new(cell)
                    } else {
                        Cell::new_align(cell, Alignment::RIGHT)
                    }
                })
                .collect();
            table.add_row(Row::new(cells));
        }

        table.to_string()
    }

    /// HTML table with the same columns as the text rendering
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table>\n<thead>\n<tr>");
        for key in HEADER {
            html.push_str(&format!("<th>{}</th>", key));
        }
        html.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in &self.rows {
            html.push_str("<tr>");
            for cell in row_cells(row) {
                html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>\n");
        html
    }
}

fn row_cells(row: &MetricsRow) -> [String; 6] {
    [
        row.file_name.clone(),
        row.expectation_count.to_string(),
        row.true_positive.to_string(),
        row.false_positive.to_string(),
        format!("{:.3}", row.sensitivity),
        format!("{:.3}", row.specificity),
    ]
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write the results table as CSV, or TSV for `.tsv`/`.tsv.gz` paths.
/// Paths ending in `.gz` are gzip compressed.
pub fn write_results(table: &ResultsTable, output_path: &Path) -> MetricsResult<()> {
    let name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let compressed = name.ends_with(".gz");
    let delimiter = if name.trim_end_matches(".gz").ends_with(".tsv") {
        b'\t'
    } else {
        b','
    };

    let file = File::create(output_path)?;
    let writer: Box<dyn Write> = if compressed {
        Box::new(GzEncoder::new(file, Compression::default()))
    } else {
        Box::new(file)
    };

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    csv_writer.write_record(HEADER)?;
    for row in table.rows() {
        csv_writer.write_record(row_cells(row))?;
    }
    csv_writer.flush()?;

    log::info!("Wrote {} result rows to {:?}", table.len(), output_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::tempdir;

    fn sample_table() -> ResultsTable {
        let mut table = ResultsTable::new();
        table.push(MetricsRow {
            file_name: "S1.vcf".to_string(),
            expectation_count: 5,
            true_positive: 3,
            false_positive: 7,
            sensitivity: 0.6,
            specificity: 0.958,
        });
        table.push(MetricsRow {
            file_name: "S2<long>.vcf".to_string(),
            expectation_count: 12,
            true_positive: 10,
            false_positive: 0,
            sensitivity: 0.833,
            specificity: 1.0,
        });
        table
    }

    #[test]
    fn test_text_table() {
        let text = sample_table().to_text_table();

        let title = text.lines().find(|l| l.contains("VCF File")).unwrap();
        let header_pos: Vec<usize> = HEADER.iter().map(|h| title.find(h).unwrap()).collect();
        assert!(header_pos.windows(2).all(|w| w[0] < w[1]));

        let s1 = text.lines().find(|l| l.contains("S1.vcf")).unwrap();
        assert!(s1.contains("0.600"));
        assert!(s1.contains("0.958"));
        let s2 = text.lines().find(|l| l.contains("S2<long>.vcf")).unwrap();
        assert!(s2.contains("1.000"));
    }

    #[test]
    fn test_text_table_aligns_non_ascii_names() {
        let mut table = sample_table();
        table.push(MetricsRow {
            file_name: "échantillon.vcf".to_string(),
            expectation_count: 1,
            true_positive: 1,
            false_positive: 0,
            sensitivity: 1.0,
            specificity: 1.0,
        });

        let text = table.to_text_table();
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(widths.len() > 3);
        assert!(widths.iter().all(|w| *w == widths[0]));
    }

    #[test]
    fn test_empty_text_table_has_header() {
        let text = ResultsTable::new().to_text_table();
        assert!(text.contains("VCF File"));
        assert!(text.contains("Specificity"));
        assert!(!text.contains(".vcf"));
    }

    #[test]
    fn test_html_table() {
        let html = sample_table().to_html();
        assert!(html.contains("<th>VCF File</th><th>Expectations</th>"));
        assert!(html.contains("<td>S1.vcf</td><td>5</td><td>3</td><td>7</td><td>0.600</td><td>0.958</td>"));
        assert!(html.contains("S2&lt;long&gt;.vcf"));
        assert_eq!(html.matches("<tr>").count(), 3);
    }

    #[test]
    fn test_write_results_csv_and_tsv() {
        let dir = tempdir().unwrap();
        let table = sample_table();

        let csv_path = dir.path().join("results.csv");
        write_results(&table, &csv_path).unwrap();
        let content = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "VCF File,Expectations,True-Positive,False-Positive,Sensitivity,Specificity"
        );
        assert_eq!(lines.next().unwrap(), "S1.vcf,5,3,7,0.600,0.958");

        let tsv_path = dir.path().join("results.tsv.gz");
        write_results(&table, &tsv_path).unwrap();
        let mut decoded = String::new();
        MultiGzDecoder::new(File::open(&tsv_path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert!(decoded.contains("S1.vcf\t5\t3\t7\t0.600\t0.958"));
    }
}
