//! CSV export of comparison records
//!
//! One row per path key, 27 columns. Booleans are written as `true`/`false`,
//! absent values as empty fields and notes joined with `"; "`.

use crate::compare::{ComparisonClass, ComparisonRecord};
use crate::discovery::UrlSource;
use crate::probe::ProbeResult;
use crate::CompareError;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Column names in output order
pub const COLUMNS: [&str; 27] = [
    "path_key",
    "present_on_a",
    "present_on_b",
    "source_a",
    "source_b",
    "initial_status_a",
    "final_status_a",
    "redirect_hops_a",
    "first_redirect_target_a",
    "final_url_a",
    "response_time_ms_a",
    "content_type_a",
    "canonical_url_a",
    "initial_status_b",
    "final_status_b",
    "redirect_hops_b",
    "first_redirect_target_b",
    "final_url_b",
    "response_time_ms_b",
    "content_type_b",
    "canonical_url_b",
    "title_a",
    "title_b",
    "title_hash_a",
    "title_hash_b",
    "comparison_class",
    "notes",
];

/// One CSV row; field order is column order
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    path_key: &'a str,
    present_on_a: bool,
    present_on_b: bool,
    source_a: &'static str,
    source_b: &'static str,
    initial_status_a: Option<u16>,
    final_status_a: Option<u16>,
    redirect_hops_a: Option<usize>,
    first_redirect_target_a: Option<&'a str>,
    final_url_a: Option<&'a str>,
    response_time_ms_a: Option<u64>,
    content_type_a: Option<&'a str>,
    canonical_url_a: Option<&'a str>,
    initial_status_b: Option<u16>,
    final_status_b: Option<u16>,
    redirect_hops_b: Option<usize>,
    first_redirect_target_b: Option<&'a str>,
    final_url_b: Option<&'a str>,
    response_time_ms_b: Option<u64>,
    content_type_b: Option<&'a str>,
    canonical_url_b: Option<&'a str>,
    title_a: Option<&'a str>,
    title_b: Option<&'a str>,
    title_hash_a: Option<&'a str>,
    title_hash_b: Option<&'a str>,
    comparison_class: ComparisonClass,
    notes: String,
}

fn source_label(source: Option<UrlSource>) -> &'static str {
    source.map(UrlSource::as_str).unwrap_or("none")
}

impl<'a> CsvRow<'a> {
    fn from_record(record: &'a ComparisonRecord) -> Self {
        let a = record.probe_a.as_ref();
        let b = record.probe_b.as_ref();

        CsvRow {
            path_key: &record.path_key,
            present_on_a: record.present_on_a,
            present_on_b: record.present_on_b,
            source_a: source_label(record.source_a),
            source_b: source_label(record.source_b),
            initial_status_a: a.and_then(|p| p.initial_status),
            final_status_a: a.and_then(|p| p.final_status),
            redirect_hops_a: a.map(ProbeResult::redirect_hops),
            first_redirect_target_a: a.and_then(|p| p.first_redirect_target.as_deref()),
            final_url_a: a.and_then(|p| p.final_url.as_deref()),
            response_time_ms_a: a.and_then(|p| p.response_time_ms),
            content_type_a: a.and_then(|p| p.content_type.as_deref()),
            canonical_url_a: a.and_then(|p| p.canonical_url.as_deref()),
            initial_status_b: b.and_then(|p| p.initial_status),
            final_status_b: b.and_then(|p| p.final_status),
            redirect_hops_b: b.map(ProbeResult::redirect_hops),
            first_redirect_target_b: b.and_then(|p| p.first_redirect_target.as_deref()),
            final_url_b: b.and_then(|p| p.final_url.as_deref()),
            response_time_ms_b: b.and_then(|p| p.response_time_ms),
            content_type_b: b.and_then(|p| p.content_type.as_deref()),
            canonical_url_b: b.and_then(|p| p.canonical_url.as_deref()),
            title_a: a.and_then(|p| p.title.as_deref()),
            title_b: b.and_then(|p| p.title.as_deref()),
            title_hash_a: a.and_then(|p| p.title_hash.as_deref()),
            title_hash_b: b.and_then(|p| p.title_hash.as_deref()),
            comparison_class: record.comparison_class,
            notes: record.notes.join("; "),
        }
    }
}

/// Writes records as CSV, header included, to any writer
pub fn write_records<W: Write>(records: &[ComparisonRecord], writer: W) -> Result<(), CompareError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);

    for record in records {
        csv_writer.serialize(CsvRow::from_record(record))?;
    }

    if records.is_empty() {
        csv_writer.write_record(COLUMNS)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes records to a CSV file, replacing any existing file
///
/// # Arguments
///
/// * `records` - The comparison records, already in output order
/// * `path` - Destination file path
pub fn write_csv(records: &[ComparisonRecord], path: impl AsRef<Path>) -> Result<(), CompareError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    write_records(records, file)?;
    tracing::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
