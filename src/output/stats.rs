//! Summary statistics over comparison records
//!
//! This module provides functionality for aggregating comparison records
//! and displaying the totals at the end of a run.

use crate::compare::{ComparisonClass, ComparisonRecord};
use crate::probe::ProbeResult;
use std::collections::BTreeMap;

/// Final-status counts for one site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Count per final status code
    pub by_status: BTreeMap<u16, usize>,

    /// Paths present on the site that ended without any status
    pub none: usize,
}

impl StatusCounts {
    fn record(&mut self, present: bool, probe: Option<&ProbeResult>) {
        if !present {
            return;
        }
        match probe.and_then(|probe| probe.final_status) {
            Some(status) => *self.by_status.entry(status).or_insert(0) += 1,
            None => self.none += 1,
        }
    }

    /// Rows in display order: statuses ascending, then `none`
    pub fn rows(&self) -> Vec<(String, usize)> {
        let mut rows: Vec<(String, usize)> = self
            .by_status
            .iter()
            .map(|(status, count)| (status.to_string(), *count))
            .collect();
        if self.none > 0 {
            rows.push(("none".to_string(), self.none));
        }
        rows
    }
}

/// Comparison run summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonSummary {
    /// Total number of joined path keys
    pub total: usize,

    /// Count of records by comparison class
    pub by_class: BTreeMap<ComparisonClass, usize>,

    /// Final statuses seen on site A
    pub status_a: StatusCounts,

    /// Final statuses seen on site B
    pub status_b: StatusCounts,

    /// Records carrying at least one note
    pub with_notes: usize,
}

impl ComparisonSummary {
    /// Aggregates a list of comparison records
    pub fn from_records(records: &[ComparisonRecord]) -> Self {
        let mut summary = ComparisonSummary {
            total: records.len(),
            ..Self::default()
        };

        for record in records {
            *summary.by_class.entry(record.comparison_class).or_insert(0) += 1;
            summary
                .status_a
                .record(record.present_on_a, record.probe_a.as_ref());
            summary
                .status_b
                .record(record.present_on_b, record.probe_b.as_ref());
            if !record.notes.is_empty() {
                summary.with_notes += 1;
            }
        }

        summary
    }

    /// Number of records of one class
    pub fn count(&self, class: ComparisonClass) -> usize {
        self.by_class.get(&class).copied().unwrap_or(0)
    }
}

/// Prints the summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The summary to display
pub fn print_summary(summary: &ComparisonSummary) {
    println!("=== URL Comparison Summary ===\n");

    println!("Overview:");
    println!("  Total paths compared: {}", summary.total);
    println!("  Paths with notes: {}", summary.with_notes);
    println!();

    println!("By Comparison Class:");
    for class in ComparisonClass::ALL {
        let count = summary.count(class);
        if count == 0 {
            continue;
        }
        let percentage = if summary.total > 0 {
            (count as f64 / summary.total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", class, count, percentage);
    }
    println!();

    for (label, counts) in [("Site A", &summary.status_a), ("Site B", &summary.status_b)] {
        println!("{} Final Status:", label);
        let rows = counts.rows();
        if rows.is_empty() {
            println!("  (no paths)");
        }
        for (status, count) in rows {
            println!("  {}: {}", status, count);
        }
        println!();
    }
}
