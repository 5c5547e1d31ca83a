//! Output module for comparison results
//!
//! This module handles:
//! - Exporting comparison records as CSV
//! - Aggregating and printing run summaries

pub mod csv;
pub mod stats;

pub use self::csv::{write_csv, write_records, COLUMNS};
pub use stats::{print_summary, ComparisonSummary, StatusCounts};
