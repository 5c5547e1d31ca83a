//! Cross-site comparison module
//!
//! Joins the discovery and probe results of both sites on the path key and
//! classifies every joined path.

mod classify;

pub use classify::{classify, record_notes, ComparisonClass, Side};

use crate::discovery::{DiscoveredUrl, Discovery, UrlSource};
use crate::probe::{ProbeResult, ProbeResults};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// The comparison of one path key across both sites
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonRecord {
    pub path_key: String,
    pub present_on_a: bool,
    pub present_on_b: bool,
    /// `None` when the path was not discovered on A
    pub source_a: Option<UrlSource>,
    pub source_b: Option<UrlSource>,
    pub probe_a: Option<ProbeResult>,
    pub probe_b: Option<ProbeResult>,
    pub comparison_class: ComparisonClass,
    pub notes: Vec<String>,
}

impl ComparisonRecord {
    /// True when the record has no warnings and a non-failing class
    pub fn is_clean(&self) -> bool {
        self.notes.is_empty() && !self.comparison_class.is_failure()
    }
}

/// Indexes a site's discovered URLs by path key
///
/// When several URLs share a path key the smallest normalized URL wins.
fn index_by_path(discovery: &Discovery) -> BTreeMap<String, &DiscoveredUrl> {
    let mut index: BTreeMap<String, &DiscoveredUrl> = BTreeMap::new();

    for discovered in discovery.urls.values() {
        match index.entry(discovered.normalized.path_key()) {
            Entry::Vacant(slot) => {
                slot.insert(discovered);
            }
            Entry::Occupied(mut slot) => {
                if discovered.normalized < slot.get().normalized {
                    slot.insert(discovered);
                }
            }
        }
    }

    index
}

/// Compares two sites
///
/// Full outer join on path key. The result is ordered by path key and holds
/// one record per key, including keys whose probes all failed.
pub fn compare(
    discovery_a: &Discovery,
    probes_a: &ProbeResults,
    discovery_b: &Discovery,
    probes_b: &ProbeResults,
) -> Vec<ComparisonRecord> {
    let index_a = index_by_path(discovery_a);
    let index_b = index_by_path(discovery_b);

    let mut path_keys: Vec<&String> = index_a.keys().chain(index_b.keys()).collect();
    path_keys.sort();
    path_keys.dedup();

    path_keys
        .into_iter()
        .map(|path_key| {
            let url_a = index_a.get(path_key).copied();
            let url_b = index_b.get(path_key).copied();
            let probe_a = url_a.and_then(|url| probes_a.get(&url.normalized));
            let probe_b = url_b.and_then(|url| probes_b.get(&url.normalized));

            let side_a = Side {
                present: url_a.is_some(),
                probe: probe_a,
            };
            let side_b = Side {
                present: url_b.is_some(),
                probe: probe_b,
            };

            ComparisonRecord {
                path_key: path_key.clone(),
                present_on_a: side_a.present,
                present_on_b: side_b.present,
                source_a: url_a.map(|url| url.source),
                source_b: url_b.map(|url| url.source),
                probe_a: probe_a.cloned(),
                probe_b: probe_b.cloned(),
                comparison_class: classify(side_a, side_b),
                notes: record_notes(side_a, side_b),
            }
        })
        .collect()
}
