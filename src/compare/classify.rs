//! Classification rules for one joined path
//!
//! Precedence, first match wins:
//! 1. `error_a` / `error_b` when a final status is 5xx
//! 2. `a_only` / `b_only`
//! 3. `redirect_both` / `redirect_mismatch`
//! 4. `status_mismatch`
//! 5. `same_status`

use crate::probe::ProbeResult;
use serde::Serialize;
use std::fmt;

/// Categorical outcome for a joined path key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonClass {
    SameStatus,
    AOnly,
    BOnly,
    StatusMismatch,
    RedirectBoth,
    RedirectMismatch,
    ErrorA,
    ErrorB,
}

impl ComparisonClass {
    /// Every class, in report order
    pub const ALL: [ComparisonClass; 8] = [
        ComparisonClass::SameStatus,
        ComparisonClass::AOnly,
        ComparisonClass::BOnly,
        ComparisonClass::StatusMismatch,
        ComparisonClass::RedirectBoth,
        ComparisonClass::RedirectMismatch,
        ComparisonClass::ErrorA,
        ComparisonClass::ErrorB,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonClass::SameStatus => "same_status",
            ComparisonClass::AOnly => "a_only",
            ComparisonClass::BOnly => "b_only",
            ComparisonClass::StatusMismatch => "status_mismatch",
            ComparisonClass::RedirectBoth => "redirect_both",
            ComparisonClass::RedirectMismatch => "redirect_mismatch",
            ComparisonClass::ErrorA => "error_a",
            ComparisonClass::ErrorB => "error_b",
        }
    }

    /// True for classes that make a run fail
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ComparisonClass::StatusMismatch | ComparisonClass::ErrorA | ComparisonClass::ErrorB
        )
    }
}

impl fmt::Display for ComparisonClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One site's view of a path: whether it was discovered and how it probed
#[derive(Debug, Clone, Copy)]
pub struct Side<'a> {
    pub present: bool,
    pub probe: Option<&'a ProbeResult>,
}

impl<'a> Side<'a> {
    pub fn absent() -> Self {
        Self {
            present: false,
            probe: None,
        }
    }

    fn final_status(&self) -> Option<u16> {
        self.probe.and_then(|probe| probe.final_status)
    }

    fn is_error(&self) -> bool {
        self.final_status().map(|status| status >= 500).unwrap_or(false)
    }

    fn redirected(&self) -> bool {
        self.probe
            .map(|probe| probe.redirect_hops() > 0)
            .unwrap_or(false)
    }

    fn landed_ok(&self) -> bool {
        self.final_status()
            .map(|status| (200..300).contains(&status))
            .unwrap_or(false)
    }
}

/// Classifies a joined path
///
/// # Examples
///
/// ```
/// use url_compare::compare::{classify, ComparisonClass, Side};
///
/// let class = classify(Side { present: true, probe: None }, Side::absent());
/// assert_eq!(class, ComparisonClass::AOnly);
/// ```
pub fn classify(a: Side<'_>, b: Side<'_>) -> ComparisonClass {
    if a.is_error() {
        return ComparisonClass::ErrorA;
    }
    if b.is_error() {
        return ComparisonClass::ErrorB;
    }

    match (a.present, b.present) {
        (true, false) => return ComparisonClass::AOnly,
        (false, true) => return ComparisonClass::BOnly,
        _ => {}
    }

    match (a.redirected(), b.redirected()) {
        (true, true) if a.landed_ok() && b.landed_ok() => return ComparisonClass::RedirectBoth,
        (true, false) | (false, true) => return ComparisonClass::RedirectMismatch,
        _ => {}
    }

    if a.final_status() != b.final_status() {
        ComparisonClass::StatusMismatch
    } else {
        ComparisonClass::SameStatus
    }
}

/// Builds the ordered warning tokens of a record
///
/// `error_a` and `error_b` when both sides are 5xx, then every probe note
/// prefixed `a:` or `b:`, then `a:not_probed` / `b:not_probed` for a present
/// side without a probe result.
pub fn record_notes(a: Side<'_>, b: Side<'_>) -> Vec<String> {
    let mut notes = Vec::new();

    if a.is_error() && b.is_error() {
        notes.push(ComparisonClass::ErrorA.to_string());
        notes.push(ComparisonClass::ErrorB.to_string());
    }

    for (prefix, side) in [("a", &a), ("b", &b)] {
        if let Some(probe) = side.probe {
            notes.extend(probe.notes.iter().map(|note| format!("{}:{}", prefix, note)));
        }
    }

    for (prefix, side) in [("a", &a), ("b", &b)] {
        if side.present && side.probe.is_none() {
            notes.push(format!("{}:not_probed", prefix));
        }
    }

    notes
}
