//! Display-side approval gating for coordinator-reviewed scores.
//!
//! The averaging code works on whatever numbers it receives; this module
//! decides which of those numbers a student or guardian may see.

use serde::Serialize;

use crate::grades::bimester_average;
use crate::models::{BimesterData, GradeEntry};

pub const PLACEHOLDER: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum Gated {
    Approved(f64),
    Pending,
    Absent,
}

impl Gated {
    pub fn value(self) -> Option<f64> {
        match self {
            Gated::Approved(value) => Some(value),
            Gated::Pending | Gated::Absent => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Gated::Pending)
    }

    /// Formatted score, or the neutral placeholder for anything not approved.
    pub fn display(self, decimals: usize) -> String {
        match self {
            Gated::Approved(value) => format!("{value:.decimals$}"),
            Gated::Pending | Gated::Absent => PLACEHOLDER.to_string(),
        }
    }
}

/// A missing approval flag predates the review workflow and counts as approved.
pub fn gate(value: Option<f64>, approved: Option<bool>) -> Gated {
    match (value, approved) {
        (None, _) => Gated::Absent,
        (Some(_), Some(false)) => Gated::Pending,
        (Some(value), _) => Gated::Approved(value),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatedBimester {
    pub score: Gated,
    pub remediation: Gated,
    pub average: Gated,
}

pub fn gated_bimester(data: &BimesterData) -> GatedBimester {
    let score = gate(data.score, data.is_score_approved);
    let remediation = gate(data.remediation, data.is_remediation_approved);
    let average = if score.is_pending() || remediation.is_pending() {
        Gated::Pending
    } else {
        match bimester_average(score.value(), remediation.value()) {
            Some(value) => Gated::Approved(value),
            None => Gated::Absent,
        }
    };
    GatedBimester {
        score,
        remediation,
        average,
    }
}

/// The entry as a student may see it: unapproved scores removed.
pub fn approved_view(entry: &GradeEntry) -> GradeEntry {
    let mut view = entry.clone();
    for slot in view.bimesters.iter_mut() {
        slot.score = gate(slot.score, slot.is_score_approved).value();
        slot.remediation = gate(slot.remediation, slot.is_remediation_approved).value();
    }
    view
}
