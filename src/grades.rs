use serde::Serialize;

use crate::config::GradeThresholds;
use crate::models::{BimesterData, GradeEntry, Situation};

/// Bimester average: the remediation score replaces the regular one only
/// when it is higher. `None` means nothing has been graded yet.
pub fn bimester_average(score: Option<f64>, remediation: Option<f64>) -> Option<f64> {
    match (score, remediation) {
        (None, None) => None,
        (Some(score), None) => Some(score),
        (None, Some(remediation)) => Some(remediation),
        (Some(score), Some(remediation)) => Some(score.max(remediation)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalData {
    #[serde(rename = "mediaAnual")]
    pub annual_average: Option<f64>,
    #[serde(rename = "mediaFinal")]
    pub final_average: Option<f64>,
    #[serde(rename = "recuperacaoFinal")]
    pub final_remediation: Option<f64>,
    #[serde(rename = "situacaoFinal")]
    pub situation: Situation,
}

/// Annual and final results from up to four bimester averages.
pub fn final_data(
    bimester_averages: &[Option<f64>],
    final_remediation: Option<f64>,
    is_year_finished: bool,
    thresholds: GradeThresholds,
) -> FinalData {
    let graded: Vec<f64> = bimester_averages.iter().flatten().copied().collect();
    let annual_average = if graded.is_empty() {
        None
    } else {
        Some(round2(graded.iter().sum::<f64>() / graded.len() as f64))
    };

    let Some(annual) = annual_average else {
        let situation = if is_year_finished {
            Situation::Pending
        } else {
            Situation::InProgress
        };
        return FinalData {
            annual_average: None,
            final_average: None,
            final_remediation,
            situation,
        };
    };

    let passing = thresholds.passing_threshold;
    let (final_average, situation) = if annual >= passing {
        (annual, Situation::Approved)
    } else if !is_year_finished {
        (annual, Situation::InProgress)
    } else if let Some(remediation) = final_remediation {
        let blended = annual.max(remediation);
        let situation = if blended >= passing {
            Situation::Approved
        } else {
            Situation::Failed
        };
        (blended, situation)
    } else if annual >= thresholds.failing_floor {
        (annual, Situation::Remediation)
    } else {
        (annual, Situation::Failed)
    };

    FinalData {
        annual_average,
        final_average: Some(final_average),
        final_remediation,
        situation,
    }
}

/// Applies a freshly computed situation to the stored one. After the year
/// closes, approval and failure are final and remediation can only resolve
/// into one of them.
///
/// Before the year closes nothing is sticky: a mid-year `Aprovado` is
/// provisional and callers must not treat it as terminal.
pub fn advance_situation(previous: Situation, computed: Situation, is_year_finished: bool) -> Situation {
    if !is_year_finished {
        return computed;
    }
    match previous {
        Situation::Approved | Situation::Failed => previous,
        Situation::Remediation if !computed.is_terminal() => previous,
        _ => computed,
    }
}

impl BimesterData {
    pub fn computed_average(&self) -> Option<f64> {
        bimester_average(self.score, self.remediation)
    }
}

impl GradeEntry {
    pub fn bimester_averages(&self) -> [Option<f64>; 4] {
        [
            self.bimesters.bimester1.computed_average(),
            self.bimesters.bimester2.computed_average(),
            self.bimesters.bimester3.computed_average(),
            self.bimesters.bimester4.computed_average(),
        ]
    }

    pub fn final_data(&self, thresholds: GradeThresholds, is_year_finished: bool) -> FinalData {
        final_data(
            &self.bimester_averages(),
            self.final_remediation,
            is_year_finished,
            thresholds,
        )
    }

    /// Copy of the entry with every derived field refreshed.
    pub fn recompute(&self, thresholds: GradeThresholds, is_year_finished: bool) -> GradeEntry {
        let mut entry = self.clone();
        for slot in entry.bimesters.iter_mut() {
            slot.average = slot.computed_average();
        }
        let data = entry.final_data(thresholds, is_year_finished);
        entry.annual_average = data.annual_average;
        entry.final_average = data.final_average;
        entry.final_situation =
            advance_situation(self.final_situation, data.situation, is_year_finished);
        entry
    }
}
