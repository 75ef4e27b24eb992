use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::attendance::{student_annual_attendance, AttendanceResult};
use crate::config::EngineConfig;
use crate::gating::{approved_view, gated_bimester, GatedBimester, PLACEHOLDER};
use crate::grades::FinalData;
use crate::models::{GradeEntry, StudentProfile};
use crate::snapshot::SchoolSnapshot;

pub const ESTIMATE_MARK: &str = "⚠";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject: String,
    pub abbreviation: String,
    pub bimesters: [GatedBimester; 4],
    pub final_data: FinalData,
    pub attendance: AttendanceResult,
    pub difficulty_topics: Vec<String>,
}

fn empty_entry(student_id: &str, subject: &str) -> GradeEntry {
    GradeEntry {
        student_id: student_id.to_string(),
        subject: subject.to_string(),
        bimesters: Default::default(),
        final_remediation: None,
        annual_average: None,
        final_average: None,
        final_situation: Default::default(),
    }
}

/// Per-subject results for a student, with unapproved scores withheld.
pub fn summarize_subjects(
    snapshot: &SchoolSnapshot,
    student: &StudentProfile,
    config: &EngineConfig,
    today: NaiveDate,
    is_year_finished: bool,
) -> Vec<SubjectSummary> {
    let ctx = snapshot.context(config, today);
    let scope = student.scope();

    snapshot
        .subjects_for(student)
        .into_iter()
        .map(|subject| {
            let entry = snapshot
                .grade(&student.id, &subject)
                .cloned()
                .unwrap_or_else(|| empty_entry(&student.id, &subject));
            let visible = approved_view(&entry);
            let bimesters = [
                gated_bimester(&entry.bimesters.bimester1),
                gated_bimester(&entry.bimesters.bimester2),
                gated_bimester(&entry.bimesters.bimester3),
                gated_bimester(&entry.bimesters.bimester4),
            ];
            let difficulty_topics = entry
                .bimesters
                .iter()
                .filter_map(|b| b.difficulty_topic.as_deref())
                .map(str::trim)
                .filter(|topic| !topic.is_empty())
                .map(str::to_string)
                .collect();

            SubjectSummary {
                abbreviation: snapshot.curriculum.abbreviate(&subject),
                bimesters,
                final_data: visible.final_data(config.thresholds(), is_year_finished),
                attendance: student_annual_attendance(
                    &ctx,
                    &scope,
                    &student.id,
                    &subject,
                    &snapshot.attendance,
                ),
                difficulty_topics,
                subject,
            }
        })
        .collect()
}

pub fn format_attendance(result: &AttendanceResult) -> String {
    if result.is_estimated {
        format!("{:.1}% {ESTIMATE_MARK}", result.percent)
    } else {
        format!("{:.1}%", result.percent)
    }
}

fn format_average(value: Option<f64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |v| format!("{v:.1}"))
}

pub fn build_report_card(
    student: &StudentProfile,
    summaries: &[SubjectSummary],
    today: NaiveDate,
    minimum_attendance: f64,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Report Card");
    let _ = writeln!(
        output,
        "{} ({} {}, {}) as of {}",
        student.name, student.grade_level, student.school_class, student.unit, today
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Grades");

    if summaries.is_empty() {
        let _ = writeln!(output, "No subjects found for this grade level.");
    } else {
        let _ = writeln!(
            output,
            "| Subject | B1 | B2 | B3 | B4 | Annual | Final | Situation | Attendance |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
        for summary in summaries {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} | {} | {} |",
                summary.abbreviation,
                summary.bimesters[0].average.display(1),
                summary.bimesters[1].average.display(1),
                summary.bimesters[2].average.display(1),
                summary.bimesters[3].average.display(1),
                format_average(summary.final_data.annual_average),
                format_average(summary.final_data.final_average),
                summary.final_data.situation.label(),
                format_attendance(&summary.attendance),
            );
        }
    }

    let pending = summaries
        .iter()
        .any(|s| s.bimesters.iter().any(|b| b.average.is_pending()));
    let estimated = summaries.iter().any(|s| s.attendance.is_estimated);
    if pending || estimated {
        let _ = writeln!(output);
    }
    if pending {
        let _ = writeln!(
            output,
            "{PLACEHOLDER} marks scores awaiting coordinator review."
        );
    }
    if estimated {
        let _ = writeln!(
            output,
            "{ESTIMATE_MARK} attendance estimated from weekly hours; subject missing from the class timetable."
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Attendance Alerts");
    let low: Vec<&SubjectSummary> = summaries
        .iter()
        .filter(|s| s.attendance.percent < minimum_attendance)
        .collect();
    if low.is_empty() {
        let _ = writeln!(
            output,
            "All subjects at or above {minimum_attendance:.0}% attendance."
        );
    } else {
        for summary in low {
            let _ = writeln!(
                output,
                "- {}: {} ({} absences over {} classes)",
                summary.subject,
                format_attendance(&summary.attendance),
                summary.attendance.absences,
                summary.attendance.taught
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Topics To Review");
    let topics: Vec<(&str, &str)> = summaries
        .iter()
        .flat_map(|s| {
            s.difficulty_topics
                .iter()
                .map(move |topic| (s.subject.as_str(), topic.as_str()))
        })
        .collect();
    if topics.is_empty() {
        let _ = writeln!(output, "No difficulty topics recorded.");
    } else {
        for (subject, topic) in topics {
            let _ = writeln!(output, "- {subject}: {topic}");
        }
    }

    output
}
