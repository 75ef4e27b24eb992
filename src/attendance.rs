//! Attendance percentages per bimester and per year.

use chrono::NaiveDate;
use serde::Serialize;

use crate::calendar::{bimester_range, locate_bimester, FIRST_BIMESTER, LAST_BIMESTER};
use crate::config::EngineConfig;
use crate::models::{
    names_match, AcademicCalendar, AttendanceRecord, AttendanceStatus, BimesterNumber,
    CalendarEvent, ClassScope, CurriculumMatrix, DateRange, WeeklyTimetable, BIMESTER_COUNT,
};
use crate::taught::taught_classes;

/// Borrowed, read-only inputs shared by every attendance computation.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceContext<'a> {
    pub curriculum: &'a CurriculumMatrix,
    pub calendar: Option<&'a AcademicCalendar>,
    pub events: &'a [CalendarEvent],
    pub timetable: &'a WeeklyTimetable,
    pub config: &'a EngineConfig,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResult {
    pub percent: f64,
    pub taught: f64,
    pub absences: f64,
    pub is_estimated: bool,
}

impl AttendanceContext<'_> {
    pub fn current_bimester(&self) -> BimesterNumber {
        locate_bimester(self.today, self.calendar)
    }
}

/// `(taught - absences) / taught` as a percentage, held within `[0, 100]`.
pub fn attendance_percent(taught: f64, absences: f64) -> f64 {
    if taught <= 0.0 {
        return 100.0;
    }
    ((taught - absences.max(0.0)) / taught * 100.0).clamp(0.0, 100.0)
}

/// Weight of one record against a student: the per-student count, else the
/// record's lesson count, else one.
fn absence_weight(record: &AttendanceRecord, student_id: &str) -> f64 {
    let weight = record
        .student_absence_count
        .get(student_id)
        .copied()
        .or(record.lesson_count)
        .unwrap_or(1);
    f64::from(weight)
}

fn is_absent(record: &AttendanceRecord, student_id: &str) -> bool {
    record.student_status.get(student_id) == Some(&AttendanceStatus::Absent)
}

pub fn count_absences(
    records: &[AttendanceRecord],
    student_id: &str,
    subject: &str,
    range: DateRange,
) -> f64 {
    records
        .iter()
        .filter(|r| range.contains(r.date) && names_match(&r.discipline, subject))
        .filter(|r| is_absent(r, student_id))
        .map(|r| absence_weight(r, student_id))
        .sum()
}

/// Weighted absences of a student in a subject per bimester, counted over
/// the same ranges `bimester_attendance` uses for taught classes.
pub fn absences_by_bimester(
    records: &[AttendanceRecord],
    student_id: &str,
    subject: &str,
    calendar: Option<&AcademicCalendar>,
    today: NaiveDate,
) -> [f64; BIMESTER_COUNT] {
    let mut totals = [0.0; BIMESTER_COUNT];
    for (bimester, total) in (FIRST_BIMESTER..=LAST_BIMESTER).zip(totals.iter_mut()) {
        let range = bimester_range(bimester, calendar, today);
        *total = count_absences(records, student_id, subject, range);
    }
    totals
}

pub fn bimester_attendance(
    ctx: &AttendanceContext<'_>,
    scope: &ClassScope,
    subject: &str,
    absences: f64,
    bimester: BimesterNumber,
) -> AttendanceResult {
    let range = bimester_range(bimester, ctx.calendar, ctx.today);
    let taught = taught_classes(
        subject,
        scope,
        range,
        ctx.curriculum,
        ctx.timetable,
        ctx.events,
        ctx.config,
    );
    AttendanceResult {
        percent: attendance_percent(taught.taught, absences),
        taught: taught.taught,
        absences,
        is_estimated: taught.estimated,
    }
}

/// Yearly attendance: taught classes and absences are summed over the elapsed
/// bimesters before dividing.
pub fn annual_attendance(
    ctx: &AttendanceContext<'_>,
    scope: &ClassScope,
    subject: &str,
    absences_per_bimester: &[f64],
) -> AttendanceResult {
    let current = ctx.current_bimester();
    let mut taught = 0.0;
    let mut absences = 0.0;
    let mut is_estimated = false;

    for bimester in FIRST_BIMESTER..=current.min(LAST_BIMESTER) {
        let index = usize::from(bimester - 1);
        let bimester_absences = absences_per_bimester.get(index).copied().unwrap_or(0.0);
        let result = bimester_attendance(ctx, scope, subject, bimester_absences, bimester);
        taught += result.taught;
        absences += bimester_absences;
        is_estimated |= result.is_estimated;
    }

    AttendanceResult {
        percent: attendance_percent(taught, absences),
        taught,
        absences,
        is_estimated,
    }
}

/// Yearly percentage from precomputed `(taught, absences)` pairs.
pub fn annual_from_parts(parts: &[(f64, f64)]) -> f64 {
    let (taught, absences) = parts
        .iter()
        .fold((0.0, 0.0), |(t, a), &(taught, absent)| (t + taught, a + absent));
    attendance_percent(taught, absences)
}

pub fn student_attendance(
    ctx: &AttendanceContext<'_>,
    scope: &ClassScope,
    student_id: &str,
    subject: &str,
    records: &[AttendanceRecord],
    bimester: BimesterNumber,
) -> AttendanceResult {
    let range = bimester_range(bimester, ctx.calendar, ctx.today);
    let absences = count_absences(records, student_id, subject, range);
    bimester_attendance(ctx, scope, subject, absences, bimester)
}

pub fn student_annual_attendance(
    ctx: &AttendanceContext<'_>,
    scope: &ClassScope,
    student_id: &str,
    subject: &str,
    records: &[AttendanceRecord],
) -> AttendanceResult {
    let absences = absences_by_bimester(records, student_id, subject, ctx.calendar, ctx.today);
    annual_attendance(ctx, scope, subject, &absences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::models::{Bimester, CurriculumSegment, CurriculumSubject};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scope() -> ClassScope {
        ClassScope {
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "A".to_string(),
            shift: None,
        }
    }

    fn curriculum() -> CurriculumMatrix {
        CurriculumMatrix {
            segments: vec![CurriculumSegment {
                name: "Fundamental II".to_string(),
                grade_levels: vec!["6º Ano".to_string()],
                subjects: vec![CurriculumSubject {
                    name: "História".to_string(),
                    weekly_hours: 5,
                    abbreviation: None,
                }],
            }],
        }
    }

    fn calendar() -> AcademicCalendar {
        let bimester = |number, start, end| Bimester {
            number,
            start_date: start,
            end_date: end,
        };
        AcademicCalendar {
            bimesters: vec![
                bimester(1, date(2025, 3, 3), date(2025, 3, 14)),
                bimester(2, date(2025, 3, 17), date(2025, 3, 28)),
                bimester(3, date(2025, 3, 31), date(2025, 4, 11)),
                bimester(4, date(2025, 4, 14), date(2025, 4, 25)),
            ],
        }
    }

    fn record(day: NaiveDate, subject: &str, student: &str, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: None,
            date: day,
            discipline: subject.to_string(),
            school_class: Some("A".to_string()),
            lesson_count: None,
            student_status: HashMap::from([(student.to_string(), status)]),
            student_absence_count: HashMap::new(),
        }
    }

    #[test]
    fn percent_stays_within_bounds() {
        assert_eq!(attendance_percent(0.0, 3.0), 100.0);
        assert_eq!(attendance_percent(10.0, 0.0), 100.0);
        assert_eq!(attendance_percent(10.0, 25.0), 0.0);
        assert_eq!(attendance_percent(20.0, 5.0), 75.0);
        for taught in 0..30 {
            for absences in 0..40 {
                let percent = attendance_percent(f64::from(taught), f64::from(absences));
                assert!((0.0..=100.0).contains(&percent));
            }
        }
    }

    #[test]
    fn annual_sums_before_dividing() {
        let parts = [(20.0, 2.0), (20.0, 0.0), (20.0, 0.0), (20.0, 0.0)];
        assert_eq!(annual_from_parts(&parts), 97.5);
        // A bimester with nothing taught does not drag the average.
        assert_eq!(annual_from_parts(&[(10.0, 1.0), (0.0, 0.0)]), 90.0);
    }

    #[test]
    fn absences_use_weights() {
        let mut heavy = record(date(2025, 3, 4), "História", "s1", AttendanceStatus::Absent);
        heavy.lesson_count = Some(2);
        let mut custom = record(date(2025, 3, 5), "História", "s1", AttendanceStatus::Absent);
        custom.lesson_count = Some(2);
        custom.student_absence_count.insert("s1".to_string(), 1);
        let present = record(date(2025, 3, 6), "História", "s1", AttendanceStatus::Present);
        let other_subject = record(date(2025, 3, 6), "Geografia", "s1", AttendanceStatus::Absent);
        let other_student = record(date(2025, 3, 7), "História", "s2", AttendanceStatus::Absent);
        let records = vec![heavy, custom, present, other_subject, other_student];

        let range = DateRange::new(date(2025, 3, 1), date(2025, 3, 31));
        assert_eq!(count_absences(&records, "s1", "história", range), 3.0);

        let narrow = DateRange::new(date(2025, 3, 5), date(2025, 3, 31));
        assert_eq!(count_absences(&records, "s1", "História", narrow), 1.0);
    }

    #[test]
    fn absences_are_bucketed_by_bimester() {
        let records = vec![
            record(date(2025, 3, 4), "História", "s1", AttendanceStatus::Absent),
            record(date(2025, 3, 20), "História", "s1", AttendanceStatus::Absent),
            record(date(2025, 3, 21), "História", "s1", AttendanceStatus::Absent),
        ];
        let cal = calendar();
        assert_eq!(
            absences_by_bimester(&records, "s1", "História", Some(&cal), date(2025, 12, 1)),
            [1.0, 2.0, 0.0, 0.0]
        );
    }

    #[test]
    fn bucketed_absences_share_the_taught_windows() {
        let records = vec![
            // Before the first bimester, in the weekend break and after the last.
            record(date(2025, 3, 1), "História", "s1", AttendanceStatus::Absent),
            record(date(2025, 3, 15), "História", "s1", AttendanceStatus::Absent),
            record(date(2025, 5, 10), "História", "s1", AttendanceStatus::Absent),
            record(date(2025, 3, 18), "História", "s1", AttendanceStatus::Absent),
            record(date(2025, 3, 25), "História", "s1", AttendanceStatus::Absent),
        ];
        let cal = calendar();
        assert_eq!(
            absences_by_bimester(&records, "s1", "História", Some(&cal), date(2025, 12, 1)),
            [0.0, 2.0, 0.0, 0.0]
        );
        // Absences dated after today fall outside the clipped range.
        assert_eq!(
            absences_by_bimester(&records, "s1", "História", Some(&cal), date(2025, 3, 20)),
            [0.0, 1.0, 0.0, 0.0]
        );
    }

    #[test]
    fn bimester_attendance_flags_estimates() {
        let cal = calendar();
        let curriculum = curriculum();
        let timetable = WeeklyTimetable::default();
        let config = EngineConfig::default();
        let ctx = AttendanceContext {
            curriculum: &curriculum,
            calendar: Some(&cal),
            events: &[],
            timetable: &timetable,
            config: &config,
            today: date(2025, 12, 1),
        };

        // Ten school days at one class a day.
        let result = bimester_attendance(&ctx, &scope(), "História", 2.0, 1);
        assert_eq!(result.taught, 10.0);
        assert_eq!(result.percent, 80.0);
        assert!(result.is_estimated);
    }

    #[test]
    fn annual_attendance_only_counts_elapsed_bimesters() {
        let cal = calendar();
        let curriculum = curriculum();
        let timetable = WeeklyTimetable::default();
        let config = EngineConfig::default();
        let ctx = AttendanceContext {
            curriculum: &curriculum,
            calendar: Some(&cal),
            events: &[],
            timetable: &timetable,
            config: &config,
            // Wednesday of the second bimester's first week.
            today: date(2025, 3, 19),
        };

        let result = annual_attendance(&ctx, &scope(), "História", &[2.0, 1.0, 5.0, 5.0]);
        assert_eq!(result.taught, 13.0);
        assert_eq!(result.absences, 3.0);
        assert_eq!(result.percent, (13.0 - 3.0) / 13.0 * 100.0);
        assert!(result.is_estimated);
    }

    #[test]
    fn future_bimester_reports_full_attendance() {
        let cal = calendar();
        let curriculum = curriculum();
        let timetable = WeeklyTimetable::default();
        let config = EngineConfig::default();
        let ctx = AttendanceContext {
            curriculum: &curriculum,
            calendar: Some(&cal),
            events: &[],
            timetable: &timetable,
            config: &config,
            today: date(2025, 3, 10),
        };
        let result = bimester_attendance(&ctx, &scope(), "História", 0.0, 4);
        assert_eq!(result.taught, 0.0);
        assert_eq!(result.percent, 100.0);
    }
}
