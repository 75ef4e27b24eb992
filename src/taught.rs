use chrono::Datelike;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{classify_day, count_school_days, DayKind};
use crate::config::EngineConfig;
use crate::models::{CalendarEvent, ClassScope, CurriculumMatrix, DateRange, WeeklyTimetable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaughtClasses {
    pub taught: f64,
    /// Counted from the uniform weekly-hours estimate instead of a timetable.
    pub estimated: bool,
}

/// Class sessions of `subject` nominally held for `scope` within `range`.
///
/// When the class timetable schedules the subject, each date contributes the
/// periods the subject occupies on that weekday. Otherwise the count is
/// estimated as `weekly_hours / school_days_per_week` per generic school day.
pub fn taught_classes(
    subject: &str,
    scope: &ClassScope,
    range: DateRange,
    curriculum: &CurriculumMatrix,
    timetable: &WeeklyTimetable,
    events: &[CalendarEvent],
    config: &EngineConfig,
) -> TaughtClasses {
    if range.is_empty() {
        return TaughtClasses::default();
    }

    if timetable.teaches(scope, subject) {
        let lesson = config.lesson_minutes;
        let taught: u32 = range
            .days()
            .map(|date| match classify_day(date, scope, events) {
                DayKind::NonSchool => 0,
                DayKind::Regular => timetable.periods_on(scope, date.weekday(), subject, lesson),
                DayKind::Makeup { follows } => timetable.periods_on(scope, follows, subject, lesson),
            })
            .sum();
        return TaughtClasses {
            taught: f64::from(taught),
            estimated: false,
        };
    }

    debug!(
        subject,
        class_has_timetable = timetable.has_scope(scope),
        unit = %scope.unit,
        grade = %scope.grade_level,
        class = %scope.school_class,
        "subject not in class timetable, estimating taught classes"
    );

    let Some(weekly_hours) = curriculum.weekly_hours(subject, &scope.grade_level) else {
        return TaughtClasses {
            taught: 0.0,
            estimated: true,
        };
    };

    let school_days = count_school_days(range, scope, events);
    let per_day = f64::from(weekly_hours) / f64::from(config.school_days_per_week.max(1));
    TaughtClasses {
        taught: (per_day * f64::from(school_days)).round(),
        estimated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::models::{
        CalendarEventType, ClassSchedule, CurriculumSegment, CurriculumSubject, ScheduleItem,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scope() -> ClassScope {
        ClassScope {
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "A".to_string(),
            shift: Some("Matutino".to_string()),
        }
    }

    fn curriculum() -> CurriculumMatrix {
        CurriculumMatrix {
            segments: vec![CurriculumSegment {
                name: "Fundamental II".to_string(),
                grade_levels: vec!["6º Ano".to_string()],
                subjects: vec![CurriculumSubject {
                    name: "Matemática".to_string(),
                    weekly_hours: 5,
                    abbreviation: None,
                }],
            }],
        }
    }

    fn math_day(day: u8) -> ClassSchedule {
        ClassSchedule {
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "A".to_string(),
            shift: "Matutino".to_string(),
            day_of_week: day,
            items: vec![
                ScheduleItem {
                    start_time: "07:00".to_string(),
                    end_time: "07:50".to_string(),
                    subject: "Matemática".to_string(),
                },
                ScheduleItem {
                    start_time: "07:50".to_string(),
                    end_time: "08:40".to_string(),
                    subject: "Matemática".to_string(),
                },
            ],
        }
    }

    fn timetable() -> WeeklyTimetable {
        // Monday, Wednesday and Friday, two periods each.
        WeeklyTimetable::new(vec![math_day(1), math_day(3), math_day(5)])
    }

    fn event(kind: CalendarEventType, day: NaiveDate) -> CalendarEvent {
        CalendarEvent {
            id: format!("{kind:?}-{day}"),
            start_date: day,
            end_date: None,
            event_type: kind,
            title: String::new(),
            scope: None,
            follows_weekday: None,
        }
    }

    #[test]
    fn empty_range_teaches_nothing() {
        let range = DateRange::new(date(2025, 3, 10), date(2025, 3, 9));
        let result = taught_classes(
            "Matemática",
            &scope(),
            range,
            &curriculum(),
            &timetable(),
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(result, TaughtClasses { taught: 0.0, estimated: false });
    }

    #[test]
    fn counts_periods_from_timetable() {
        // 2025-03-03 (Mon) .. 2025-03-16 (Sun): two Mon/Wed/Fri weeks.
        let range = DateRange::new(date(2025, 3, 3), date(2025, 3, 16));
        let result = taught_classes(
            "Matemática",
            &scope(),
            range,
            &curriculum(),
            &timetable(),
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(result, TaughtClasses { taught: 12.0, estimated: false });
    }

    #[test]
    fn holidays_skip_and_makeup_days_add() {
        let range = DateRange::new(date(2025, 3, 3), date(2025, 3, 9));
        let mut saturday = event(CalendarEventType::MakeupClass, date(2025, 3, 8));
        saturday.follows_weekday = Some(1);
        let events = vec![
            event(CalendarEventType::Holiday, date(2025, 3, 3)),
            event(CalendarEventType::Suspension, date(2025, 3, 5)),
            saturday,
        ];
        let result = taught_classes(
            "Matemática",
            &scope(),
            range,
            &curriculum(),
            &timetable(),
            &events,
            &EngineConfig::default(),
        );
        // Friday plus the Saturday makeup following Monday's timetable.
        assert_eq!(result.taught, 4.0);
        assert!(!result.estimated);
    }

    fn curriculum_with_arts() -> CurriculumMatrix {
        let mut matrix = curriculum();
        matrix.segments[0].subjects.push(CurriculumSubject {
            name: "Artes".to_string(),
            weekly_hours: 2,
            abbreviation: None,
        });
        matrix
    }

    #[test]
    fn subject_missing_from_partial_timetable_is_estimated() {
        // 2025-03-03 .. 2025-03-14: ten weekdays at two weekly hours over five days.
        let range = DateRange::new(date(2025, 3, 3), date(2025, 3, 14));
        let result = taught_classes(
            "Artes",
            &scope(),
            range,
            &curriculum_with_arts(),
            &WeeklyTimetable::new(vec![math_day(1)]),
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(result, TaughtClasses { taught: 4.0, estimated: true });
        assert!(crate::attendance::attendance_percent(result.taught, 4.0) < 100.0);
    }

    #[test]
    fn subject_unknown_to_timetable_and_curriculum_is_zero() {
        let range = DateRange::new(date(2025, 3, 3), date(2025, 3, 9));
        let result = taught_classes(
            "Artes",
            &scope(),
            range,
            &curriculum(),
            &timetable(),
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(result, TaughtClasses { taught: 0.0, estimated: true });
    }

    #[test]
    fn missing_timetable_uses_weekly_hours_estimate() {
        let range = DateRange::new(date(2025, 3, 3), date(2025, 3, 16));
        let events = vec![event(CalendarEventType::Holiday, date(2025, 3, 4))];
        let result = taught_classes(
            "Matemática",
            &scope(),
            range,
            &curriculum(),
            &WeeklyTimetable::default(),
            &events,
            &EngineConfig::default(),
        );
        // 9 school days × 5 weekly hours / 5 days.
        assert_eq!(result, TaughtClasses { taught: 9.0, estimated: true });
    }

    #[test]
    fn missing_timetable_and_curriculum_entry_is_zero() {
        let range = DateRange::new(date(2025, 3, 3), date(2025, 3, 16));
        let result = taught_classes(
            "Robótica",
            &scope(),
            range,
            &curriculum(),
            &WeeklyTimetable::default(),
            &[],
            &EngineConfig::default(),
        );
        assert_eq!(result.taught, 0.0);
        assert!(result.estimated);
    }

    #[test]
    fn repeated_calls_agree() {
        let range = DateRange::new(date(2025, 2, 1), date(2025, 4, 15));
        let run = || {
            taught_classes(
                "Matemática",
                &scope(),
                range,
                &curriculum(),
                &timetable(),
                &[],
                &EngineConfig::default(),
            )
        };
        assert_eq!(run(), run());
    }
}
