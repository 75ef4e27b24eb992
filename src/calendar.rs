//! Bimester location and school-day classification.
//!
//! Everything here is total: an unusable calendar falls back to the static
//! month partition, and dates outside the configured year clamp to the first
//! or last bimester.

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, warn};

use crate::error::CalendarError;
use crate::models::{
    names_match, AcademicCalendar, Bimester, BimesterNumber, CalendarEvent, CalendarEventType,
    ClassScope, DateRange, EventScope,
};

pub const FIRST_BIMESTER: BimesterNumber = 1;
pub const LAST_BIMESTER: BimesterNumber = 4;

impl AcademicCalendar {
    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.bimesters.len() != 4 {
            return Err(CalendarError::WrongCount {
                found: self.bimesters.len(),
            });
        }

        let ordered = self.by_number()?;
        for bimester in ordered {
            if bimester.end_date < bimester.start_date {
                return Err(CalendarError::Inverted {
                    number: bimester.number,
                    start: bimester.start_date,
                    end: bimester.end_date,
                });
            }
        }
        for pair in ordered.windows(2) {
            if pair[0].end_date >= pair[1].start_date {
                return Err(CalendarError::Overlap {
                    number: pair[0].number,
                    end: pair[0].end_date,
                    next: pair[1].number,
                    next_start: pair[1].start_date,
                });
            }
        }
        Ok(())
    }

    pub fn bimester(&self, number: BimesterNumber) -> Option<&Bimester> {
        self.bimesters.iter().find(|b| b.number == number)
    }

    /// The four bimesters in order, or `None` if the calendar is not usable.
    pub fn usable_bimesters(&self) -> Option<[&Bimester; 4]> {
        match self.validate() {
            Ok(()) => self.by_number().ok(),
            Err(err) => {
                debug!(%err, "academic calendar unusable, using month partition");
                None
            }
        }
    }

    fn by_number(&self) -> Result<[&Bimester; 4], CalendarError> {
        let mut slots: [Option<&Bimester>; 4] = [None; 4];
        for bimester in &self.bimesters {
            let index = usize::from(bimester.number).wrapping_sub(1);
            match slots.get_mut(index) {
                Some(slot) if slot.is_none() => *slot = Some(bimester),
                _ => {
                    return Err(CalendarError::BadNumber {
                        number: bimester.number,
                    })
                }
            }
        }
        match slots {
            [Some(a), Some(b), Some(c), Some(d)] => Ok([a, b, c, d]),
            _ => Err(CalendarError::WrongCount {
                found: slots.iter().flatten().count(),
            }),
        }
    }
}

/// Validates a calendar at load time, logging why it was rejected.
pub fn check_calendar(calendar: &AcademicCalendar) -> Result<(), CalendarError> {
    calendar.validate().inspect_err(|err| {
        warn!(%err, "academic calendar rejected");
    })
}

pub fn bimester_for_month(month: u32) -> BimesterNumber {
    match month {
        1..=3 => 1,
        4..=6 => 2,
        7..=9 => 3,
        10..=12 => 4,
        _ => FIRST_BIMESTER,
    }
}

/// Grading period a date belongs to.
///
/// Dates before the first bimester clamp to 1, dates after the last clamp to
/// 4, and dates in a break between two bimesters count toward the one that
/// just ended.
pub fn locate_bimester(date: NaiveDate, calendar: Option<&AcademicCalendar>) -> BimesterNumber {
    match calendar.and_then(AcademicCalendar::usable_bimesters) {
        Some(ordered) => ordered
            .iter()
            .rev()
            .find(|b| b.start_date <= date)
            .map(|b| b.number)
            .unwrap_or(FIRST_BIMESTER),
        None => bimester_for_month(date.month()),
    }
}

/// Like [`locate_bimester`] for raw stored text; unparseable dates map to 1.
pub fn locate_bimester_str(text: &str, calendar: Option<&AcademicCalendar>) -> BimesterNumber {
    match parse_date(text) {
        Some(date) => locate_bimester(date, calendar),
        None => FIRST_BIMESTER,
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    let day_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d").ok()
}

fn month_partition_range(year: i32, number: BimesterNumber) -> Option<DateRange> {
    let first_month = u32::from(number - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(year, first_month, 1)?;
    let end = if number == LAST_BIMESTER {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(year, first_month + 3, 1)?.pred_opt()?
    };
    Some(DateRange::new(start, end))
}

/// Date range of a bimester, clipped to `today` when it has not ended yet.
pub fn bimester_range(
    number: BimesterNumber,
    calendar: Option<&AcademicCalendar>,
    today: NaiveDate,
) -> DateRange {
    let number = number.clamp(FIRST_BIMESTER, LAST_BIMESTER);
    let configured = calendar
        .and_then(AcademicCalendar::usable_bimesters)
        .map(|ordered| {
            let bimester = ordered[usize::from(number - 1)];
            DateRange::new(bimester.start_date, bimester.end_date)
        });

    match configured.or_else(|| month_partition_range(today.year(), number)) {
        Some(range) => DateRange::new(range.start, range.end.min(today)),
        None => DateRange::empty(),
    }
}

pub fn weekday_from_sunday_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

impl EventScope {
    pub fn matches(&self, scope: &ClassScope) -> bool {
        let field_matches = |wanted: &Option<String>, actual: &str| {
            wanted.as_deref().map_or(true, |w| names_match(w, actual))
        };
        field_matches(&self.unit, &scope.unit)
            && field_matches(&self.grade_level, &scope.grade_level)
            && field_matches(&self.school_class, &scope.school_class)
    }
}

impl CalendarEvent {
    pub fn covers(&self, date: NaiveDate) -> bool {
        let end = self.end_date.unwrap_or(self.start_date).max(self.start_date);
        self.start_date <= date && date <= end
    }

    pub fn applies_to(&self, scope: &ClassScope) -> bool {
        self.scope.as_ref().map_or(true, |s| s.matches(scope))
    }
}

/// How a date is treated for a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayKind {
    Regular,
    NonSchool,
    /// Classes are held following the timetable of `follows`.
    Makeup { follows: Weekday },
}

pub fn classify_day(date: NaiveDate, scope: &ClassScope, events: &[CalendarEvent]) -> DayKind {
    let mut cancelled = false;
    for event in events
        .iter()
        .filter(|e| e.covers(date) && e.applies_to(scope))
    {
        match event.event_type {
            CalendarEventType::MakeupClass => {
                let follows = event
                    .follows_weekday
                    .and_then(weekday_from_sunday_index)
                    .unwrap_or_else(|| date.weekday());
                return DayKind::Makeup { follows };
            }
            kind if kind.cancels_classes() => cancelled = true,
            _ => {}
        }
    }
    if cancelled {
        DayKind::NonSchool
    } else {
        DayKind::Regular
    }
}

/// Generic school days in a range: weekdays not cancelled by an event, plus
/// makeup days.
pub fn count_school_days(range: DateRange, scope: &ClassScope, events: &[CalendarEvent]) -> u32 {
    let mut days = 0;
    for date in range.days() {
        match classify_day(date, scope, events) {
            DayKind::Regular if !is_weekend(date.weekday()) => days += 1,
            DayKind::Makeup { .. } => days += 1,
            _ => {}
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar_2025() -> AcademicCalendar {
        AcademicCalendar {
            bimesters: vec![
                Bimester {
                    number: 1,
                    start_date: date(2025, 2, 1),
                    end_date: date(2025, 4, 15),
                },
                Bimester {
                    number: 2,
                    start_date: date(2025, 4, 22),
                    end_date: date(2025, 7, 4),
                },
                Bimester {
                    number: 3,
                    start_date: date(2025, 7, 28),
                    end_date: date(2025, 9, 30),
                },
                Bimester {
                    number: 4,
                    start_date: date(2025, 10, 6),
                    end_date: date(2025, 12, 12),
                },
            ],
        }
    }

    fn scope() -> ClassScope {
        ClassScope {
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "A".to_string(),
            shift: None,
        }
    }

    fn event(kind: CalendarEventType, start: NaiveDate, end: Option<NaiveDate>) -> CalendarEvent {
        CalendarEvent {
            id: "e1".to_string(),
            start_date: start,
            end_date: end,
            event_type: kind,
            title: "evento".to_string(),
            scope: None,
            follows_weekday: None,
        }
    }

    #[test]
    fn month_partition_without_calendar() {
        assert_eq!(locate_bimester(date(2025, 3, 31), None), 1);
        assert_eq!(locate_bimester(date(2025, 4, 1), None), 2);
        assert_eq!(locate_bimester(date(2025, 9, 15), None), 3);
        assert_eq!(locate_bimester(date(2025, 12, 31), None), 4);
    }

    #[test]
    fn incomplete_calendar_falls_back_to_months() {
        let mut calendar = calendar_2025();
        calendar.bimesters.truncate(3);
        assert_eq!(locate_bimester(date(2025, 2, 10), Some(&calendar)), 1);
        assert_eq!(locate_bimester(date(2025, 11, 10), Some(&calendar)), 4);
        assert_eq!(locate_bimester(date(2025, 5, 10), Some(&calendar)), 2);
    }

    #[test]
    fn configured_ranges_win_over_months() {
        let calendar = calendar_2025();
        assert_eq!(locate_bimester(date(2025, 4, 10), Some(&calendar)), 1);
        assert_eq!(locate_bimester(date(2025, 7, 1), Some(&calendar)), 2);
        assert_eq!(locate_bimester(date(2025, 10, 6), Some(&calendar)), 4);
    }

    #[test]
    fn out_of_range_dates_clamp() {
        let calendar = calendar_2025();
        assert_eq!(locate_bimester(date(2025, 1, 5), Some(&calendar)), 1);
        assert_eq!(locate_bimester(date(2025, 12, 20), Some(&calendar)), 4);
    }

    #[test]
    fn break_between_bimesters_counts_toward_previous() {
        let calendar = calendar_2025();
        assert_eq!(locate_bimester(date(2025, 7, 15), Some(&calendar)), 2);
    }

    #[test]
    fn location_is_monotonic_over_the_year() {
        let calendar = calendar_2025();
        let year = DateRange::new(date(2024, 12, 1), date(2026, 1, 31));
        let mut previous = FIRST_BIMESTER;
        for day in year.days() {
            let current = locate_bimester(day, Some(&calendar));
            assert!((1..=4).contains(&current));
            assert!(current >= previous, "went back on {day}");
            previous = current;
        }
    }

    #[test]
    fn malformed_text_defaults_to_first_bimester() {
        let calendar = calendar_2025();
        assert_eq!(locate_bimester_str("not a date", Some(&calendar)), 1);
        assert_eq!(locate_bimester_str("2025-13-45", None), 1);
        assert_eq!(
            locate_bimester_str("2025-08-10T10:00:00Z", Some(&calendar)),
            3
        );
    }

    #[test]
    fn validation_reports_overlap_and_count() {
        let mut calendar = calendar_2025();
        calendar.bimesters[1].start_date = date(2025, 4, 15);
        assert!(matches!(
            calendar.validate(),
            Err(CalendarError::Overlap { number: 1, .. })
        ));

        calendar.bimesters.pop();
        assert_eq!(
            calendar.validate(),
            Err(CalendarError::WrongCount { found: 3 })
        );
    }

    #[test]
    fn validation_rejects_duplicate_numbers() {
        let mut calendar = calendar_2025();
        calendar.bimesters[3].number = 3;
        assert_eq!(
            calendar.validate(),
            Err(CalendarError::BadNumber { number: 3 })
        );
        assert!(check_calendar(&calendar).is_err());
    }

    #[test]
    fn bimester_range_clips_to_today() {
        let calendar = calendar_2025();
        let range = bimester_range(2, Some(&calendar), date(2025, 5, 10));
        assert_eq!(range, DateRange::new(date(2025, 4, 22), date(2025, 5, 10)));

        let future = bimester_range(3, Some(&calendar), date(2025, 5, 10));
        assert!(future.is_empty());

        let fallback = bimester_range(4, None, date(2026, 12, 31));
        assert_eq!(fallback, DateRange::new(date(2026, 10, 1), date(2026, 12, 31)));
        let fallback = bimester_range(1, None, date(2026, 12, 31));
        assert_eq!(fallback, DateRange::new(date(2026, 1, 1), date(2026, 3, 31)));
    }

    #[test]
    fn makeup_overrides_holiday() {
        let holiday = event(CalendarEventType::Holiday, date(2025, 3, 3), Some(date(2025, 3, 4)));
        let mut makeup = event(CalendarEventType::MakeupClass, date(2025, 3, 4), None);
        makeup.follows_weekday = Some(1);
        let events = vec![holiday, makeup];

        assert_eq!(classify_day(date(2025, 3, 3), &scope(), &events), DayKind::NonSchool);
        assert_eq!(
            classify_day(date(2025, 3, 4), &scope(), &events),
            DayKind::Makeup {
                follows: Weekday::Mon
            }
        );
        assert_eq!(classify_day(date(2025, 3, 5), &scope(), &events), DayKind::Regular);
    }

    #[test]
    fn scoped_events_only_touch_their_classes() {
        let mut holiday = event(CalendarEventType::Suspension, date(2025, 3, 5), None);
        holiday.scope = Some(EventScope {
            unit: None,
            grade_level: Some("7º Ano".to_string()),
            school_class: None,
        });
        assert_eq!(
            classify_day(date(2025, 3, 5), &scope(), &[holiday]),
            DayKind::Regular
        );
    }

    #[test]
    fn school_days_skip_weekends_and_holidays() {
        // 2025-03-03 (Mon) .. 2025-03-09 (Sun)
        let week = DateRange::new(date(2025, 3, 3), date(2025, 3, 9));
        assert_eq!(count_school_days(week, &scope(), &[]), 5);

        let holiday = event(CalendarEventType::Holiday, date(2025, 3, 4), None);
        let saturday = event(CalendarEventType::MakeupClass, date(2025, 3, 8), None);
        let substitution = event(CalendarEventType::Substitution, date(2025, 3, 5), None);
        assert_eq!(
            count_school_days(week, &scope(), &[holiday, saturday, substitution]),
            5
        );
    }
}
