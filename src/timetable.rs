use chrono::{NaiveTime, Weekday};

use crate::calendar::weekday_from_sunday_index;
use crate::error::KeyError;
use crate::models::{
    names_match, ClassSchedule, ClassScope, ScheduleDocument, ScheduleItem, TimetableKey,
    WeeklyTimetable,
};

impl TimetableKey {
    /// Stored document id: `unit_grade_class_shift_day`.
    pub fn document_id(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.unit, self.grade_level, self.school_class, self.shift, self.day_of_week
        )
    }

    /// Parses a document id. The unit may itself contain underscores.
    pub fn parse(id: &str) -> Result<Self, KeyError> {
        let mut parts = id.rsplitn(5, '_');
        let (Some(day), Some(shift), Some(class), Some(grade), Some(unit)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(KeyError::Malformed(id.to_string()));
        };

        let day_of_week: u8 = day
            .parse()
            .ok()
            .filter(|d| *d <= 6)
            .ok_or_else(|| KeyError::BadWeekday(id.to_string()))?;

        Ok(Self {
            unit: unit.to_string(),
            grade_level: grade.to_string(),
            school_class: class.to_string(),
            shift: shift.to_string(),
            day_of_week,
        })
    }

    pub fn into_schedule(self, document: ScheduleDocument) -> ClassSchedule {
        ClassSchedule {
            unit: self.unit,
            grade_level: self.grade_level,
            school_class: self.school_class,
            shift: self.shift,
            day_of_week: self.day_of_week,
            items: document.items,
        }
    }
}

impl ScheduleItem {
    /// Class periods this slot occupies; unreadable times count as one.
    pub fn periods(&self, lesson_minutes: u32) -> u32 {
        let parse = |text: &str| NaiveTime::parse_from_str(text.trim(), "%H:%M").ok();
        let span = match (parse(&self.start_time), parse(&self.end_time)) {
            (Some(start), Some(end)) => (end - start).num_minutes(),
            _ => return 1,
        };
        if span <= 0 || lesson_minutes == 0 {
            return 1;
        }
        let periods = (span as f64 / f64::from(lesson_minutes)).round();
        (periods as u32).max(1)
    }
}

impl ClassSchedule {
    pub fn key(&self) -> TimetableKey {
        TimetableKey {
            unit: self.unit.clone(),
            grade_level: self.grade_level.clone(),
            school_class: self.school_class.clone(),
            shift: self.shift.clone(),
            day_of_week: self.day_of_week,
        }
    }

    pub fn weekday(&self) -> Option<Weekday> {
        weekday_from_sunday_index(self.day_of_week)
    }

    pub fn belongs_to(&self, scope: &ClassScope) -> bool {
        names_match(&self.unit, &scope.unit)
            && names_match(&self.grade_level, &scope.grade_level)
            && names_match(&self.school_class, &scope.school_class)
            && scope
                .shift
                .as_deref()
                .map_or(true, |shift| names_match(shift, &self.shift))
    }

    pub fn periods_for(&self, subject: &str, lesson_minutes: u32) -> u32 {
        self.items
            .iter()
            .filter(|item| names_match(&item.subject, subject))
            .map(|item| item.periods(lesson_minutes))
            .sum()
    }
}

impl WeeklyTimetable {
    pub fn new(schedules: Vec<ClassSchedule>) -> Self {
        Self { schedules }
    }

    pub fn for_scope<'a>(&'a self, scope: &'a ClassScope) -> impl Iterator<Item = &'a ClassSchedule> {
        self.schedules.iter().filter(move |s| s.belongs_to(scope))
    }

    /// Whether any weekday is scheduled for the class.
    pub fn has_scope(&self, scope: &ClassScope) -> bool {
        self.for_scope(scope).next().is_some()
    }

    pub fn teaches(&self, scope: &ClassScope, subject: &str) -> bool {
        self.for_scope(scope)
            .any(|s| s.items.iter().any(|item| names_match(&item.subject, subject)))
    }

    pub fn periods_on(
        &self,
        scope: &ClassScope,
        weekday: Weekday,
        subject: &str,
        lesson_minutes: u32,
    ) -> u32 {
        self.for_scope(scope)
            .filter(|s| s.weekday() == Some(weekday))
            .map(|s| s.periods_for(subject, lesson_minutes))
            .sum()
    }

    /// Periods of the subject in one week of the class's timetable.
    pub fn weekly_periods(&self, scope: &ClassScope, subject: &str, lesson_minutes: u32) -> u32 {
        self.for_scope(scope)
            .map(|s| s.periods_for(subject, lesson_minutes))
            .sum()
    }
}
