use chrono::NaiveDate;
use thiserror::Error;

use crate::models::BimesterNumber;

/// Rejected academic-calendar configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("academic calendar must have exactly 4 bimesters, found {found}")]
    WrongCount { found: usize },
    #[error("bimester number {number} is duplicated or outside 1..=4")]
    BadNumber { number: BimesterNumber },
    #[error("bimester {number} ends on {end} before it starts on {start}")]
    Inverted {
        number: BimesterNumber,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("bimester {number} ends on {end} but bimester {next} starts on {next_start}")]
    Overlap {
        number: BimesterNumber,
        end: NaiveDate,
        next: BimesterNumber,
        next_start: NaiveDate,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurriculumError {
    #[error("subject {subject:?} appears twice in segment {segment:?}")]
    DuplicateSubject { segment: String, subject: String },
    #[error("grade level {grade:?} is claimed by segments {first:?} and {second:?}")]
    GradeInTwoSegments {
        grade: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("timetable key {0:?} must be unit_grade_class_shift_day")]
    Malformed(String),
    #[error("timetable key {0:?} has a day of week outside 0..=6")]
    BadWeekday(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failing floor {floor} is above the passing threshold {threshold}")]
    FloorAboveThreshold { floor: f64, threshold: f64 },
    #[error("passing threshold {0} must be between 0 and 10")]
    ThresholdOutOfScale(f64),
    #[error("minimum attendance {0} must be a percentage")]
    MinimumAttendance(f64),
    #[error("lesson length must be at least one minute")]
    LessonMinutes,
    #[error("school days per week must be between 1 and 7, got {0}")]
    SchoolDays(u32),
}
