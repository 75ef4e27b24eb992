use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attendance::AttendanceContext;
use crate::calendar::check_calendar;
use crate::config::EngineConfig;
use crate::models::{
    names_match, AcademicCalendar, AttendanceRecord, CalendarEvent, CurriculumMatrix, GradeEntry,
    StudentProfile, WeeklyTimetable,
};

/// Every document the engine reads, materialized in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSnapshot {
    #[serde(default)]
    pub calendar: Option<AcademicCalendar>,
    #[serde(default)]
    pub curriculum: CurriculumMatrix,
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub timetable: WeeklyTimetable,
    #[serde(default)]
    pub attendance: Vec<AttendanceRecord>,
    #[serde(default)]
    pub grades: Vec<GradeEntry>,
    #[serde(default)]
    pub students: Vec<StudentProfile>,
}

impl SchoolSnapshot {
    pub fn from_json_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot: SchoolSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("invalid snapshot JSON in {}", path.display()))?;
        snapshot.check()?;
        info!(
            students = snapshot.students.len(),
            records = snapshot.attendance.len(),
            grades = snapshot.grades.len(),
            "snapshot loaded from {}",
            path.display()
        );
        Ok(snapshot)
    }

    /// Load-time configuration checks. An invalid calendar is only logged,
    /// since the locator falls back to the month partition.
    pub fn check(&self) -> anyhow::Result<()> {
        if let Some(calendar) = &self.calendar {
            if check_calendar(calendar).is_err() {
                info!("bimesters will be located by month partition");
            }
        }
        self.curriculum
            .validate()
            .context("curriculum matrix is inconsistent")?;
        if self.timetable.schedules.iter().any(|s| s.day_of_week > 6) {
            warn!("timetable contains schedules with a day of week outside 0..=6");
        }
        Ok(())
    }

    pub fn student(&self, student_id: &str) -> Option<&StudentProfile> {
        self.students.iter().find(|s| s.id == student_id)
    }

    pub fn grades_for<'a>(&'a self, student_id: &'a str) -> impl Iterator<Item = &'a GradeEntry> {
        self.grades.iter().filter(move |g| g.student_id == student_id)
    }

    pub fn grade(&self, student_id: &str, subject: &str) -> Option<&GradeEntry> {
        self.grades
            .iter()
            .find(|g| g.student_id == student_id && names_match(&g.subject, subject))
    }

    /// Subjects to report for a student: curriculum order first, then any
    /// graded subject the curriculum does not list.
    pub fn subjects_for(&self, student: &StudentProfile) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .curriculum
            .subjects_for_grade(&student.grade_level)
            .into_iter()
            .map(|s| s.name.clone())
            .collect();
        for entry in self.grades_for(&student.id) {
            if !subjects.iter().any(|s| names_match(s, &entry.subject)) {
                subjects.push(entry.subject.clone());
            }
        }
        subjects
    }

    pub fn context<'a>(&'a self, config: &'a EngineConfig, today: NaiveDate) -> AttendanceContext<'a> {
        AttendanceContext {
            curriculum: &self.curriculum,
            calendar: self.calendar.as_ref(),
            events: &self.events,
            timetable: &self.timetable,
            config,
            today,
        }
    }
}
