use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Grading period number, always within `1..=4`.
pub type BimesterNumber = u8;

pub const BIMESTER_COUNT: usize = 4;

/// Inclusive calendar-date range. `start > end` means empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self {
            start: NaiveDate::MAX,
            end: NaiveDate::MIN,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        let first = if self.is_empty() { None } else { Some(self.start) };
        std::iter::successors(first, move |day| {
            day.checked_add_days(Days::new(1)).filter(|next| *next <= end)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bimester {
    pub number: BimesterNumber,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicCalendar {
    #[serde(default)]
    pub bimesters: Vec<Bimester>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventType {
    #[serde(alias = "feriado")]
    Holiday,
    #[serde(alias = "recesso", alias = "school_day_suspension")]
    Suspension,
    #[serde(alias = "substituicao")]
    Substitution,
    #[serde(alias = "reposicao", alias = "makeup")]
    MakeupClass,
}

impl CalendarEventType {
    pub fn cancels_classes(self) -> bool {
        matches!(self, CalendarEventType::Holiday | CalendarEventType::Suspension)
    }
}

/// Restricts an event to part of the school. Absent fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventScope {
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub school_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub event_type: CalendarEventType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub scope: Option<EventScope>,
    /// Weekday timetable (0 = Sunday) followed by a makeup day.
    #[serde(default)]
    pub follows_weekday: Option<u8>,
}

/// The class a computation is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassScope {
    pub unit: String,
    pub grade_level: String,
    pub school_class: String,
    #[serde(default)]
    pub shift: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSchedule {
    pub unit: String,
    pub grade_level: String,
    pub school_class: String,
    pub shift: String,
    /// 0 = Sunday … 6 = Saturday.
    pub day_of_week: u8,
    #[serde(default)]
    pub items: Vec<ScheduleItem>,
}

/// Stored shape of a class schedule; the scope lives in the document key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub items: Vec<ScheduleItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimetableKey {
    pub unit: String,
    pub grade_level: String,
    pub school_class: String,
    pub shift: String,
    pub day_of_week: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyTimetable {
    pub schedules: Vec<ClassSchedule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSubject {
    pub name: String,
    pub weekly_hours: u32,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSegment {
    pub name: String,
    #[serde(default)]
    pub grade_levels: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<CurriculumSubject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumMatrix {
    #[serde(default)]
    pub segments: Vec<CurriculumSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[serde(alias = "Presente", alias = "presente")]
    Present,
    #[serde(alias = "Ausente", alias = "ausente", alias = "Falta", alias = "falta")]
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub date: NaiveDate,
    pub discipline: String,
    #[serde(default)]
    pub school_class: Option<String>,
    #[serde(default)]
    pub lesson_count: Option<u32>,
    #[serde(default)]
    pub student_status: HashMap<String, AttendanceStatus>,
    #[serde(default)]
    pub student_absence_count: HashMap<String, u32>,
}

/// Stored grade sentinels: `-1` on the wire, `None` in memory.
pub mod sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const UNGRADED: f64 = -1.0;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.unwrap_or(UNGRADED))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.filter(|value| value.is_finite() && *value >= 0.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimesterData {
    #[serde(rename = "nota", default)]
    pub score: Option<f64>,
    #[serde(rename = "recuperacao", default)]
    pub remediation: Option<f64>,
    #[serde(rename = "media", default, with = "sentinel")]
    pub average: Option<f64>,
    #[serde(rename = "faltas", default)]
    pub absences: Option<u32>,
    #[serde(default)]
    pub difficulty_topic: Option<String>,
    #[serde(rename = "isNotaApproved", default)]
    pub is_score_approved: Option<bool>,
    #[serde(rename = "isRecuperacaoApproved", default)]
    pub is_remediation_approved: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BimesterSlots {
    #[serde(default)]
    pub bimester1: BimesterData,
    #[serde(default)]
    pub bimester2: BimesterData,
    #[serde(default)]
    pub bimester3: BimesterData,
    #[serde(default)]
    pub bimester4: BimesterData,
}

impl BimesterSlots {
    pub fn get(&self, number: BimesterNumber) -> Option<&BimesterData> {
        match number {
            1 => Some(&self.bimester1),
            2 => Some(&self.bimester2),
            3 => Some(&self.bimester3),
            4 => Some(&self.bimester4),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, number: BimesterNumber) -> Option<&mut BimesterData> {
        match number {
            1 => Some(&mut self.bimester1),
            2 => Some(&mut self.bimester2),
            3 => Some(&mut self.bimester3),
            4 => Some(&mut self.bimester4),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BimesterData> {
        [&self.bimester1, &self.bimester2, &self.bimester3, &self.bimester4].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BimesterData> {
        [
            &mut self.bimester1,
            &mut self.bimester2,
            &mut self.bimester3,
            &mut self.bimester4,
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Situation {
    #[default]
    #[serde(rename = "Cursando")]
    InProgress,
    #[serde(rename = "Pendente")]
    Pending,
    #[serde(rename = "Aprovado")]
    Approved,
    #[serde(rename = "Recuperação", alias = "Recuperacao")]
    Remediation,
    #[serde(rename = "Reprovado")]
    Failed,
}

impl Situation {
    pub fn is_terminal(self) -> bool {
        matches!(self, Situation::Approved | Situation::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Situation::InProgress => "Cursando",
            Situation::Pending => "Pendente",
            Situation::Approved => "Aprovado",
            Situation::Remediation => "Recuperação",
            Situation::Failed => "Reprovado",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub student_id: String,
    pub subject: String,
    #[serde(default)]
    pub bimesters: BimesterSlots,
    #[serde(rename = "recuperacaoFinal", default)]
    pub final_remediation: Option<f64>,
    #[serde(rename = "mediaAnual", default, with = "sentinel")]
    pub annual_average: Option<f64>,
    #[serde(rename = "mediaFinal", default, with = "sentinel")]
    pub final_average: Option<f64>,
    #[serde(rename = "situacaoFinal", default)]
    pub final_situation: Situation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub grade_level: String,
    pub school_class: String,
    #[serde(default)]
    pub shift: Option<String>,
}

impl StudentProfile {
    pub fn scope(&self) -> ClassScope {
        ClassScope {
            unit: self.unit.clone(),
            grade_level: self.grade_level.clone(),
            school_class: self.school_class.clone(),
            shift: self.shift.clone(),
        }
    }
}

/// Name comparison used for subjects, grades, units and classes.
pub(crate) fn names_match(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}
