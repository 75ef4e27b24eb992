use std::collections::{HashMap, HashSet};

use crate::error::CurriculumError;
use crate::models::{names_match, CurriculumMatrix, CurriculumSegment, CurriculumSubject};

impl CurriculumMatrix {
    pub fn segment_for_grade(&self, grade_level: &str) -> Option<&CurriculumSegment> {
        self.segments.iter().find(|segment| {
            segment
                .grade_levels
                .iter()
                .any(|grade| names_match(grade, grade_level))
        })
    }

    /// Subjects taught to a grade level, in matrix order.
    pub fn subjects_for_grade(&self, grade_level: &str) -> Vec<&CurriculumSubject> {
        self.segment_for_grade(grade_level)
            .map(|segment| segment.subjects.iter().collect())
            .unwrap_or_default()
    }

    pub fn subject(&self, subject: &str, grade_level: &str) -> Option<&CurriculumSubject> {
        self.segment_for_grade(grade_level)?
            .subjects
            .iter()
            .find(|s| names_match(&s.name, subject))
    }

    pub fn weekly_hours(&self, subject: &str, grade_level: &str) -> Option<u32> {
        self.subject(subject, grade_level).map(|s| s.weekly_hours)
    }

    /// Yearly class hours; unknown subjects have no workload.
    pub fn annual_workload(&self, subject: &str, grade_level: &str, weeks_per_year: u32) -> u32 {
        self.weekly_hours(subject, grade_level)
            .map_or(0, |hours| hours.saturating_mul(weeks_per_year))
    }

    /// Short label for narrow displays, e.g. `MAT` for Matemática.
    pub fn abbreviate(&self, subject: &str) -> String {
        let configured = self
            .segments
            .iter()
            .flat_map(|segment| segment.subjects.iter())
            .find(|s| names_match(&s.name, subject))
            .and_then(|s| s.abbreviation.clone());

        configured.unwrap_or_else(|| {
            subject
                .chars()
                .filter(|c| c.is_alphabetic())
                .take(3)
                .flat_map(char::to_uppercase)
                .collect()
        })
    }

    pub fn validate(&self) -> Result<(), CurriculumError> {
        let mut owners: HashMap<String, &str> = HashMap::new();
        for segment in &self.segments {
            let mut seen = HashSet::new();
            for subject in &segment.subjects {
                if !seen.insert(subject.name.trim().to_lowercase()) {
                    return Err(CurriculumError::DuplicateSubject {
                        segment: segment.name.clone(),
                        subject: subject.name.clone(),
                    });
                }
            }
            for grade in &segment.grade_levels {
                let key = grade.trim().to_lowercase();
                if let Some(first) = owners.insert(key, &segment.name) {
                    if first != segment.name {
                        return Err(CurriculumError::GradeInTwoSegments {
                            grade: grade.clone(),
                            first: first.to_string(),
                            second: segment.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
