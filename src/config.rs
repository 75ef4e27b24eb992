use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Tunable rules of the engine, passed into every computation that needs them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub passing_threshold: f64,
    pub failing_floor: f64,
    pub weeks_per_year: u32,
    pub lesson_minutes: u32,
    pub school_days_per_week: u32,
    /// Attendance percentage below which a subject is flagged.
    pub minimum_attendance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            passing_threshold: 7.0,
            failing_floor: 4.0,
            weeks_per_year: 40,
            lesson_minutes: 50,
            school_days_per_week: 5,
            minimum_attendance: 75.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradeThresholds {
    pub passing_threshold: f64,
    pub failing_floor: f64,
}

impl Default for GradeThresholds {
    fn default() -> Self {
        EngineConfig::default().thresholds()
    }
}

impl EngineConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config JSON in {}", path.display()))?;
        config.validate()?;
        debug!(?config, "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=10.0).contains(&self.passing_threshold) {
            return Err(ConfigError::ThresholdOutOfScale(self.passing_threshold));
        }
        if self.failing_floor > self.passing_threshold {
            return Err(ConfigError::FloorAboveThreshold {
                floor: self.failing_floor,
                threshold: self.passing_threshold,
            });
        }
        if self.lesson_minutes == 0 {
            return Err(ConfigError::LessonMinutes);
        }
        if !(0.0..=100.0).contains(&self.minimum_attendance) {
            return Err(ConfigError::MinimumAttendance(self.minimum_attendance));
        }
        if !(1..=7).contains(&self.school_days_per_week) {
            return Err(ConfigError::SchoolDays(self.school_days_per_week));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> GradeThresholds {
        GradeThresholds {
            passing_threshold: self.passing_threshold,
            failing_floor: self.failing_floor,
        }
    }
}
