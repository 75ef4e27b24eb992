//! Bimester, attendance and grade computations for school report cards.
//!
//! The computation modules are pure: callers load documents into a
//! [`snapshot::SchoolSnapshot`] first and pass "today" explicitly.

pub mod attendance;
pub mod calendar;
pub mod config;
pub mod curriculum;
pub mod db;
pub mod error;
pub mod gating;
pub mod grades;
pub mod models;
pub mod report;
pub mod snapshot;
pub mod taught;
pub mod timetable;

pub use attendance::{
    annual_attendance, annual_from_parts, attendance_percent, bimester_attendance,
    count_absences, AttendanceContext, AttendanceResult,
};
pub use calendar::{bimester_range, locate_bimester, locate_bimester_str};
pub use config::{EngineConfig, GradeThresholds};
pub use gating::{gate, gated_bimester, Gated};
pub use grades::{advance_situation, bimester_average, final_data, FinalData};
pub use snapshot::SchoolSnapshot;
pub use taught::{taught_classes, TaughtClasses};
