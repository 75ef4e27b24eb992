use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    AcademicCalendar, AttendanceRecord, AttendanceStatus, Bimester, CalendarEvent,
    CalendarEventType, ClassSchedule, CurriculumMatrix, CurriculumSegment, CurriculumSubject,
    EventScope, GradeEntry, ScheduleDocument, ScheduleItem, Situation, StudentProfile,
    TimetableKey, WeeklyTimetable,
};
use crate::snapshot::SchoolSnapshot;

pub const CALENDARS: &str = "academic_calendar";
pub const CURRICULUM: &str = "curriculum";
pub const EVENTS: &str = "calendar_events";
pub const SCHEDULES: &str = "class_schedules";
pub const ATTENDANCE: &str = "attendance";
pub const GRADES: &str = "grades";
pub const STUDENTS: &str = "students";

const CURRENT_CALENDAR: &str = "current";
const CURRICULUM_MATRIX: &str = "matrix";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn upsert_document<'c, T: Serialize>(
    executor: impl PgExecutor<'c>,
    collection: &str,
    doc_id: &str,
    body: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_value(body)?;
    sqlx::query(
        r#"
        INSERT INTO academic_engine.documents (collection, doc_id, body)
        VALUES ($1, $2, $3)
        ON CONFLICT (collection, doc_id) DO UPDATE
        SET body = EXCLUDED.body, updated_at = now()
        "#,
    )
    .bind(collection)
    .bind(doc_id)
    .bind(body)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn fetch_document<'c, T: DeserializeOwned>(
    executor: impl PgExecutor<'c>,
    collection: &str,
    doc_id: &str,
) -> anyhow::Result<Option<T>> {
    let row = sqlx::query(
        "SELECT body FROM academic_engine.documents WHERE collection = $1 AND doc_id = $2",
    )
    .bind(collection)
    .bind(doc_id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => {
            let body: serde_json::Value = row.get("body");
            let value = serde_json::from_value(body)
                .with_context(|| format!("malformed document {collection}/{doc_id}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn fetch_documents<T: DeserializeOwned>(
    pool: &PgPool,
    collection: &str,
) -> anyhow::Result<Vec<(String, T)>> {
    let rows = sqlx::query(
        "SELECT doc_id, body FROM academic_engine.documents WHERE collection = $1 ORDER BY doc_id",
    )
    .bind(collection)
    .fetch_all(pool)
    .await?;

    let mut documents = Vec::new();
    for row in rows {
        let doc_id: String = row.get("doc_id");
        let body: serde_json::Value = row.get("body");
        let value = serde_json::from_value(body)
            .with_context(|| format!("malformed document {collection}/{doc_id}"))?;
        documents.push((doc_id, value));
    }
    Ok(documents)
}

/// Reads every collection the engine needs into memory.
pub async fn load_snapshot(pool: &PgPool) -> anyhow::Result<SchoolSnapshot> {
    let calendar = fetch_document::<AcademicCalendar>(pool, CALENDARS, CURRENT_CALENDAR).await?;
    let curriculum = fetch_document::<CurriculumMatrix>(pool, CURRICULUM, CURRICULUM_MATRIX)
        .await?
        .unwrap_or_default();

    let events = fetch_documents::<CalendarEvent>(pool, EVENTS)
        .await?
        .into_iter()
        .map(|(doc_id, mut event)| {
            if event.id.is_empty() {
                event.id = doc_id;
            }
            event
        })
        .collect();

    let mut schedules = Vec::new();
    for (doc_id, document) in fetch_documents::<ScheduleDocument>(pool, SCHEDULES).await? {
        match TimetableKey::parse(&doc_id) {
            Ok(key) => schedules.push(key.into_schedule(document)),
            Err(err) => warn!(%err, "skipping class schedule"),
        }
    }

    let attendance = fetch_documents::<AttendanceRecord>(pool, ATTENDANCE)
        .await?
        .into_iter()
        .map(|(doc_id, mut record)| {
            record.id.get_or_insert(doc_id);
            record
        })
        .collect();

    let grades = fetch_documents::<GradeEntry>(pool, GRADES)
        .await?
        .into_iter()
        .map(|(_, entry)| entry)
        .collect();
    let students = fetch_documents::<StudentProfile>(pool, STUDENTS)
        .await?
        .into_iter()
        .map(|(_, student)| student)
        .collect();

    let snapshot = SchoolSnapshot {
        calendar,
        curriculum,
        events,
        timetable: WeeklyTimetable::new(schedules),
        attendance,
        grades,
        students,
    };
    snapshot.check()?;
    Ok(snapshot)
}

pub fn attendance_doc_id(date: NaiveDate, discipline: &str, school_class: &str) -> String {
    format!("{date}_{discipline}_{school_class}")
}

fn grade_doc_id(entry: &GradeEntry) -> String {
    format!("{}_{}", entry.student_id, entry.subject)
}

pub async fn store_snapshot(pool: &PgPool, snapshot: &SchoolSnapshot) -> anyhow::Result<()> {
    if let Some(calendar) = &snapshot.calendar {
        upsert_document(pool, CALENDARS, CURRENT_CALENDAR, calendar).await?;
    }
    upsert_document(pool, CURRICULUM, CURRICULUM_MATRIX, &snapshot.curriculum).await?;

    for event in &snapshot.events {
        upsert_document(pool, EVENTS, &event.id, event).await?;
    }
    for schedule in &snapshot.timetable.schedules {
        let document = ScheduleDocument {
            items: schedule.items.clone(),
        };
        upsert_document(pool, SCHEDULES, &schedule.key().document_id(), &document).await?;
    }
    for record in &snapshot.attendance {
        let doc_id = record.id.clone().unwrap_or_else(|| {
            attendance_doc_id(
                record.date,
                &record.discipline,
                record.school_class.as_deref().unwrap_or_default(),
            )
        });
        upsert_document(pool, ATTENDANCE, &doc_id, record).await?;
    }
    for entry in &snapshot.grades {
        upsert_document(pool, GRADES, &grade_doc_id(entry), entry).await?;
    }
    for student in &snapshot.students {
        upsert_document(pool, STUDENTS, &student.id, student).await?;
    }
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let snapshot = sample_snapshot()?;
    store_snapshot(pool, &snapshot).await
}

fn date(y: i32, m: u32, d: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).context("invalid date")
}

fn subject(name: &str, weekly_hours: u32, abbreviation: &str) -> CurriculumSubject {
    CurriculumSubject {
        name: name.to_string(),
        weekly_hours,
        abbreviation: Some(abbreviation.to_string()),
    }
}

/// A realistic school year for a single unit.
pub fn sample_snapshot() -> anyhow::Result<SchoolSnapshot> {
    let calendar = AcademicCalendar {
        bimesters: vec![
            Bimester { number: 1, start_date: date(2026, 2, 2)?, end_date: date(2026, 4, 17)? },
            Bimester { number: 2, start_date: date(2026, 4, 27)?, end_date: date(2026, 7, 3)? },
            Bimester { number: 3, start_date: date(2026, 7, 27)?, end_date: date(2026, 9, 30)? },
            Bimester { number: 4, start_date: date(2026, 10, 5)?, end_date: date(2026, 12, 11)? },
        ],
    };

    let fundamental: Vec<String> = (6..=9).map(|n| format!("{n}º Ano")).collect();
    let medio: Vec<String> = (1..=3).map(|n| format!("{n}ª Série")).collect();
    let curriculum = CurriculumMatrix {
        segments: vec![
            CurriculumSegment {
                name: "Fundamental II".to_string(),
                grade_levels: fundamental,
                subjects: vec![
                    subject("Matemática", 5, "MAT"),
                    subject("Português", 5, "POR"),
                    subject("Ciências", 3, "CIE"),
                    subject("História", 2, "HIS"),
                    subject("Geografia", 2, "GEO"),
                    subject("Inglês", 2, "ING"),
                    subject("Educação Física", 2, "EDF"),
                    subject("Artes", 1, "ART"),
                ],
            },
            CurriculumSegment {
                name: "Ensino Médio".to_string(),
                grade_levels: medio,
                subjects: vec![
                    subject("Matemática", 4, "MAT"),
                    subject("Português", 4, "POR"),
                    subject("Física", 3, "FIS"),
                    subject("Química", 3, "QUI"),
                    subject("Biologia", 3, "BIO"),
                    subject("História", 2, "HIS"),
                ],
            },
        ],
    };

    let week: [&[(&str, &str, &str)]; 5] = [
        &[
            ("07:00", "08:40", "Matemática"),
            ("09:00", "09:50", "Português"),
            ("09:50", "10:40", "Ciências"),
            ("10:40", "11:30", "História"),
        ],
        &[
            ("07:00", "08:40", "Português"),
            ("09:00", "09:50", "Matemática"),
            ("09:50", "10:40", "Geografia"),
            ("10:40", "11:30", "Inglês"),
        ],
        &[
            ("07:00", "07:50", "Matemática"),
            ("07:50", "08:40", "Ciências"),
            ("09:00", "09:50", "Português"),
            ("09:50", "11:30", "Educação Física"),
        ],
        &[
            ("07:00", "07:50", "Português"),
            ("07:50", "08:40", "Matemática"),
            ("09:00", "09:50", "Ciências"),
            ("09:50", "10:40", "História"),
            ("10:40", "11:30", "Inglês"),
        ],
        &[
            ("07:00", "07:50", "Matemática"),
            ("07:50", "08:40", "Português"),
            ("09:00", "09:50", "Geografia"),
            ("09:50", "10:40", "Artes"),
        ],
    ];
    let schedules = week
        .iter()
        .zip(1u8..)
        .map(|(slots, day_of_week)| ClassSchedule {
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "A".to_string(),
            shift: "Matutino".to_string(),
            day_of_week,
            items: slots
                .iter()
                .map(|(start, end, subject)| ScheduleItem {
                    start_time: start.to_string(),
                    end_time: end.to_string(),
                    subject: subject.to_string(),
                })
                .collect(),
        })
        .collect();

    let event = |id: &str,
                 kind: CalendarEventType,
                 start: NaiveDate,
                 end: Option<NaiveDate>,
                 title: &str| CalendarEvent {
        id: id.to_string(),
        start_date: start,
        end_date: end,
        event_type: kind,
        title: title.to_string(),
        scope: None,
        follows_weekday: None,
    };
    let mut makeup = event(
        "2026-reposicao-corpus-christi",
        CalendarEventType::MakeupClass,
        date(2026, 6, 6)?,
        None,
        "Reposição de Corpus Christi",
    );
    makeup.follows_weekday = Some(4);
    makeup.scope = Some(EventScope {
        unit: Some("Centro".to_string()),
        grade_level: None,
        school_class: None,
    });
    let events = vec![
        event("2026-carnaval", CalendarEventType::Holiday, date(2026, 2, 16)?, Some(date(2026, 2, 18)?), "Carnaval"),
        event("2026-tiradentes", CalendarEventType::Holiday, date(2026, 4, 21)?, None, "Tiradentes"),
        event("2026-corpus-christi", CalendarEventType::Holiday, date(2026, 6, 4)?, Some(date(2026, 6, 5)?), "Corpus Christi"),
        makeup,
        event("2026-conselho", CalendarEventType::Suspension, date(2026, 8, 14)?, None, "Conselho de classe"),
        event("2026-independencia", CalendarEventType::Holiday, date(2026, 9, 7)?, None, "Independência"),
        event("2026-aparecida", CalendarEventType::Holiday, date(2026, 10, 12)?, None, "Nossa Senhora Aparecida"),
        event("2026-finados", CalendarEventType::Holiday, date(2026, 11, 2)?, None, "Finados"),
    ];

    let students = vec![
        StudentProfile {
            id: "ana-souza".to_string(),
            name: "Ana Souza".to_string(),
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "A".to_string(),
            shift: Some("Matutino".to_string()),
        },
        StudentProfile {
            id: "bruno-lima".to_string(),
            name: "Bruno Lima".to_string(),
            unit: "Centro".to_string(),
            grade_level: "6º Ano".to_string(),
            school_class: "B".to_string(),
            shift: Some("Vespertino".to_string()),
        },
    ];

    let absences: [(&str, &str, &str, NaiveDate, Option<u32>); 5] = [
        ("ana-souza", "A", "Matemática", date(2026, 3, 2)?, None),
        ("ana-souza", "A", "Matemática", date(2026, 3, 9)?, None),
        ("ana-souza", "A", "Português", date(2026, 5, 12)?, Some(2)),
        ("bruno-lima", "B", "Matemática", date(2026, 3, 4)?, None),
        ("bruno-lima", "B", "História", date(2026, 8, 20)?, Some(2)),
    ];
    let attendance = absences
        .iter()
        .map(|(student, class, discipline, day, weight)| {
            let mut record = AttendanceRecord {
                id: Some(attendance_doc_id(*day, discipline, class)),
                date: *day,
                discipline: discipline.to_string(),
                school_class: Some(class.to_string()),
                lesson_count: Some(1),
                student_status: HashMap::from([(student.to_string(), AttendanceStatus::Absent)]),
                student_absence_count: HashMap::new(),
            };
            if let Some(weight) = weight {
                record.student_absence_count.insert(student.to_string(), *weight);
            }
            record
        })
        .collect();

    let grade = |student: &str, subject: &str, scores: [(Option<f64>, Option<f64>); 4]| {
        let mut entry = GradeEntry {
            student_id: student.to_string(),
            subject: subject.to_string(),
            bimesters: Default::default(),
            final_remediation: None,
            annual_average: None,
            final_average: None,
            final_situation: Situation::InProgress,
        };
        for (slot, (score, remediation)) in entry.bimesters.iter_mut().zip(scores) {
            slot.score = score;
            slot.remediation = remediation;
            slot.is_score_approved = score.map(|_| true);
            slot.is_remediation_approved = remediation.map(|_| true);
        }
        entry
    };

    let mut ana_math = grade(
        "ana-souza",
        "Matemática",
        [(Some(8.5), None), (Some(6.0), Some(7.5)), (Some(9.0), None), (None, None)],
    );
    ana_math.bimesters.bimester3.is_score_approved = Some(false);
    let mut ana_portuguese = grade(
        "ana-souza",
        "Português",
        [(Some(5.5), None), (Some(6.5), None), (Some(7.0), None), (None, None)],
    );
    ana_portuguese.bimesters.bimester2.difficulty_topic =
        Some("Interpretação de texto".to_string());
    let bruno_math = grade(
        "bruno-lima",
        "Matemática",
        [(Some(4.0), Some(5.0)), (Some(5.5), None), (Some(6.0), None), (None, None)],
    );

    let grades = [ana_math, ana_portuguese, bruno_math]
        .iter()
        .map(|entry| entry.recompute(Default::default(), false))
        .collect();

    debug!("sample school year built");
    Ok(SchoolSnapshot {
        calendar: Some(calendar),
        curriculum,
        events,
        timetable: WeeklyTimetable::new(schedules),
        attendance,
        grades,
        students,
    })
}

#[derive(Debug, serde::Deserialize)]
struct AttendanceCsvRow {
    date: NaiveDate,
    discipline: String,
    school_class: String,
    student_id: String,
    status: AttendanceStatus,
    lesson_count: Option<u32>,
    source_key: Option<String>,
}

impl AttendanceCsvRow {
    fn source_key(&self) -> String {
        self.source_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()))
    }

    fn doc_id(&self) -> String {
        attendance_doc_id(self.date, &self.discipline, &self.school_class)
    }

    /// Folds this row's mark into the record for its date, subject and class.
    fn merge_into(self, existing: Option<AttendanceRecord>) -> AttendanceRecord {
        let mut record = existing.unwrap_or_else(|| AttendanceRecord {
            id: Some(self.doc_id()),
            date: self.date,
            discipline: self.discipline.clone(),
            school_class: Some(self.school_class.clone()),
            lesson_count: None,
            student_status: HashMap::new(),
            student_absence_count: HashMap::new(),
        });

        record.student_status.insert(self.student_id.clone(), self.status);
        if let Some(count) = self.lesson_count {
            record.student_absence_count.insert(self.student_id, count);
        }
        record
    }
}

pub async fn import_attendance_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<AttendanceCsvRow>() {
        let row = result?;
        let source_key = row.source_key();
        let doc_id = row.doc_id();

        // The key claim only sticks if the merged record is written too.
        let mut tx = pool.begin().await?;
        let claimed = sqlx::query(
            r#"
            INSERT INTO academic_engine.import_keys (source_key)
            VALUES ($1)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(&source_key)
        .execute(&mut *tx)
        .await?;

        if claimed.rows_affected() == 0 {
            debug!(%source_key, "attendance row already imported");
            tx.rollback().await?;
            continue;
        }

        let existing = fetch_document::<AttendanceRecord>(&mut *tx, ATTENDANCE, &doc_id).await?;
        let record = row.merge_into(existing);
        upsert_document(&mut *tx, ATTENDANCE, &doc_id, &record).await?;
        tx.commit().await?;
        inserted += 1;
    }

    Ok(inserted)
}
