use crate::domain::{
    EconomicSituation, ExamType, GradeEntry, HealthInformation, PerformanceLabel, Semester,
    SocialMediaAndTechnology, Student, StudentProfile, Subject,
};
use crate::grades::{self, GradeMetrics, TrendSummary};
use crate::scoring::{score_performance, PerformanceScore};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "schoolhub.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            credit_hours INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT NOT NULL,
            mobile TEXT,
            gender TEXT,
            nationality TEXT,
            address TEXT,
            date_of_birth TEXT,
            enrollment_date TEXT,
            guardian_name TEXT NOT NULL,
            guardian_relationship TEXT,
            guardian_contact TEXT,
            guardian_address TEXT,
            guardian_job_title TEXT,
            guardian_monthly_income REAL,
            grade_level TEXT,
            attendance_percentage REAL NOT NULL DEFAULT 0,
            academic_performance TEXT,
            performance_index REAL,
            is_active INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(full_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_subjects(
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            PRIMARY KEY(student_id, subject_id),
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        )",
        [],
    )?;

    for table in SatelliteKind::ALL.iter().map(|k| k.table()) {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}(
                    student_id TEXT PRIMARY KEY,
                    profile_json TEXT NOT NULL,
                    updated_at TEXT,
                    FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
                )",
                table
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            score REAL NOT NULL,
            max_score REAL NOT NULL DEFAULT 100,
            percentage REAL NOT NULL,
            letter TEXT NOT NULL,
            gpa_points REAL NOT NULL,
            exam_type TEXT NOT NULL,
            semester TEXT NOT NULL,
            is_retake INTEGER NOT NULL DEFAULT 0,
            improved_score REAL,
            date_recorded TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS performance_trends(
            student_id TEXT NOT NULL,
            semester TEXT NOT NULL,
            average_percentage REAL NOT NULL,
            gpa REAL NOT NULL,
            grade_count INTEGER NOT NULL,
            PRIMARY KEY(student_id, semester),
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS reports(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            category TEXT NOT NULL,
            report_type TEXT NOT NULL,
            generated_at TEXT NOT NULL,
            data_json TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_student ON reports(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_reports_category ON reports(category)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS predictions(
            student_id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            predicted_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;

    Ok(conn)
}

fn now_ts() -> String {
    Utc::now().to_rfc3339()
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
}

// ---------------------------------------------------------------------------
// settings
// ---------------------------------------------------------------------------

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("setting {} is not valid JSON", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// subjects
// ---------------------------------------------------------------------------

pub fn create_subject(conn: &Connection, name: &str, credit_hours: u32) -> anyhow::Result<Subject> {
    let subject = Subject {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        credit_hours: credit_hours.max(1),
    };
    conn.execute(
        "INSERT INTO subjects(id, name, credit_hours) VALUES(?, ?, ?)",
        (&subject.id, &subject.name, subject.credit_hours),
    )?;
    Ok(subject)
}

pub fn list_subjects(conn: &Connection) -> anyhow::Result<Vec<Subject>> {
    let mut stmt = conn.prepare("SELECT id, name, credit_hours FROM subjects ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                credit_hours: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn subject_exists(conn: &Connection, subject_id: &str) -> anyhow::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM subjects WHERE id = ?", [subject_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

// ---------------------------------------------------------------------------
// students
// ---------------------------------------------------------------------------

const STUDENT_COLUMNS: &str = "id, full_name, email, mobile, gender, nationality, address,
    date_of_birth, enrollment_date, guardian_name, guardian_relationship, guardian_contact,
    guardian_address, guardian_job_title, guardian_monthly_income, grade_level,
    attendance_percentage, academic_performance, is_active";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    let performance: Option<String> = r.get(17)?;
    Ok(Student {
        id: r.get(0)?,
        full_name: r.get(1)?,
        email: r.get(2)?,
        mobile: r.get(3)?,
        gender: r.get(4)?,
        nationality: r.get(5)?,
        address: r.get(6)?,
        date_of_birth: parse_date(r.get(7)?),
        enrollment_date: parse_date(r.get(8)?),
        guardian_name: r.get(9)?,
        guardian_relationship: r.get(10)?,
        guardian_contact: r.get(11)?,
        guardian_address: r.get(12)?,
        guardian_job_title: r.get(13)?,
        guardian_monthly_income: r.get(14)?,
        grade_level: r.get(15)?,
        attendance_percentage: r.get(16)?,
        academic_performance: performance.as_deref().and_then(PerformanceLabel::parse),
        is_active: r.get::<_, i64>(18)? != 0,
    })
}

pub fn student_exists(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

pub fn email_taken(conn: &Connection, email: &str, except_id: Option<&str>) -> anyhow::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT id FROM students WHERE lower(email) = lower(?)",
            [email],
            |r| r.get(0),
        )
        .optional()?;
    Ok(match (found, except_id) {
        (Some(id), Some(except)) => id != except,
        (Some(_), None) => true,
        (None, _) => false,
    })
}

pub fn load_student(conn: &Connection, student_id: &str) -> anyhow::Result<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

fn write_student_base(conn: &Connection, s: &Student) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(
            id, full_name, email, mobile, gender, nationality, address,
            date_of_birth, enrollment_date, guardian_name, guardian_relationship,
            guardian_contact, guardian_address, guardian_job_title, guardian_monthly_income,
            grade_level, attendance_percentage, is_active, updated_at)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
         ON CONFLICT(id) DO UPDATE SET
            full_name = excluded.full_name,
            email = excluded.email,
            mobile = excluded.mobile,
            gender = excluded.gender,
            nationality = excluded.nationality,
            address = excluded.address,
            date_of_birth = excluded.date_of_birth,
            enrollment_date = excluded.enrollment_date,
            guardian_name = excluded.guardian_name,
            guardian_relationship = excluded.guardian_relationship,
            guardian_contact = excluded.guardian_contact,
            guardian_address = excluded.guardian_address,
            guardian_job_title = excluded.guardian_job_title,
            guardian_monthly_income = excluded.guardian_monthly_income,
            grade_level = excluded.grade_level,
            attendance_percentage = excluded.attendance_percentage,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at",
        rusqlite::params![
            s.id,
            s.full_name,
            s.email,
            s.mobile,
            s.gender,
            s.nationality,
            s.address,
            s.date_of_birth.map(|d| d.to_string()),
            s.enrollment_date.map(|d| d.to_string()),
            s.guardian_name,
            s.guardian_relationship,
            s.guardian_contact,
            s.guardian_address,
            s.guardian_job_title,
            s.guardian_monthly_income,
            s.grade_level,
            s.attendance_percentage,
            if s.is_active { 1 } else { 0 },
            now_ts(),
        ],
    )?;
    Ok(())
}

fn write_performance(conn: &Connection, student_id: &str, score: &PerformanceScore) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE students SET academic_performance = ?, performance_index = ? WHERE id = ?",
        (score.label.as_str(), score.index, student_id),
    )?;
    Ok(())
}

/// Recomputes and persists the derived performance of one student.
/// Returns `None` when the student does not exist.
pub fn rescore_student(conn: &Connection, student_id: &str) -> anyhow::Result<Option<PerformanceScore>> {
    let Some(profile) = load_profile(conn, student_id)? else {
        return Ok(None);
    };
    let score = score_performance(&profile);
    write_performance(conn, student_id, &score)?;
    Ok(Some(score))
}

/// Persists the base fields, then scores the stored profile and writes the
/// derived label, all in one transaction.
pub fn save_student(conn: &Connection, student: &Student) -> anyhow::Result<PerformanceScore> {
    let tx = conn.unchecked_transaction()?;
    write_student_base(&tx, student)?;
    let score = rescore_student(&tx, &student.id)?
        .ok_or_else(|| anyhow::anyhow!("student {} vanished during save", student.id))?;
    tx.commit()?;
    Ok(score)
}

/// Inserts a new student and its first report atomically. `build` sees the
/// profile as stored; if it fails nothing is kept.
pub fn create_student_with_report<F>(
    conn: &Connection,
    student: &Student,
    category: &str,
    report_type: &str,
    build: F,
) -> anyhow::Result<(PerformanceScore, StudentProfile, ReportRow)>
where
    F: FnOnce(&StudentProfile) -> anyhow::Result<serde_json::Map<String, serde_json::Value>>,
{
    let tx = conn.unchecked_transaction()?;
    write_student_base(&tx, student)?;
    let score = rescore_student(&tx, &student.id)?
        .ok_or_else(|| anyhow::anyhow!("student {} vanished during save", student.id))?;
    let profile = load_profile(&tx, &student.id)?
        .ok_or_else(|| anyhow::anyhow!("student {} vanished during save", student.id))?;
    let data = build(&profile)?;
    let report = create_report(&tx, &student.id, category, report_type, &data)?;
    tx.commit()?;
    Ok((score, profile, report))
}

pub fn delete_student(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    Ok(n > 0)
}

pub fn count_students(conn: &Connection, active_only: bool) -> anyhow::Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE (? = 0 OR is_active = 1)",
        [if active_only { 1 } else { 0 }],
        |r| r.get(0),
    )?;
    Ok(n.max(0) as usize)
}

/// Students ordered by name, then id, windowed by `offset`/`limit`.
pub fn list_students(
    conn: &Connection,
    active_only: bool,
    offset: usize,
    limit: usize,
) -> anyhow::Result<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students
         WHERE (? = 0 OR is_active = 1)
         ORDER BY full_name, id
         LIMIT ? OFFSET ?",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            (
                if active_only { 1 } else { 0 },
                limit as i64,
                offset as i64,
            ),
            student_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// satellite profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatelliteKind {
    Economic,
    Health,
    Tech,
}

impl SatelliteKind {
    pub const ALL: [SatelliteKind; 3] = [
        SatelliteKind::Economic,
        SatelliteKind::Health,
        SatelliteKind::Tech,
    ];

    fn table(self) -> &'static str {
        match self {
            SatelliteKind::Economic => "economic_situations",
            SatelliteKind::Health => "health_information",
            SatelliteKind::Tech => "tech_and_social",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "economic" => Some(SatelliteKind::Economic),
            "health" => Some(SatelliteKind::Health),
            "tech" => Some(SatelliteKind::Tech),
            _ => None,
        }
    }
}

fn load_satellite<T: serde::de::DeserializeOwned>(
    conn: &Connection,
    kind: SatelliteKind,
    student_id: &str,
) -> anyhow::Result<Option<T>> {
    let sql = format!("SELECT profile_json FROM {} WHERE student_id = ?", kind.table());
    let raw: Option<String> = conn.query_row(&sql, [student_id], |r| r.get(0)).optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s).with_context(|| {
            format!("stored {} profile for {} is invalid", kind.table(), student_id)
        })?)),
        None => Ok(None),
    }
}

/// Upserts a satellite profile and rescores the owning student.
pub fn set_satellite<T: Serialize>(
    conn: &Connection,
    kind: SatelliteKind,
    student_id: &str,
    profile: &T,
) -> anyhow::Result<PerformanceScore> {
    let tx = conn.unchecked_transaction()?;
    let sql = format!(
        "INSERT INTO {}(student_id, profile_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
            profile_json = excluded.profile_json,
            updated_at = excluded.updated_at",
        kind.table()
    );
    tx.execute(&sql, (student_id, serde_json::to_string(profile)?, now_ts()))?;
    let score = rescore_student(&tx, student_id)?
        .ok_or_else(|| anyhow::anyhow!("student {} not found", student_id))?;
    tx.commit()?;
    Ok(score)
}

/// Removes a satellite profile; returns the new score, or `None` if there was
/// nothing to remove.
pub fn clear_satellite(
    conn: &Connection,
    kind: SatelliteKind,
    student_id: &str,
) -> anyhow::Result<Option<PerformanceScore>> {
    let tx = conn.unchecked_transaction()?;
    let sql = format!("DELETE FROM {} WHERE student_id = ?", kind.table());
    let n = tx.execute(&sql, [student_id])?;
    if n == 0 {
        return Ok(None);
    }
    let score = rescore_student(&tx, student_id)?;
    tx.commit()?;
    Ok(score)
}

pub fn load_profile(conn: &Connection, student_id: &str) -> anyhow::Result<Option<StudentProfile>> {
    let Some(student) = load_student(conn, student_id)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT s.name, s.credit_hours, g.score, g.max_score
         FROM grades g
         JOIN subjects s ON s.id = g.subject_id
         WHERE g.student_id = ?
         ORDER BY g.rowid",
    )?;
    let grades = stmt
        .query_map([student_id], |r| {
            Ok(GradeEntry {
                subject_name: r.get(0)?,
                credit_hours: r.get(1)?,
                score: r.get(2)?,
                max_score: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT s.name
         FROM student_subjects ss
         JOIN subjects s ON s.id = ss.subject_id
         WHERE ss.student_id = ?
         ORDER BY s.name",
    )?;
    let subjects = stmt
        .query_map([student_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(StudentProfile {
        economic: load_satellite::<EconomicSituation>(conn, SatelliteKind::Economic, student_id)?,
        health: load_satellite::<HealthInformation>(conn, SatelliteKind::Health, student_id)?,
        tech: load_satellite::<SocialMediaAndTechnology>(conn, SatelliteKind::Tech, student_id)?,
        student,
        grades,
        subjects,
    }))
}

pub fn load_profiles(conn: &Connection, students: Vec<Student>) -> anyhow::Result<Vec<StudentProfile>> {
    let mut out = Vec::with_capacity(students.len());
    for s in students {
        if let Some(p) = load_profile(conn, &s.id)? {
            out.push(p);
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// grades and trends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewGrade {
    pub student_id: String,
    pub subject_id: String,
    pub score: f64,
    pub max_score: f64,
    pub exam_type: ExamType,
    pub semester: Semester,
    pub is_retake: bool,
    pub date_recorded: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRow {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub score: f64,
    pub max_score: f64,
    pub percentage: f64,
    pub letter: String,
    pub gpa_points: f64,
    pub exam_type: String,
    pub semester: String,
    pub is_retake: bool,
    pub improved_score: Option<f64>,
    pub date_recorded: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedGrade {
    pub grade: GradeRow,
    pub trend: TrendSummary,
    pub performance: PerformanceScore,
}

fn latest_original_score(
    conn: &Connection,
    student_id: &str,
    subject_id: &str,
) -> anyhow::Result<Option<f64>> {
    Ok(conn
        .query_row(
            "SELECT score FROM grades
             WHERE student_id = ? AND subject_id = ? AND is_retake = 0
             ORDER BY date_recorded DESC, rowid DESC
             LIMIT 1",
            (student_id, subject_id),
            |r| r.get(0),
        )
        .optional()?)
}

/// Stores a grade with its derived metrics, refreshes the semester trend and
/// rescores the student.
pub fn record_grade(conn: &Connection, g: &NewGrade) -> anyhow::Result<RecordedGrade> {
    let GradeMetrics {
        percentage,
        letter,
        gpa_points,
    } = grades::calculate_grade_metrics(g.score, g.max_score);

    let tx = conn.unchecked_transaction()?;
    let improved_score = if g.is_retake {
        grades::retake_improvement(g.score, latest_original_score(&tx, &g.student_id, &g.subject_id)?)
    } else {
        None
    };

    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO grades(
            id, student_id, subject_id, score, max_score, percentage, letter, gpa_points,
            exam_type, semester, is_retake, improved_score, date_recorded)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            id,
            g.student_id,
            g.subject_id,
            g.score,
            g.max_score,
            percentage,
            letter.as_str(),
            gpa_points,
            g.exam_type.as_str(),
            g.semester.as_str(),
            if g.is_retake { 1 } else { 0 },
            improved_score,
            g.date_recorded.to_string(),
        ],
    )?;
    tx.execute(
        "INSERT OR IGNORE INTO student_subjects(student_id, subject_id) VALUES(?, ?)",
        (&g.student_id, &g.subject_id),
    )?;

    let trend = refresh_trend(&tx, &g.student_id, g.semester.as_str())?;
    let performance = rescore_student(&tx, &g.student_id)?
        .ok_or_else(|| anyhow::anyhow!("student {} not found", g.student_id))?;
    let grade = load_grade(&tx, &id)?.ok_or_else(|| anyhow::anyhow!("grade {} not stored", id))?;
    tx.commit()?;

    Ok(RecordedGrade {
        grade,
        trend,
        performance,
    })
}

const GRADE_SELECT: &str = "SELECT g.id, g.student_id, g.subject_id, s.name, g.score, g.max_score,
        g.percentage, g.letter, g.gpa_points, g.exam_type, g.semester, g.is_retake,
        g.improved_score, g.date_recorded
     FROM grades g
     JOIN subjects s ON s.id = g.subject_id";

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<GradeRow> {
    Ok(GradeRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        subject_name: r.get(3)?,
        score: r.get(4)?,
        max_score: r.get(5)?,
        percentage: r.get(6)?,
        letter: r.get(7)?,
        gpa_points: r.get(8)?,
        exam_type: r.get(9)?,
        semester: r.get(10)?,
        is_retake: r.get::<_, i64>(11)? != 0,
        improved_score: r.get(12)?,
        date_recorded: r.get(13)?,
    })
}

pub fn load_grade(conn: &Connection, grade_id: &str) -> anyhow::Result<Option<GradeRow>> {
    let sql = format!("{} WHERE g.id = ?", GRADE_SELECT);
    Ok(conn.query_row(&sql, [grade_id], grade_from_row).optional()?)
}

/// Most recent first.
pub fn list_grades(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<GradeRow>> {
    let sql = format!(
        "{} WHERE g.student_id = ? ORDER BY g.date_recorded DESC, g.rowid DESC",
        GRADE_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes a grade, then refreshes its semester trend and rescores the owner.
pub fn delete_grade(conn: &Connection, grade_id: &str) -> anyhow::Result<Option<PerformanceScore>> {
    let Some(row) = load_grade(conn, grade_id)? else {
        return Ok(None);
    };
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM grades WHERE id = ?", [grade_id])?;
    refresh_trend(&tx, &row.student_id, &row.semester)?;
    let score = rescore_student(&tx, &row.student_id)?;
    tx.commit()?;
    Ok(score)
}

pub fn refresh_trend(conn: &Connection, student_id: &str, semester: &str) -> anyhow::Result<TrendSummary> {
    let mut stmt = conn.prepare(
        "SELECT percentage, gpa_points FROM grades WHERE student_id = ? AND semester = ?",
    )?;
    let rows = stmt
        .query_map((student_id, semester), |r| {
            Ok((r.get::<_, f64>(0)?, r.get::<_, f64>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let trend = grades::semester_trend(rows);
    conn.execute(
        "INSERT INTO performance_trends(student_id, semester, average_percentage, gpa, grade_count)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, semester) DO UPDATE SET
            average_percentage = excluded.average_percentage,
            gpa = excluded.gpa,
            grade_count = excluded.grade_count",
        (
            student_id,
            semester,
            trend.average_percentage,
            trend.gpa,
            trend.grade_count as i64,
        ),
    )?;
    Ok(trend)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendRow {
    pub semester: String,
    pub average_percentage: f64,
    pub gpa: f64,
    pub grade_count: i64,
}

pub fn list_trends(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<TrendRow>> {
    let mut stmt = conn.prepare(
        "SELECT semester, average_percentage, gpa, grade_count
         FROM performance_trends
         WHERE student_id = ?
         ORDER BY semester",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(TrendRow {
                semester: r.get(0)?,
                average_percentage: r.get(1)?,
                gpa: r.get(2)?,
                grade_count: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// predictions cache
// ---------------------------------------------------------------------------

pub fn upsert_prediction(conn: &Connection, student_id: &str, label: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO predictions(student_id, label, predicted_at) VALUES(?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
            label = excluded.label,
            predicted_at = excluded.predicted_at",
        (student_id, label, now_ts()),
    )?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPrediction {
    pub student_id: String,
    pub full_name: String,
    pub predicted: String,
    pub actual: Option<String>,
    pub predicted_at: String,
}

pub fn list_predictions(conn: &Connection) -> anyhow::Result<Vec<CachedPrediction>> {
    let mut stmt = conn.prepare(
        "SELECT p.student_id, s.full_name, p.label, s.academic_performance, p.predicted_at
         FROM predictions p
         JOIN students s ON s.id = p.student_id
         ORDER BY s.full_name, s.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CachedPrediction {
                student_id: r.get(0)?,
                full_name: r.get(1)?,
                predicted: r.get(2)?,
                actual: r.get(3)?,
                predicted_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub category: String,
    pub report_type: String,
    pub generated_at: String,
    pub data: serde_json::Value,
}

pub fn create_report(
    conn: &Connection,
    student_id: &str,
    category: &str,
    report_type: &str,
    data: &serde_json::Map<String, serde_json::Value>,
) -> anyhow::Result<ReportRow> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO reports(id, student_id, category, report_type, generated_at, data_json)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            student_id,
            category,
            report_type,
            now_ts(),
            serde_json::to_string(data)?,
        ),
    )?;
    load_report(conn, &id)?.ok_or_else(|| anyhow::anyhow!("report {} not stored", id))
}

const REPORT_SELECT: &str = "SELECT r.id, r.student_id, s.full_name, r.category, r.report_type,
        r.generated_at, r.data_json
     FROM reports r
     JOIN students s ON s.id = r.student_id";

fn report_from_row(r: &Row<'_>) -> rusqlite::Result<ReportRow> {
    let raw: String = r.get(6)?;
    Ok(ReportRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: r.get(2)?,
        category: r.get(3)?,
        report_type: r.get(4)?,
        generated_at: r.get(5)?,
        data: serde_json::from_str(&raw)
            .unwrap_or_else(|_| serde_json::json!({ "Report Data": raw })),
    })
}

pub fn load_report(conn: &Connection, report_id: &str) -> anyhow::Result<Option<ReportRow>> {
    let sql = format!("{} WHERE r.id = ?", REPORT_SELECT);
    Ok(conn.query_row(&sql, [report_id], report_from_row).optional()?)
}

/// Newest first, optionally narrowed to one category and/or one student.
pub fn list_reports(
    conn: &Connection,
    category: Option<&str>,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<ReportRow>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR r.category = ?1) AND (?2 IS NULL OR r.student_id = ?2)
         ORDER BY r.generated_at DESC, r.rowid DESC",
        REPORT_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((category, student_id), report_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_report(conn: &Connection, report_id: &str) -> anyhow::Result<bool> {
    Ok(conn.execute("DELETE FROM reports WHERE id = ?", [report_id])? > 0)
}

pub fn report_counts_by_category(conn: &Connection) -> anyhow::Result<BTreeMap<String, i64>> {
    let mut stmt =
        conn.prepare("SELECT category, COUNT(*) FROM reports GROUP BY category ORDER BY category")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}

/// Student count per stored performance label; unlabeled rows count under
/// "Not Specified".
pub fn performance_distribution(conn: &Connection) -> anyhow::Result<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare(
        "SELECT COALESCE(academic_performance, 'Not Specified'), COUNT(*)
         FROM students
         GROUP BY 1
         ORDER BY 1",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(rows)
}
