//! Category snapshots of a student's data.
//!
//! A report's data is a flat key/value map whose keys depend on the category.
//! Readers must tolerate missing keys.

use crate::domain::StudentProfile;
use crate::features::weighted_average_score;
use crate::scoring::{score_performance, IncomeCategory};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Personal,
    Guardian,
    Health,
    Academic,
    Economic,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 5] = [
        ReportCategory::Personal,
        ReportCategory::Guardian,
        ReportCategory::Health,
        ReportCategory::Academic,
        ReportCategory::Economic,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ReportCategory::Personal => "personal",
            ReportCategory::Guardian => "guardian",
            ReportCategory::Health => "health",
            ReportCategory::Academic => "academic",
            ReportCategory::Economic => "economic",
        }
    }

    pub fn display(self) -> &'static str {
        match self {
            ReportCategory::Personal => "Personal Information Report",
            ReportCategory::Guardian => "Guardian Information Report",
            ReportCategory::Health => "Health Information Report",
            ReportCategory::Academic => "Academic Information Report",
            ReportCategory::Economic => "Economic Situation Report",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|c| c.code() == t)
    }
}

pub const PERSONAL_KEYS: [&str; 7] = [
    "Full Name",
    "Date of Birth",
    "Gender",
    "Email",
    "Mobile",
    "Nationality",
    "Address",
];

pub const HEALTH_UNAVAILABLE_KEY: &str = "Health Information";
pub const ECONOMIC_UNAVAILABLE_KEY: &str = "Economic Situation";
const NOT_AVAILABLE: &str = "Not Available";
const NA: &str = "N/A";

fn opt_str(v: &Option<String>) -> Value {
    match v {
        Some(s) => json!(s),
        None => Value::Null,
    }
}

fn opt_date(v: Option<NaiveDate>) -> Value {
    match v {
        Some(d) => json!(d.to_string()),
        None => json!(NA),
    }
}

/// Builds the data map for `category`. Unknown categories produce an empty map.
pub fn build_report_data(
    profile: &StudentProfile,
    category: &str,
    today: NaiveDate,
) -> Map<String, Value> {
    match ReportCategory::parse(category) {
        Some(c) => build_category_data(profile, c, today),
        None => Map::new(),
    }
}

pub fn build_category_data(
    profile: &StudentProfile,
    category: ReportCategory,
    today: NaiveDate,
) -> Map<String, Value> {
    match category {
        ReportCategory::Personal => personal_data(profile),
        ReportCategory::Guardian => guardian_data(profile),
        ReportCategory::Health => health_data(profile),
        ReportCategory::Academic => academic_data(profile, today),
        ReportCategory::Economic => economic_data(profile),
    }
}

fn personal_data(profile: &StudentProfile) -> Map<String, Value> {
    let s = &profile.student;
    let values = [
        json!(s.full_name),
        opt_date(s.date_of_birth),
        opt_str(&s.gender),
        json!(s.email),
        opt_str(&s.mobile),
        opt_str(&s.nationality),
        opt_str(&s.address),
    ];
    PERSONAL_KEYS
        .iter()
        .zip(values)
        .map(|(k, v)| ((*k).to_string(), v))
        .collect()
}

fn guardian_data(profile: &StudentProfile) -> Map<String, Value> {
    let s = &profile.student;
    let mut m = Map::new();
    m.insert("Guardian Name".into(), json!(s.guardian_name));
    m.insert("Guardian Relationship".into(), opt_str(&s.guardian_relationship));
    m.insert("Guardian Contact".into(), opt_str(&s.guardian_contact));
    m.insert("Guardian Address".into(), opt_str(&s.guardian_address));
    m.insert("Guardian Job Title".into(), opt_str(&s.guardian_job_title));
    m.insert(
        "Guardian Monthly Income".into(),
        match s.guardian_monthly_income {
            Some(v) => json!(format!("{:.2}", v)),
            None => json!(NA),
        },
    );
    m
}

fn health_data(profile: &StudentProfile) -> Map<String, Value> {
    let mut m = Map::new();
    let Some(h) = &profile.health else {
        m.insert(HEALTH_UNAVAILABLE_KEY.into(), json!(NOT_AVAILABLE));
        return m;
    };
    m.insert("Dental Health".into(), json!(h.dental_health));
    m.insert("Ear Health".into(), json!(h.ear_health));
    m.insert("General Health".into(), json!(h.general_health_status));
    m.insert("Last Medical Checkup".into(), opt_date(h.last_medical_checkup));
    m.insert("Weight".into(), json!(h.weight));
    m.insert("Height".into(), json!(h.height));
    m.insert("Blood Type".into(), json!(h.blood_type));
    m
}

fn academic_data(profile: &StudentProfile, today: NaiveDate) -> Map<String, Value> {
    let s = &profile.student;
    let score = score_performance(profile);
    let label = s.academic_performance.unwrap_or(score.label);

    let mut m = Map::new();
    m.insert("Name".into(), json!(s.full_name));
    m.insert("Age".into(), json!(s.age_on(today)));
    m.insert("Grade Level".into(), opt_str(&s.grade_level));
    m.insert("Academic Performance".into(), json!(label.as_str()));
    m.insert(
        "Performance Index".into(),
        json!((score.index * 10000.0).round() / 10000.0),
    );
    m.insert(
        "Average Score".into(),
        json!((weighted_average_score(&profile.grades) * 100.0).round() / 100.0),
    );
    m.insert("Enrollment Date".into(), opt_date(s.enrollment_date));
    m.insert(
        "Attendance".into(),
        json!(format!("{}%", s.attendance_percentage)),
    );
    m.insert("Subjects".into(), json!(profile.subjects));
    m
}

fn economic_data(profile: &StudentProfile) -> Map<String, Value> {
    let mut m = Map::new();
    let Some(e) = &profile.economic else {
        m.insert(ECONOMIC_UNAVAILABLE_KEY.into(), json!(NOT_AVAILABLE));
        return m;
    };
    m.insert(
        "Family Income Level".into(),
        match e.family_income_level {
            Some(v) => json!(format!("{:.2}", v)),
            None => json!(NA),
        },
    );
    m.insert(
        "Income Category".into(),
        json!(IncomeCategory::from_income(e.family_income_level).as_str()),
    );
    m.insert(
        "Housing Status".into(),
        match e.housing_status {
            Some(h) => json!(h.as_str()),
            None => json!(NA),
        },
    );
    m.insert("Daily Study Hours".into(), json!(e.daily_study_hours));
    m.insert("Works After School".into(), json!(e.works_after_school));
    m.insert("Is Orphan".into(), json!(e.is_orphan));
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GradeEntry, HealthInformation, PerformanceLabel, Student};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).expect("date")
    }

    fn profile() -> StudentProfile {
        let mut s = Student::new("s1", "Lina Haddad");
        s.email = "lina@example.org".into();
        s.gender = Some("Female".into());
        s.date_of_birth = NaiveDate::from_ymd_opt(2008, 3, 2);
        s.attendance_percentage = 90.0;
        s.grade_level = Some("Grade 11".into());
        let mut p = StudentProfile::bare(s);
        p.grades = vec![GradeEntry {
            subject_name: "Math".into(),
            credit_hours: 2,
            score: 88.0,
            max_score: 100.0,
        }];
        p.subjects = vec!["Math".into()];
        p
    }

    #[test]
    fn personal_report_has_exactly_the_personal_keys() {
        let data = build_report_data(&profile(), "personal", today());
        let mut keys: Vec<&str> = data.keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        let mut expected = PERSONAL_KEYS.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);
        assert_eq!(data["Date of Birth"], json!("2008-03-02"));
        assert_eq!(data["Mobile"], Value::Null);
    }

    #[test]
    fn unknown_category_is_empty() {
        assert!(build_report_data(&profile(), "unknown_category", today()).is_empty());
    }

    #[test]
    fn category_codes_are_case_insensitive() {
        assert_eq!(ReportCategory::parse(" Academic "), Some(ReportCategory::Academic));
        assert_eq!(ReportCategory::parse("finance"), None);
    }

    #[test]
    fn missing_satellites_yield_single_sentinel() {
        let health = build_report_data(&profile(), "health", today());
        assert_eq!(health.len(), 1);
        assert_eq!(health[HEALTH_UNAVAILABLE_KEY], json!("Not Available"));

        let econ = build_report_data(&profile(), "economic", today());
        assert_eq!(econ.len(), 1);
        assert_eq!(econ[ECONOMIC_UNAVAILABLE_KEY], json!("Not Available"));
    }

    #[test]
    fn health_report_lists_profile_fields() {
        let mut p = profile();
        p.health = Some(HealthInformation {
            weight: Some(51.5),
            ..HealthInformation::default()
        });
        let data = build_report_data(&p, "health", today());
        assert_eq!(data["Blood Type"], json!("O+"));
        assert_eq!(data["Weight"], json!(51.5));
        assert_eq!(data["Last Medical Checkup"], json!("N/A"));
    }

    #[test]
    fn academic_report_includes_average_and_label() {
        let mut p = profile();
        p.student.academic_performance = Some(PerformanceLabel::Good);
        let data = build_report_data(&p, "academic", today());
        assert_eq!(data["Average Score"], json!(88.0));
        assert_eq!(data["Academic Performance"], json!("Good"));
        assert_eq!(data["Attendance"], json!("90%"));
        assert_eq!(data["Age"], json!(16));
        assert_eq!(data["Subjects"], json!(["Math"]));
    }

    #[test]
    fn guardian_income_defaults_to_na() {
        let data = build_report_data(&profile(), "guardian", today());
        assert_eq!(data["Guardian Name"], json!("Unknown Guardian"));
        assert_eq!(data["Guardian Monthly Income"], json!("N/A"));
    }
}
