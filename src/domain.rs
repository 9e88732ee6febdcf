use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a closed set of text choices stored as their display label.
macro_rules! text_choices {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Exact label match after trimming; anything else is `None`.
            pub fn parse(raw: &str) -> Option<Self> {
                let t = raw.trim();
                $(if t == $label { return Some($name::$variant); })+
                None
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_choices! {
    /// Categorical academic performance. Declaration order is the class-code
    /// order the external classifier was trained with.
    pub enum PerformanceLabel {
        Average => "Average",
        Excellent => "Excellent",
        Good => "Good",
        NeedsImprovement => "Needs Improvement",
        VeryGood => "Very Good",
    }
}

impl PerformanceLabel {
    /// Maps a classifier class code onto the canonical list.
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn code(self) -> usize {
        Self::ALL
            .iter()
            .position(|l| *l == self)
            .unwrap_or_default()
    }
}

text_choices! {
    pub enum Level {
        Low => "Low",
        Moderate => "Moderate",
        High => "High",
    }
}

text_choices! {
    /// Four-step scale used by sleep disorder and family pressures.
    pub enum Severity {
        None => "None",
        Low => "Low",
        Moderate => "Moderate",
        High => "High",
    }
}

text_choices! {
    pub enum StudyLifeBalance {
        NeedsImprovement => "Needs Improvement",
        Moderate => "Moderate",
        Good => "Good",
    }
}

text_choices! {
    pub enum Impact {
        Positive => "Positive",
        Negative => "Negative",
        Neutral => "Neutral",
        None => "None",
    }
}

text_choices! {
    pub enum ContentType {
        Educational => "Educational",
        Entertainment => "Entertainment",
        Gaming => "Gaming",
        News => "News",
        Sports => "Sports",
        Other => "Other",
    }
}

text_choices! {
    pub enum HousingStatus {
        Owned => "Owned",
        Rented => "Rented",
        Shared => "Shared",
        TemporaryShelter => "Temporary Shelter",
        None => "None",
    }
}

text_choices! {
    pub enum Semester {
        Fall => "Fall",
        Spring => "Spring",
        Summer => "Summer",
    }
}

text_choices! {
    pub enum ExamType {
        Midterm => "Midterm",
        Final => "Final",
        Quiz => "Quiz",
        Assignment => "Assignment",
        Other => "Other",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub enrollment_date: Option<NaiveDate>,
    pub guardian_name: String,
    pub guardian_relationship: Option<String>,
    pub guardian_contact: Option<String>,
    pub guardian_address: Option<String>,
    pub guardian_job_title: Option<String>,
    pub guardian_monthly_income: Option<f64>,
    pub grade_level: Option<String>,
    pub attendance_percentage: f64,
    pub academic_performance: Option<PerformanceLabel>,
    pub is_active: bool,
}

impl Student {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: String::new(),
            mobile: None,
            gender: None,
            nationality: None,
            address: None,
            date_of_birth: None,
            enrollment_date: None,
            guardian_name: "Unknown Guardian".to_string(),
            guardian_relationship: None,
            guardian_contact: None,
            guardian_address: None,
            guardian_job_title: None,
            guardian_monthly_income: None,
            grade_level: None,
            attendance_percentage: 0.0,
            academic_performance: None,
            is_active: true,
        }
    }

    /// Whole years between birth date and `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        use chrono::Datelike;
        let dob = self.date_of_birth?;
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        Some(age)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EconomicSituation {
    pub is_orphan: bool,
    pub family_income_level: Option<f64>,
    pub monthly_expenses: Option<f64>,
    pub housing_status: Option<HousingStatus>,
    pub has_private_study_room: bool,
    pub has_stationery: bool,
    pub receives_private_tutoring: bool,
    pub daily_study_hours: f64,
    pub works_after_school: bool,
}

impl Default for EconomicSituation {
    fn default() -> Self {
        Self {
            is_orphan: false,
            family_income_level: None,
            monthly_expenses: None,
            housing_status: None,
            has_private_study_room: false,
            has_stationery: true,
            receives_private_tutoring: false,
            daily_study_hours: 0.0,
            works_after_school: false,
        }
    }
}

impl EconomicSituation {
    /// Income below twice the monthly expenses; unknown when either is unset.
    pub fn is_poor(&self) -> bool {
        match (self.family_income_level, self.monthly_expenses) {
            (Some(income), Some(expenses)) => income < expenses * 2.0,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthInformation {
    pub academic_stress: Level,
    pub motivation: Level,
    pub depression: bool,
    pub anxiety: bool,
    pub sleep_disorder: Severity,
    pub study_life_balance: StudyLifeBalance,
    pub family_pressures: Severity,
    pub dental_health: String,
    pub ear_health: String,
    pub general_health_status: String,
    pub last_medical_checkup: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub blood_type: String,
}

impl Default for HealthInformation {
    fn default() -> Self {
        Self {
            academic_stress: Level::Moderate,
            motivation: Level::Moderate,
            depression: false,
            anxiety: false,
            sleep_disorder: Severity::None,
            study_life_balance: StudyLifeBalance::NeedsImprovement,
            family_pressures: Severity::None,
            dental_health: "good".to_string(),
            ear_health: "good".to_string(),
            general_health_status: "good".to_string(),
            last_medical_checkup: None,
            weight: None,
            height: None,
            blood_type: "O+".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialMediaAndTechnology {
    pub has_phone: bool,
    pub has_laptop: bool,
    pub daily_screen_time: f64,
    pub social_media_impact_on_studies: Impact,
    pub content_type_watched: ContentType,
    pub plays_video_games: bool,
    pub daily_gaming_hours: f64,
}

impl Default for SocialMediaAndTechnology {
    fn default() -> Self {
        Self {
            has_phone: false,
            has_laptop: false,
            daily_screen_time: 0.0,
            social_media_impact_on_studies: Impact::None,
            content_type_watched: ContentType::Other,
            plays_video_games: false,
            daily_gaming_hours: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub credit_hours: u32,
}

/// One grade row joined with its subject's credit hours.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeEntry {
    pub subject_name: String,
    pub credit_hours: u32,
    pub score: f64,
    pub max_score: f64,
}

/// A student with everything the scorer, extractor and report builder read.
#[derive(Debug, Clone)]
pub struct StudentProfile {
    pub student: Student,
    pub economic: Option<EconomicSituation>,
    pub health: Option<HealthInformation>,
    pub tech: Option<SocialMediaAndTechnology>,
    pub grades: Vec<GradeEntry>,
    pub subjects: Vec<String>,
}

impl StudentProfile {
    pub fn bare(student: Student) -> Self {
        Self {
            student,
            economic: None,
            health: None,
            tech: None,
            grades: Vec::new(),
            subjects: Vec::new(),
        }
    }
}
