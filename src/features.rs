//! Fixed-order numeric encoding of a student profile.
//!
//! The slot order is the classifier's input contract. Any missing satellite
//! profile contributes zeros; extraction never fails.

use crate::domain::{
    ContentType, GradeEntry, HousingStatus, Impact, Level, Severity, StudentProfile,
    StudyLifeBalance,
};
use ndarray::Array2;

pub const FEATURE_COUNT: usize = 26;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "attendance_percentage",
    "average_score",
    "daily_study_hours",
    "has_private_study_room",
    "has_stationery",
    "receives_private_tutoring",
    "works_after_school",
    "family_income_level",
    "housing_owned",
    "housing_rented",
    "housing_temporary_shelter",
    "housing_none",
    "motivation_high",
    "depression",
    "academic_stress_high",
    "study_life_balance_good",
    "family_pressures_high",
    "sleep_disorder_high",
    "daily_screen_time",
    "plays_video_games",
    "daily_gaming_hours",
    "social_media_negative",
    "content_gaming",
    "content_educational",
    "content_entertainment",
    "content_news",
];

const HOUSING_ONE_HOT: [HousingStatus; 4] = [
    HousingStatus::Owned,
    HousingStatus::Rented,
    HousingStatus::TemporaryShelter,
    HousingStatus::None,
];

const CONTENT_ONE_HOT: [ContentType; 4] = [
    ContentType::Gaming,
    ContentType::Educational,
    ContentType::Entertainment,
    ContentType::News,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    pub fn to_named_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        for (name, value) in FEATURE_NAMES.iter().zip(self.0.iter()) {
            obj.insert((*name).to_string(), serde_json::json!(value));
        }
        serde_json::Value::Object(obj)
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Credit-hour weighted mean of raw scores; 0.0 when there is no weight.
pub fn weighted_average_score(grades: &[GradeEntry]) -> f64 {
    let mut total = 0.0;
    let mut weight: u64 = 0;
    for g in grades {
        total += g.score * f64::from(g.credit_hours);
        weight += u64::from(g.credit_hours);
    }
    if weight == 0 {
        0.0
    } else {
        total / weight as f64
    }
}

pub fn extract_features(profile: &StudentProfile) -> FeatureVector {
    let mut v = [0.0; FEATURE_COUNT];

    v[0] = profile.student.attendance_percentage;
    v[1] = weighted_average_score(&profile.grades);

    if let Some(econ) = &profile.economic {
        v[2] = econ.daily_study_hours;
        v[3] = flag(econ.has_private_study_room);
        v[4] = flag(econ.has_stationery);
        v[5] = flag(econ.receives_private_tutoring);
        v[6] = flag(econ.works_after_school);
        v[7] = econ.family_income_level.unwrap_or(0.0);
        if let Some(status) = econ.housing_status {
            for (i, h) in HOUSING_ONE_HOT.iter().enumerate() {
                v[8 + i] = flag(status == *h);
            }
        }
    }

    if let Some(health) = &profile.health {
        v[12] = flag(health.motivation == Level::High);
        v[13] = flag(health.depression);
        v[14] = flag(health.academic_stress == Level::High);
        v[15] = flag(health.study_life_balance == StudyLifeBalance::Good);
        v[16] = flag(health.family_pressures == Severity::High);
        v[17] = flag(health.sleep_disorder == Severity::High);
    }

    if let Some(tech) = &profile.tech {
        v[18] = tech.daily_screen_time;
        v[19] = flag(tech.plays_video_games);
        v[20] = tech.daily_gaming_hours;
        v[21] = flag(tech.social_media_impact_on_studies == Impact::Negative);
        for (i, c) in CONTENT_ONE_HOT.iter().enumerate() {
            v[22 + i] = flag(tech.content_type_watched == *c);
        }
    }

    FeatureVector(v)
}

/// Stacks one row per profile, in input order.
pub fn feature_matrix(profiles: &[StudentProfile]) -> Array2<f64> {
    let mut m = Array2::<f64>::zeros((profiles.len(), FEATURE_COUNT));
    for (row, profile) in profiles.iter().enumerate() {
        let fv = extract_features(profile);
        for (col, value) in fv.0.iter().enumerate() {
            m[[row, col]] = *value;
        }
    }
    m
}
