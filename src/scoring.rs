//! Weighted academic-performance index.
//!
//! Every factor is normalized to [0, 1] so that higher always means better,
//! then combined with the constant [`WEIGHTS`] table.

use crate::domain::{
    ContentType, Impact, Level, PerformanceLabel, Severity, StudentProfile, StudyLifeBalance,
};
use crate::features::weighted_average_score;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Factor {
    Attendance,
    Score,
    Study,
    Motivation,
    Stress,
    Depression,
    StudyLifeBalance,
    FamilyPressures,
    Gaming,
    SocialMedia,
    Content,
    Income,
}

pub const WEIGHTS: [(Factor, f64); 12] = [
    (Factor::Attendance, 0.20),
    (Factor::Score, 0.35),
    (Factor::Study, 0.10),
    (Factor::Motivation, 0.10),
    (Factor::Stress, 0.05),
    (Factor::Depression, 0.03),
    (Factor::StudyLifeBalance, 0.03),
    (Factor::FamilyPressures, 0.02),
    (Factor::Gaming, 0.04),
    (Factor::SocialMedia, 0.03),
    (Factor::Content, 0.03),
    (Factor::Income, 0.02),
];

/// Lower bound (inclusive) of the index for each label, highest first.
pub const LABEL_THRESHOLDS: [(PerformanceLabel, f64); 4] = [
    (PerformanceLabel::Excellent, 0.80),
    (PerformanceLabel::VeryGood, 0.70),
    (PerformanceLabel::Good, 0.60),
    (PerformanceLabel::Average, 0.50),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IncomeCategory {
    Low,
    Middle,
    High,
}

impl IncomeCategory {
    pub fn from_income(income: Option<f64>) -> Self {
        match income {
            Some(v) if v >= 2000.0 => IncomeCategory::High,
            Some(v) if v >= 500.0 => IncomeCategory::Middle,
            _ => IncomeCategory::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncomeCategory::Low => "Low",
            IncomeCategory::Middle => "Middle",
            IncomeCategory::High => "High",
        }
    }

    fn value(self) -> f64 {
        match self {
            IncomeCategory::Low => 0.0,
            IncomeCategory::Middle => 0.5,
            IncomeCategory::High => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorValue {
    pub factor: Factor,
    pub weight: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceScore {
    pub label: PerformanceLabel,
    /// Weighted index in [0, 1].
    pub index: f64,
    pub factors: Vec<FactorValue>,
}

fn level_value(level: Level) -> f64 {
    match level {
        Level::Low => 0.0,
        Level::Moderate => 0.5,
        Level::High => 1.0,
    }
}

fn pressure_value(sev: Severity) -> f64 {
    match sev {
        Severity::None => 1.0,
        Severity::Low => 0.75,
        Severity::Moderate => 0.5,
        Severity::High => 0.25,
    }
}

fn balance_value(balance: StudyLifeBalance) -> f64 {
    match balance {
        StudyLifeBalance::NeedsImprovement => 0.0,
        StudyLifeBalance::Moderate => 0.5,
        StudyLifeBalance::Good => 1.0,
    }
}

fn impact_value(impact: Impact) -> f64 {
    match impact {
        Impact::Negative => 1.0,
        Impact::Neutral => 0.5,
        Impact::Positive | Impact::None => 0.0,
    }
}

fn content_value(content: ContentType) -> f64 {
    match content {
        ContentType::Educational => 1.0,
        ContentType::News => 0.8,
        ContentType::Sports => 0.7,
        ContentType::Other => 0.6,
        ContentType::Entertainment => 0.5,
        ContentType::Gaming => 0.3,
    }
}

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Normalized value of each factor for `profile`, in [`WEIGHTS`] order.
pub fn factor_values(profile: &StudentProfile) -> [f64; 12] {
    let attendance = unit(profile.student.attendance_percentage / 100.0);
    let score = unit(weighted_average_score(&profile.grades) / 100.0);

    let study = profile
        .economic
        .as_ref()
        .map(|e| unit(e.daily_study_hours / 10.0))
        .unwrap_or(0.0);

    // No health profile: no motivation credit, stress counted as high,
    // no depression, no balance credit, no family pressure.
    let (motivation, stress, depressed, balance, pressures) = match &profile.health {
        Some(h) => (
            level_value(h.motivation),
            level_value(h.academic_stress),
            h.depression,
            balance_value(h.study_life_balance),
            pressure_value(h.family_pressures),
        ),
        None => (0.0, 1.0, false, 0.0, 1.0),
    };

    // No tech profile: gaming counted as saturated, no social-media impact,
    // no content credit.
    let (gaming, social, content) = match &profile.tech {
        Some(t) => (
            unit(t.daily_gaming_hours / 5.0),
            impact_value(t.social_media_impact_on_studies),
            content_value(t.content_type_watched),
        ),
        None => (1.0, 0.0, 0.0),
    };

    let income = IncomeCategory::from_income(
        profile
            .economic
            .as_ref()
            .and_then(|e| e.family_income_level),
    )
    .value();

    [
        attendance,
        score,
        study,
        motivation,
        1.0 - stress,
        if depressed { 0.0 } else { 1.0 },
        balance,
        pressures,
        1.0 - gaming,
        1.0 - social,
        content,
        income,
    ]
}

pub fn label_for_index(index: f64) -> PerformanceLabel {
    LABEL_THRESHOLDS
        .iter()
        .find(|(_, threshold)| index >= *threshold)
        .map(|(label, _)| *label)
        .unwrap_or(PerformanceLabel::NeedsImprovement)
}

pub fn score_performance(profile: &StudentProfile) -> PerformanceScore {
    let values = factor_values(profile);
    let mut index = 0.0;
    let mut factors = Vec::with_capacity(WEIGHTS.len());
    for ((factor, weight), value) in WEIGHTS.iter().zip(values.iter()) {
        index += weight * value;
        factors.push(FactorValue {
            factor: *factor,
            weight: *weight,
            value: *value,
        });
    }
    let index = unit(index);
    PerformanceScore {
        label: label_for_index(index),
        index,
        factors,
    }
}
