use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    pub fn gpa_points(self) -> f64 {
        match self {
            LetterGrade::A => 4.0,
            LetterGrade::B => 3.0,
            LetterGrade::C => 2.0,
            LetterGrade::D => 1.0,
            LetterGrade::F => 0.0,
        }
    }
}

/// Lower bound (inclusive, percent) for each letter, highest first.
pub const GRADE_THRESHOLDS: [(LetterGrade, f64); 5] = [
    (LetterGrade::A, 90.0),
    (LetterGrade::B, 80.0),
    (LetterGrade::C, 70.0),
    (LetterGrade::D, 60.0),
    (LetterGrade::F, 0.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeMetrics {
    pub percentage: f64,
    pub letter: LetterGrade,
    pub gpa_points: f64,
}

/// Percentages are stored with two decimals.
pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn letter_for_percentage(percentage: f64) -> LetterGrade {
    GRADE_THRESHOLDS
        .iter()
        .find(|(_, threshold)| percentage >= *threshold)
        .map(|(letter, _)| *letter)
        .unwrap_or(LetterGrade::F)
}

pub fn calculate_grade_metrics(score: f64, max_score: f64) -> GradeMetrics {
    let percentage = if max_score > 0.0 {
        round_2_decimals(100.0 * score / max_score)
    } else {
        0.0
    };
    let letter = letter_for_percentage(percentage);
    GradeMetrics {
        percentage,
        letter,
        gpa_points: letter.gpa_points(),
    }
}

/// Gain of a retake over the latest original attempt, if it is a gain at all.
pub fn retake_improvement(retake_score: f64, original_score: Option<f64>) -> Option<f64> {
    let original = original_score?;
    if retake_score > original {
        Some(round_2_decimals(retake_score - original))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub average_percentage: f64,
    pub gpa: f64,
    pub grade_count: usize,
}

/// Averages `(percentage, gpa_points)` pairs for one semester. Empty input
/// yields zeros.
pub fn semester_trend<I>(rows: I) -> TrendSummary
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut count: usize = 0;
    let mut pct_sum = 0.0;
    let mut gpa_sum = 0.0;
    for (pct, gpa) in rows {
        count += 1;
        pct_sum += pct;
        gpa_sum += gpa;
    }
    if count == 0 {
        return TrendSummary {
            average_percentage: 0.0,
            gpa: 0.0,
            grade_count: 0,
        };
    }
    TrendSummary {
        average_percentage: round_2_decimals(pct_sum / count as f64),
        gpa: round_2_decimals(gpa_sum / count as f64),
        grade_count: count,
    }
}
