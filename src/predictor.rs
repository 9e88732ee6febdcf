//! Batch performance prediction against an externally trained classifier.

use crate::domain::{PerformanceLabel, StudentProfile};
use crate::features::{feature_matrix, FEATURE_COUNT, FEATURE_NAMES};
use ndarray::{Array1, Array2, Axis};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const LINEAR_FORMAT: &str = "schoolhub-linear-v1";
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model artifact could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("model artifact is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported model format: {0}")]
    Format(String),

    #[error("model shape mismatch: {0}")]
    Shape(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Anything that maps a feature matrix (one row per student) to class codes.
pub trait Classifier: Send + Sync {
    fn predict_batch(&self, features: &Array2<f64>) -> Result<Vec<i64>, ModelError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinearArtifact {
    format: String,
    feature_count: usize,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(default)]
    means: Option<Vec<f64>>,
    #[serde(default)]
    scales: Option<Vec<f64>>,
    coefficients: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

/// Multiclass linear model: standardize, score each class, take the argmax.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    means: Array1<f64>,
    scales: Array1<f64>,
    coefficients: Array2<f64>,
    intercepts: Array1<f64>,
}

impl LinearClassifier {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let a: LinearArtifact = serde_json::from_slice(bytes)?;
        if a.format != LINEAR_FORMAT {
            return Err(ModelError::Format(a.format));
        }
        if a.feature_count != FEATURE_COUNT {
            return Err(ModelError::Shape(format!(
                "expected {} features, artifact declares {}",
                FEATURE_COUNT, a.feature_count
            )));
        }
        if let Some(names) = &a.feature_names {
            let matches = names.len() == FEATURE_COUNT
                && names.iter().zip(FEATURE_NAMES.iter()).all(|(a, b)| a == b);
            if !matches {
                return Err(ModelError::Shape(
                    "feature names differ from the extractor order".to_string(),
                ));
            }
        }
        let classes = a.intercepts.len();
        if classes != PerformanceLabel::ALL.len() {
            return Err(ModelError::Shape(format!(
                "expected {} classes, artifact has {}",
                PerformanceLabel::ALL.len(),
                classes
            )));
        }
        if a.coefficients.len() != classes {
            return Err(ModelError::Shape(format!(
                "{} coefficient rows for {} intercepts",
                a.coefficients.len(),
                classes
            )));
        }
        let mut flat = Vec::with_capacity(classes * FEATURE_COUNT);
        for (i, row) in a.coefficients.iter().enumerate() {
            if row.len() != FEATURE_COUNT {
                return Err(ModelError::Shape(format!(
                    "coefficient row {} has {} entries",
                    i,
                    row.len()
                )));
            }
            flat.extend_from_slice(row);
        }
        let coefficients = Array2::from_shape_vec((classes, FEATURE_COUNT), flat)
            .map_err(|e| ModelError::Shape(e.to_string()))?;

        let means = vector_or(a.means, 0.0, "means")?;
        let scales = vector_or(a.scales, 1.0, "scales")?.mapv(|s| if s == 0.0 { 1.0 } else { s });

        Ok(Self {
            means,
            scales,
            coefficients,
            intercepts: Array1::from_vec(a.intercepts),
        })
    }

    pub fn class_count(&self) -> usize {
        self.intercepts.len()
    }
}

fn vector_or(v: Option<Vec<f64>>, fill: f64, what: &str) -> Result<Array1<f64>, ModelError> {
    match v {
        None => Ok(Array1::from_elem(FEATURE_COUNT, fill)),
        Some(v) if v.len() == FEATURE_COUNT => Ok(Array1::from_vec(v)),
        Some(v) => Err(ModelError::Shape(format!(
            "{} has {} entries, expected {}",
            what,
            v.len(),
            FEATURE_COUNT
        ))),
    }
}

impl Classifier for LinearClassifier {
    fn predict_batch(&self, features: &Array2<f64>) -> Result<Vec<i64>, ModelError> {
        if features.ncols() != FEATURE_COUNT {
            return Err(ModelError::Shape(format!(
                "feature matrix has {} columns",
                features.ncols()
            )));
        }
        let standardized = (features - &self.means) / &self.scales;
        let scores = standardized.dot(&self.coefficients.t()) + &self.intercepts;
        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| {
                let mut best: Option<(usize, f64)> = None;
                for (i, s) in row.iter().enumerate() {
                    if !s.is_finite() {
                        continue;
                    }
                    if best.map(|(_, b)| *s > b).unwrap_or(true) {
                        best = Some((i, *s));
                    }
                }
                best.map(|(i, _)| i as i64).unwrap_or(-1)
            })
            .collect())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub path: String,
    pub format: String,
    pub sha256: String,
    pub classes: usize,
}

struct LoadedModel {
    classifier: Arc<dyn Classifier>,
    info: ModelInfo,
}

pub fn load_linear_model(path: &Path) -> Result<(LinearClassifier, ModelInfo), ModelError> {
    let bytes = std::fs::read(path)?;
    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    let model = LinearClassifier::from_json_bytes(&bytes)?;
    let info = ModelInfo {
        path: path.to_string_lossy().to_string(),
        format: LINEAR_FORMAT.to_string(),
        sha256,
        classes: model.class_count(),
    };
    Ok((model, info))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictedLabel {
    Label(PerformanceLabel),
    Error,
}

impl PredictedLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictedLabel::Label(l) => l.as_str(),
            PredictedLabel::Error => "Error",
        }
    }

    pub fn label(self) -> Option<PerformanceLabel> {
        match self {
            PredictedLabel::Label(l) => Some(l),
            PredictedLabel::Error => None,
        }
    }
}

impl Serialize for PredictedLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Maps class codes row by row; missing or out-of-range codes become `Error`.
pub fn map_class_codes(codes: &[i64], rows: usize) -> Vec<PredictedLabel> {
    (0..rows)
        .map(|i| {
            codes
                .get(i)
                .and_then(|c| PerformanceLabel::from_code(*c))
                .map(PredictedLabel::Label)
                .unwrap_or(PredictedLabel::Error)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPrediction {
    pub student_id: String,
    pub full_name: String,
    pub predicted_performance: PredictedLabel,
}

#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Unavailable { message: String },
    Ready(Vec<StudentPrediction>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelInfo>,
}

/// Owns the classifier. The artifact is read at most once, on first use; a
/// failed load is remembered and reported on every later call.
pub struct Predictor {
    path: PathBuf,
    model: OnceCell<Result<LoadedModel, String>>,
}

impl Predictor {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            model: OnceCell::new(),
        }
    }

    pub fn with_classifier(classifier: Arc<dyn Classifier>, info: ModelInfo) -> Self {
        Self {
            path: PathBuf::from(&info.path),
            model: OnceCell::with_value(Ok(LoadedModel { classifier, info })),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn loaded(&self) -> Result<&LoadedModel, &str> {
        self.model
            .get_or_init(|| match load_linear_model(&self.path) {
                Ok((model, info)) => {
                    tracing::info!(path = %info.path, sha256 = %info.sha256, "prediction model loaded");
                    Ok(LoadedModel {
                        classifier: Arc::new(model),
                        info,
                    })
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "prediction model unavailable");
                    Err(e.to_string())
                }
            })
            .as_ref()
            .map_err(|e| e.as_str())
    }

    pub fn status(&self) -> PredictorStatus {
        match self.loaded() {
            Ok(m) => PredictorStatus {
                available: true,
                message: None,
                model: Some(m.info.clone()),
            },
            Err(message) => PredictorStatus {
                available: false,
                message: Some(unavailable_message(message)),
                model: None,
            },
        }
    }

    pub fn predict_batch(&self, profiles: &[StudentProfile]) -> BatchOutcome {
        let model = match self.loaded() {
            Ok(m) => m,
            Err(message) => {
                return BatchOutcome::Unavailable {
                    message: unavailable_message(message),
                }
            }
        };
        if profiles.is_empty() {
            return BatchOutcome::Ready(Vec::new());
        }

        let features = feature_matrix(profiles);
        let codes = match model.classifier.predict_batch(&features) {
            Ok(codes) => codes,
            Err(e) => {
                tracing::warn!(rows = profiles.len(), error = %e, "batch prediction failed");
                Vec::new()
            }
        };
        let labels = map_class_codes(&codes, profiles.len());

        BatchOutcome::Ready(
            profiles
                .iter()
                .zip(labels)
                .map(|(p, label)| StudentPrediction {
                    student_id: p.student.id.clone(),
                    full_name: p.student.full_name.clone(),
                    predicted_performance: label,
                })
                .collect(),
        )
    }
}

fn unavailable_message(detail: &str) -> String {
    format!("The prediction model could not be loaded. ({})", detail)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub number: usize,
    pub num_pages: usize,
    pub page_size: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    pub fn offset(&self) -> usize {
        (self.number - 1) * self.page_size
    }
}

/// Tolerant page lookup: missing or invalid page numbers fall back to the
/// first page, numbers past the end to the last one. An empty collection
/// still has one (empty) page.
pub fn paginate(total: usize, requested: Option<i64>, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let num_pages = total.div_ceil(page_size).max(1);
    let number = match requested {
        Some(n) if n >= 1 => (n as usize).min(num_pages),
        _ => 1,
    };
    Page {
        number,
        num_pages,
        page_size,
        total,
        has_next: number < num_pages,
        has_previous: number > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Student;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        codes: Vec<i64>,
        calls: AtomicUsize,
    }

    impl Classifier for Fixed {
        fn predict_batch(&self, _features: &Array2<f64>) -> Result<Vec<i64>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.codes.clone())
        }
    }

    struct Failing;

    impl Classifier for Failing {
        fn predict_batch(&self, _features: &Array2<f64>) -> Result<Vec<i64>, ModelError> {
            Err(ModelError::Inference("boom".to_string()))
        }
    }

    fn info() -> ModelInfo {
        ModelInfo {
            path: "memory".to_string(),
            format: "test".to_string(),
            sha256: String::new(),
            classes: 5,
        }
    }

    fn profiles(n: usize) -> Vec<StudentProfile> {
        (0..n)
            .map(|i| StudentProfile::bare(Student::new(format!("s{i}"), format!("Student {i}"))))
            .collect()
    }

    fn labels(outcome: BatchOutcome) -> Vec<&'static str> {
        match outcome {
            BatchOutcome::Ready(rows) => rows
                .iter()
                .map(|r| r.predicted_performance.as_str())
                .collect(),
            BatchOutcome::Unavailable { message } => panic!("unavailable: {message}"),
        }
    }

    #[test]
    fn empty_batch_skips_the_model() {
        let model = Arc::new(Fixed {
            codes: vec![],
            calls: AtomicUsize::new(0),
        });
        let p = Predictor::with_classifier(model.clone(), info());
        assert!(labels(p.predict_batch(&[])).is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn codes_map_through_canonical_list_in_one_call() {
        let model = Arc::new(Fixed {
            codes: vec![1, 4, 7, -2],
            calls: AtomicUsize::new(0),
        });
        let p = Predictor::with_classifier(model.clone(), info());
        assert_eq!(
            labels(p.predict_batch(&profiles(5))),
            vec!["Excellent", "Very Good", "Error", "Error", "Error"]
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inference_failure_marks_every_row() {
        let p = Predictor::with_classifier(Arc::new(Failing), info());
        assert_eq!(labels(p.predict_batch(&profiles(3))), vec!["Error"; 3]);
    }

    #[test]
    fn missing_artifact_is_reported_not_raised() {
        let p = Predictor::from_path("/definitely/not/here/model.json");
        match p.predict_batch(&profiles(2)) {
            BatchOutcome::Unavailable { message } => {
                assert!(message.contains("could not be loaded"))
            }
            BatchOutcome::Ready(_) => panic!("expected unavailable"),
        }
        let status = p.status();
        assert!(!status.available);
        assert!(status.model.is_none());
    }

    fn artifact(bias_class: usize) -> serde_json::Value {
        let zeros = vec![0.0; FEATURE_COUNT];
        let mut attendance = vec![0.0; FEATURE_COUNT];
        attendance[0] = 1.0;
        let mut coefficients = vec![zeros.clone(); 5];
        coefficients[1] = attendance;
        let mut intercepts = vec![0.0; 5];
        intercepts[bias_class] = 50.0;
        json!({
            "format": LINEAR_FORMAT,
            "featureCount": FEATURE_COUNT,
            "featureNames": FEATURE_NAMES,
            "coefficients": coefficients,
            "intercepts": intercepts,
        })
    }

    #[test]
    fn linear_classifier_takes_the_argmax() {
        let bytes = serde_json::to_vec(&artifact(3)).expect("artifact json");
        let model = LinearClassifier::from_json_bytes(&bytes).expect("load");
        let mut m = Array2::<f64>::zeros((2, FEATURE_COUNT));
        m[[0, 0]] = 95.0;
        m[[1, 0]] = 20.0;
        assert_eq!(model.predict_batch(&m).expect("predict"), vec![1, 3]);

        let narrow = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            model.predict_batch(&narrow),
            Err(ModelError::Shape(_))
        ));
    }

    #[test]
    fn linear_classifier_rejects_bad_artifacts() {
        let mut a = artifact(0);
        a["format"] = json!("pickle");
        let bytes = serde_json::to_vec(&a).expect("json");
        assert!(matches!(
            LinearClassifier::from_json_bytes(&bytes),
            Err(ModelError::Format(_))
        ));

        let mut a = artifact(0);
        a["intercepts"] = json!([0.0, 0.0]);
        let bytes = serde_json::to_vec(&a).expect("json");
        assert!(matches!(
            LinearClassifier::from_json_bytes(&bytes),
            Err(ModelError::Shape(_))
        ));

        let mut a = artifact(0);
        a["intercepts"] = json!(vec![0.0; 6]);
        a["coefficients"] = json!(vec![vec![0.0; FEATURE_COUNT]; 6]);
        let bytes = serde_json::to_vec(&a).expect("json");
        assert!(matches!(
            LinearClassifier::from_json_bytes(&bytes),
            Err(ModelError::Shape(_))
        ));

        assert!(matches!(
            LinearClassifier::from_json_bytes(b"not json"),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn pagination_is_tolerant() {
        let p = paginate(45, Some(2), 20);
        assert_eq!((p.number, p.num_pages, p.offset()), (2, 3, 20));
        assert!(p.has_next && p.has_previous);

        assert_eq!(paginate(45, Some(99), 20).number, 3);
        assert_eq!(paginate(45, Some(0), 20).number, 1);
        assert_eq!(paginate(45, None, 20).number, 1);

        let empty = paginate(0, Some(4), 20);
        assert_eq!((empty.number, empty.num_pages), (1, 1));
        assert!(!empty.has_next);
    }
}
