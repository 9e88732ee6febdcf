use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Row = true label, column = predicted label, both in `labels` order.
    pub confusion_matrix: Vec<Vec<usize>>,
    pub labels: Vec<String>,
    pub samples: usize,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

/// Accuracy plus support-weighted precision, recall and F1. Classes with no
/// predictions (or no support) contribute zero instead of failing.
pub fn compute_evaluation_metrics<T>(y_true: &[T], y_pred: &[T]) -> EvaluationMetrics
where
    T: Ord + Clone + ToString,
{
    let n = y_true.len().min(y_pred.len());
    let labels: Vec<T> = y_true[..n]
        .iter()
        .chain(y_pred[..n].iter())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let k = labels.len();
    let index_of = |v: &T| labels.binary_search(v).unwrap_or_default();

    let mut confusion = vec![vec![0usize; k]; k];
    for (t, p) in y_true[..n].iter().zip(y_pred[..n].iter()) {
        confusion[index_of(t)][index_of(p)] += 1;
    }

    let correct: usize = (0..k).map(|i| confusion[i][i]).sum();
    let accuracy = ratio(correct as f64, n as f64);

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for i in 0..k {
        let tp = confusion[i][i] as f64;
        let support: usize = confusion[i].iter().sum();
        let predicted: usize = (0..k).map(|r| confusion[r][i]).sum();
        let p = ratio(tp, predicted as f64);
        let r = ratio(tp, support as f64);
        let f = ratio(2.0 * p * r, p + r);
        let w = ratio(support as f64, n as f64);
        precision += w * p;
        recall += w * r;
        f1 += w * f;
    }

    EvaluationMetrics {
        accuracy,
        precision,
        recall,
        f1,
        confusion_matrix: confusion,
        labels: labels.iter().map(|l| l.to_string()).collect(),
        samples: n,
    }
}
