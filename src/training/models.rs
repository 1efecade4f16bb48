//! Classifier trait and evaluation metrics

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision threshold applied to positive-class probabilities
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Class names used in reports, indexed by label
pub const CLASS_NAMES: [&str; 2] = ["Not Readmitted", "Readmitted"];

/// Trait for binary classifiers
pub trait Classifier: Send + Sync {
    /// Fit the model to training data with labels in {0, 1}
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class for each row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard labels at `DECISION_THRESHOLD`
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self
            .predict_proba(x)?
            .mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 }))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// 2x2 confusion matrix for labels {0, 1}
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// Rows are true labels, columns predicted labels
    pub fn as_array(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "              pred 0   pred 1")?;
        writeln!(f, "  true 0  {:>9} {:>8}", self.tn, self.fp)?;
        write!(f, "  true 1  {:>9} {:>8}", self.fn_, self.tp)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Area under the ROC curve from the rank-sum statistic, with tied scores
/// sharing their average rank. `None` when only one class is present.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
    let n = y_true.len();
    if n != scores.len() {
        return None;
    }
    let n_pos = y_true.iter().filter(|&&y| y > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; the tie group i..=j shares the mean rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos as f64 * n_neg as f64))
}

/// Metrics for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    /// Precision of the positive class
    pub precision: f64,
    /// Recall of the positive class
    pub recall: f64,
    pub f1_score: f64,
    /// AUC-ROC, absent when only one class is present
    pub auc_roc: Option<f64>,
    pub confusion_matrix: ConfusionMatrix,
    /// Training time in seconds
    pub training_time_secs: f64,
    /// Number of features
    pub n_features: usize,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute classification metrics from labels and positive-class probabilities
    pub fn compute_classification(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        y_prob: Option<&Array1<f64>>,
    ) -> Self {
        let cm = ConfusionMatrix::from_predictions(y_true, y_pred);
        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);

        Self {
            accuracy: ratio(cm.tp + cm.tn, cm.total()),
            precision,
            recall,
            f1_score: f1(precision, recall),
            auc_roc: y_prob.and_then(|p| roc_auc(y_true, p)),
            confusion_matrix: cm,
            training_time_secs: 0.0,
            n_features: 0,
            n_samples: y_true.len(),
        }
    }

    /// Labels at `DECISION_THRESHOLD` from probabilities, then metrics
    pub fn from_probabilities(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Self {
        let y_pred = y_prob.mapv(|p| if p >= DECISION_THRESHOLD { 1.0 } else { 0.0 });
        Self::compute_classification(y_true, &y_pred, Some(y_prob))
    }
}

/// Per-class precision/recall/F1/support
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassScores {
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class table with macro and weighted averages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

impl ClassificationReport {
    pub fn from_confusion(cm: &ConfusionMatrix) -> Self {
        let neg_precision = ratio(cm.tn, cm.tn + cm.fn_);
        let neg_recall = ratio(cm.tn, cm.tn + cm.fp);
        let pos_precision = ratio(cm.tp, cm.tp + cm.fp);
        let pos_recall = ratio(cm.tp, cm.tp + cm.fn_);

        let classes = vec![
            ClassScores {
                name: CLASS_NAMES[0].to_string(),
                precision: neg_precision,
                recall: neg_recall,
                f1_score: f1(neg_precision, neg_recall),
                support: cm.tn + cm.fp,
            },
            ClassScores {
                name: CLASS_NAMES[1].to_string(),
                precision: pos_precision,
                recall: pos_recall,
                f1_score: f1(pos_precision, pos_recall),
                support: cm.tp + cm.fn_,
            },
        ];

        let total = cm.total();
        let macro_avg = averaged(&classes, "macro avg", total, |_| 1.0);
        let weighted_avg = averaged(&classes, "weighted avg", total, |c| c.support as f64);

        Self {
            accuracy: ratio(cm.tp + cm.tn, total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

fn averaged(
    classes: &[ClassScores],
    name: &str,
    support: usize,
    weight: impl Fn(&ClassScores) -> f64,
) -> ClassScores {
    let w_sum: f64 = classes.iter().map(&weight).sum();
    let avg = |field: fn(&ClassScores) -> f64| {
        if w_sum > 0.0 {
            classes.iter().map(|c| weight(c) * field(c)).sum::<f64>() / w_sum
        } else {
            0.0
        }
    };
    ClassScores {
        name: name.to_string(),
        precision: avg(|c| c.precision),
        recall: avg(|c| c.recall),
        f1_score: avg(|c| c.f1_score),
        support,
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn row(f: &mut fmt::Formatter<'_>, c: &ClassScores) -> fmt::Result {
            writeln!(
                f,
                "{:>16} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                c.name, c.precision, c.recall, c.f1_score, c.support
            )
        }

        writeln!(
            f,
            "{:>16} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            row(f, c)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>16} {:>9} {:>9} {:>9.4} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, &self.macro_avg)?;
        row(f, &self.weighted_avg)
    }
}
