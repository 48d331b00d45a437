use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::detector::ImageResult;

/// Label whose high-confidence detections trigger the mine warning.
pub const ALERT_LABEL: &str = "milco";
/// Alert fires strictly above this display confidence (percent).
pub const ALERT_CONFIDENCE: f32 = 60.0;

/// One display row on the result page.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Percent in [0, 100], rounded to 2 decimals.
    pub confidence: f32,
}

/// User-facing notices, rendered in order. An ordered list instead of a single
/// string so an artifact problem can never silently erase a detection alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    MineAlert,
    NoDetections,
    PredictionFailed,
    AnnotatedMissing,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Notice::MineAlert => "⚠️ Mine ahead!",
            Notice::NoDetections => "No objects detected.",
            Notice::PredictionFailed => "Prediction failed.",
            Notice::AnnotatedMissing => {
                "Prediction completed, but annotated image not found. Showing original."
            }
        };
        f.write_str(text)
    }
}

/// Aggregated view of one prediction run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub predictions: Vec<Prediction>,
    pub class_counts: BTreeMap<String, usize>,
    pub notices: Vec<Notice>,
}

impl Summary {
    pub fn has_detections(&self) -> bool {
        !self.predictions.is_empty()
    }
}

/// Maps the raw model output to display data. Pure and deterministic: one
/// prediction per box, in input order; counts sum to the box count.
pub fn summarize(results: &[ImageResult], names: &HashMap<usize, String>) -> Summary {
    let mut summary = Summary::default();

    let Some(first) = results.first() else {
        summary.notices.push(Notice::PredictionFailed);
        return summary;
    };
    if first.boxes.is_empty() {
        summary.notices.push(Notice::NoDetections);
        return summary;
    }

    let mut alerted = false;
    for detection in &first.boxes {
        let label = names
            .get(&detection.class_id)
            .cloned()
            .unwrap_or_else(|| format!("Class {}", detection.class_id));
        let confidence = round2(detection.confidence * 100.0);

        if !alerted && label.eq_ignore_ascii_case(ALERT_LABEL) && confidence > ALERT_CONFIDENCE {
            summary.notices.push(Notice::MineAlert);
            alerted = true;
        }

        *summary.class_counts.entry(label.clone()).or_insert(0) += 1;
        summary.predictions.push(Prediction { label, confidence });
    }

    summary
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{BoundingBox, RawDetection};

    fn boxes(entries: &[(usize, f32)]) -> ImageResult {
        ImageResult {
            boxes: entries
                .iter()
                .map(|&(class_id, confidence)| RawDetection {
                    class_id,
                    confidence,
                    bbox: BoundingBox {
                        x1: 0.0,
                        y1: 0.0,
                        x2: 1.0,
                        y2: 1.0,
                    },
                })
                .collect(),
        }
    }

    fn names() -> HashMap<usize, String> {
        HashMap::from([(0, "milco".to_string()), (1, "nombo".to_string())])
    }

    #[test]
    fn one_prediction_per_box_and_counts_sum() {
        let result = boxes(&[(0, 0.9), (1, 0.5), (0, 0.3), (1, 0.8)]);
        let summary = summarize(&[result], &names());
        assert_eq!(summary.predictions.len(), 4);
        assert_eq!(summary.class_counts.values().sum::<usize>(), 4);
        assert_eq!(summary.class_counts["milco"], 2);
        assert_eq!(summary.class_counts["nombo"], 2);
    }

    #[test]
    fn preserves_input_order() {
        let result = boxes(&[(1, 0.5), (0, 0.9)]);
        let summary = summarize(&[result], &names());
        assert_eq!(summary.predictions[0].label, "nombo");
        assert_eq!(summary.predictions[1].label, "milco");
    }

    #[test]
    fn confidence_scaled_and_rounded() {
        let result = boxes(&[(0, 0.87654)]);
        let summary = summarize(&[result], &names());
        assert_eq!(summary.predictions[0].confidence, 87.65);
    }

    #[test]
    fn milco_above_threshold_alerts() {
        let summary = summarize(&[boxes(&[(0, 0.75)])], &names());
        assert_eq!(summary.notices, vec![Notice::MineAlert]);
    }

    #[test]
    fn milco_below_threshold_does_not_alert() {
        let summary = summarize(&[boxes(&[(0, 0.50)])], &names());
        assert!(summary.notices.is_empty());
    }

    #[test]
    fn alert_label_is_case_insensitive() {
        let names = HashMap::from([(0, "MILCO".to_string())]);
        let summary = summarize(&[boxes(&[(0, 0.75)])], &names);
        assert_eq!(summary.notices, vec![Notice::MineAlert]);
    }

    #[test]
    fn alert_fires_at_most_once() {
        let summary = summarize(&[boxes(&[(0, 0.75), (0, 0.9)])], &names());
        assert_eq!(summary.notices, vec![Notice::MineAlert]);
    }

    #[test]
    fn other_labels_never_alert() {
        let summary = summarize(&[boxes(&[(1, 0.99)])], &names());
        assert!(summary.notices.is_empty());
    }

    #[test]
    fn unmapped_class_gets_numeric_label() {
        let summary = summarize(&[boxes(&[(7, 0.4)])], &names());
        assert_eq!(summary.predictions[0].label, "Class 7");
        assert_eq!(summary.class_counts["Class 7"], 1);
    }

    #[test]
    fn empty_box_list_is_no_detections() {
        let summary = summarize(&[boxes(&[])], &names());
        assert_eq!(summary.notices, vec![Notice::NoDetections]);
        assert!(summary.predictions.is_empty());
        assert!(summary.class_counts.is_empty());
    }

    #[test]
    fn empty_result_sequence_is_prediction_failed() {
        let summary = summarize(&[], &names());
        assert_eq!(summary.notices, vec![Notice::PredictionFailed]);
        assert!(summary.predictions.is_empty());
    }
}
