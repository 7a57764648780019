use serde::Serialize;

use crate::data::model::LabelClass;

/// Scores strictly above this are Abnormal; exactly 0.5 is Normal.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Classification result for one signal, derived fresh per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    /// 1 = Abnormal, 0 = Normal.
    #[serde(rename = "prediction")]
    pub predicted_class: u8,
    /// Probability of the predicted class, `max(score, 1 - score)`.
    pub confidence: f64,
    /// Classifier output, interpreted as P(abnormal).
    pub raw_score: f64,
    pub class_name: &'static str,
}

impl Verdict {
    pub fn from_score(raw_score: f64) -> Self {
        let class = if raw_score > DECISION_THRESHOLD {
            LabelClass::Abnormal
        } else {
            LabelClass::Normal
        };
        let (predicted_class, confidence) = match class {
            LabelClass::Abnormal => (1, raw_score),
            LabelClass::Normal => (0, 1.0 - raw_score),
        };
        Verdict {
            predicted_class,
            confidence,
            raw_score,
            class_name: class.name(),
        }
    }

    pub fn class(&self) -> LabelClass {
        if self.predicted_class == 1 {
            LabelClass::Abnormal
        } else {
            LabelClass::Normal
        }
    }

    /// Whether the verdict agrees with a ground-truth label.
    pub fn matches_label(&self, label: f64) -> bool {
        self.class() == LabelClass::from_label(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abnormal_score() {
        let v = Verdict::from_score(0.73);
        assert_eq!(v.predicted_class, 1);
        assert_eq!(v.class_name, "Abnormal");
        assert_eq!(v.confidence, 0.73);
        assert_eq!(v.raw_score, 0.73);
    }

    #[test]
    fn normal_score() {
        let v = Verdict::from_score(0.2);
        assert_eq!(v.predicted_class, 0);
        assert_eq!(v.class_name, "Normal");
        assert!((v.confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn half_is_normal() {
        let v = Verdict::from_score(0.5);
        assert_eq!(v.predicted_class, 0);
        assert_eq!(v.class_name, "Normal");
        assert_eq!(v.confidence, 0.5);
    }

    #[test]
    fn identical_scores_identical_verdicts() {
        for score in [0.0, 0.1, 0.4999, 0.5, 0.5001, 0.99, 1.0] {
            assert_eq!(Verdict::from_score(score), Verdict::from_score(score));
            let c = Verdict::from_score(score).confidence;
            assert!((0.5..=1.0).contains(&c));
        }
    }

    #[test]
    fn serializes_with_wire_names() {
        let json = serde_json::to_value(Verdict::from_score(0.73)).unwrap();
        assert_eq!(json["prediction"], 1);
        assert_eq!(json["class_name"], "Abnormal");
        assert_eq!(json["raw_score"], 0.73);
    }

    #[test]
    fn agreement_with_label() {
        assert!(Verdict::from_score(0.9).matches_label(2.0));
        assert!(Verdict::from_score(0.1).matches_label(0.0));
        assert!(!Verdict::from_score(0.9).matches_label(0.0));
    }
}
