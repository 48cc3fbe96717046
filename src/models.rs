use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtracurricularGrade {
    #[default]
    None,
    Good,
    VeryGood,
}

impl ExtracurricularGrade {
    /// Accepts the source tiers ("B", "SB") and their spelled-out forms.
    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_uppercase().replace('_', " ");
        match normalized.as_str() {
            "B" | "BAIK" | "GOOD" => Self::Good,
            "SB" | "SANGAT BAIK" | "VERY GOOD" => Self::VeryGood,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Good => "GOOD",
            Self::VeryGood => "VERY_GOOD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub class_name: Option<String>,
    /// Only subjects with a usable value are present.
    pub subject_scores: BTreeMap<String, f64>,
    pub extracurricular_grade: ExtracurricularGrade,
    pub unexcused_absences: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeScore {
    pub subject_average: f64,
    pub bonus: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Pass,
    Fail,
}

impl Label {
    pub fn is_pass(&self) -> bool {
        matches!(self, Label::Pass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub label: Label,
    pub override_reason: Option<String>,
}

/// One row of the roster-level output partitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecidedStudent {
    pub id: String,
    pub name: String,
    pub final_score: f64,
    pub bonus: f64,
    pub override_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordWarning {
    pub id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub train_size: usize,
    pub test_size: usize,
}

impl EvaluationReport {
    pub fn named_metrics(&self) -> [(&'static str, f64); 4] {
        [
            ("Accuracy", self.accuracy),
            ("Precision", self.precision),
            ("Recall", self.recall),
            ("F1-Score", self.f1),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InapplicableReason {
    SingleClass,
    MinorityClassTooSmall,
}

impl std::fmt::Display for InapplicableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleClass => write!(f, "labels contain a single class"),
            Self::MinorityClassTooSmall => write!(f, "a class has fewer than 2 members"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Evaluated(EvaluationReport),
    NotApplicable { reason: InapplicableReason },
}

impl EvaluationOutcome {
    pub fn report(&self) -> Option<&EvaluationReport> {
        match self {
            Self::Evaluated(report) => Some(report),
            Self::NotApplicable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterOutcome {
    pub threshold: u32,
    pub passed: Vec<DecidedStudent>,
    pub failed: Vec<DecidedStudent>,
    pub warnings: Vec<RecordWarning>,
    pub evaluation: EvaluationOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RosterSummary {
    pub passed: usize,
    pub failed: usize,
    pub excluded: usize,
}

impl RosterOutcome {
    pub fn summary(&self) -> RosterSummary {
        RosterSummary {
            passed: self.passed.len(),
            failed: self.failed.len(),
            excluded: self.warnings.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentOutcome {
    pub id: String,
    pub name: String,
    pub threshold: u32,
    pub unexcused_absences: Option<u32>,
    pub score: CompositeScore,
    pub decision: Decision,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_tiers() {
        assert_eq!(ExtracurricularGrade::parse("b"), ExtracurricularGrade::Good);
        assert_eq!(ExtracurricularGrade::parse(" SB "), ExtracurricularGrade::VeryGood);
        assert_eq!(
            ExtracurricularGrade::parse("very_good"),
            ExtracurricularGrade::VeryGood
        );
        assert_eq!(ExtracurricularGrade::parse("C"), ExtracurricularGrade::None);
        assert_eq!(ExtracurricularGrade::parse(""), ExtracurricularGrade::None);
    }

    #[test]
    fn summary_counts_partitions_and_warnings() {
        let student = DecidedStudent {
            id: "1".to_string(),
            name: "Avery".to_string(),
            final_score: 80.0,
            bonus: 0.0,
            override_reason: None,
        };
        let outcome = RosterOutcome {
            threshold: 75,
            passed: vec![student.clone(), student.clone()],
            failed: vec![student],
            warnings: vec![RecordWarning {
                id: "9".to_string(),
                name: "Jules".to_string(),
                reason: "no scores".to_string(),
            }],
            evaluation: EvaluationOutcome::NotApplicable {
                reason: InapplicableReason::SingleClass,
            },
        };
        let summary = outcome.summary();
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.excluded, 1);
        assert!(outcome.evaluation.report().is_none());
    }
}
