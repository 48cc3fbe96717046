use crate::models::{CompositeScore, Decision, Label};
use crate::rules::{self, Override};

pub fn threshold_label(final_score: f64, threshold: u32) -> Label {
    if final_score >= f64::from(threshold) {
        Label::Pass
    } else {
        Label::Fail
    }
}

/// An override always wins; otherwise the label is the plain threshold comparison.
pub fn decide(final_score: f64, threshold: u32, applied: Option<Override>) -> Decision {
    match applied {
        Some(applied) => Decision {
            label: Label::Fail,
            override_reason: Some(applied.reason),
        },
        None => Decision {
            label: threshold_label(final_score, threshold),
            override_reason: None,
        },
    }
}

/// Override rules first, then the threshold comparison.
pub fn decide_student(
    score: &CompositeScore,
    unexcused_absences: Option<u32>,
    threshold: u32,
    absence_limit: u32,
) -> Decision {
    let applied = rules::evaluate(score, unexcused_absences, absence_limit);
    decide(score.final_score, threshold, applied)
}
