//! Hard overrides that force a FAIL regardless of score.

use crate::models::CompositeScore;

pub const ABSENCE_OVERRIDE_REASON: &str = "exceeds unexcused-absence limit; refer to counseling";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub reason: String,
}

/// An absent count never triggers the rule.
pub fn absence_override(unexcused_absences: Option<u32>, limit: u32) -> Option<Override> {
    match unexcused_absences {
        Some(count) if count > limit => Some(Override {
            reason: ABSENCE_OVERRIDE_REASON.to_string(),
        }),
        _ => None,
    }
}

/// Runs every override rule in precedence order. No current rule reads the score.
pub fn evaluate(
    _score: &CompositeScore,
    unexcused_absences: Option<u32>,
    absence_limit: u32,
) -> Option<Override> {
    absence_override(unexcused_absences, absence_limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_only_above_limit() {
        assert!(absence_override(Some(6), 5).is_some());
        assert!(absence_override(Some(5), 5).is_none());
        assert!(absence_override(Some(0), 5).is_none());
        assert!(absence_override(None, 0).is_none());
    }

    #[test]
    fn limit_is_configurable() {
        assert!(absence_override(Some(6), 7).is_none());
        assert!(absence_override(Some(8), 7).is_some());
    }

    #[test]
    fn reason_is_populated() {
        let score = CompositeScore {
            subject_average: 95.0,
            bonus: 0.0,
            final_score: 95.0,
        };
        let applied = evaluate(&score, Some(8), 5).unwrap();
        assert_eq!(applied.reason, ABSENCE_OVERRIDE_REASON);
    }
}
