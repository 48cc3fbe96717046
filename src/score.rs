use crate::config::BonusTable;
use crate::error::InsufficientDataError;
use crate::models::{CompositeScore, StudentRecord};
use crate::schema::normalize_header;

/// Lenient numeric coercion for a subject cell. Anything unusable is `None`.
pub fn parse_score(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: f64 = trimmed.replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Mean of the finite scores among `subjects`. Stored scores for subjects
/// outside that set are ignored.
pub fn subject_average(record: &StudentRecord, subjects: &[String]) -> Option<f64> {
    let usable: Vec<f64> = subjects
        .iter()
        .filter_map(|subject| record.subject_scores.get(&normalize_header(subject)))
        .copied()
        .filter(|value| value.is_finite())
        .collect();

    if usable.is_empty() {
        None
    } else {
        Some(usable.iter().sum::<f64>() / usable.len() as f64)
    }
}

pub fn compose(
    record: &StudentRecord,
    bonus: &BonusTable,
    subjects: &[String],
) -> Result<CompositeScore, InsufficientDataError> {
    let subject_average =
        subject_average(record, subjects).ok_or_else(|| InsufficientDataError {
            id: record.id.clone(),
        })?;
    let bonus = bonus.bonus_for(record.extracurricular_grade);

    Ok(CompositeScore {
        subject_average,
        bonus,
        final_score: subject_average + bonus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::ExtracurricularGrade;

    fn subjects() -> Vec<String> {
        EngineConfig::default().subjects
    }

    fn record(scores: &[(&str, f64)], grade: ExtracurricularGrade) -> StudentRecord {
        StudentRecord {
            id: "101".to_string(),
            name: "Avery Lee".to_string(),
            class_name: None,
            subject_scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            extracurricular_grade: grade,
            unexcused_absences: None,
        }
    }

    #[test]
    fn averages_present_subjects_only() {
        let student = record(
            &[("MTK", 80.0), ("BINDO", 70.0), ("BINGGRIS", 75.0), ("IPA", 85.0), ("IPS", 90.0)],
            ExtracurricularGrade::None,
        );
        let score = compose(&student, &BonusTable::default(), &subjects()).unwrap();
        assert!((score.subject_average - 80.0).abs() < 1e-9);
        assert_eq!(score.bonus, 0.0);
        assert!((score.final_score - 80.0).abs() < 1e-9);

        let partial = record(&[("MTK", 60.0), ("IPA", 90.0)], ExtracurricularGrade::None);
        assert_eq!(subject_average(&partial, &subjects()), Some(75.0));
    }

    #[test]
    fn unconfigured_subjects_are_ignored() {
        let student = record(&[("MTK", 80.0), ("SENI", 20.0)], ExtracurricularGrade::None);
        assert_eq!(subject_average(&student, &subjects()), Some(80.0));

        let only_art = record(&[("SENI", 20.0)], ExtracurricularGrade::None);
        assert!(compose(&only_art, &BonusTable::default(), &subjects()).is_err());
    }

    #[test]
    fn bonus_tier_is_added_to_average() {
        let student = record(&[("MTK", 80.0)], ExtracurricularGrade::VeryGood);
        let score = compose(&student, &BonusTable::default(), &subjects()).unwrap();
        assert_eq!(score.bonus, 70.0);
        assert_eq!(score.final_score, score.subject_average + score.bonus);

        let good = record(&[("MTK", 80.0)], ExtracurricularGrade::Good);
        let score = compose(&good, &BonusTable::default(), &subjects()).unwrap();
        assert_eq!(score.final_score, 145.0);
    }

    #[test]
    fn empty_record_is_insufficient() {
        let student = record(&[], ExtracurricularGrade::Good);
        let err = compose(&student, &BonusTable::default(), &subjects()).unwrap_err();
        assert_eq!(err.id, "101");

        let nan_only = record(&[("MTK", f64::NAN)], ExtracurricularGrade::None);
        assert!(compose(&nan_only, &BonusTable::default(), &subjects()).is_err());
    }

    #[test]
    fn parse_score_is_lenient() {
        assert_eq!(parse_score(" 87.5 "), Some(87.5));
        assert_eq!(parse_score("87,5"), Some(87.5));
        assert_eq!(parse_score("-"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("NaN"), None);
    }
}
