//! Entry points that take an immutable roster snapshot plus configuration.

use crate::config::EngineConfig;
use crate::decision;
use crate::error::InsufficientDataError;
use crate::evaluation::{self, FeatureMatrix};
use crate::models::{
    DecidedStudent, Label, RecordWarning, RosterOutcome, StudentOutcome, StudentRecord,
};
use crate::schema::{normalize_header, NormalizedRoster};
use crate::score;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentQuery {
    Id(String),
    Name(String),
}

pub fn find_student<'a>(
    records: &'a [StudentRecord],
    query: &StudentQuery,
) -> Option<&'a StudentRecord> {
    match query {
        StudentQuery::Id(id) => records.iter().find(|record| record.id == id.trim()),
        StudentQuery::Name(name) => {
            let wanted = name.trim().to_uppercase();
            records
                .iter()
                .find(|record| record.name.trim().to_uppercase() == wanted)
        }
    }
}

pub fn decide_student(
    record: &StudentRecord,
    config: &EngineConfig,
) -> Result<StudentOutcome, InsufficientDataError> {
    let score = score::compose(record, &config.bonus, &config.subjects)?;
    let decision = decision::decide_student(
        &score,
        record.unexcused_absences,
        config.threshold,
        config.absence_override_limit,
    );

    Ok(StudentOutcome {
        id: record.id.clone(),
        name: record.name.clone(),
        threshold: config.threshold,
        unexcused_absences: record.unexcused_absences,
        score,
        decision,
    })
}

/// Decides every scorable record, partitions them, and audits the labels.
/// Unscorable records become warnings after those raised while normalizing;
/// the rest of the roster still runs.
pub fn run_roster(roster: &NormalizedRoster, config: &EngineConfig) -> RosterOutcome {
    let mut passed = Vec::new();
    let mut failed = Vec::new();
    let mut warnings = roster.warnings.clone();
    let mut sparse_features = Vec::new();
    let mut labels = Vec::new();

    for record in &roster.records {
        let outcome = match decide_student(record, config) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(id = %record.id, "{err}");
                warnings.push(RecordWarning {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        sparse_features.push(
            config
                .subjects
                .iter()
                .map(|subject| record.subject_scores.get(&normalize_header(subject)).copied())
                .collect::<Vec<_>>(),
        );
        labels.push(outcome.decision.label);

        let row = DecidedStudent {
            id: outcome.id,
            name: outcome.name,
            final_score: outcome.score.final_score,
            bonus: outcome.score.bonus,
            override_reason: outcome.decision.override_reason,
        };
        match outcome.decision.label {
            Label::Pass => passed.push(row),
            Label::Fail => failed.push(row),
        }
    }

    let evaluation = evaluation::evaluate(
        &FeatureMatrix::from_sparse(&sparse_features),
        &labels,
        &config.evaluation,
    );

    let outcome = RosterOutcome {
        threshold: config.threshold,
        passed,
        failed,
        warnings,
        evaluation,
    };
    let summary = outcome.summary();
    tracing::info!(
        passed = summary.passed,
        failed = summary.failed,
        excluded = summary.excluded,
        threshold = config.threshold,
        "roster decided"
    );
    outcome
}
