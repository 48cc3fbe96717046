use chrono::NaiveDate;

use crate::error::RenderError;
use crate::layout::{CellStyle, ColumnBounds, RowMetrics, Table, TableLayout};
use crate::models::{DecidedStudent, RosterOutcome, StudentOutcome, StudentRecord};
use crate::pdf::{Align, Color, Font, PageGeometry, PdfDocument};
use crate::schema::normalize_header;
use crate::score;

pub const PDF_MIME: &str = "application/pdf";

const HEADER_STYLE: CellStyle = CellStyle {
    font: Font::Bold,
    size: 10.0,
    line_height: 8.0,
};

const BODY_STYLE: CellStyle = CellStyle {
    font: Font::Regular,
    size: 9.0,
    line_height: 6.0,
};

/// A rendered document plus what a caller needs to hand it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub filename: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

fn artifact(stem: &str, bytes: Vec<u8>) -> ReportArtifact {
    ReportArtifact {
        filename: format!("{}.pdf", sanitize_filename(stem)),
        mime: PDF_MIME,
        bytes,
    }
}

pub fn sanitize_filename(stem: &str) -> String {
    let cleaned: String = stem
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned
    }
}

fn format_score(value: f64) -> String {
    format!("{value:.2}")
}

/// Draw stage: header row, then each measured row, repeating the header on
/// every page break. The header never ends a page without a row under it.
fn draw_table(
    doc: &mut PdfDocument,
    table: &Table,
    layout: &TableLayout,
) -> Result<(), RenderError> {
    let left = doc.geometry().margin;
    let header = layout.measure_row(&table.headers, layout.header_style);
    let rows: Vec<RowMetrics> = table
        .rows
        .iter()
        .map(|cells| layout.measure_row(cells, layout.body_style))
        .collect();

    if let Some((index, tallest)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| header.height + row.height > doc.usable_height())
    {
        return Err(RenderError::InvalidGeometry(format!(
            "row {} is {:.1} mm tall and cannot fit on a page under its header",
            index + 1,
            tallest.height
        )));
    }

    let first_height = rows.first().map_or(0.0, |row| row.height);
    doc.ensure_space(header.height + first_height);
    draw_row(doc, layout, left, &header, layout.header_style, Align::Center);
    for metrics in &rows {
        if doc.ensure_space(metrics.height) {
            draw_row(doc, layout, left, &header, layout.header_style, Align::Center);
        }
        draw_row(doc, layout, left, metrics, layout.body_style, Align::Left);
    }
    Ok(())
}

fn draw_row(
    doc: &mut PdfDocument,
    layout: &TableLayout,
    left: f64,
    metrics: &RowMetrics,
    style: CellStyle,
    align: Align,
) {
    let top = doc.cursor();
    let mut x = left;
    for (cell_lines, width) in metrics.lines.iter().zip(&layout.widths) {
        doc.rect(x, top, *width, metrics.height);
        for (i, line) in cell_lines.iter().enumerate() {
            let line_top = top + i as f64 * style.line_height;
            doc.text(
                x + layout.padding,
                line_top,
                width - 2.0 * layout.padding,
                style.line_height,
                line,
                style.font,
                style.size,
                Color::BLACK,
                align,
            );
        }
        x += width;
    }
    doc.advance(metrics.height);
}

const SECTION_TITLE_HEIGHT: f64 = 8.0;
const SECTION_TITLE_GAP: f64 = 2.0;
const PLACEHOLDER_HEIGHT: f64 = 8.0;

/// Title plus table. The title moves to a new page together with the header
/// and first row when they do not fit below it.
fn section_table(
    doc: &mut PdfDocument,
    title: &str,
    table: &Table,
    bounds: ColumnBounds,
) -> Result<(), RenderError> {
    let layout = TableLayout::measure(table, bounds, HEADER_STYLE, BODY_STYLE)?;
    let first_block = match table.rows.first() {
        Some(first) => {
            layout.measure_row(&table.headers, HEADER_STYLE).height
                + layout.measure_row(first, BODY_STYLE).height
        }
        None => PLACEHOLDER_HEIGHT,
    };
    let reserve = SECTION_TITLE_HEIGHT + SECTION_TITLE_GAP + first_block;
    if reserve <= doc.usable_height() {
        doc.ensure_space(reserve);
    }

    doc.line(title, Font::Bold, 12.0, SECTION_TITLE_HEIGHT, Color::BLACK, Align::Center);
    doc.advance(SECTION_TITLE_GAP);
    if table.rows.is_empty() {
        doc.line(
            "No records",
            Font::Regular,
            11.0,
            PLACEHOLDER_HEIGHT,
            Color::BLACK,
            Align::Left,
        );
    } else {
        draw_table(doc, table, &layout)?;
    }
    doc.advance(4.0);
    Ok(())
}

pub fn decided_table(students: &[DecidedStudent]) -> Table {
    Table {
        headers: ["ID", "Name", "Final Score", "Bonus", "Note"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rows: students
            .iter()
            .map(|s| {
                vec![
                    s.id.clone(),
                    s.name.clone(),
                    format_score(s.final_score),
                    format_score(s.bonus),
                    s.override_reason.clone().unwrap_or_default(),
                ]
            })
            .collect(),
    }
}

fn portrait_bounds(doc: &PdfDocument) -> ColumnBounds {
    ColumnBounds {
        total: doc.geometry().content_width(),
        min: 18.0,
        max: 70.0,
    }
}

/// Roster-level report: passed and failed tables plus the evaluation block
/// when the evaluation ran.
pub fn roster_report(
    outcome: &RosterOutcome,
    class_name: &str,
    generated_on: NaiveDate,
) -> Result<ReportArtifact, RenderError> {
    let passed = decided_table(&outcome.passed);
    let failed = decided_table(&outcome.failed);

    let mut doc = PdfDocument::new(PageGeometry::a4_portrait())?;
    let bounds = portrait_bounds(&doc);

    doc.line(
        &format!("Graduation Prediction - {class_name}"),
        Font::Bold,
        14.0,
        8.0,
        Color::BLACK,
        Align::Center,
    );
    doc.line(
        &format!("Generated {generated_on}"),
        Font::Regular,
        9.0,
        6.0,
        Color::BLACK,
        Align::Center,
    );
    doc.advance(4.0);
    doc.line(
        &format!("Graduation threshold: {}", outcome.threshold),
        Font::Regular,
        12.0,
        8.0,
        Color::BLACK,
        Align::Left,
    );
    let summary = outcome.summary();
    doc.line(
        &format!(
            "Passed: {}   Failed: {}   Excluded: {}",
            summary.passed, summary.failed, summary.excluded
        ),
        Font::Regular,
        12.0,
        8.0,
        Color::BLACK,
        Align::Left,
    );
    doc.advance(4.0);

    if let Some(report) = outcome.evaluation.report() {
        doc.line(
            "Model Evaluation (Random Forest)",
            Font::Bold,
            12.0,
            8.0,
            Color::BLACK,
            Align::Left,
        );
        for (name, value) in report.named_metrics() {
            doc.line(
                &format!("{name}: {value:.2}"),
                Font::Regular,
                11.0,
                6.0,
                Color::BLACK,
                Align::Left,
            );
        }
        doc.advance(4.0);
    }

    section_table(&mut doc, "Passed Students", &passed, bounds)?;
    section_table(&mut doc, "Failed Students", &failed, bounds)?;

    if !outcome.warnings.is_empty() {
        let excluded = Table {
            headers: vec!["ID".to_string(), "Name".to_string(), "Reason".to_string()],
            rows: outcome
                .warnings
                .iter()
                .map(|w| vec![w.id.clone(), w.name.clone(), w.reason.clone()])
                .collect(),
        };
        section_table(&mut doc, "Excluded Records", &excluded, bounds)?;
    }

    tracing::debug!(pages = doc.page_count(), "roster report rendered");
    Ok(artifact(&format!("{class_name}_Prediction"), doc.finish()))
}

/// Single-student report: identity block, pass/fail banner and, for an
/// absence override, the counseling note.
pub fn student_report(
    outcome: &StudentOutcome,
    generated_on: NaiveDate,
) -> Result<ReportArtifact, RenderError> {
    let mut doc = PdfDocument::new(PageGeometry::a4_portrait())?;

    doc.line(
        "Graduation Prediction Result",
        Font::Bold,
        16.0,
        10.0,
        Color::BLACK,
        Align::Center,
    );
    doc.line(
        &format!("Generated {generated_on}"),
        Font::Regular,
        9.0,
        6.0,
        Color::BLACK,
        Align::Center,
    );
    doc.advance(8.0);

    let mut identity = vec![
        format!("Name              : {}", outcome.name),
        format!("ID                : {}", outcome.id),
        format!("Subject average   : {}", format_score(outcome.score.subject_average)),
        format!("Extracurricular   : {}", format_score(outcome.score.bonus)),
        format!("Average + bonus   : {}", format_score(outcome.score.final_score)),
        format!("Threshold         : {}", outcome.threshold),
    ];
    if let Some(absences) = outcome.unexcused_absences {
        identity.push(format!("Unexcused absences: {absences}"));
    }
    for line in &identity {
        doc.line(line, Font::Regular, 12.0, 8.0, Color::BLACK, Align::Left);
    }
    doc.advance(4.0);

    if outcome.decision.label.is_pass() {
        doc.line("PASSED", Font::Bold, 14.0, 10.0, Color::GREEN, Align::Left);
    } else {
        doc.line("NOT PASSED", Font::Bold, 14.0, 10.0, Color::RED, Align::Left);
        if let Some(reason) = &outcome.decision.override_reason {
            doc.line(
                &format!("Note: {reason}"),
                Font::Regular,
                12.0,
                10.0,
                Color::RED,
                Align::Left,
            );
        }
    }

    Ok(artifact(&format!("Prediction_{}", outcome.name), doc.finish()))
}

/// Subject score table for the whole roster, one row per student.
pub fn report_card_table(records: &[StudentRecord], subjects: &[String]) -> Table {
    let subjects: Vec<String> = subjects.iter().map(|s| normalize_header(s)).collect();
    let mut headers = vec!["ID".to_string(), "Name".to_string()];
    headers.extend(subjects.iter().cloned());
    headers.push("Average".to_string());

    let rows = records
        .iter()
        .map(|record| {
            let mut row = vec![record.id.clone(), record.name.clone()];
            row.extend(subjects.iter().map(|subject| {
                record
                    .subject_scores
                    .get(subject)
                    .map(|v| format_score(*v))
                    .unwrap_or_default()
            }));
            row.push(
                score::subject_average(record, &subjects)
                    .map(format_score)
                    .unwrap_or_else(|| "-".to_string()),
            );
            row
        })
        .collect();

    Table { headers, rows }
}

pub fn report_card(
    records: &[StudentRecord],
    subjects: &[String],
    class_name: &str,
    generated_on: NaiveDate,
) -> Result<ReportArtifact, RenderError> {
    let table = report_card_table(records, subjects);
    let mut doc = PdfDocument::new(PageGeometry::a4_landscape())?;
    let bounds = ColumnBounds {
        total: doc.geometry().content_width(),
        min: 20.0,
        max: 50.0,
    };

    doc.line(
        &format!("REPORT CARD - {class_name}"),
        Font::Bold,
        14.0,
        10.0,
        Color::BLACK,
        Align::Center,
    );
    doc.line(
        &format!("Generated {generated_on}"),
        Font::Regular,
        9.0,
        6.0,
        Color::BLACK,
        Align::Center,
    );
    doc.advance(4.0);

    let layout = TableLayout::measure(&table, bounds, HEADER_STYLE, BODY_STYLE)?;
    draw_table(&mut doc, &table, &layout)?;
    tracing::debug!(pages = doc.page_count(), rows = table.rows.len(), "report card rendered");

    Ok(artifact(&format!("ReportCard_{class_name}"), doc.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CompositeScore, Decision, EvaluationOutcome, EvaluationReport, ExtracurricularGrade,
        InapplicableReason, Label, RecordWarning,
    };
    use crate::rules::ABSENCE_OVERRIDE_REASON;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    fn count(haystack: &[u8], needle: &str) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle.as_bytes())
            .count()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn decided(id: &str, final_score: f64, reason: Option<&str>) -> DecidedStudent {
        DecidedStudent {
            id: id.to_string(),
            name: format!("Student {id}"),
            final_score,
            bonus: 0.0,
            override_reason: reason.map(str::to_string),
        }
    }

    fn outcome(passed: Vec<DecidedStudent>, failed: Vec<DecidedStudent>) -> RosterOutcome {
        RosterOutcome {
            threshold: 75,
            passed,
            failed,
            warnings: Vec::new(),
            evaluation: EvaluationOutcome::NotApplicable {
                reason: InapplicableReason::SingleClass,
            },
        }
    }

    fn student_outcome(label: Label, reason: Option<&str>) -> StudentOutcome {
        StudentOutcome {
            id: "101".to_string(),
            name: "Avery Lee".to_string(),
            threshold: 75,
            unexcused_absences: Some(8),
            score: CompositeScore {
                subject_average: 95.0,
                bonus: 0.0,
                final_score: 95.0,
            },
            decision: Decision {
                label,
                override_reason: reason.map(str::to_string),
            },
        }
    }

    #[test]
    fn roster_report_has_both_sections() {
        let report = roster_report(
            &outcome(
                vec![decided("1", 80.0, None)],
                vec![decided("2", 95.0, Some(ABSENCE_OVERRIDE_REASON))],
            ),
            "XII IPA 1",
            day(),
        )
        .unwrap();
        assert_eq!(report.mime, "application/pdf");
        assert_eq!(report.filename, "XII_IPA_1_Prediction.pdf");
        assert!(report.bytes.starts_with(b"%PDF-"));
        assert!(contains(&report.bytes, "(Passed Students)"));
        assert!(contains(&report.bytes, "(Failed Students)"));
        assert!(contains(&report.bytes, "(80.00)"));
        assert!(!contains(&report.bytes, "Model Evaluation"));
    }

    #[test]
    fn evaluation_block_appears_when_present() {
        let mut roster = outcome(vec![decided("1", 80.0, None)], vec![decided("2", 60.0, None)]);
        roster.evaluation = EvaluationOutcome::Evaluated(EvaluationReport {
            accuracy: 1.0,
            precision: 0.5,
            recall: 0.25,
            f1: 0.33,
            train_size: 7,
            test_size: 3,
        });
        roster.warnings.push(RecordWarning {
            id: "3".to_string(),
            name: "Student 3".to_string(),
            reason: "no usable subject scores".to_string(),
        });
        let report = roster_report(&roster, "Kelas", day()).unwrap();
        assert!(contains(&report.bytes, "(Model Evaluation \\(Random Forest\\))"));
        assert!(contains(&report.bytes, "(Recall: 0.25)"));
        assert!(contains(&report.bytes, "(Excluded Records)"));
    }

    #[test]
    fn empty_partition_prints_placeholder() {
        let report = roster_report(&outcome(vec![decided("1", 80.0, None)], vec![]), "A", day())
            .unwrap();
        assert!(contains(&report.bytes, "(No records)"));
    }

    #[test]
    fn long_rosters_paginate() {
        let passed = (0..120).map(|i| decided(&i.to_string(), 80.0, None)).collect();
        let report = roster_report(&outcome(passed, vec![]), "Big", day()).unwrap();
        assert!(count(&report.bytes, "/Type /Page ") > 1);
        assert!(count(&report.bytes, "(Final Score)") > 1);
    }

    #[test]
    fn section_title_moves_with_its_first_row() {
        let table = decided_table(&[decided("1", 80.0, None)]);
        let mut doc = PdfDocument::new(PageGeometry::a4_portrait()).unwrap();
        let bounds = portrait_bounds(&doc);
        doc.advance(doc.usable_height() - 15.0);

        section_table(&mut doc, "Passed Students", &table, bounds).unwrap();

        let layout = TableLayout::measure(&table, bounds, HEADER_STYLE, BODY_STYLE).unwrap();
        let expected = doc.geometry().margin
            + SECTION_TITLE_HEIGHT
            + SECTION_TITLE_GAP
            + layout.measure_row(&table.headers, HEADER_STYLE).height
            + layout.measure_row(&table.rows[0], BODY_STYLE).height
            + 4.0;
        assert_eq!(doc.page_count(), 2);
        assert!((doc.cursor() - expected).abs() < 1e-9);
    }

    #[test]
    fn row_taller_than_a_page_is_rejected() {
        let tall_note = vec!["line"; 60].join("\n");
        let roster = outcome(vec![], vec![decided("1", 40.0, Some(&tall_note))]);
        assert!(matches!(
            roster_report(&roster, "Tall", day()),
            Err(RenderError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn failing_student_gets_counseling_note() {
        let report =
            student_report(&student_outcome(Label::Fail, Some(ABSENCE_OVERRIDE_REASON)), day())
                .unwrap();
        assert_eq!(report.filename, "Prediction_Avery_Lee.pdf");
        assert!(contains(&report.bytes, "(NOT PASSED)"));
        assert!(contains(&report.bytes, "refer to counseling"));
    }

    #[test]
    fn passing_student_has_no_note() {
        let report = student_report(&student_outcome(Label::Pass, None), day()).unwrap();
        assert!(contains(&report.bytes, "(PASSED)"));
        assert!(!contains(&report.bytes, "Note:"));
    }

    #[test]
    fn report_card_lists_subjects_and_average() {
        let record = StudentRecord {
            id: "101".to_string(),
            name: "Avery Lee".to_string(),
            class_name: None,
            subject_scores: [("MTK".to_string(), 80.0), ("IPA".to_string(), 90.0)]
                .into_iter()
                .collect(),
            extracurricular_grade: ExtracurricularGrade::Good,
            unexcused_absences: None,
        };
        let subjects = vec!["MTK".to_string(), "IPA".to_string(), "IPS".to_string()];
        let table = report_card_table(std::slice::from_ref(&record), &subjects);
        assert_eq!(table.headers, ["ID", "Name", "MTK", "IPA", "IPS", "Average"]);
        assert_eq!(table.rows[0], ["101", "Avery Lee", "80.00", "90.00", "", "85.00"]);

        let report = report_card(&[record], &subjects, "XII", day()).unwrap();
        assert_eq!(report.filename, "ReportCard_XII.pdf");
        assert!(contains(&report.bytes, "(REPORT CARD - XII)"));
    }

    #[test]
    fn sanitizes_filenames() {
        assert_eq!(sanitize_filename("a/b c"), "a_b_c");
        assert_eq!(sanitize_filename("  "), "report");
    }
}
