use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{ExtracurricularGrade, StudentRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, imported_on: NaiveDate) -> anyhow::Result<usize> {
    let scores = |values: [f64; 5]| -> BTreeMap<String, f64> {
        ["MTK", "BINDO", "BINGGRIS", "IPA", "IPS"]
            .iter()
            .map(|s| s.to_string())
            .zip(values)
            .collect()
    };

    let students = vec![
        StudentRecord {
            id: "2026001".to_string(),
            name: "Avery Lee".to_string(),
            class_name: Some("XII IPA 1".to_string()),
            subject_scores: scores([80.0, 70.0, 75.0, 85.0, 90.0]),
            extracurricular_grade: ExtracurricularGrade::None,
            unexcused_absences: Some(0),
        },
        StudentRecord {
            id: "2026002".to_string(),
            name: "Jules Moreno".to_string(),
            class_name: Some("XII IPA 1".to_string()),
            subject_scores: scores([62.0, 58.0, 66.0, 60.0, 64.0]),
            extracurricular_grade: ExtracurricularGrade::Good,
            unexcused_absences: Some(2),
        },
        StudentRecord {
            id: "2026003".to_string(),
            name: "Kiara Patel".to_string(),
            class_name: Some("XII IPA 1".to_string()),
            subject_scores: scores([92.0, 88.0, 95.0, 90.0, 97.0]),
            extracurricular_grade: ExtracurricularGrade::VeryGood,
            unexcused_absences: Some(8),
        },
    ];

    import_roster(pool, &students, imported_on).await
}

/// Upserts students by student number and replaces their subject scores.
pub async fn import_roster(
    pool: &PgPool,
    records: &[StudentRecord],
    imported_on: NaiveDate,
) -> anyhow::Result<usize> {
    let mut tx = pool.begin().await?;
    let mut imported = 0usize;

    for record in records {
        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO graduation_forecast.students
            (id, student_number, full_name, class_name, extracurricular, unexcused_absences, imported_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_number) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                class_name = EXCLUDED.class_name,
                extracurricular = EXCLUDED.extracurricular,
                unexcused_absences = EXCLUDED.unexcused_absences,
                imported_on = EXCLUDED.imported_on
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.id)
        .bind(&record.name)
        .bind(record.class_name.as_deref())
        .bind(record.extracurricular_grade.as_str())
        .bind(record.unexcused_absences.map(|n| i32::try_from(n).unwrap_or(i32::MAX)))
        .bind(imported_on)
        .fetch_one(&mut *tx)
        .await?
        .get("id");

        sqlx::query("DELETE FROM graduation_forecast.subject_scores WHERE student_id = $1")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        for (subject, score) in &record.subject_scores {
            sqlx::query(
                r#"
                INSERT INTO graduation_forecast.subject_scores (student_id, subject, score)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(student_id)
            .bind(subject)
            .bind(*score)
            .execute(&mut *tx)
            .await?;
        }

        imported += 1;
    }

    tx.commit().await?;
    Ok(imported)
}

pub async fn fetch_roster(
    pool: &PgPool,
    class_name: Option<&str>,
) -> anyhow::Result<Vec<StudentRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT st.id, st.student_number, st.full_name, st.class_name,
               st.extracurricular, st.unexcused_absences, sc.subject, sc.score
        FROM graduation_forecast.students st
        LEFT JOIN graduation_forecast.subject_scores sc ON sc.student_id = st.id
        WHERE ($1::text IS NULL OR st.class_name = $1)
        ORDER BY st.student_number, sc.subject
        "#,
    )
    .bind(class_name)
    .fetch_all(pool)
    .await?;

    let mut records: Vec<StudentRecord> = Vec::new();
    let mut positions: HashMap<Uuid, usize> = HashMap::new();

    for row in rows {
        let id: Uuid = row.get("id");
        let position = *positions.entry(id).or_insert_with(|| {
            let extracurricular: String = row.get("extracurricular");
            let absences: Option<i32> = row.get("unexcused_absences");
            records.push(StudentRecord {
                id: row.get("student_number"),
                name: row.get("full_name"),
                class_name: row.get("class_name"),
                subject_scores: Default::default(),
                extracurricular_grade: ExtracurricularGrade::parse(&extracurricular),
                unexcused_absences: absences.and_then(|n| u32::try_from(n).ok()),
            });
            records.len() - 1
        });

        let subject: Option<String> = row.get("subject");
        let score: Option<f64> = row.get("score");
        if let (Some(subject), Some(score)) = (subject, score) {
            records[position].subject_scores.insert(subject, score);
        }
    }

    Ok(records)
}
