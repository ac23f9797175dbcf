use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResultRecord {
    pub result_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub score: i32,
    pub created_at: OffsetDateTime,
}

/// Result row with its student and exam joins. The joins are left joins and
/// the fields optional: aggregates must tolerate a missing association
/// instead of failing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JoinedResult {
    pub result_id: Uuid,
    pub student_id: Uuid,
    pub exam_id: Uuid,
    pub score: i32,
    pub created_at: OffsetDateTime,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub exam_name: Option<String>,
    pub course: Option<String>,
    pub exam_date: Option<Date>,
    pub credits: Option<i32>,
}

const JOINED_SELECT: &str = r#"
    SELECT r.result_id, r.student_id, r.exam_id, r.score, r.created_at,
           s.name  AS student_name,
           s.email AS student_email,
           e.exam_name,
           e.course,
           e.date    AS exam_date,
           e.credits
    FROM results r
    LEFT JOIN students s ON s.student_id = r.student_id
    LEFT JOIN exams e ON e.exam_id = r.exam_id
"#;

pub async fn list_joined(db: &PgPool) -> anyhow::Result<Vec<JoinedResult>> {
    let sql = format!("{JOINED_SELECT} ORDER BY r.created_at DESC");
    let rows = sqlx::query_as::<_, JoinedResult>(&sql).fetch_all(db).await?;
    Ok(rows)
}

pub async fn list_joined_for_student(
    db: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<JoinedResult>> {
    let sql = format!("{JOINED_SELECT} WHERE r.student_id = $1 ORDER BY r.created_at DESC");
    let rows = sqlx::query_as::<_, JoinedResult>(&sql)
        .bind(student_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Returns the existing result id for a (student, exam) pair, if any. Used to
/// steer a second insert toward the edit path before the unique index fires.
pub async fn existing_pair(
    db: &PgPool,
    student_id: Uuid,
    exam_id: Uuid,
) -> anyhow::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT result_id FROM results
        WHERE student_id = $1 AND exam_id = $2
        "#,
    )
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|(id,)| id))
}

pub async fn create(
    db: &PgPool,
    student_id: Uuid,
    exam_id: Uuid,
    score: i32,
) -> sqlx::Result<ResultRecord> {
    sqlx::query_as::<_, ResultRecord>(
        r#"
        INSERT INTO results (student_id, exam_id, score)
        VALUES ($1, $2, $3)
        RETURNING result_id, student_id, exam_id, score, created_at
        "#,
    )
    .bind(student_id)
    .bind(exam_id)
    .bind(score)
    .fetch_one(db)
    .await
}

/// Multi-row insert for one CSV batch. All-or-nothing per batch: a constraint
/// violation anywhere in the batch fails the whole statement, which the
/// import surfaces as that batch's failure count.
pub async fn insert_batch(db: &PgPool, rows: &[(Uuid, Uuid, i32)]) -> sqlx::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let mut builder: QueryBuilder<sqlx::Postgres> =
        QueryBuilder::new("INSERT INTO results (student_id, exam_id, score) ");
    builder.push_values(rows, |mut b, (student_id, exam_id, score)| {
        b.push_bind(student_id).push_bind(exam_id).push_bind(score);
    });
    let result = builder.build().execute(db).await?;
    Ok(result.rows_affected())
}

pub async fn update(
    db: &PgPool,
    result_id: Uuid,
    student_id: Uuid,
    exam_id: Uuid,
    score: i32,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE results
        SET student_id = $2, exam_id = $3, score = $4
        WHERE result_id = $1
        "#,
    )
    .bind(result_id)
    .bind(student_id)
    .bind(exam_id)
    .bind(score)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(db: &PgPool, result_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(r#"DELETE FROM results WHERE result_id = $1"#)
        .bind(result_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
