use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exam {
    pub exam_id: Uuid,
    pub course: String,
    pub exam_name: String,
    pub date: Date,
    pub credits: i32,
    pub created_at: OffsetDateTime,
}

impl Exam {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Exam>> {
        let rows = sqlx::query_as::<_, Exam>(
            r#"
            SELECT exam_id, course, exam_name, date, credits, created_at
            FROM exams
            ORDER BY date DESC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, exam_id: Uuid) -> anyhow::Result<Option<Exam>> {
        let row = sqlx::query_as::<_, Exam>(
            r#"
            SELECT exam_id, course, exam_name, date, credits, created_at
            FROM exams
            WHERE exam_id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn find_by_name(db: &PgPool, exam_name: &str) -> anyhow::Result<Option<Exam>> {
        let row = sqlx::query_as::<_, Exam>(
            r#"
            SELECT exam_id, course, exam_name, date, credits, created_at
            FROM exams
            WHERE lower(exam_name) = lower($1)
            "#,
        )
        .bind(exam_name)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn create(
        db: &PgPool,
        course: &str,
        exam_name: &str,
        date: Date,
        credits: i32,
    ) -> sqlx::Result<Exam> {
        sqlx::query_as::<_, Exam>(
            r#"
            INSERT INTO exams (course, exam_name, date, credits)
            VALUES ($1, $2, $3, $4)
            RETURNING exam_id, course, exam_name, date, credits, created_at
            "#,
        )
        .bind(course)
        .bind(exam_name)
        .bind(date)
        .bind(credits)
        .fetch_one(db)
        .await
    }

    /// Deletes an exam together with all of its results. The primary path is
    /// one transaction; if a transaction cannot be opened the deletes run
    /// sequentially, which can leave the exam in place with its results gone
    /// if interrupted. Either way no result may outlive its exam.
    pub async fn delete_cascade(db: &PgPool, exam_id: Uuid) -> anyhow::Result<bool> {
        match db.begin().await {
            Ok(mut tx) => {
                sqlx::query(r#"DELETE FROM results WHERE exam_id = $1"#)
                    .bind(exam_id)
                    .execute(&mut *tx)
                    .await?;
                let deleted = sqlx::query(r#"DELETE FROM exams WHERE exam_id = $1"#)
                    .bind(exam_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(deleted.rows_affected() > 0)
            }
            Err(e) => {
                warn!(error = %e, %exam_id, "transaction unavailable, falling back to sequential deletion");
                sqlx::query(r#"DELETE FROM results WHERE exam_id = $1"#)
                    .bind(exam_id)
                    .execute(db)
                    .await?;
                let deleted = sqlx::query(r#"DELETE FROM exams WHERE exam_id = $1"#)
                    .bind(exam_id)
                    .execute(db)
                    .await?;
                Ok(deleted.rows_affected() > 0)
            }
        }
    }
}

// Database-backed test; run with `cargo test -- --ignored` against a
// Postgres instance at DATABASE_URL.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::students::repo::Student;
    use sqlx::postgres::PgPoolOptions;
    use time::macros::date;

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let db = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .expect("connect to test database");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");
        db
    }

    #[tokio::test]
    #[ignore]
    async fn delete_cascade_leaves_no_results_behind() {
        let db = pool().await;
        let tag = Uuid::new_v4().simple().to_string();
        let student = Student::create(&db, "Cascade Case", &format!("cascade-{tag}@example.com"))
            .await
            .expect("create student");
        let exam = Exam::create(
            &db,
            "CS101",
            &format!("Cascade Exam {tag}"),
            date!(2030 - 06 - 01),
            3,
        )
        .await
        .expect("create exam");
        crate::results::repo::create(&db, student.student_id, exam.exam_id, 88)
            .await
            .expect("create result");

        assert!(Exam::delete_cascade(&db, exam.exam_id).await.expect("delete"));

        let leftover: (i64,) = sqlx::query_as("SELECT count(*) FROM results WHERE exam_id = $1")
            .bind(exam.exam_id)
            .fetch_one(&db)
            .await
            .expect("count results");
        assert_eq!(leftover.0, 0);
        assert!(Exam::find(&db, exam.exam_id)
            .await
            .expect("find exam")
            .is_none());

        let _ = Student::delete_cascade(&db, student.student_id).await;
    }
}
