use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

impl Student {
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Student>> {
        let rows = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, name, email, created_at
            FROM students
            ORDER BY name
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, student_id: Uuid) -> anyhow::Result<Option<Student>> {
        let row = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, name, email, created_at
            FROM students
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<Student>> {
        let row = sqlx::query_as::<_, Student>(
            r#"
            SELECT student_id, name, email, created_at
            FROM students
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        name: &str,
        email: &str,
    ) -> sqlx::Result<Student> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (name, email)
            VALUES ($1, $2)
            RETURNING student_id, name, email, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_one(db)
        .await
    }

    /// Variant used by student sign-up: a lecturer may have pre-created the
    /// profile, in which case the existing row wins and no event fires.
    pub async fn create_if_absent<'e>(
        db: impl PgExecutor<'e>,
        name: &str,
        email: &str,
    ) -> sqlx::Result<Option<Student>> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (name, email)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING student_id, name, email, created_at
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_optional(db)
        .await
    }

    /// Removes the student and all of their results in one transaction, so no
    /// orphaned result rows can survive a partial failure.
    pub async fn delete_cascade(db: &PgPool, student_id: Uuid) -> anyhow::Result<bool> {
        let mut tx = db.begin().await?;
        sqlx::query(r#"DELETE FROM results WHERE student_id = $1"#)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query(r#"DELETE FROM students WHERE student_id = $1"#)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }
}
