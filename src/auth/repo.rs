use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password. Takes an executor so sign-up
    /// can run inside the same transaction as the student-profile insert.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await
    }

    pub async fn update_password(
        db: &PgPool,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET password_hash = $2 WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub async fn role_of(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<String>> {
    let role: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT role FROM users WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(role.map(|(r,)| r))
}

/// Stores a reset code with a one-hour expiry, dropping any expired codes for
/// the same address on the way.
pub async fn store_reset_code(db: &PgPool, email: &str, code: &str) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM password_resets WHERE email = $1 AND expires_at <= now()"#)
        .bind(email)
        .execute(db)
        .await?;
    sqlx::query(
        r#"
        INSERT INTO password_resets (email, code, expires_at)
        VALUES ($1, $2, now() + interval '1 hour')
        "#,
    )
    .bind(email)
    .bind(code)
    .execute(db)
    .await?;
    Ok(())
}

/// Deletes the code if it matches and has not expired; a consumed code cannot
/// be replayed.
pub async fn consume_reset_code(db: &PgPool, email: &str, code: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM password_resets
        WHERE email = $1 AND code = $2 AND expires_at > now()
        "#,
    )
    .bind(email)
    .bind(code)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
