use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{RefreshTokenRow, User};

impl User {
    /// Find a user by email. The match is byte-exact; no normalization.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, role, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, display_name, role, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Create a new user with a hashed password. Role starts at USER.
    pub async fn create(
        db: &SqlitePool,
        email: &str,
        password_hash: &str,
        display_name: &str,
    ) -> sqlx::Result<User> {
        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'USER', ?, ?)
            RETURNING id, email, password_hash, display_name, role, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(display_name)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await
    }

    /// Set a user's role. Returns the updated row, or None for an unknown id.
    pub async fn update_role(db: &SqlitePool, id: Uuid, role: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, email, password_hash, display_name, role, created_at, updated_at
            "#,
        )
        .bind(role)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .fetch_optional(db)
        .await
    }
}

impl RefreshTokenRow {
    /// Persist the session row for a freshly minted refresh token.
    pub async fn record(
        db: &SqlitePool,
        id: Uuid,
        token: &str,
        user_id: Uuid,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<RefreshTokenRow> {
        sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            INSERT INTO refresh_tokens (id, token, user_id, expires_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, token, user_id, expires_at
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .fetch_one(db)
        .await
    }

    /// Claim the session row for a token string, removing it in the same
    /// statement. Of two concurrent callers exactly one receives the row;
    /// the other sees None.
    pub async fn consume(db: &SqlitePool, token: &str) -> sqlx::Result<Option<RefreshTokenRow>> {
        sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token = ?
            RETURNING id, token, user_id, expires_at
            "#,
        )
        .bind(token)
        .fetch_optional(db)
        .await
    }

    /// Drop the session row for a token string, if one exists.
    pub async fn delete_by_token(db: &SqlitePool, token: &str) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
