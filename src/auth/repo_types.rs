use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database. Never serialized directly; responses go
/// through [`crate::auth::dto::PublicUser`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String, // Argon2 hash
    pub display_name: String,
    pub role: String, // GUEST | USER | ADMIN
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One live refresh-token session. The row id doubles as the `token_id`
/// claim inside the refresh JWT.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}
