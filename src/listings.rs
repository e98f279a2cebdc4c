use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Marketplace listing. Only existence matters to the messaging core; the
/// selling flow owns the rest of the lifecycle.
#[derive(Debug, Clone, FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub created_at: OffsetDateTime,
}

impl Listing {
    pub async fn exists(db: &SqlitePool, id: Uuid) -> sqlx::Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM listings WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await?;
        Ok(count > 0)
    }

    pub async fn create(
        db: &SqlitePool,
        seller_id: Uuid,
        title: &str,
        price_cents: i64,
    ) -> sqlx::Result<Listing> {
        sqlx::query_as::<_, Listing>(
            r#"
            INSERT INTO listings (id, seller_id, title, price_cents, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, seller_id, title, price_cents, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(title)
        .bind(price_cents)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await
    }
}
