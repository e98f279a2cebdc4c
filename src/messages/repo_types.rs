use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Conversation between two users, optionally scoped to a listing. The pair
/// is stored sorted (low/high by uuid byte order) so per-scope uniqueness is
/// a store constraint rather than a lookup convention.
#[derive(Debug, Clone, FromRow)]
pub struct ThreadRow {
    pub id: Uuid,
    pub listing_id: Option<Uuid>,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ThreadRow {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_low == user_id || self.participant_high == user_id
    }
}

/// Thread joined with both participants' display names, for list views.
#[derive(Debug, Clone, FromRow)]
pub struct ThreadWithNames {
    pub id: Uuid,
    pub listing_id: Option<Uuid>,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub low_display_name: String,
    pub high_display_name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
}
