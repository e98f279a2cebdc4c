use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::messages::repo_types::{MessageRow, ThreadWithNames};

/// Request body for opening (or returning to) a conversation.
#[derive(Debug, Deserialize)]
pub struct CreateThreadRequest {
    pub participant_id: Uuid,
    pub listing_id: Option<Uuid>,
}

/// Request body for sending a message.
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantView {
    pub id: Uuid,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// One entry of a user's conversation list. `last_message` is null for a
/// thread nobody has written to yet.
#[derive(Debug, Serialize)]
pub struct ThreadSummary {
    pub id: Uuid,
    pub listing_id: Option<Uuid>,
    pub participants: Vec<ParticipantView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub last_message: Option<MessageView>,
}

impl ThreadSummary {
    pub fn from_parts(thread: ThreadWithNames, last_message: Option<MessageRow>) -> Self {
        Self {
            id: thread.id,
            listing_id: thread.listing_id,
            participants: vec![
                ParticipantView {
                    id: thread.participant_low,
                    display_name: thread.low_display_name,
                },
                ParticipantView {
                    id: thread.participant_high,
                    display_name: thread.high_display_name,
                },
            ],
            created_at: thread.created_at,
            updated_at: thread.updated_at,
            last_message: last_message.map(MessageView::from),
        }
    }
}
