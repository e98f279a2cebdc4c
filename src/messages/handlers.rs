use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    messages::{
        dto::{
            CreateMessageRequest, CreateThreadRequest, ListMessagesQuery, MessageView,
            ThreadSummary,
        },
        services,
    },
    state::AppState,
};

pub fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/messages/threads", get(list_threads).post(create_thread))
        .route(
            "/messages/threads/:id/messages",
            get(list_messages).post(create_message),
        )
}

#[instrument(skip(state))]
pub async fn list_threads(
    State(state): State<AppState>,
    AuthUser { id: user_id, .. }: AuthUser,
) -> Result<Json<Vec<ThreadSummary>>, ApiError> {
    Ok(Json(services::list_threads(&state, user_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_thread(
    State(state): State<AppState>,
    AuthUser { id: user_id, .. }: AuthUser,
    Json(payload): Json<CreateThreadRequest>,
) -> Result<(StatusCode, Json<ThreadSummary>), ApiError> {
    let summary =
        services::create_or_get_thread(&state, user_id, payload.participant_id, payload.listing_id)
            .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[instrument(skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser { id: user_id, .. }: AuthUser,
    Path(thread_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let limit = parse_limit(query.limit.as_deref())?;
    let messages = services::list_messages(&state, thread_id, user_id, limit).await?;
    Ok(Json(messages))
}

#[instrument(skip(state, payload))]
pub async fn create_message(
    State(state): State<AppState>,
    AuthUser { id: user_id, .. }: AuthUser,
    Path(thread_id): Path<Uuid>,
    Json(payload): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let message = services::append_message(&state, thread_id, user_id, &payload.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

fn parse_limit(raw: Option<&str>) -> Result<Option<i64>, ApiError> {
    let Some(raw) = raw else { return Ok(None) };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::validation(
            "limit",
            "format",
            "Limit must be a positive integer",
        ));
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| ApiError::validation("limit", "format", "Limit must be a positive integer"))
}
