use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::error::{is_unique_violation, ApiError};
use crate::listings::Listing;
use crate::messages::dto::{MessageView, ThreadSummary};
use crate::messages::repo_types::{MessageRow, ThreadRow};
use crate::state::AppState;

/// Threads the user belongs to, most recently active first, each carrying
/// its latest message.
pub async fn list_threads(state: &AppState, user_id: Uuid) -> Result<Vec<ThreadSummary>, ApiError> {
    let threads = ThreadRow::list_for_user(&state.db, user_id).await?;
    let mut summaries = Vec::with_capacity(threads.len());
    for thread in threads {
        let last = MessageRow::last_for_thread(&state.db, thread.id).await?;
        summaries.push(ThreadSummary::from_parts(thread, last));
    }
    Ok(summaries)
}

/// Find or create the conversation between the caller and a participant
/// within one listing scope. At most one thread exists per pair per scope;
/// concurrent creators converge on the same thread.
pub async fn create_or_get_thread(
    state: &AppState,
    user_id: Uuid,
    participant_id: Uuid,
    listing_id: Option<Uuid>,
) -> Result<ThreadSummary, ApiError> {
    if participant_id == user_id {
        return Err(ApiError::InvalidOperation(
            "Cannot start a conversation with yourself".into(),
        ));
    }
    if User::find_by_id(&state.db, participant_id).await?.is_none() {
        return Err(ApiError::NotFound("Participant not found".into()));
    }
    if let Some(listing) = listing_id {
        if !Listing::exists(&state.db, listing).await? {
            return Err(ApiError::NotFound("Listing not found".into()));
        }
    }

    if let Some(existing) =
        ThreadRow::find_by_pair(&state.db, user_id, participant_id, listing_id).await?
    {
        return summarize(state, existing.id).await;
    }

    let thread = match ThreadRow::insert(&state.db, user_id, participant_id, listing_id).await {
        Ok(t) => {
            info!(thread_id = %t.id, user_id = %user_id, participant_id = %participant_id, "thread created");
            t
        }
        // Lost the insert race; the winner's thread is the thread.
        Err(e) if is_unique_violation(&e) => {
            ThreadRow::find_by_pair(&state.db, user_id, participant_id, listing_id)
                .await?
                .ok_or_else(|| {
                    ApiError::Internal(anyhow::anyhow!("thread missing after unique violation"))
                })?
        }
        Err(e) => return Err(e.into()),
    };

    summarize(state, thread.id).await
}

/// The caller must be a member of the thread. A missing thread gets the same
/// rejection, so outsiders cannot probe for thread ids.
pub async fn ensure_participant(
    state: &AppState,
    thread_id: Uuid,
    user_id: Uuid,
) -> Result<ThreadRow, ApiError> {
    let denied = || {
        warn!(thread_id = %thread_id, user_id = %user_id, "thread access denied");
        ApiError::Forbidden("You do not have access to this conversation".into())
    };

    let thread = ThreadRow::find_by_id(&state.db, thread_id)
        .await?
        .ok_or_else(denied)?;
    if !thread.is_participant(user_id) {
        return Err(denied());
    }
    Ok(thread)
}

/// Append a message to a thread the sender belongs to. Bumps the thread's
/// activity timestamp so conversation lists surface it first.
pub async fn append_message(
    state: &AppState,
    thread_id: Uuid,
    user_id: Uuid,
    body: &str,
) -> Result<MessageView, ApiError> {
    let thread = ensure_participant(state, thread_id, user_id).await?;

    let length = body.chars().count();
    if length == 0 {
        return Err(ApiError::validation(
            "body",
            "min_length",
            "Message body cannot be empty",
        ));
    }
    if length > 2000 {
        return Err(ApiError::validation(
            "body",
            "max_length",
            "Message body must be at most 2000 characters",
        ));
    }

    let message = MessageRow::insert(&state.db, thread.id, user_id, body).await?;
    ThreadRow::touch(&state.db, thread.id).await?;
    info!(thread_id = %thread.id, message_id = %message.id, "message appended");
    Ok(MessageView::from(message))
}

/// Messages of a thread, oldest first. `limit` selects the most recent
/// window without changing the order.
pub async fn list_messages(
    state: &AppState,
    thread_id: Uuid,
    user_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<MessageView>, ApiError> {
    ensure_participant(state, thread_id, user_id).await?;
    let rows = MessageRow::list_for_thread(&state.db, thread_id, limit).await?;
    Ok(rows.into_iter().map(MessageView::from).collect())
}

async fn summarize(state: &AppState, thread_id: Uuid) -> Result<ThreadSummary, ApiError> {
    let thread = ThreadRow::with_names(&state.db, thread_id)
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("thread row missing participants")))?;
    let last = MessageRow::last_for_thread(&state.db, thread_id).await?;
    Ok(ThreadSummary::from_parts(thread, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::test_support::test_state;

    async fn user(state: &AppState, email: &str, name: &str) -> Uuid {
        User::create(&state.db, email, "hash", name)
            .await
            .expect("create user")
            .id
    }

    #[tokio::test]
    async fn create_or_get_is_idempotent_across_argument_order() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;

        let first = create_or_get_thread(&state, alice, bob, None)
            .await
            .expect("create");
        let second = create_or_get_thread(&state, bob, alice, None)
            .await
            .expect("get");
        assert_eq!(first.id, second.id);

        let names: Vec<&str> = first
            .participants
            .iter()
            .map(|p| p.display_name.as_str())
            .collect();
        assert!(names.contains(&"Alice"));
        assert!(names.contains(&"Bob"));
    }

    #[tokio::test]
    async fn listing_scopes_are_separate_conversations() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;
        let lamp = Listing::create(&state.db, bob, "Lamp", 1_500)
            .await
            .expect("listing");
        let bike = Listing::create(&state.db, bob, "Bike", 25_000)
            .await
            .expect("listing");

        let unscoped = create_or_get_thread(&state, alice, bob, None)
            .await
            .expect("create");
        let about_lamp = create_or_get_thread(&state, alice, bob, Some(lamp.id))
            .await
            .expect("create");
        let about_bike = create_or_get_thread(&state, alice, bob, Some(bike.id))
            .await
            .expect("create");

        assert_ne!(unscoped.id, about_lamp.id);
        assert_ne!(unscoped.id, about_bike.id);
        assert_ne!(about_lamp.id, about_bike.id);

        let again = create_or_get_thread(&state, bob, alice, Some(lamp.id))
            .await
            .expect("get");
        assert_eq!(again.id, about_lamp.id);
        assert_eq!(again.listing_id, Some(lamp.id));
    }

    #[tokio::test]
    async fn self_conversation_is_rejected() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;

        let err = create_or_get_thread(&state, alice, alice, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(_)));
        assert_eq!(err.to_string(), "Cannot start a conversation with yourself");
    }

    #[tokio::test]
    async fn unknown_participant_and_listing_are_not_found() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;

        let ghost = create_or_get_thread(&state, alice, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(ghost.to_string(), "Participant not found");

        let no_listing = create_or_get_thread(&state, alice, bob, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(no_listing.to_string(), "Listing not found");
    }

    #[tokio::test]
    async fn concurrent_creators_converge_on_one_thread() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;

        let (a, b) = tokio::join!(
            create_or_get_thread(&state, alice, bob, None),
            create_or_get_thread(&state, bob, alice, None),
        );
        let a = a.expect("first creator");
        let b = b.expect("second creator");
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn outsiders_and_unknown_threads_get_the_same_rejection() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;
        let mallory = user(&state, "mallory@example.com", "Mallory").await;

        let thread = create_or_get_thread(&state, alice, bob, None)
            .await
            .expect("create");

        let outsider = append_message(&state, thread.id, mallory, "hi")
            .await
            .unwrap_err();
        let ghost = append_message(&state, Uuid::new_v4(), mallory, "hi")
            .await
            .unwrap_err();
        assert!(matches!(outsider, ApiError::Forbidden(_)));
        assert!(matches!(ghost, ApiError::Forbidden(_)));
        assert_eq!(outsider.to_string(), ghost.to_string());

        let listing = list_messages(&state, thread.id, mallory, None)
            .await
            .unwrap_err();
        assert!(matches!(listing, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn body_length_is_counted_in_code_points() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;
        let thread = create_or_get_thread(&state, alice, bob, None)
            .await
            .expect("create");

        let empty = append_message(&state, thread.id, alice, "").await.unwrap_err();
        assert!(matches!(empty, ApiError::Validation(_)));

        // 2000 three-byte characters stay within the limit.
        let at_limit = "€".repeat(2000);
        append_message(&state, thread.id, alice, &at_limit)
            .await
            .expect("2000 code points fit");

        let over = "a".repeat(2001);
        let err = append_message(&state, thread.id, alice, &over)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn appending_bumps_the_thread_to_the_front() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;
        let carol = user(&state, "carol@example.com", "Carol").await;

        let with_bob = create_or_get_thread(&state, alice, bob, None)
            .await
            .expect("create");
        let with_carol = create_or_get_thread(&state, alice, carol, None)
            .await
            .expect("create");

        // Most recently created sits first while both are silent.
        let before: Vec<Uuid> = list_threads(&state, alice)
            .await
            .expect("list")
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(before, vec![with_carol.id, with_bob.id]);

        append_message(&state, with_bob.id, alice, "still interested?")
            .await
            .expect("append");

        let after = list_threads(&state, alice).await.expect("list");
        assert_eq!(after[0].id, with_bob.id);
        assert_eq!(
            after[0].last_message.as_ref().map(|m| m.body.as_str()),
            Some("still interested?")
        );
        assert!(after[1].last_message.is_none());
    }

    #[tokio::test]
    async fn messages_read_oldest_first_with_a_recent_window() {
        let state = test_state().await;
        let alice = user(&state, "alice@example.com", "Alice").await;
        let bob = user(&state, "bob@example.com", "Bob").await;
        let thread = create_or_get_thread(&state, alice, bob, None)
            .await
            .expect("create");

        for n in 1..=3 {
            append_message(&state, thread.id, alice, &format!("message {n}"))
                .await
                .expect("append");
        }

        let all = list_messages(&state, thread.id, bob, None)
            .await
            .expect("list");
        let bodies: Vec<&str> = all.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["message 1", "message 2", "message 3"]);

        let window = list_messages(&state, thread.id, bob, Some(2))
            .await
            .expect("list window");
        let bodies: Vec<&str> = window.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["message 2", "message 3"]);
    }
}
