use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::messages::repo_types::{MessageRow, ThreadRow, ThreadWithNames};

/// Normalizes an unordered participant pair to the stored (low, high) form.
fn ordered(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

const THREAD_WITH_NAMES: &str = r#"
    SELECT t.id, t.listing_id, t.participant_low, t.participant_high,
           ul.display_name AS low_display_name, uh.display_name AS high_display_name,
           t.created_at, t.updated_at
    FROM message_threads t
    JOIN users ul ON ul.id = t.participant_low
    JOIN users uh ON uh.id = t.participant_high
"#;

impl ThreadRow {
    /// Find the thread for an unordered pair within one listing scope.
    /// `IS ?` keeps the unscoped (NULL) case comparable.
    pub async fn find_by_pair(
        db: &SqlitePool,
        a: Uuid,
        b: Uuid,
        listing_id: Option<Uuid>,
    ) -> sqlx::Result<Option<ThreadRow>> {
        let (low, high) = ordered(a, b);
        sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, listing_id, participant_low, participant_high, created_at, updated_at
            FROM message_threads
            WHERE participant_low = ? AND participant_high = ? AND listing_id IS ?
            "#,
        )
        .bind(low)
        .bind(high)
        .bind(listing_id)
        .fetch_optional(db)
        .await
    }

    /// Insert a thread for the pair. A unique violation means a concurrent
    /// creator won; callers retry the lookup.
    pub async fn insert(
        db: &SqlitePool,
        a: Uuid,
        b: Uuid,
        listing_id: Option<Uuid>,
    ) -> sqlx::Result<ThreadRow> {
        let (low, high) = ordered(a, b);
        let now = OffsetDateTime::now_utc();
        sqlx::query_as::<_, ThreadRow>(
            r#"
            INSERT INTO message_threads (id, listing_id, participant_low, participant_high, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, listing_id, participant_low, participant_high, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(listing_id)
        .bind(low)
        .bind(high)
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> sqlx::Result<Option<ThreadRow>> {
        sqlx::query_as::<_, ThreadRow>(
            r#"
            SELECT id, listing_id, participant_low, participant_high, created_at, updated_at
            FROM message_threads
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn with_names(db: &SqlitePool, id: Uuid) -> sqlx::Result<Option<ThreadWithNames>> {
        sqlx::query_as::<_, ThreadWithNames>(&format!("{THREAD_WITH_NAMES} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// All threads a user belongs to, most recently active first.
    pub async fn list_for_user(
        db: &SqlitePool,
        user_id: Uuid,
    ) -> sqlx::Result<Vec<ThreadWithNames>> {
        sqlx::query_as::<_, ThreadWithNames>(&format!(
            "{THREAD_WITH_NAMES} WHERE t.participant_low = ? OR t.participant_high = ? ORDER BY t.updated_at DESC"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    /// Mark the thread as active now. Called on every appended message.
    pub async fn touch(db: &SqlitePool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("UPDATE message_threads SET updated_at = ? WHERE id = ?")
            .bind(OffsetDateTime::now_utc())
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

impl MessageRow {
    pub async fn insert(
        db: &SqlitePool,
        thread_id: Uuid,
        sender_id: Uuid,
        body: &str,
    ) -> sqlx::Result<MessageRow> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, thread_id, sender_id, body, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, thread_id, sender_id, body, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(thread_id)
        .bind(sender_id)
        .bind(body)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(db)
        .await
    }

    /// Messages of a thread, oldest first. With a limit, the window is the
    /// most recent `limit` messages, still oldest first. LIMIT -1 is how
    /// SQLite spells "no limit".
    pub async fn list_for_thread(
        db: &SqlitePool,
        thread_id: Uuid,
        limit: Option<i64>,
    ) -> sqlx::Result<Vec<MessageRow>> {
        let mut rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, thread_id, sender_id, body, created_at
            FROM messages
            WHERE thread_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(thread_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(db)
        .await?;
        rows.reverse();
        Ok(rows)
    }

    pub async fn last_for_thread(
        db: &SqlitePool,
        thread_id: Uuid,
    ) -> sqlx::Result<Option<MessageRow>> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, thread_id, sender_id, body, created_at
            FROM messages
            WHERE thread_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(thread_id)
        .fetch_optional(db)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::User;
    use crate::error::is_unique_violation;
    use crate::test_support::test_pool;

    async fn two_users(db: &SqlitePool) -> (Uuid, Uuid) {
        let a = User::create(db, "a@example.com", "hash", "Alice")
            .await
            .expect("create a");
        let b = User::create(db, "b@example.com", "hash", "Bob")
            .await
            .expect("create b");
        (a.id, b.id)
    }

    #[tokio::test]
    async fn pair_lookup_ignores_argument_order() {
        let db = test_pool().await;
        let (a, b) = two_users(&db).await;
        let created = ThreadRow::insert(&db, a, b, None).await.expect("insert");

        let forward = ThreadRow::find_by_pair(&db, a, b, None)
            .await
            .expect("query")
            .expect("found");
        let backward = ThreadRow::find_by_pair(&db, b, a, None)
            .await
            .expect("query")
            .expect("found");
        assert_eq!(forward.id, created.id);
        assert_eq!(backward.id, created.id);
    }

    #[tokio::test]
    async fn duplicate_pair_in_same_scope_violates_uniqueness() {
        let db = test_pool().await;
        let (a, b) = two_users(&db).await;
        ThreadRow::insert(&db, a, b, None).await.expect("insert");

        let err = ThreadRow::insert(&db, b, a, None).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn scopes_are_distinct_threads() {
        let db = test_pool().await;
        let (a, b) = two_users(&db).await;
        let seller = User::create(&db, "s@example.com", "hash", "Seller")
            .await
            .expect("create seller");
        let listing = crate::listings::Listing::create(&db, seller.id, "Lamp", 1_500)
            .await
            .expect("create listing");

        let unscoped = ThreadRow::insert(&db, a, b, None).await.expect("insert");
        let scoped = ThreadRow::insert(&db, a, b, Some(listing.id))
            .await
            .expect("insert scoped");
        assert_ne!(unscoped.id, scoped.id);

        let found = ThreadRow::find_by_pair(&db, a, b, Some(listing.id))
            .await
            .expect("query")
            .expect("found");
        assert_eq!(found.id, scoped.id);
    }

    #[tokio::test]
    async fn limited_listing_returns_most_recent_window_oldest_first() {
        let db = test_pool().await;
        let (a, b) = two_users(&db).await;
        let thread = ThreadRow::insert(&db, a, b, None).await.expect("insert");

        for n in 1..=5 {
            MessageRow::insert(&db, thread.id, a, &format!("message {n}"))
                .await
                .expect("insert message");
        }

        let all = MessageRow::list_for_thread(&db, thread.id, None)
            .await
            .expect("list");
        let bodies: Vec<&str> = all.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(
            bodies,
            vec!["message 1", "message 2", "message 3", "message 4", "message 5"]
        );

        let window = MessageRow::list_for_thread(&db, thread.id, Some(2))
            .await
            .expect("list window");
        let bodies: Vec<&str> = window.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["message 4", "message 5"]);

        let last = MessageRow::last_for_thread(&db, thread.id)
            .await
            .expect("last")
            .expect("exists");
        assert_eq!(last.body, "message 5");
    }
}
