//! # Message Store
//!
//! Durable persistence for direct messages and their read state, and the
//! owner of conversation history queries. The realtime hub and the REST
//! surface both write through this service, so persisted state is
//! consistent regardless of which path produced it.

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::message::{ConversationSummary, Message, MessageKind, NewMessage};

/// History queries are capped; older messages stay reachable through the
/// store, this is purely a response-size guard.
const HISTORY_LIMIT: i64 = 200;

/// Storage seam between the hub and PostgreSQL.
///
/// `mark_read` is an atomic conditional update: it reports `true` exactly
/// once per message, and only for the message's receiver. Everything else
/// (missing id, foreign message, already read) is `false`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn save(&self, message: NewMessage) -> AppResult<Message>;

    async fn mark_read(&self, message_id: Uuid, reader_id: Uuid) -> AppResult<bool>;

    /// Both directions of the exchange between two users, oldest first.
    async fn conversation(&self, user_a: Uuid, user_b: Uuid) -> AppResult<Vec<Message>>;

    /// Unread messages sent by `sender_id` to `receiver_id`.
    async fn count_unread(&self, receiver_id: Uuid, sender_id: Uuid) -> AppResult<i64>;

    /// One summary per chat partner of `user_id`, newest conversation first.
    async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>>;
}

/// PostgreSQL-backed message store.
pub struct PgMessageStore {
    db: Pool,
}

impl PgMessageStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn save(&self, message: NewMessage) -> AppResult<Message> {
        let id = Uuid::new_v4();
        let client = self.db.get().await?;

        // sent_at comes from the database default so the timestamp is
        // assigned at persistence time, not when the event was received.
        let row = client
            .query_one(
                "INSERT INTO messages \
                     (id, sender_id, receiver_id, content, message_type, image_url, image_file_name) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING id, sender_id, receiver_id, content, message_type, \
                           image_url, image_file_name, sent_at, is_read, read_at",
                &[
                    &id,
                    &message.sender_id,
                    &message.receiver_id,
                    &message.content,
                    &message.kind.as_db(),
                    &message.image_url,
                    &message.image_file_name,
                ],
            )
            .await?;

        message_from_row(&row)
    }

    async fn mark_read(&self, message_id: Uuid, reader_id: Uuid) -> AppResult<bool> {
        let client = self.db.get().await?;

        // Conditional update keeps this idempotent under concurrent calls:
        // exactly one caller observes the flip, everyone else gets false.
        let updated = client
            .execute(
                "UPDATE messages SET is_read = TRUE, read_at = NOW() \
                 WHERE id = $1 AND receiver_id = $2 AND NOT is_read",
                &[&message_id, &reader_id],
            )
            .await?;

        Ok(updated == 1)
    }

    async fn conversation(&self, user_a: Uuid, user_b: Uuid) -> AppResult<Vec<Message>> {
        let client = self.db.get().await?;

        let rows = client
            .query(
                "SELECT id, sender_id, receiver_id, content, message_type, \
                        image_url, image_file_name, sent_at, is_read, read_at \
                 FROM messages \
                 WHERE (sender_id = $1 AND receiver_id = $2) \
                    OR (sender_id = $2 AND receiver_id = $1) \
                 ORDER BY sent_at ASC \
                 LIMIT $3",
                &[&user_a, &user_b, &HISTORY_LIMIT],
            )
            .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn count_unread(&self, receiver_id: Uuid, sender_id: Uuid) -> AppResult<i64> {
        let client = self.db.get().await?;

        let row = client
            .query_one(
                "SELECT COUNT(*) FROM messages \
                 WHERE receiver_id = $1 AND sender_id = $2 AND NOT is_read",
                &[&receiver_id, &sender_id],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn conversations_for(&self, user_id: Uuid) -> AppResult<Vec<ConversationSummary>> {
        let client = self.db.get().await?;

        // 1. Latest message per chat partner.
        let rows = client
            .query(
                "SELECT DISTINCT ON (other_user_id) \
                        id, sender_id, receiver_id, content, message_type, \
                        image_url, image_file_name, sent_at, is_read, read_at, other_user_id \
                 FROM ( \
                     SELECT *, \
                            CASE WHEN sender_id = $1 THEN receiver_id ELSE sender_id END \
                                AS other_user_id \
                     FROM messages \
                     WHERE sender_id = $1 OR receiver_id = $1 \
                 ) m \
                 ORDER BY other_user_id, sent_at DESC",
                &[&user_id],
            )
            .await?;

        // 2. Unread counts per partner, merged in memory.
        let unread_rows = client
            .query(
                "SELECT sender_id, COUNT(*) AS unread FROM messages \
                 WHERE receiver_id = $1 AND NOT is_read \
                 GROUP BY sender_id",
                &[&user_id],
            )
            .await?;

        let mut unread_by_sender: HashMap<Uuid, i64> = HashMap::new();
        for row in unread_rows {
            unread_by_sender.insert(row.get("sender_id"), row.get("unread"));
        }

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let other_user_id: Uuid = row.get("other_user_id");
            summaries.push(ConversationSummary {
                other_user_id,
                last_message: message_from_row(&row)?,
                unread_count: unread_by_sender.remove(&other_user_id).unwrap_or(0),
            });
        }

        summaries.sort_by(|a, b| b.last_message.sent_at.cmp(&a.last_message.sent_at));

        Ok(summaries)
    }
}

fn message_from_row(row: &Row) -> AppResult<Message> {
    let kind_raw: String = row.get("message_type");
    let message_type = MessageKind::from_db(&kind_raw)
        .ok_or_else(|| AppError::Database(format!("invalid message_type: {kind_raw}")))?;

    Ok(Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        message_type,
        image_url: row.get("image_url"),
        image_file_name: row.get("image_file_name"),
        sent_at: row.get("sent_at"),
        is_read: row.get("is_read"),
        read_at: row.get("read_at"),
    })
}
