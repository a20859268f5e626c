use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::with_retries;

pub struct MessageRow {
    pub id: Uuid,
    pub room_id: Uuid,
    pub session_id: Option<Uuid>,
    pub sender_nickname: String,
    pub content: String,
    pub server_timestamp: DateTime<Utc>,
}

fn row_to_message(row: sqlx::postgres::PgRow) -> MessageRow {
    MessageRow {
        id: row.get("id"),
        room_id: row.get("room_id"),
        session_id: row.get("session_id"),
        sender_nickname: row.get("sender_nickname"),
        content: row.get("content"),
        server_timestamp: row.get("server_timestamp"),
    }
}

pub async fn append_message(
    pool: &PgPool,
    room_id: Uuid,
    session_id: Option<Uuid>,
    sender_nickname: &str,
    content: &str,
) -> Result<MessageRow, sqlx::Error> {
    with_retries(|| async {
        let row = sqlx::query(
            r#"INSERT INTO messages (room_id, session_id, sender_nickname, content)
               VALUES ($1, $2, $3, $4)
               RETURNING id, room_id, session_id, sender_nickname, content, server_timestamp"#,
        )
        .bind(room_id)
        .bind(session_id)
        .bind(sender_nickname)
        .bind(content)
        .fetch_one(pool)
        .await?;
        Ok(row_to_message(row))
    })
    .await
}

/// Oldest-first, capped at `limit` (spec §4.3 hydrates the in-memory cache
/// from this on a room's first live join).
pub async fn load_recent_messages(
    pool: &PgPool,
    room_id: Uuid,
    limit: i64,
) -> Result<Vec<MessageRow>, sqlx::Error> {
    with_retries(|| async {
        let rows = sqlx::query(
            r#"SELECT id, room_id, session_id, sender_nickname, content, server_timestamp
               FROM messages
               WHERE room_id = $1
               ORDER BY server_timestamp DESC
               LIMIT $2"#,
        )
        .bind(room_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        let mut messages: Vec<MessageRow> = rows.into_iter().map(row_to_message).collect();
        messages.reverse();
        Ok(messages)
    })
    .await
}
