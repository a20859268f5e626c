use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::rooms::{self, RoomRow};
use super::with_retries;

/// Sessions rejoin an existing row within this window of their last
/// activity; past it a matching nickname starts a fresh session instead
/// (spec §4.2 `getOrCreateSession`).
const REJOIN_WINDOW: Duration = Duration::minutes(60);

pub struct SessionRow {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Option<String>,
    pub nickname: String,
    pub current_socket_id: Option<String>,
    pub is_active: bool,
    pub last_seen_at: DateTime<Utc>,
    pub game_time_period: Option<i32>,
    pub game_time_minutes: Option<i32>,
    pub game_time_seconds: Option<i32>,
    pub elapsed_seconds: Option<i64>,
}

fn row_to_session(row: sqlx::postgres::PgRow) -> SessionRow {
    SessionRow {
        id: row.get("id"),
        room_id: row.get("room_id"),
        user_id: row.get("user_id"),
        nickname: row.get("nickname"),
        current_socket_id: row.get("current_socket_id"),
        is_active: row.get("is_active"),
        last_seen_at: row.get("last_seen_at"),
        game_time_period: row.get("game_time_period"),
        game_time_minutes: row.get("game_time_minutes"),
        game_time_seconds: row.get("game_time_seconds"),
        elapsed_seconds: row.get("elapsed_seconds"),
    }
}

async fn find_by_id(
    pool: &PgPool,
    session_id: Uuid,
    cutoff: DateTime<Utc>,
) -> Result<Option<SessionRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, room_id, user_id, nickname, current_socket_id, is_active,
                  last_seen_at, game_time_period, game_time_minutes, game_time_seconds, elapsed_seconds
           FROM sessions WHERE id = $1 AND is_active AND last_seen_at >= $2"#,
    )
    .bind(session_id)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_session))
}

async fn find_active_by_room_nickname(
    pool: &PgPool,
    room_id: Uuid,
    nickname: &str,
    cutoff: DateTime<Utc>,
) -> Result<Option<SessionRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, room_id, user_id, nickname, current_socket_id, is_active,
                  last_seen_at, game_time_period, game_time_minutes, game_time_seconds, elapsed_seconds
           FROM sessions
           WHERE room_id = $1 AND nickname = $2 AND is_active AND last_seen_at >= $3"#,
    )
    .bind(room_id)
    .bind(nickname)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_session))
}

/// Returns the session row plus whether it was reactivated from an existing
/// row (`xmax <> 0`) rather than freshly inserted.
async fn upsert_by_room_nickname(
    pool: &PgPool,
    room_id: Uuid,
    nickname: &str,
    user_id: Option<&str>,
) -> Result<(SessionRow, bool), sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO sessions (room_id, nickname, user_id, is_active, last_seen_at)
           VALUES ($1, $2, $3, true, now())
           ON CONFLICT (room_id, nickname) DO UPDATE
               SET is_active = true, last_seen_at = now(), user_id = COALESCE(sessions.user_id, EXCLUDED.user_id)
           RETURNING id, room_id, user_id, nickname, current_socket_id, is_active,
                     last_seen_at, game_time_period, game_time_minutes, game_time_seconds, elapsed_seconds,
                     (xmax <> 0) AS was_existing_row"#,
    )
    .bind(room_id)
    .bind(nickname)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    let was_existing_row: bool = row.get("was_existing_row");
    Ok((row_to_session(row), was_existing_row))
}

/// Resolves or creates the session for a join, per spec §4.2's three-way
/// order: an exact `clientSessionId` match, then an active same-room,
/// same-nickname match within [`REJOIN_WINDOW`], then upsert-by-nickname.
/// Also upserts the room (first write wins for sport tag/metadata). The
/// third element of the return is `isReconnect`.
pub async fn get_or_create_session(
    pool: &PgPool,
    room_code: &str,
    sport_tag: &str,
    room_name: Option<&str>,
    teams: Option<&[String]>,
    game_date: Option<&str>,
    nickname: &str,
    user_id: Option<&str>,
    client_session_id: Option<Uuid>,
) -> Result<(SessionRow, RoomRow, bool), sqlx::Error> {
    with_retries(|| async {
        let room = rooms::upsert_room(pool, room_code, sport_tag, room_name, teams, game_date).await?;
        let cutoff = Utc::now() - REJOIN_WINDOW;

        if let Some(client_session_id) = client_session_id {
            if let Some(existing) = find_by_id(pool, client_session_id, cutoff).await? {
                if existing.room_id == room.id && existing.nickname == nickname {
                    return Ok((existing, room, true));
                }
            }
        }

        if let Some(existing) = find_active_by_room_nickname(pool, room.id, nickname, cutoff).await? {
            return Ok((existing, room, true));
        }

        let (session, was_existing_row) = upsert_by_room_nickname(pool, room.id, nickname, user_id).await?;
        Ok((session, room, was_existing_row))
    })
    .await
}

pub async fn connect_session(pool: &PgPool, session_id: Uuid, socket_id: &str) -> Result<(), sqlx::Error> {
    with_retries(|| async {
        sqlx::query(
            "UPDATE sessions SET current_socket_id = $2, is_active = true, last_seen_at = now() WHERE id = $1",
        )
        .bind(session_id)
        .bind(socket_id)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Clears the socket and bumps `last_seen_at` but leaves `is_active`
/// unchanged — a clean disconnect still leaves the session reconnectable
/// until [`REJOIN_WINDOW`] elapses (spec §4.2 `disconnectSession`); going
/// stale past that window is `expire_disconnected_sessions`'s job instead.
pub async fn disconnect_session(pool: &PgPool, session_id: Uuid) -> Result<(), sqlx::Error> {
    with_retries(|| async {
        sqlx::query("UPDATE sessions SET current_socket_id = NULL, last_seen_at = now() WHERE id = $1")
            .bind(session_id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

pub async fn update_session_game_time(
    pool: &PgPool,
    session_id: Uuid,
    period: u32,
    minutes: u32,
    seconds: u32,
    elapsed_seconds: u64,
) -> Result<(), sqlx::Error> {
    with_retries(|| async {
        sqlx::query(
            r#"UPDATE sessions
               SET game_time_period = $2, game_time_minutes = $3, game_time_seconds = $4,
                   elapsed_seconds = $5, last_seen_at = now()
               WHERE id = $1"#,
        )
        .bind(session_id)
        .bind(period as i32)
        .bind(minutes as i32)
        .bind(seconds as i32)
        .bind(elapsed_seconds as i64)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn get_session_game_time(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Option<(i32, i32, i32, i64)>, sqlx::Error> {
    with_retries(|| async {
        let row = sqlx::query(
            "SELECT game_time_period, game_time_minutes, game_time_seconds, elapsed_seconds FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.and_then(|row| {
            let period: Option<i32> = row.get("game_time_period");
            let minutes: Option<i32> = row.get("game_time_minutes");
            let seconds: Option<i32> = row.get("game_time_seconds");
            let elapsed: Option<i64> = row.get("elapsed_seconds");
            Some((period?, minutes?, seconds?, elapsed?))
        }))
    })
    .await
}

/// Flips any session whose socket never cleanly disconnected to inactive
/// once it has been quiet past the window (spec §4.2 `expireDisconnectedSessions`,
/// driven by the idle-socket sweeper).
pub async fn expire_disconnected_sessions(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    with_retries(|| async {
        let result = sqlx::query(
            "UPDATE sessions SET is_active = false, current_socket_id = NULL WHERE is_active AND last_seen_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    })
    .await
}

pub async fn purge_stale_sessions(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    with_retries(|| async {
        let result = sqlx::query("DELETE FROM sessions WHERE NOT is_active AND last_seen_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    })
    .await
}
