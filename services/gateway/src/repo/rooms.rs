use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::with_retries;

pub struct RoomRow {
    pub id: Uuid,
    pub room_code: String,
    pub sport_tag: String,
    pub room_name: Option<String>,
    pub teams: Option<Vec<String>>,
    pub game_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

fn row_to_room(row: sqlx::postgres::PgRow) -> RoomRow {
    RoomRow {
        id: row.get("id"),
        room_code: row.get("room_code"),
        sport_tag: row.get("sport_tag"),
        room_name: row.get("room_name"),
        teams: row.get("teams"),
        game_date: row.get("game_date"),
        created_at: row.get("created_at"),
        last_activity_at: row.get("last_activity_at"),
    }
}

/// First write wins for `sport_tag` and metadata; subsequent joiners only
/// bump `last_activity_at` (spec §4.2).
pub async fn upsert_room(
    pool: &PgPool,
    room_code: &str,
    sport_tag: &str,
    room_name: Option<&str>,
    teams: Option<&[String]>,
    game_date: Option<&str>,
) -> Result<RoomRow, sqlx::Error> {
    with_retries(|| async {
        let row = sqlx::query(
            r#"INSERT INTO rooms (room_code, sport_tag, room_name, teams, game_date)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (room_code) DO UPDATE SET last_activity_at = now()
               RETURNING id, room_code, sport_tag, room_name, teams, game_date, created_at, last_activity_at"#,
        )
        .bind(room_code)
        .bind(sport_tag)
        .bind(room_name)
        .bind(teams)
        .bind(game_date)
        .fetch_one(pool)
        .await?;
        Ok(row_to_room(row))
    })
    .await
}

pub async fn touch_room_activity(pool: &PgPool, room_id: Uuid) -> Result<(), sqlx::Error> {
    with_retries(|| async {
        sqlx::query("UPDATE rooms SET last_activity_at = now() WHERE id = $1")
            .bind(room_id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

/// Deletes rooms whose `last_activity_at` is past the cutoff and which have
/// no active sessions (spec §4.2 `purgeStale`, second half).
pub async fn delete_stale_rooms(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    with_retries(|| async {
        let result = sqlx::query(
            r#"DELETE FROM rooms
               WHERE last_activity_at < $1
                 AND NOT EXISTS (
                     SELECT 1 FROM sessions s
                     WHERE s.room_id = rooms.id AND s.is_active
                 )"#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    })
    .await
}
