use chrono::Utc;
use protocol::{
    GameTimeWire, JoinRoomRequest, JoinedRoomPayload, MessageWire, NewMessagePayload,
    OffsetUpdatedPayload, RoomMeta, ServerEvent, SendMessageRequest, SyncConfirmedPayload,
    SyncGameTimeRequest, UserJoinedPayload, UserLeftPayload, UserSummary, UserSyncedPayload,
};
use sport_clock::{GameTime, Sport};
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::rate_limit::retry_after_secs;
use crate::repo;
use crate::room::CachedMessage;
use crate::state::AppState;
use crate::validation;

/// Per-socket context the read loop carries between events. Nothing here is
/// shared across sockets — everything cross-socket lives behind `AppState`.
pub struct SocketSession {
    pub socket_id: String,
    pub user_id: Option<String>,
    pub room_code: Option<String>,
    pub nickname: Option<String>,
    pub session_id: Option<Uuid>,
}

impl SocketSession {
    pub fn new(socket_id: String, user_id: Option<String>) -> Self {
        Self {
            socket_id,
            user_id,
            room_code: None,
            nickname: None,
            session_id: None,
        }
    }
}

pub async fn handle_join_room(
    state: &AppState,
    session: &mut SocketSession,
    req: JoinRoomRequest,
) -> Result<(), GatewayError> {
    let room_code = validation::normalize_room_code(&req.room_code).map_err(GatewayError::InvalidRoomId)?;
    let nickname = validation::validate_nickname(&req.nickname).map_err(GatewayError::InvalidNickname)?;
    let requested_sport_tag = req.sport.as_deref().unwrap_or("basketball");
    if Sport::from_tag(requested_sport_tag).is_none() {
        return Err(GatewayError::InvalidSport(format!("unknown sport tag '{requested_sport_tag}'")));
    }

    let meta = req.room_meta.unwrap_or_default();
    let client_session_id = req.session_id.as_deref().and_then(|s| Uuid::parse_str(s).ok());

    let (session_row, room_row, is_reconnect) = repo::sessions::get_or_create_session(
        &state.pool,
        &room_code,
        requested_sport_tag,
        meta.room_name.as_deref(),
        meta.teams.as_deref(),
        meta.game_date.as_deref(),
        &nickname,
        session.user_id.as_deref(),
        client_session_id,
    )
    .await
    .map_err(|err| GatewayError::StoreFailure(err.to_string()))?;

    // The room's sport is fixed by its durable row, not this joiner's
    // request, since it's immutable after the first join (spec §3).
    let sport = Sport::from_tag(&room_row.sport_tag)
        .ok_or_else(|| GatewayError::StoreFailure(format!("room has unrecognised sport tag '{}'", room_row.sport_tag)))?;

    repo::sessions::connect_session(&state.pool, session_row.id, &session.socket_id)
        .await
        .map_err(|err| GatewayError::StoreFailure(err.to_string()))?;

    let recent = repo::messages::load_recent_messages(&state.pool, room_row.id, crate::room::MESSAGE_CACHE_CAP as i64)
        .await
        .map_err(|err| GatewayError::StoreFailure(err.to_string()))?;
    let cached: Vec<CachedMessage> = recent
        .into_iter()
        .map(|m| CachedMessage {
            id: m.id,
            sender_session_id: m.session_id,
            sender_nickname: m.sender_nickname,
            content: m.content,
            server_timestamp: m.server_timestamp,
        })
        .collect();

    let room_meta = RoomMeta {
        room_name: room_row.room_name.clone(),
        teams: room_row.teams.clone(),
        game_date: room_row.game_date.clone(),
    };
    let room = state
        .rooms
        .get_or_init(&room_code, || crate::room::Room::new(room_row.id, room_code.clone(), sport, room_meta.clone()))
        .await;

    let restored = match (
        session_row.game_time_period,
        session_row.game_time_minutes,
        session_row.game_time_seconds,
        session_row.elapsed_seconds,
    ) {
        (Some(period), Some(minutes), Some(seconds), Some(elapsed)) => Some((
            GameTime {
                period: period as u32,
                minutes: minutes as u32,
                seconds: seconds as u32,
            },
            elapsed as u64,
        )),
        _ => None,
    };

    let (users_snapshot, messages_snapshot, restored_sync) = {
        let mut room = room.lock().await;
        room.hydrate_messages(cached);
        room.add_user(session.socket_id.clone(), nickname.clone(), session_row.id, restored);

        let restored_sync = restored.map(|(game_time, _)| {
            let user = room
                .users
                .get(&session.socket_id)
                .expect("user was just added to this room");
            SyncConfirmedPayload {
                offset_ms: user.offset_ms,
                is_baseline: user.offset_ms == 0,
                elapsed_seconds: user.elapsed_seconds.unwrap_or(0),
                game_time: GameTimeWire {
                    period: game_time.period,
                    minutes: game_time.minutes,
                    seconds: game_time.seconds,
                },
            }
        });

        let users_snapshot: Vec<UserSummary> = room.users.values().map(crate::room::User::to_summary).collect();
        let messages_snapshot: Vec<MessageWire> = room.messages.iter().map(CachedMessage::to_wire).collect();
        (users_snapshot, messages_snapshot, restored_sync)
    };

    session.room_code = Some(room_code.clone());
    session.nickname = Some(nickname.clone());
    session.session_id = Some(session_row.id);

    let joined_payload = JoinedRoomPayload {
        session_id: session_row.id.to_string(),
        is_reconnect,
        sport: sport.tag().to_owned(),
        room_meta: Some(room_meta),
        users: users_snapshot,
        messages: messages_snapshot,
        restored_sync,
    };
    state
        .delay_queue
        .deliver_immediately(&session.socket_id, ServerEvent::JoinedRoom(joined_payload))
        .await;

    let summary = {
        let room = room.lock().await;
        room.users
            .get(&session.socket_id)
            .expect("user was just added to this room")
            .to_summary()
    };
    broadcast_to_room_except(state, &room_code, &session.socket_id, ServerEvent::UserJoined(UserJoinedPayload { user: summary })).await;

    Ok(())
}

pub async fn handle_sync_game_time(
    state: &AppState,
    session: &mut SocketSession,
    req: SyncGameTimeRequest,
) -> Result<(), GatewayError> {
    let room_code = session.room_code.clone().ok_or(GatewayError::MustJoinFirst)?;
    let Some(room) = state.rooms.get(&room_code).await else {
        return Err(GatewayError::MustJoinFirst);
    };

    let outcome = {
        let mut room = room.lock().await;
        room.update_user_game_time(&session.socket_id, req.period, req.minutes, req.seconds)
            .map_err(|err| GatewayError::InvalidTime(err.to_string()))?
    };

    if let Some(session_id) = session.session_id {
        let pool = state.pool.clone();
        let elapsed = outcome.elapsed_seconds;
        let (period, minutes, seconds) = (req.period, req.minutes, req.seconds);
        tokio::spawn(async move {
            if let Err(err) = repo::sessions::update_session_game_time(&pool, session_id, period, minutes, seconds, elapsed).await {
                warn!(error = %err, "failed to persist game-time sync");
            }
        });
    }

    let game_time = GameTimeWire {
        period: req.period,
        minutes: req.minutes,
        seconds: req.seconds,
    };
    state
        .delay_queue
        .deliver_immediately(
            &session.socket_id,
            ServerEvent::SyncConfirmed(SyncConfirmedPayload {
                offset_ms: outcome.offset_ms,
                is_baseline: outcome.is_baseline,
                elapsed_seconds: outcome.elapsed_seconds,
                game_time,
            }),
        )
        .await;

    let nickname = session.nickname.clone().unwrap_or_default();
    broadcast_to_room_except(
        state,
        &room_code,
        &session.socket_id,
        ServerEvent::UserSynced(UserSyncedPayload {
            socket_id: session.socket_id.clone(),
            nickname,
            offset_ms: outcome.offset_ms,
            is_baseline: outcome.is_baseline,
            elapsed_seconds: outcome.elapsed_seconds,
            game_time,
        }),
    )
    .await;

    for (changed_socket_id, new_offset) in outcome.changed_offsets {
        state
            .delay_queue
            .deliver_immediately(&changed_socket_id, ServerEvent::OffsetUpdated(OffsetUpdatedPayload { offset_ms: new_offset }))
            .await;

        let changed_summary = {
            let room = room.lock().await;
            room.users.get(&changed_socket_id).map(crate::room::User::to_summary)
        };
        if let Some(summary) = changed_summary {
            if let Some(game_time) = summary.game_time {
                broadcast_to_room_except(
                    state,
                    &room_code,
                    &changed_socket_id,
                    ServerEvent::UserSynced(UserSyncedPayload {
                        socket_id: summary.socket_id,
                        nickname: summary.nickname,
                        offset_ms: summary.offset_ms,
                        is_baseline: summary.offset_ms == 0,
                        elapsed_seconds: summary.elapsed_seconds.unwrap_or(0),
                        game_time,
                    }),
                )
                .await;
            }
        }
    }

    Ok(())
}

pub async fn handle_send_message(
    state: &AppState,
    session: &mut SocketSession,
    req: SendMessageRequest,
) -> Result<(), GatewayError> {
    let room_code = session.room_code.clone().ok_or(GatewayError::MustJoinFirst)?;
    let Some(room) = state.rooms.get(&room_code).await else {
        return Err(GatewayError::MustJoinFirst);
    };

    if let Err(wait) = state.message_limiter.check(&session.socket_id).await {
        return Err(GatewayError::RateLimited {
            retry_after_secs: retry_after_secs(wait),
        });
    }

    let content = validation::validate_message_content(&req.content).map_err(GatewayError::InvalidMessage)?;

    let id = Uuid::new_v4();
    let now = Utc::now();
    let nickname = session.nickname.clone().unwrap_or_default();

    if let Some(session_id) = session.session_id {
        let pool = state.pool.clone();
        let room_id = room.lock().await.room_id;
        let nickname = nickname.clone();
        let content = content.clone();
        tokio::spawn(async move {
            if let Err(err) = repo::messages::append_message(&pool, room_id, Some(session_id), &nickname, &content).await {
                warn!(error = %err, "failed to persist message");
            }
        });
    }

    let message = CachedMessage {
        id,
        sender_session_id: session.session_id,
        sender_nickname: nickname,
        content,
        server_timestamp: now,
    };
    let wire = message.to_wire();

    let recipients: Vec<(String, bool)> = {
        let mut room = room.lock().await;
        room.add_message(message);
        room.users
            .values()
            .map(|u| (u.socket_id.clone(), u.is_synced() && u.offset_ms > 0))
            .collect()
    };

    let event = ServerEvent::NewMessage(NewMessagePayload { message: wire });
    let now_instant = Instant::now();
    for (socket_id, is_delayed) in recipients {
        if socket_id == session.socket_id || !is_delayed {
            state.delay_queue.deliver_immediately(&socket_id, event.clone()).await;
            continue;
        }
        let offset_ms = {
            let room = room.lock().await;
            room.users.get(&socket_id).map_or(0, |u| u.offset_ms)
        };
        let deliver_at = now_instant + Duration::from_millis(offset_ms);
        state.delay_queue.enqueue(&socket_id, event.clone(), deliver_at).await;
    }

    Ok(())
}

/// Runs on every path that tears down a socket: clean disconnect, read
/// error, or a forced expiry from the idle sweeper.
pub async fn handle_disconnect(state: &AppState, session: &SocketSession) {
    state.delay_queue.clear_queue(&session.socket_id).await;
    state.message_limiter.clear(&session.socket_id).await;

    if let Some(session_id) = session.session_id {
        let pool = state.pool.clone();
        tokio::spawn(async move {
            if let Err(err) = repo::sessions::disconnect_session(&pool, session_id).await {
                warn!(error = %err, "failed to persist disconnect");
            }
        });
    }

    let Some(room_code) = session.room_code.clone() else { return };
    let Some(room) = state.rooms.get(&room_code).await else { return };

    let removed = room.lock().await.remove_user(&session.socket_id);
    if let Some(user) = removed {
        broadcast_to_room_except(
            state,
            &room_code,
            &session.socket_id,
            ServerEvent::UserLeft(UserLeftPayload {
                socket_id: user.socket_id,
                nickname: user.nickname,
            }),
        )
        .await;
    }
    state.rooms.remove_if_empty(&room_code).await;
}

async fn broadcast_to_room_except(state: &AppState, room_code: &str, except_socket_id: &str, event: ServerEvent) {
    let Some(room) = state.rooms.get(room_code).await else { return };
    let recipients: Vec<String> = {
        let room = room.lock().await;
        room.users.keys().filter(|id| id.as_str() != except_socket_id).cloned().collect()
    };
    for socket_id in recipients {
        state.delay_queue.deliver_immediately(&socket_id, event.clone()).await;
    }
}
