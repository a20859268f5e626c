use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures_util::{FutureExt, SinkExt, StreamExt};
use protocol::{ClientEvent, ErrorPayload, ServerEvent};
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{identify, Identity};
use crate::error::GatewayError;
use crate::gateway::events::{self, SocketSession};
use crate::rate_limit::retry_after_secs;
use crate::state::AppState;

/// Upgrades the HTTP connection, applying the per-source-IP handshake
/// admission limit before accepting (spec §4.5) and resolving the caller's
/// identity (falling back to guest, per `auth::identify`'s contract) before
/// the socket loop starts.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let source = addr.ip().to_string();
    if let Err(wait) = state.handshake_limiter.check(&source).await {
        warn!(
            source = %source,
            retry_after_secs = retry_after_secs(wait),
            "rejecting handshake, connection rate exceeded"
        );
        return StatusCode::TOO_MANY_REQUESTS.into_response();
    }

    let identity = identify(&headers, state.token_verifier.as_ref()).await;
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
        .into_response()
}

/// Owns one socket end to end: registers it with the delay queue and
/// connection registry, runs the writer task and the inbound read loop, and
/// tears everything down (including `handle_disconnect`) on exit.
async fn handle_socket(socket: WebSocket, state: AppState, identity: Identity) {
    let socket_id = Uuid::new_v4().to_string();
    let user_id = match identity {
        Identity::Authenticated { user_id } => Some(user_id),
        Identity::Guest => None,
    };

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.delay_queue.register_socket(socket_id.clone(), tx).await;

    let cancel = CancellationToken::new();
    state.connections.register(socket_id.clone(), cancel.clone()).await;

    // The delay queue and the idle-socket sweeper both deliver through this
    // channel; a single writer task keeps all socket writes serialized
    // (spec §5).
    let writer_socket_id = socket_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    error!(socket_id = %writer_socket_id, error = %err, "failed to serialize outbound event");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = SocketSession::new(socket_id.clone(), user_id);
    info!(socket_id = %socket_id, "socket connected");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_inbound_text(&state, &mut session, &text).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(socket_id = %session.socket_id, error = %err, "websocket read error");
                    break;
                }
            },
        }
    }

    events::handle_disconnect(&state, &session).await;
    state.connections.unregister(&session.socket_id).await;
    state.delay_queue.clear_queue(&session.socket_id).await;
    state.message_limiter.clear(&session.socket_id).await;
    writer.abort();
    info!(socket_id = %session.socket_id, "socket disconnected");
}

async fn handle_inbound_text(state: &AppState, session: &mut SocketSession, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(err) => {
            state
                .delay_queue
                .deliver_immediately(
                    &session.socket_id,
                    ServerEvent::Error(ErrorPayload {
                        message: format!("invalid message: {err}"),
                    }),
                )
                .await;
            return;
        }
    };

    // An event handler panicking must not take the whole socket's read loop
    // (and everyone else's delivery through the shared dispatcher) down with
    // it; caught here and converted to a generic error reply (spec §7).
    let outcome = AssertUnwindSafe(dispatch(state, session, event)).catch_unwind().await;
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(socket_id = %session.socket_id, "event handler panicked");
            Err(GatewayError::Internal("internal error".to_owned()))
        }
    };

    if let Err(err) = outcome {
        warn!(socket_id = %session.socket_id, code = err.code(), "event rejected");
        state.delay_queue.deliver_immediately(&session.socket_id, err.into()).await;
    }
}

async fn dispatch(state: &AppState, session: &mut SocketSession, event: ClientEvent) -> Result<(), GatewayError> {
    match event {
        ClientEvent::JoinRoom(req) => events::handle_join_room(state, session, req).await,
        ClientEvent::SyncGameTime(req) => events::handle_sync_game_time(state, session, req).await,
        ClientEvent::SendMessage(req) => events::handle_send_message(state, session, req).await,
    }
}
