use chrono::Utc;
use protocol::{ServerEvent, SessionExpiredPayload};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::repo;
use crate::state::AppState;

/// A live user older than this is force-expired (spec §4.5).
const IDLE_SESSION_MAX_AGE: Duration = Duration::from_secs(4 * 60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const PURGE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// `(B).expireDisconnectedSessions()`'s window: a session idle past this is
/// marked inactive even if its socket never cleanly disconnected.
const DISCONNECTED_SESSION_WINDOW: chrono::Duration = chrono::Duration::minutes(60);
const STALE_ROOM_MAX_AGE_DAYS: i64 = 7;

async fn run_ticking<F, Fut>(interval: Duration, cancel: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => tick().await,
        }
    }
}

/// Drops any socket whose live user has been in a room longer than
/// [`IDLE_SESSION_MAX_AGE`], emitting `session-expired` first (spec §4.5).
pub fn spawn_idle_socket_sweeper(state: AppState, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run_ticking(SWEEP_INTERVAL, cancel, || async {
            let idle = state.rooms.find_idle_sockets(IDLE_SESSION_MAX_AGE).await;
            for socket_id in idle {
                info!(socket_id, "expiring idle session");
                state
                    .delay_queue
                    .deliver_immediately(
                        &socket_id,
                        ServerEvent::SessionExpired(SessionExpiredPayload {
                            reason: "idle too long".to_owned(),
                        }),
                    )
                    .await;
                state.connections.expire(&socket_id).await;
            }
        })
        .await;
    })
}

pub fn spawn_session_expiry_sweeper(state: AppState, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run_ticking(SWEEP_INTERVAL, cancel, || async {
            let cutoff = Utc::now() - DISCONNECTED_SESSION_WINDOW;
            match repo::sessions::expire_disconnected_sessions(&state.pool, cutoff).await {
                Ok(count) if count > 0 => info!(count, "expired disconnected sessions"),
                Ok(_) => {}
                Err(err) => error!(error = %err, "failed to expire disconnected sessions"),
            }
        })
        .await;
    })
}

pub fn spawn_stale_purge_sweeper(state: AppState, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run_ticking(PURGE_INTERVAL, cancel, || async {
            let cutoff = Utc::now() - chrono::Duration::days(STALE_ROOM_MAX_AGE_DAYS);
            match repo::sessions::purge_stale_sessions(&state.pool, cutoff).await {
                Ok(count) if count > 0 => info!(count, "purged stale sessions"),
                Ok(_) => {}
                Err(err) => error!(error = %err, "failed to purge stale sessions"),
            }
            match repo::rooms::delete_stale_rooms(&state.pool, cutoff).await {
                Ok(count) if count > 0 => info!(count, "purged stale rooms"),
                Ok(_) => {}
                Err(err) => error!(error = %err, "failed to purge stale rooms"),
            }
        })
        .await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn run_ticking_stops_as_soon_as_cancel_fires() {
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        cancel.cancel();
        run_ticking(Duration::from_millis(10), cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {}
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
