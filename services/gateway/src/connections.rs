use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Maps a live socket id to the token that tears down its read loop. The
/// idle-socket sweeper (spec §4.5) uses this to force-close a socket from
/// outside the loop that owns it.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, socket_id: String, token: CancellationToken) {
        self.tokens.write().await.insert(socket_id, token);
    }

    pub async fn unregister(&self, socket_id: &str) {
        self.tokens.write().await.remove(socket_id);
    }

    /// Cancels the socket's token if it's still registered. A no-op if the
    /// socket already disconnected on its own.
    pub async fn expire(&self, socket_id: &str) {
        if let Some(token) = self.tokens.read().await.get(socket_id) {
            token.cancel();
        }
    }

    /// Drains the registry and cancels every still-registered token, so a
    /// server shutdown closes all live sockets instead of leaving them open
    /// (spec §4.5 shutdown contract: "close all sockets with a clean reason
    /// code").
    pub async fn cancel_all(&self) {
        let tokens = std::mem::take(&mut *self.tokens.write().await);
        for token in tokens.into_values() {
            token.cancel();
        }
    }
}
