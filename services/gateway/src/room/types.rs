use chrono::{DateTime, Utc};
use protocol::{GameTimeWire, MessageWire, RoomMeta, UserSummary};
use sport_clock::{GameTime, Sport};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use uuid::Uuid;

/// In-memory cap on a room's recent-message cache (spec §3).
pub const MESSAGE_CACHE_CAP: usize = 50;

/// A connected participant, keyed by socket id within its room.
#[derive(Debug, Clone)]
pub struct User {
    pub socket_id: String,
    pub nickname: String,
    pub session_id: Uuid,
    pub joined_at: Instant,
    pub game_time: Option<GameTime>,
    pub elapsed_seconds: Option<u64>,
    pub offset_ms: u64,
}

impl User {
    pub fn is_synced(&self) -> bool {
        self.elapsed_seconds.is_some()
    }

    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            socket_id: self.socket_id.clone(),
            nickname: self.nickname.clone(),
            is_synced: self.is_synced(),
            offset_ms: self.offset_ms,
            game_time: self.game_time.map(|gt| GameTimeWire {
                period: gt.period,
                minutes: gt.minutes,
                seconds: gt.seconds,
            }),
            elapsed_seconds: self.elapsed_seconds,
        }
    }
}

/// A message as held in a room's bounded cache. Never mutated once created.
#[derive(Debug, Clone)]
pub struct CachedMessage {
    pub id: Uuid,
    pub sender_session_id: Option<Uuid>,
    pub sender_nickname: String,
    pub content: String,
    pub server_timestamp: DateTime<Utc>,
}

impl CachedMessage {
    pub fn to_wire(&self) -> MessageWire {
        MessageWire {
            id: self.id.to_string(),
            sender_session_id: self.sender_session_id.map(|id| id.to_string()),
            sender_nickname: self.sender_nickname.clone(),
            content: self.content.clone(),
            server_timestamp: self.server_timestamp.to_rfc3339(),
        }
    }
}

/// Result of [`Room::update_user_game_time`]: the sender's own derived
/// state plus the subset of *other* users whose offset changed as a side
/// effect of the recompute (spec §4.3).
pub struct SyncOutcome {
    pub offset_ms: u64,
    pub is_baseline: bool,
    pub elapsed_seconds: u64,
    pub changed_offsets: Vec<(String, u64)>,
}

/// One conversation bound to a single sport tag for its whole lifetime.
pub struct Room {
    pub room_id: Uuid,
    pub room_code: String,
    pub sport: Sport,
    pub meta: RoomMeta,
    pub users: HashMap<String, User>,
    pub messages: VecDeque<CachedMessage>,
}

impl Room {
    pub fn new(room_id: Uuid, room_code: String, sport: Sport, meta: RoomMeta) -> Self {
        Self {
            room_id,
            room_code,
            sport,
            meta,
            users: HashMap::new(),
            messages: VecDeque::new(),
        }
    }

    /// Hydrates the message cache from durable storage. Only takes effect
    /// while the cache is empty, so a second caller racing to initialize the
    /// same room can't duplicate history (spec §4.3: "idempotent").
    pub fn hydrate_messages(&mut self, preloaded: Vec<CachedMessage>) {
        if self.messages.is_empty() {
            self.messages.extend(preloaded);
        }
    }

    pub fn add_user(
        &mut self,
        socket_id: String,
        nickname: String,
        session_id: Uuid,
        restored: Option<(GameTime, u64)>,
    ) {
        let (game_time, elapsed_seconds) = match restored {
            Some((gt, elapsed)) => (Some(gt), Some(elapsed)),
            None => (None, None),
        };
        self.users.insert(
            socket_id.clone(),
            User {
                socket_id,
                nickname,
                session_id,
                joined_at: Instant::now(),
                game_time,
                elapsed_seconds,
                offset_ms: 0,
            },
        );
        if elapsed_seconds.is_some() {
            self.recompute_offsets();
        }
    }

    /// Removes a user. If they were the baseline, offsets are recomputed so
    /// the registry's invariants keep holding for whoever is left.
    pub fn remove_user(&mut self, socket_id: &str) -> Option<User> {
        let removed = self.users.remove(socket_id)?;
        if removed.is_synced() && removed.offset_ms == 0 {
            self.recompute_offsets();
        }
        Some(removed)
    }

    pub fn update_user_game_time(
        &mut self,
        socket_id: &str,
        period: u32,
        minutes: u32,
        seconds: u32,
    ) -> Result<SyncOutcome, sport_clock::InvalidTime> {
        let elapsed = sport_clock::to_elapsed(self.sport, period, minutes, seconds)?;
        if let Some(user) = self.users.get_mut(socket_id) {
            user.game_time = Some(GameTime {
                period,
                minutes,
                seconds,
            });
            user.elapsed_seconds = Some(elapsed);
        }
        let changed = self.recompute_offsets();
        let offset_ms = self.users.get(socket_id).map_or(0, |u| u.offset_ms);
        let changed_offsets = changed
            .into_iter()
            .filter(|sid| sid != socket_id)
            .filter_map(|sid| self.users.get(&sid).map(|u| (sid, u.offset_ms)))
            .collect();
        Ok(SyncOutcome {
            offset_ms,
            is_baseline: offset_ms == 0,
            elapsed_seconds: elapsed,
            changed_offsets,
        })
    }

    /// Sole writer of `offsetMs`. Sets every synced user's offset relative
    /// to the most advanced synced user (the baseline, at offset 0);
    /// unsynced users keep the `0` sentinel, which (D) treats as "no delay
    /// information, deliver immediately". Returns the socket ids whose
    /// offset actually changed value.
    fn recompute_offsets(&mut self) -> Vec<String> {
        let max_elapsed = self.users.values().filter_map(|u| u.elapsed_seconds).max();
        let Some(max_elapsed) = max_elapsed else {
            return Vec::new();
        };
        let mut changed = Vec::new();
        for user in self.users.values_mut() {
            if let Some(elapsed) = user.elapsed_seconds {
                let new_offset = 1000 * (max_elapsed - elapsed);
                if user.offset_ms != new_offset {
                    user.offset_ms = new_offset;
                    changed.push(user.socket_id.clone());
                }
            }
        }
        changed
    }

    pub fn add_message(&mut self, message: CachedMessage) {
        self.messages.push_back(message);
        while self.messages.len() > MESSAGE_CACHE_CAP {
            self.messages.pop_front();
        }
    }
}
