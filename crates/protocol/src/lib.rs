// protocol: wire types for the spoiler-free broadcast chat gateway.
//
// Every inbound/outbound frame is a JSON object `{"event": <name>,
// "data": <payload>}`. `ClientEvent`/`ServerEvent` are discriminated
// unions tagged on the `event` field with the payload nested under
// `data`, matching the wire contract exactly (serde's adjacently
// tagged representation).

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// Wire representation of a sport-clock reading. Validated and converted to
/// elapsed seconds by the `sport-clock` crate on the gateway side; this type
/// carries the raw, unvalidated fields as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTimeWire {
    pub period: u32,
    pub minutes: u32,
    pub seconds: u32,
}

/// Optional display metadata a room may be created with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teams: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_date: Option<String>,
}

/// A single roster entry as seen by other participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub socket_id: String,
    pub nickname: String,
    pub is_synced: bool,
    pub offset_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_time: Option<GameTimeWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<u64>,
}

/// A chat message as delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWire {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_session_id: Option<String>,
    pub sender_nickname: String,
    pub content: String,
    /// RFC 3339 timestamp; the canonical ordering key.
    pub server_timestamp: String,
}

// ---------------------------------------------------------------------------
// Inbound (client -> gateway)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub room_code: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_meta: Option<RoomMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncGameTimeRequest {
    pub period: u32,
    pub minutes: u32,
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// All inbound frames a connected socket may send, tagged on `event`.
///
/// ```json
/// {"event": "join-room", "data": {"room_code": "demo", "nickname": "alice"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(JoinRoomRequest),
    SyncGameTime(SyncGameTimeRequest),
    SendMessage(SendMessageRequest),
}

// ---------------------------------------------------------------------------
// Outbound (gateway -> client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinedRoomPayload {
    pub session_id: String,
    pub is_reconnect: bool,
    pub sport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_meta: Option<RoomMeta>,
    pub users: Vec<UserSummary>,
    pub messages: Vec<MessageWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_sync: Option<SyncConfirmedPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserJoinedPayload {
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLeftPayload {
    pub socket_id: String,
    pub nickname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSyncedPayload {
    pub socket_id: String,
    pub nickname: String,
    pub offset_ms: u64,
    pub is_baseline: bool,
    pub elapsed_seconds: u64,
    pub game_time: GameTimeWire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfirmedPayload {
    pub offset_ms: u64,
    pub is_baseline: bool,
    pub elapsed_seconds: u64,
    pub game_time: GameTimeWire,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetUpdatedPayload {
    pub offset_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessagePayload {
    pub message: MessageWire,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionExpiredPayload {
    pub reason: String,
}

/// Matches spec's `{event: "error", data: {message: string}}` — no
/// machine-readable code field on the wire (open issue, see DESIGN.md).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// All outbound frames the gateway may send, tagged on `event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "kebab-case")]
pub enum ServerEvent {
    JoinedRoom(JoinedRoomPayload),
    UserJoined(UserJoinedPayload),
    UserLeft(UserLeftPayload),
    UserSynced(UserSyncedPayload),
    SyncConfirmed(SyncConfirmedPayload),
    OffsetUpdated(OffsetUpdatedPayload),
    NewMessage(NewMessagePayload),
    SessionExpired(SessionExpiredPayload),
    Error(ErrorPayload),
}

/// Internal error classification, used for logging and metrics only — the
/// wire error event carries no code field (§9 open question).
pub mod error_codes {
    pub const INVALID_ROOM_ID: &str = "InvalidRoomId";
    pub const INVALID_NICKNAME: &str = "InvalidNickname";
    pub const INVALID_SPORT: &str = "InvalidSport";
    pub const INVALID_TIME: &str = "InvalidTime";
    pub const INVALID_MESSAGE: &str = "InvalidMessage";
    pub const RATE_LIMITED: &str = "RateLimited";
    pub const MUST_JOIN_FIRST: &str = "MustJoinFirst";
    pub const STORE_FAILURE: &str = "StoreFailure";
    pub const SESSION_EXPIRED: &str = "SessionExpired";
    pub const INTERNAL_ERROR: &str = "InternalError";
}

// ---------------------------------------------------------------------------
// Auxiliary HTTP surface
// ---------------------------------------------------------------------------

/// Frozen HTTP error envelope used by all non-2xx responses on the
/// auxiliary HTTP surface (health, preferences).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_tags_on_event_field_with_snake_case_data() {
        let req = ClientEvent::JoinRoom(JoinRoomRequest {
            room_code: "demo".to_owned(),
            nickname: "alice".to_owned(),
            session_id: None,
            sport: None,
            room_meta: None,
        });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["event"], "join-room");
        assert_eq!(json["data"]["room_code"], "demo");
    }

    #[test]
    fn client_event_round_trips_through_json() {
        let req = ClientEvent::SyncGameTime(SyncGameTimeRequest {
            period: 3,
            minutes: 8,
            seconds: 42,
        });
        let text = serde_json::to_string(&req).unwrap();
        let back: ClientEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn server_event_error_has_no_code_field() {
        let evt = ServerEvent::Error(ErrorPayload {
            message: "must join a room first".to_owned(),
        });
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["data"]["message"], "must join a room first");
        assert!(json["data"].get("code").is_none());
    }

    #[test]
    fn send_message_event_name_is_send_message() {
        let req = ClientEvent::SendMessage(SendMessageRequest {
            content: "nice pass".to_owned(),
        });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["event"], "send-message");
    }

    #[test]
    fn unknown_event_name_fails_to_deserialize() {
        let text = r#"{"event":"not-a-real-event","data":{}}"#;
        assert!(serde_json::from_str::<ClientEvent>(text).is_err());
    }
}
