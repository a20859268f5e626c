use protocol::{error_codes, ErrorPayload, ServerEvent, SessionExpiredPayload};
use std::fmt;

/// Error kinds surfaced to a connected socket. Each maps to exactly one
/// `ServerEvent` (`error` or, for `SessionExpired`, `session-expired`) —
/// there is no structured code on the wire today (spec §9 open question);
/// `code()` exists for logging only.
#[derive(Debug, Clone)]
pub enum GatewayError {
    InvalidRoomId(String),
    InvalidNickname(String),
    InvalidSport(String),
    InvalidTime(String),
    InvalidMessage(String),
    RateLimited { retry_after_secs: u64 },
    MustJoinFirst,
    StoreFailure(String),
    SessionExpired,
    Internal(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRoomId(_) => error_codes::INVALID_ROOM_ID,
            GatewayError::InvalidNickname(_) => error_codes::INVALID_NICKNAME,
            GatewayError::InvalidSport(_) => error_codes::INVALID_SPORT,
            GatewayError::InvalidTime(_) => error_codes::INVALID_TIME,
            GatewayError::InvalidMessage(_) => error_codes::INVALID_MESSAGE,
            GatewayError::RateLimited { .. } => error_codes::RATE_LIMITED,
            GatewayError::MustJoinFirst => error_codes::MUST_JOIN_FIRST,
            GatewayError::StoreFailure(_) => error_codes::STORE_FAILURE,
            GatewayError::SessionExpired => error_codes::SESSION_EXPIRED,
            GatewayError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidRoomId(m)
            | GatewayError::InvalidNickname(m)
            | GatewayError::InvalidSport(m)
            | GatewayError::InvalidTime(m)
            | GatewayError::InvalidMessage(m)
            | GatewayError::StoreFailure(m)
            | GatewayError::Internal(m) => write!(f, "{m}"),
            GatewayError::RateLimited { retry_after_secs } => {
                write!(f, "rate limited, retry after {retry_after_secs}s")
            }
            GatewayError::MustJoinFirst => write!(f, "must join a room first"),
            GatewayError::SessionExpired => write!(f, "session expired"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<GatewayError> for ServerEvent {
    fn from(err: GatewayError) -> Self {
        if matches!(err, GatewayError::SessionExpired) {
            return ServerEvent::SessionExpired(SessionExpiredPayload {
                reason: err.to_string(),
            });
        }
        ServerEvent::Error(ErrorPayload {
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expired_maps_to_session_expired_event_not_generic_error() {
        let event: ServerEvent = GatewayError::SessionExpired.into();
        assert!(matches!(event, ServerEvent::SessionExpired(_)));
    }

    #[test]
    fn must_join_first_maps_to_error_event_with_message() {
        let event: ServerEvent = GatewayError::MustJoinFirst.into();
        match event {
            ServerEvent::Error(payload) => assert_eq!(payload.message, "must join a room first"),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[test]
    fn rate_limited_code_is_stable_for_logging() {
        assert_eq!(
            GatewayError::RateLimited { retry_after_secs: 5 }.code(),
            error_codes::RATE_LIMITED
        );
    }
}
