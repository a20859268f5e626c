pub mod registry;
pub mod types;

pub use registry::{RoomRegistry, SharedRoom};
pub use types::{CachedMessage, Room, SyncOutcome, User, MESSAGE_CACHE_CAP};
