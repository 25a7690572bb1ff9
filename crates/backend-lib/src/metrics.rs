// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const RELAY_ROOMS: &str = "relay.rooms";
pub const RELAY_DELIVERED: &str = "relay.delivered";
pub const RELAY_DROPPED_FRAMES: &str = "relay.dropped_frames";
pub const SESSION_CREATED: &str = "session.created";
pub const SESSION_EXPIRED: &str = "session.expired";
pub const SESSION_ACTIVE: &str = "session.active";
pub const MODERATION_FAIL_OPEN: &str = "moderation.fail_open";
pub const UPLOAD_STORED: &str = "upload.stored";
