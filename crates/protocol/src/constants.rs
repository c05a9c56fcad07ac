//! Wire-level constants from the spec's EXTERNAL INTERFACES section.

/// 8-byte magic that opens every ACIP frame header: ASCII "ACIPv1\0\0".
pub const ACIP_MAGIC: u64 = 0x4143_4950_7631_0000;

/// Payloads larger than this are rejected with [`crate::error::FrameError::Oversize`].
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

pub const MAX_SESSION_STRING_LEN: usize = 48;
pub const MAX_SERVER_ADDRESS_LEN: usize = 63;
pub const SESSION_EXPIRATION_MS: u64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_PORT: u16 = 27225;
pub const PARTICIPANT_CAP: u8 = 8;
pub const RING_TICK_SECS: u64 = 5 * 60;

/// Generic error messages are bounded at this many bytes.
pub const MAX_ERROR_MESSAGE_LEN: usize = 256;
/// Join-failure messages are bounded tighter (spec §7).
pub const MAX_JOIN_MESSAGE_LEN: usize = 128;

/// Default replay window for signed requests (spec §4.4).
pub const DEFAULT_REPLAY_WINDOW_SECS: u64 = 300;
/// Allowed future clock skew beyond `now` (spec §4.4).
pub const MAX_FUTURE_SKEW_SECS: u64 = 60;
