//! Wire-level error taxonomy. Framing errors are fatal to a connection;
//! validation errors are recoverable (see ERROR HANDLING DESIGN in the spec).

/// Errors raised while framing/deframing a packet at the codec layer.
/// All of these close the connection — no ACIP_ERROR is sent back.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("connection closed before any header bytes arrived")]
    CleanEof,
    #[error("connection closed mid-header or mid-payload")]
    Truncated,
    #[error("bad magic: expected {expected:#018x}, got {actual:#018x}")]
    BadMagic { expected: u64, actual: u64 },
    #[error("CRC32 mismatch: header said {expected:#010x}, computed {actual:#010x}")]
    CorruptCrc { expected: u32, actual: u32 },
    #[error("payload of {0} bytes exceeds the {1} byte cap")]
    Oversize(u32, u32),
}

/// Errors raised while a handler validates/decodes a payload it already
/// knows is well-framed. These are recoverable — the connection stays open
/// and the client gets an ACIP_ERROR.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("declared length does not match remaining payload, need {needed} more byte(s), {remaining} left")]
    Truncated { needed: usize, remaining: usize },
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),
    #[error("unrecognized packet type {0:#06x}")]
    Unhandled(u16),
}
