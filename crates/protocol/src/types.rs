//! Small fixed-vocabulary wire enums shared by several message types.

use crate::error::ValidationError;

macro_rules! wire_enum {
    ($name:ident { $($variant:ident = $val:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $val),+
        }

        impl $name {
            pub fn from_u8(v: u8) -> Result<Self, ValidationError> {
                match v {
                    $($val => Ok(Self::$variant),)+
                    _ => Err(ValidationError::InvalidParam(concat!(
                        "out-of-range ", stringify!($name)
                    ))),
                }
            }

            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }
    };
}

wire_enum!(SessionType {
    DirectTcp = 0,
    WebRtc = 1,
});

wire_enum!(StunNatType {
    Open = 0,
    FullCone = 1,
    Restricted = 2,
    PortRestricted = 3,
    Symmetric = 4,
});

wire_enum!(ParticipantRole {
    Initiator = 0,
    Host = 1,
    Member = 2,
});

wire_enum!(ConnectionType {
    DirectTcp = 0,
    WebRtc = 1,
});

/// Wire values for ACIP_ERROR, fixed by the spec's EXTERNAL INTERFACES table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    None = 0,
    SessionNotFound = 1,
    SessionFull = 2,
    InvalidPassword = 3,
    InvalidSignature = 4,
    RateLimited = 5,
    StringTaken = 6,
    StringInvalid = 7,
    Internal = 255,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::SessionNotFound,
            2 => Self::SessionFull,
            3 => Self::InvalidPassword,
            4 => Self::InvalidSignature,
            5 => Self::RateLimited,
            6 => Self::StringTaken,
            7 => Self::StringInvalid,
            _ => Self::Internal,
        }
    }
}

/// Bitmask values for `ice_candidate_types` in [`crate::messages::NetworkQuality`].
pub mod ice_candidate_bits {
    pub const HOST: u8 = 1;
    pub const SRFLX: u8 = 2;
    pub const RELAY: u8 = 4;
}

/// Bitmask values for session `capabilities`.
pub mod capability_bits {
    pub const VIDEO: u8 = 1 << 0;
    pub const AUDIO: u8 = 1 << 1;
    /// Bits 2-7 are reserved and must be zero at creation time.
    pub const RESERVED_MASK: u8 = !(VIDEO | AUDIO);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stun_nat_type_roundtrip() {
        for v in 0u8..=4 {
            let t = StunNatType::from_u8(v).unwrap();
            assert_eq!(t.as_u8(), v);
        }
        assert!(StunNatType::from_u8(5).is_err());
    }

    #[test]
    fn error_code_unknown_maps_to_internal() {
        assert_eq!(ErrorCode::from_u8(200).as_u8(), ErrorCode::Internal.as_u8());
    }

    #[test]
    fn reserved_capability_bits() {
        assert_eq!(capability_bits::RESERVED_MASK & capability_bits::VIDEO, 0);
        assert_eq!(capability_bits::RESERVED_MASK & capability_bits::AUDIO, 0);
        assert_ne!(capability_bits::RESERVED_MASK, 0);
    }
}
