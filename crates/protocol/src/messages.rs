//! Typed ACIP payload structs: one per packet type, each hand-encoded over
//! [`crate::wire::Writer`]/[`crate::wire::Reader`]. Dispatch matches on
//! [`PacketType`] and hands the still-opaque payload bytes to the matching
//! struct's `decode`.

use crate::constants::{MAX_ERROR_MESSAGE_LEN, MAX_SERVER_ADDRESS_LEN, MAX_SESSION_STRING_LEN};
use crate::error::ValidationError;
use crate::wire::{Reader, Writer};

/// Stable small integers in the ACIP discovery range (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketType {
    SessionCreate = 0x0001,
    SessionCreated = 0x0002,
    SessionLookup = 0x0003,
    SessionInfo = 0x0004,
    SessionJoin = 0x0005,
    SessionJoined = 0x0006,
    SessionLeave = 0x0007,
    SessionEnd = 0x0008,
    SessionReconnect = 0x0009,
    ParticipantJoined = 0x000A,
    ParticipantLeft = 0x000B,
    WebrtcSdp = 0x000C,
    WebrtcIce = 0x000D,
    ParticipantList = 0x000E,
    RingCollect = 0x000F,
    NetworkQuality = 0x0010,
    HostAnnouncement = 0x0011,
    HostDesignated = 0x0012,
    HostLost = 0x0013,
    FutureHostElected = 0x0014,
    AcipError = 0x0015,
    /// SecurityEnvelope — wraps an encrypted inner packet (§4.2).
    Encrypted = 0x0016,
    RekeyRequest = 0x0017,
    RekeyResponse = 0x0018,
    RekeyComplete = 0x0019,
    KeyExchangeInit = 0x001A,
    KeyExchangeAck = 0x001B,
}

impl PacketType {
    pub const ALL: &'static [PacketType] = &[
        Self::SessionCreate,
        Self::SessionCreated,
        Self::SessionLookup,
        Self::SessionInfo,
        Self::SessionJoin,
        Self::SessionJoined,
        Self::SessionLeave,
        Self::SessionEnd,
        Self::SessionReconnect,
        Self::ParticipantJoined,
        Self::ParticipantLeft,
        Self::WebrtcSdp,
        Self::WebrtcIce,
        Self::ParticipantList,
        Self::RingCollect,
        Self::NetworkQuality,
        Self::HostAnnouncement,
        Self::HostDesignated,
        Self::HostLost,
        Self::FutureHostElected,
        Self::AcipError,
        Self::Encrypted,
        Self::RekeyRequest,
        Self::RekeyResponse,
        Self::RekeyComplete,
        Self::KeyExchangeInit,
        Self::KeyExchangeAck,
    ];

    /// The handshake types allowed in cleartext on an encrypted channel (§4.2).
    pub fn is_handshake_type(self) -> bool {
        matches!(
            self,
            Self::RekeyRequest
                | Self::RekeyResponse
                | Self::RekeyComplete
                | Self::KeyExchangeInit
                | Self::KeyExchangeAck
        )
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_u16() == v)
    }
}

fn bool_u8(v: bool) -> u8 {
    if v {
        1
    } else {
        0
    }
}

/// C→S. `sign_create` covers `timestamp || capabilities || max_participants`;
/// the rest of this struct rides along unsigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCreateRequest {
    pub timestamp: u64,
    pub identity_pubkey: [u8; 32],
    pub capabilities: u8,
    pub max_participants: u8,
    pub session_type: u8,
    pub require_server_verify: bool,
    pub require_client_verify: bool,
    pub expose_ip: bool,
    pub server_address: String,
    pub server_port: u16,
    /// Empty means "generate one" (spec §4.5 creation policy).
    pub reserved_string: String,
    pub has_password: bool,
    /// Cleartext password used only to derive the stored Argon2id hash;
    /// never stored or echoed back.
    pub password: Vec<u8>,
    pub signature: [u8; 64],
}

impl SessionCreateRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u64(self.timestamp)
            .bytes(&self.identity_pubkey)
            .u8(self.capabilities)
            .u8(self.max_participants)
            .u8(self.session_type)
            .u8(bool_u8(self.require_server_verify))
            .u8(bool_u8(self.require_client_verify))
            .u8(bool_u8(self.expose_ip))
            .short_string(self.server_address.as_bytes())
            .u16(self.server_port)
            .short_string(self.reserved_string.as_bytes())
            .u8(bool_u8(self.has_password))
            .short_string(&self.password)
            .bytes(&self.signature);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let timestamp = r.u64()?;
        let identity_pubkey = r.array::<32>()?;
        let capabilities = r.u8()?;
        let max_participants = r.u8()?;
        let session_type = r.u8()?;
        let require_server_verify = r.u8()? != 0;
        let require_client_verify = r.u8()? != 0;
        let expose_ip = r.u8()? != 0;
        let server_address = string_from_bytes(r.short_string(MAX_SERVER_ADDRESS_LEN)?)?;
        let server_port = r.u16()?;
        let reserved_string = string_from_bytes(r.short_string(MAX_SESSION_STRING_LEN)?)?;
        let has_password = r.u8()? != 0;
        let password = r.short_string(128)?;
        let signature = r.array::<64>()?;
        r.finish()?;
        Ok(Self {
            timestamp,
            identity_pubkey,
            capabilities,
            max_participants,
            session_type,
            require_server_verify,
            require_client_verify,
            expose_ip,
            server_address,
            server_port,
            reserved_string,
            has_password,
            password,
            signature,
        })
    }
}

fn string_from_bytes(bytes: Vec<u8>) -> Result<String, ValidationError> {
    String::from_utf8(bytes).map_err(|_| ValidationError::InvalidParam("field is not valid UTF-8"))
}

/// S→C. Successful creation: fresh session string plus discovered ICE servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCreated {
    pub session_id: [u8; 16],
    pub session_string: String,
    pub stun_servers: Vec<String>,
    pub turn_servers: Vec<String>,
}

impl SessionCreated {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .short_string(self.session_string.as_bytes());
        w.u8(self.stun_servers.len() as u8);
        for s in &self.stun_servers {
            w.short_string(s.as_bytes());
        }
        w.u8(self.turn_servers.len() as u8);
        for s in &self.turn_servers {
            w.short_string(s.as_bytes());
        }
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let session_string = string_from_bytes(r.short_string(MAX_SESSION_STRING_LEN)?)?;
        let stun_count = r.u8()?;
        let mut stun_servers = Vec::with_capacity(stun_count as usize);
        for _ in 0..stun_count {
            stun_servers.push(string_from_bytes(r.short_string(128)?)?);
        }
        let turn_count = r.u8()?;
        let mut turn_servers = Vec::with_capacity(turn_count as usize);
        for _ in 0..turn_count {
            turn_servers.push(string_from_bytes(r.short_string(128)?)?);
        }
        r.finish()?;
        Ok(Self {
            session_id,
            session_string,
            stun_servers,
            turn_servers,
        })
    }
}

/// C→S.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLookup {
    pub session_string: String,
}

impl SessionLookup {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.short_string(self.session_string.as_bytes());
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_string = string_from_bytes(r.short_string(MAX_SESSION_STRING_LEN)?)?;
        r.finish()?;
        Ok(Self { session_string })
    }
}

/// S→C. Never carries `server_address`/`server_port` — those fields do not
/// exist on this struct by construction (spec §4.5 IP-disclosure policy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub found: bool,
    pub session_id: [u8; 16],
    pub host_pubkey: [u8; 32],
    pub capabilities: u8,
    pub max_participants: u8,
    pub current_participants: u8,
    pub session_type: u8,
    pub has_password: bool,
}

impl SessionInfo {
    pub fn not_found() -> Self {
        Self {
            found: false,
            session_id: [0; 16],
            host_pubkey: [0; 32],
            capabilities: 0,
            max_participants: 0,
            current_participants: 0,
            session_type: 0,
            has_password: false,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(bool_u8(self.found))
            .bytes(&self.session_id)
            .bytes(&self.host_pubkey)
            .u8(self.capabilities)
            .u8(self.max_participants)
            .u8(self.current_participants)
            .u8(self.session_type)
            .u8(bool_u8(self.has_password));
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let found = r.u8()? != 0;
        let session_id = r.array::<16>()?;
        let host_pubkey = r.array::<32>()?;
        let capabilities = r.u8()?;
        let max_participants = r.u8()?;
        let current_participants = r.u8()?;
        let session_type = r.u8()?;
        let has_password = r.u8()? != 0;
        r.finish()?;
        Ok(Self {
            found,
            session_id,
            host_pubkey,
            capabilities,
            max_participants,
            current_participants,
            session_type,
            has_password,
        })
    }
}

/// C→S. `sign_join` covers `timestamp || session_string` (no null terminator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionJoin {
    pub timestamp: u64,
    pub identity_pubkey: [u8; 32],
    pub session_string: String,
    pub password: Vec<u8>,
    pub signature: [u8; 64],
}

impl SessionJoin {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u64(self.timestamp)
            .bytes(&self.identity_pubkey)
            .short_string(self.session_string.as_bytes())
            .short_string(&self.password)
            .bytes(&self.signature);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let timestamp = r.u64()?;
        let identity_pubkey = r.array::<32>()?;
        let session_string = string_from_bytes(r.short_string(MAX_SESSION_STRING_LEN)?)?;
        let password = r.short_string(128)?;
        let signature = r.array::<64>()?;
        r.finish()?;
        Ok(Self {
            timestamp,
            identity_pubkey,
            session_string,
            password,
            signature,
        })
    }
}

/// S→C. `server_address` is only non-empty when `success` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionJoined {
    pub success: bool,
    pub error_code: u8,
    pub participant_id: [u8; 16],
    pub session_id: [u8; 16],
    pub server_address: String,
    pub server_port: u16,
    pub current_participants: u8,
    pub max_participants: u8,
}

impl SessionJoined {
    pub fn failure(error_code: u8) -> Self {
        Self {
            success: false,
            error_code,
            participant_id: [0; 16],
            session_id: [0; 16],
            server_address: String::new(),
            server_port: 0,
            current_participants: 0,
            max_participants: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(bool_u8(self.success))
            .u8(self.error_code)
            .bytes(&self.participant_id)
            .bytes(&self.session_id)
            .short_string(self.server_address.as_bytes())
            .u16(self.server_port)
            .u8(self.current_participants)
            .u8(self.max_participants);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let success = r.u8()? != 0;
        let error_code = r.u8()?;
        let participant_id = r.array::<16>()?;
        let session_id = r.array::<16>()?;
        let server_address = string_from_bytes(r.short_string(MAX_SERVER_ADDRESS_LEN)?)?;
        let server_port = r.u16()?;
        let current_participants = r.u8()?;
        let max_participants = r.u8()?;
        r.finish()?;
        Ok(Self {
            success,
            error_code,
            participant_id,
            session_id,
            server_address,
            server_port,
            current_participants,
            max_participants,
        })
    }
}

/// C→S.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLeave {
    pub session_id: [u8; 16],
    pub participant_id: [u8; 16],
}

impl SessionLeave {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id).bytes(&self.participant_id);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let participant_id = r.array::<16>()?;
        r.finish()?;
        Ok(Self {
            session_id,
            participant_id,
        })
    }
}

/// C→S. `sign_end` covers `session_id` alone — the host pubkey is looked up
/// server-side from the session record, not taken from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnd {
    pub session_id: [u8; 16],
    pub signature: [u8; 64],
}

impl SessionEnd {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id).bytes(&self.signature);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let signature = r.array::<64>()?;
        r.finish()?;
        Ok(Self {
            session_id,
            signature,
        })
    }
}

/// C→S. `sign_reconnect` covers `session_id || participant_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReconnect {
    pub session_id: [u8; 16],
    pub participant_id: [u8; 16],
    pub signature: [u8; 64],
}

impl SessionReconnect {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.participant_id)
            .bytes(&self.signature);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let participant_id = r.array::<16>()?;
        let signature = r.array::<64>()?;
        r.finish()?;
        Ok(Self {
            session_id,
            participant_id,
            signature,
        })
    }
}

/// S→C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantJoined {
    pub session_id: [u8; 16],
    pub participant_id: [u8; 16],
    pub identity_pubkey: [u8; 32],
    pub current_participants: u8,
}

impl ParticipantJoined {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.participant_id)
            .bytes(&self.identity_pubkey)
            .u8(self.current_participants);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let participant_id = r.array::<16>()?;
        let identity_pubkey = r.array::<32>()?;
        let current_participants = r.u8()?;
        r.finish()?;
        Ok(Self {
            session_id,
            participant_id,
            identity_pubkey,
            current_participants,
        })
    }
}

/// S→C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantLeft {
    pub session_id: [u8; 16],
    pub participant_id: [u8; 16],
    pub was_host: bool,
    pub current_participants: u8,
}

impl ParticipantLeft {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.participant_id)
            .u8(bool_u8(self.was_host))
            .u8(self.current_participants);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let participant_id = r.array::<16>()?;
        let was_host = r.u8()? != 0;
        let current_participants = r.u8()?;
        r.finish()?;
        Ok(Self {
            session_id,
            participant_id,
            was_host,
            current_participants,
        })
    }
}

/// Relay payload shared by WEBRTC_SDP and WEBRTC_ICE — the engine never
/// parses `body`. `recipient_id` all-zero means broadcast to every other
/// participant (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingRelay {
    pub session_id: [u8; 16],
    pub sender_id: [u8; 16],
    pub recipient_id: [u8; 16],
    pub body: Vec<u8>,
}

impl SignalingRelay {
    pub fn is_broadcast(&self) -> bool {
        self.recipient_id == [0u8; 16]
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.sender_id)
            .bytes(&self.recipient_id)
            .blob(&self.body);
        w.into_vec()
    }

    pub fn decode(buf: &[u8], max_body_len: usize) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let sender_id = r.array::<16>()?;
        let recipient_id = r.array::<16>()?;
        let body = r.blob(max_body_len)?;
        r.finish()?;
        Ok(Self {
            session_id,
            sender_id,
            recipient_id,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantEntry {
    pub participant_id: [u8; 16],
    pub address: String,
    pub port: u16,
    pub connection_type: u8,
}

/// S→C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantList {
    pub session_id: [u8; 16],
    pub participants: Vec<ParticipantEntry>,
}

impl ParticipantList {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id);
        w.u8(self.participants.len() as u8);
        for p in &self.participants {
            w.bytes(&p.participant_id);
            w.short_string(p.address.as_bytes());
            w.u16(p.port);
            w.u8(p.connection_type);
        }
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let count = r.u8()?;
        let mut participants = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let participant_id = r.array::<16>()?;
            let address_bytes = r.short_string(MAX_SERVER_ADDRESS_LEN)?;
            let address = String::from_utf8(address_bytes)
                .map_err(|_| ValidationError::InvalidParam("field is not valid UTF-8"))?;
            let port = r.u16()?;
            let connection_type = r.u8()?;
            participants.push(ParticipantEntry {
                participant_id,
                address,
                port,
                connection_type,
            });
        }
        r.finish()?;
        Ok(Self {
            session_id,
            participants,
        })
    }
}

/// P→P.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCollect {
    pub session_id: [u8; 16],
    pub from: [u8; 16],
    pub to: [u8; 16],
    pub round_number: u64,
}

impl RingCollect {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.from)
            .bytes(&self.to)
            .u64(self.round_number);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let from = r.array::<16>()?;
        let to = r.array::<16>()?;
        let round_number = r.u64()?;
        r.finish()?;
        Ok(Self {
            session_id,
            from,
            to,
            round_number,
        })
    }
}

/// P→P / P→S. Mirrors the NAT quality record in the data model (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkQuality {
    pub session_id: [u8; 16],
    pub participant_id: [u8; 16],
    pub round_number: u64,
    pub has_public_ip: bool,
    pub upnp_available: bool,
    pub upnp_mapped_port: u16,
    pub stun_nat_type: u8,
    pub lan_reachable: bool,
    pub stun_latency_ms: u32,
    pub upload_kbps: u32,
    pub download_kbps: u32,
    pub rtt_to_acds_ms: u32,
    pub jitter_ms: u8,
    pub packet_loss_pct: u8,
    pub public_address: String,
    pub public_port: u16,
    pub ice_candidate_types: u8,
}

impl NetworkQuality {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.participant_id)
            .u64(self.round_number)
            .u8(bool_u8(self.has_public_ip))
            .u8(bool_u8(self.upnp_available))
            .u16(self.upnp_mapped_port)
            .u8(self.stun_nat_type)
            .u8(bool_u8(self.lan_reachable))
            .u32(self.stun_latency_ms)
            .u32(self.upload_kbps)
            .u32(self.download_kbps)
            .u32(self.rtt_to_acds_ms)
            .u8(self.jitter_ms)
            .u8(self.packet_loss_pct)
            .short_string(self.public_address.as_bytes())
            .u16(self.public_port)
            .u8(self.ice_candidate_types);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let participant_id = r.array::<16>()?;
        let round_number = r.u64()?;
        let has_public_ip = r.u8()? != 0;
        let upnp_available = r.u8()? != 0;
        let upnp_mapped_port = r.u16()?;
        let stun_nat_type = r.u8()?;
        let lan_reachable = r.u8()? != 0;
        let stun_latency_ms = r.u32()?;
        let upload_kbps = r.u32()?;
        let download_kbps = r.u32()?;
        let rtt_to_acds_ms = r.u32()?;
        let jitter_ms = r.u8()?;
        let packet_loss_pct = r.u8()?;
        let public_address = string_from_bytes(r.short_string(MAX_SERVER_ADDRESS_LEN)?)?;
        let public_port = r.u16()?;
        let ice_candidate_types = r.u8()?;
        r.finish()?;
        if packet_loss_pct > 100 {
            return Err(ValidationError::InvalidParam(
                "packet_loss_pct out of range 0..=100",
            ));
        }
        Ok(Self {
            session_id,
            participant_id,
            round_number,
            has_public_ip,
            upnp_available,
            upnp_mapped_port,
            stun_nat_type,
            lan_reachable,
            stun_latency_ms,
            upload_kbps,
            download_kbps,
            rtt_to_acds_ms,
            jitter_ms,
            packet_loss_pct,
            public_address,
            public_port,
            ice_candidate_types,
        })
    }
}

/// C→S, self-declared by the would-be host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAnnouncement {
    pub session_id: [u8; 16],
    pub host_id: [u8; 16],
    pub address: String,
    pub port: u16,
    pub connection_type: u8,
    pub signature: [u8; 64],
}

impl HostAnnouncement {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.host_id)
            .short_string(self.address.as_bytes())
            .u16(self.port)
            .u8(self.connection_type)
            .bytes(&self.signature);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let host_id = r.array::<16>()?;
        let address = string_from_bytes(r.short_string(MAX_SERVER_ADDRESS_LEN)?)?;
        let port = r.u16()?;
        let connection_type = r.u8()?;
        let signature = r.array::<64>()?;
        r.finish()?;
        Ok(Self {
            session_id,
            host_id,
            address,
            port,
            connection_type,
            signature,
        })
    }
}

/// S→C, broadcast once a HOST_ANNOUNCEMENT is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDesignated {
    pub session_id: [u8; 16],
    pub host_id: [u8; 16],
    pub address: String,
    pub port: u16,
    pub connection_type: u8,
}

impl HostDesignated {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.host_id)
            .short_string(self.address.as_bytes())
            .u16(self.port)
            .u8(self.connection_type);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let host_id = r.array::<16>()?;
        let address = string_from_bytes(r.short_string(MAX_SERVER_ADDRESS_LEN)?)?;
        let port = r.u16()?;
        let connection_type = r.u8()?;
        r.finish()?;
        Ok(Self {
            session_id,
            host_id,
            address,
            port,
            connection_type,
        })
    }
}

/// C→S. Bookkeeping only — receipt never triggers a fresh election (§4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLost {
    pub session_id: [u8; 16],
    pub reporter_id: [u8; 16],
    pub last_host_id: [u8; 16],
    pub reason_code: u8,
    pub reason_message: String,
    pub when: u64,
}

impl HostLost {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.reporter_id)
            .bytes(&self.last_host_id)
            .u8(self.reason_code)
            .short_string(self.reason_message.as_bytes())
            .u64(self.when);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let reporter_id = r.array::<16>()?;
        let last_host_id = r.array::<16>()?;
        let reason_code = r.u8()?;
        let reason_message = string_from_bytes(r.short_string(128)?)?;
        let when = r.u64()?;
        r.finish()?;
        Ok(Self {
            session_id,
            reporter_id,
            last_host_id,
            reason_code,
            reason_message,
            when,
        })
    }
}

/// C→S and rebroadcast by the server to every participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FutureHostElected {
    pub session_id: [u8; 16],
    pub future_host_id: [u8; 16],
    pub address: String,
    pub port: u16,
    pub connection_type: u8,
    pub round_number: u64,
}

impl FutureHostElected {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.session_id)
            .bytes(&self.future_host_id)
            .short_string(self.address.as_bytes())
            .u16(self.port)
            .u8(self.connection_type)
            .u64(self.round_number);
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let session_id = r.array::<16>()?;
        let future_host_id = r.array::<16>()?;
        let address = string_from_bytes(r.short_string(MAX_SERVER_ADDRESS_LEN)?)?;
        let port = r.u16()?;
        let connection_type = r.u8()?;
        let round_number = r.u64()?;
        r.finish()?;
        Ok(Self {
            session_id,
            future_host_id,
            address,
            port,
            connection_type,
            round_number,
        })
    }
}

/// S→C. `max_len` distinguishes the 256-byte generic bound from the
/// 128-byte join-failure bound (spec §7) — callers pick it by context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcipError {
    pub code: u8,
    pub message: String,
}

impl AcipError {
    pub fn new(code: crate::types::ErrorCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        message.truncate(MAX_ERROR_MESSAGE_LEN);
        Self {
            code: code.as_u8(),
            message,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(self.code).long_string(self.message.as_bytes());
        w.into_vec()
    }

    pub fn decode(buf: &[u8], max_len: usize) -> Result<Self, ValidationError> {
        let mut r = Reader::new(buf);
        let code = r.u8()?;
        let message = string_from_bytes(r.long_string(max_len)?)?;
        r.finish()?;
        Ok(Self { code, message })
    }
}

/// Wraps an encrypted inner ACIP packet: `nonce(24) || ciphertext_and_tag`.
/// The ciphertext/tag split is opaque here — `acip_server::security` owns
/// the AEAD construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEnvelope {
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
}

impl SecurityEnvelope {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24 + self.ciphertext.len());
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        if buf.len() < 24 {
            return Err(ValidationError::Truncated {
                needed: 24,
                remaining: buf.len(),
            });
        }
        let mut nonce = [0u8; 24];
        nonce.copy_from_slice(&buf[..24]);
        Ok(Self {
            nonce,
            ciphertext: buf[24..].to_vec(),
        })
    }
}

macro_rules! ephemeral_key_message {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub ephemeral_pubkey: [u8; 32],
        }

        impl $name {
            pub fn encode(&self) -> Vec<u8> {
                self.ephemeral_pubkey.to_vec()
            }

            pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
                let mut r = Reader::new(buf);
                let ephemeral_pubkey = r.array::<32>()?;
                r.finish()?;
                Ok(Self { ephemeral_pubkey })
            }
        }
    };
}

ephemeral_key_message!(RekeyRequest);
ephemeral_key_message!(RekeyResponse);
ephemeral_key_message!(KeyExchangeInit);
ephemeral_key_message!(KeyExchangeAck);

/// Empty payload — confirms the new key is in effect (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RekeyComplete;

impl RekeyComplete {
    pub fn encode(&self) -> Vec<u8> {
        Vec::new()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ValidationError> {
        Reader::new(buf).finish()?;
        Ok(Self)
    }
}
