//! Packet dispatch: an open-addressed handler table built once at startup
//! (spec §4.3). Dispatch itself does no payload interpretation — every
//! handler decodes and validates its own payload.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use acip_protocol::types::{ConnectionType, ErrorCode};
use acip_protocol::*;
use ed25519_dalek::{Signature, VerifyingKey};

use crate::error::AppError;
use crate::migration::MigrationCoordinator;
use crate::rate_limit::AuthFailureLimiter;
use crate::relay::{Outbox, Relay};
use crate::ring::RingConsensus;
use crate::security::SecureChannel;
use crate::session::{CreateCandidate, JoinCandidate, SessionStore};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Per-connection state threaded through every handler call.
pub struct ConnectionContext {
    pub client_id: u64,
    pub peer_ip: String,
    pub identity_pubkey: Option<[u8; 32]>,
    pub session_id: Option<[u8; 16]>,
    pub participant_id: Option<[u8; 16]>,
    pub secure: Option<SecureChannel>,
    pub outbox: Outbox,
}

impl ConnectionContext {
    /// Queues one outbound packet. The connection's write-loop task drains
    /// the queue onto the socket; a full queue here means the slow-client
    /// disconnect policy (spec §5) kicks in on the sender side.
    pub async fn send(&self, packet_type: PacketType, payload: &[u8]) {
        let encoded = frame::encode(packet_type.as_u16(), self.client_id, payload);
        let _ = self.outbox.send(encoded).await;
    }

    async fn send_error(&self, code: ErrorCode, message: &str) {
        let err = AcipError::new(code, message);
        self.send(PacketType::AcipError, &err.encode()).await;
    }
}

/// Shared services bundled behind `Arc`s (spec §4.3/§4.9).
pub struct Engine {
    pub sessions: Arc<SessionStore>,
    pub relay: Arc<Relay>,
    pub ring: Arc<RingConsensus>,
    pub auth_limiter: Arc<AuthFailureLimiter>,
    pub replay_window_secs: u64,
    pub password_verify_timeout: Duration,
}

async fn handle_session_create(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = SessionCreateRequest::decode(payload)?;
    let now = now_secs();
    let timestamp_ok = crate::auth::timestamp_in_window(req.timestamp, now, engine.replay_window_secs);
    let signature = Signature::from_bytes(&req.signature);
    let sig_ok = timestamp_ok
        && VerifyingKey::from_bytes(&req.identity_pubkey)
            .map(|pk| crate::auth::verify_create(&pk, req.timestamp, req.capabilities, req.max_participants, &signature))
            .unwrap_or(false);

    if !sig_ok {
        return Err(AppError::InvalidSignature);
    }

    let password_hash = if req.has_password {
        crate::auth::hash_password(req.password.clone())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
    } else {
        String::new()
    };

    let candidate = CreateCandidate {
        host_pubkey: req.identity_pubkey,
        capabilities: req.capabilities,
        max_participants: req.max_participants,
        session_type: req.session_type,
        require_server_verify: req.require_server_verify,
        require_client_verify: req.require_client_verify,
        expose_ip: req.expose_ip,
        server_address: req.server_address,
        server_port: req.server_port,
        reserved_string: req.reserved_string,
        has_password: req.has_password,
        password_hash,
    };

    let info = engine.sessions.create(candidate).await.map_err(AppError::Create)?;
    ctx.identity_pubkey = Some(req.identity_pubkey);
    ctx.session_id = Some(info.session_id);

    let session_string = engine
        .sessions
        .with_session(info.session_id, |s| s.session_string.clone())
        .await
        .unwrap_or_default();

    let created = SessionCreated {
        session_id: info.session_id,
        session_string,
        stun_servers: Vec::new(),
        turn_servers: Vec::new(),
    };
    ctx.send(PacketType::SessionCreated, &created.encode()).await;
    Ok(())
}

async fn handle_session_lookup(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = SessionLookup::decode(payload)?;
    let info = engine
        .sessions
        .lookup_by_string(&req.session_string)
        .await
        .unwrap_or_else(SessionInfo::not_found);
    ctx.send(PacketType::SessionInfo, &info.encode()).await;
    Ok(())
}

async fn handle_session_join(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = SessionJoin::decode(payload)?;
    let now = now_secs();
    let timestamp_ok = crate::auth::timestamp_in_window(req.timestamp, now, engine.replay_window_secs);
    let signature = Signature::from_bytes(&req.signature);
    let signature_valid = timestamp_ok
        && VerifyingKey::from_bytes(&req.identity_pubkey)
            .map(|pk| crate::auth::verify_join(&pk, req.timestamp, &req.session_string, &signature))
            .unwrap_or(false);

    let session_id = match engine.sessions.lookup_by_string(&req.session_string).await {
        Some(info) => info.session_id,
        None => {
            ctx.send(
                PacketType::SessionJoined,
                &SessionJoined::failure(ErrorCode::SessionNotFound.as_u8()).encode(),
            )
            .await;
            return Err(AppError::Join(crate::session::JoinError::SessionNotFound));
        }
    };

    let candidate = JoinCandidate {
        identity_pubkey: req.identity_pubkey,
        signature_valid,
        password: req.password,
        password_verify_timeout: engine.password_verify_timeout,
    };

    match engine.sessions.join(session_id, candidate).await {
        Ok(outcome) => {
            ctx.identity_pubkey = Some(req.identity_pubkey);
            ctx.session_id = Some(session_id);
            ctx.participant_id = Some(outcome.participant_id);

            let joined = SessionJoined {
                success: true,
                error_code: ErrorCode::None.as_u8(),
                participant_id: outcome.participant_id,
                session_id,
                server_address: outcome.server_address,
                server_port: outcome.server_port,
                current_participants: outcome.current_participants,
                max_participants: outcome.max_participants,
            };
            ctx.send(PacketType::SessionJoined, &joined.encode()).await;

            let event = ParticipantJoined {
                session_id,
                participant_id: outcome.participant_id,
                identity_pubkey: req.identity_pubkey,
                current_participants: outcome.current_participants,
            };
            engine.relay.notify_joined(session_id, &event).await;
            engine
                .relay
                .register(session_id, outcome.participant_id, ctx.outbox.clone())
                .await;
            Ok(())
        }
        Err(e) => {
            ctx.send(
                PacketType::SessionJoined,
                &SessionJoined::failure(e.error_code().as_u8()).encode(),
            )
            .await;
            Err(AppError::Join(e))
        }
    }
}

async fn handle_session_leave(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = SessionLeave::decode(payload)?;
    if let Some(was_host) = engine.sessions.leave(req.session_id, req.participant_id).await {
        engine.relay.unregister(req.session_id, req.participant_id).await;
        let remaining = engine
            .sessions
            .lookup_by_id(req.session_id)
            .await
            .map(|i| i.current_participants)
            .unwrap_or(0);
        let event = ParticipantLeft {
            session_id: req.session_id,
            participant_id: req.participant_id,
            was_host,
            current_participants: remaining,
        };
        engine.relay.notify_left(req.session_id, &event).await;
    }
    ctx.session_id = None;
    ctx.participant_id = None;
    Ok(())
}

async fn handle_session_end(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = SessionEnd::decode(payload)?;
    let Some(host_pubkey) = ctx.identity_pubkey else {
        return Err(AppError::NotHost);
    };
    let Ok(pk) = VerifyingKey::from_bytes(&host_pubkey) else {
        return Err(AppError::InvalidSignature);
    };
    let signature = Signature::from_bytes(&req.signature);
    if !crate::auth::verify_end(&pk, &req.session_id, &signature) {
        return Err(AppError::InvalidSignature);
    }
    if engine.sessions.end(req.session_id, host_pubkey).await {
        Ok(())
    } else {
        Err(AppError::NotHost)
    }
}

async fn handle_session_reconnect(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = SessionReconnect::decode(payload)?;
    let Some(pubkey) = ctx.identity_pubkey else {
        return Err(AppError::InvalidSignature);
    };
    let Ok(pk) = VerifyingKey::from_bytes(&pubkey) else {
        return Err(AppError::InvalidSignature);
    };
    let signature = Signature::from_bytes(&req.signature);
    if !crate::auth::verify_reconnect(&pk, &req.session_id, &req.participant_id, &signature) {
        return Err(AppError::InvalidSignature);
    }
    if engine.sessions.reconnect(req.session_id, req.participant_id).await {
        ctx.session_id = Some(req.session_id);
        ctx.participant_id = Some(req.participant_id);
        engine
            .relay
            .register(req.session_id, req.participant_id, ctx.outbox.clone())
            .await;
        Ok(())
    } else {
        ctx.send_error(ErrorCode::SessionNotFound, "no such participant to reconnect").await;
        Err(AppError::Join(crate::session::JoinError::SessionNotFound))
    }
}

async fn handle_signaling_relay(
    payload: &[u8],
    packet_type: PacketType,
    engine: &Engine,
) -> Result<(), AppError> {
    let relay_msg = SignalingRelay::decode(payload, 1 << 16)?;
    let encoded = frame::encode(packet_type.as_u16(), 0, payload);
    engine.relay.relay_signaling(relay_msg.session_id, &encoded, &relay_msg).await;
    Ok(())
}

async fn handle_webrtc_sdp(payload: &[u8], _ctx: &mut ConnectionContext, engine: &Engine) -> Result<(), AppError> {
    handle_signaling_relay(payload, PacketType::WebrtcSdp, engine).await
}

async fn handle_webrtc_ice(payload: &[u8], _ctx: &mut ConnectionContext, engine: &Engine) -> Result<(), AppError> {
    handle_signaling_relay(payload, PacketType::WebrtcIce, engine).await
}

async fn handle_network_quality(
    payload: &[u8],
    _ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let report = NetworkQuality::decode(payload)?;
    let session_id = report.session_id;
    engine
        .sessions
        .with_session(session_id, |s| {
            if let Some(participant) = s.participants.get_mut(&report.participant_id) {
                participant.nat_quality = Some(report.clone());
            }
            engine.ring.record_report(s, report)
        })
        .await;
    Ok(())
}

async fn handle_ring_collect(
    payload: &[u8],
    _ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let collect = RingCollect::decode(payload)?;
    engine.relay.unicast(collect.session_id, collect.to, payload).await;
    Ok(())
}

async fn handle_host_announcement(
    payload: &[u8],
    _ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let announcement = HostAnnouncement::decode(payload)?;
    let session_id = announcement.session_id;
    let host_id = announcement.host_id;
    let signature = announcement.signature;

    // Verified and applied inside one lock acquisition: the announcer's
    // identity_pubkey only exists as session participant state, and
    // re-locking between verify and apply would let the participant set
    // change out from under the decision.
    let outcome = engine
        .sessions
        .with_session(session_id, |s| {
            let Some(announcer) = s.participants.get(&host_id) else {
                return Err(AppError::InvalidSignature);
            };
            let Ok(pk) = VerifyingKey::from_bytes(&announcer.identity_pubkey) else {
                return Err(AppError::InvalidSignature);
            };
            let sig = Signature::from_bytes(&signature);
            if !crate::auth::verify_host_announcement(&pk, &session_id, &host_id, &sig) {
                return Err(AppError::InvalidSignature);
            }

            let initiator_id = s
                .participants
                .values()
                .find(|p| p.role == crate::session::ParticipantRole::Initiator)
                .map(|p| p.participant_id);
            MigrationCoordinator::accept_announcement(s, host_id, initiator_id).map_err(AppError::Announcement)
        })
        .await;

    match outcome {
        Some(Ok(accepted_host)) => {
            let designated = HostDesignated {
                session_id,
                host_id: accepted_host,
                address: announcement.address,
                port: announcement.port,
                connection_type: announcement.connection_type,
            };
            engine.relay.broadcast(session_id, &designated.encode()).await;
            Ok(())
        }
        Some(Err(e)) => Err(e),
        None => Err(AppError::Announcement(crate::migration::AnnouncementError::Unauthorized)),
    }
}

async fn handle_host_lost(
    payload: &[u8],
    _ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let lost = HostLost::decode(payload)?;
    engine
        .sessions
        .with_session(lost.session_id, |s| MigrationCoordinator::record_host_lost(s))
        .await;
    Ok(())
}

async fn handle_future_host_elected(
    payload: &[u8],
    _ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let elected = FutureHostElected::decode(payload)?;
    engine
        .sessions
        .with_session(elected.session_id, |s| {
            MigrationCoordinator::record_future_host_elected(s, elected.future_host_id)
        })
        .await;
    engine.relay.broadcast(elected.session_id, payload).await;
    Ok(())
}

async fn handle_participant_list(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    engine: &Engine,
) -> Result<(), AppError> {
    let req = ParticipantList::decode(payload)?;
    let entries = engine
        .sessions
        .with_session(req.session_id, |s| {
            s.participants
                .values()
                .map(|p| ParticipantEntry {
                    participant_id: p.participant_id,
                    address: p
                        .nat_quality
                        .as_ref()
                        .map(|nq| nq.public_address.clone())
                        .unwrap_or_default(),
                    port: p.nat_quality.as_ref().map(|nq| nq.public_port).unwrap_or(0),
                    connection_type: ConnectionType::DirectTcp.as_u8(),
                })
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_default();

    let response = ParticipantList {
        session_id: req.session_id,
        participants: entries,
    };
    ctx.send(PacketType::ParticipantList, &response.encode()).await;
    Ok(())
}

async fn handle_rekey_request(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    _engine: &Engine,
) -> Result<(), AppError> {
    let req = RekeyRequest::decode(payload)?;
    let (secret, our_public) = crate::security::generate_ephemeral();
    let new_key = crate::security::derive_shared_key(secret, req.ephemeral_pubkey);
    if let Some(channel) = ctx.secure.as_mut() {
        channel.begin_rekey(new_key);
    }
    let response = RekeyResponse { ephemeral_pubkey: our_public };
    ctx.send(PacketType::RekeyResponse, &response.encode()).await;
    Ok(())
}

async fn handle_rekey_complete(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    _engine: &Engine,
) -> Result<(), AppError> {
    RekeyComplete::decode(payload)?;
    if let Some(channel) = ctx.secure.as_mut() {
        channel.complete_rekey();
    }
    Ok(())
}

async fn handle_key_exchange_init(
    payload: &[u8],
    ctx: &mut ConnectionContext,
    _engine: &Engine,
) -> Result<(), AppError> {
    let init = KeyExchangeInit::decode(payload)?;
    let (secret, our_public) = crate::security::generate_ephemeral();
    let key = crate::security::derive_shared_key(secret, init.ephemeral_pubkey);
    ctx.secure = Some(SecureChannel::new(key));
    let ack = KeyExchangeAck { ephemeral_pubkey: our_public };
    ctx.send(PacketType::KeyExchangeAck, &ack.encode()).await;
    Ok(())
}

async fn handle_key_exchange_ack(
    payload: &[u8],
    _ctx: &mut ConnectionContext,
    _engine: &Engine,
) -> Result<(), AppError> {
    KeyExchangeAck::decode(payload)?;
    Ok(())
}

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
type HandlerFn = for<'a> fn(&'a [u8], &'a mut ConnectionContext, &'a Engine) -> HandlerFuture<'a>;

/// Wraps an async handler fn as a non-capturing shim coercible to
/// `HandlerFn` — a plain closure's inferred return type doesn't reliably
/// unify with a higher-ranked `Pin<Box<dyn Future>>` signature, but a named
/// fn item with an explicit signature does.
macro_rules! handler {
    ($f:path) => {{
        fn shim<'a>(
            payload: &'a [u8],
            ctx: &'a mut ConnectionContext,
            engine: &'a Engine,
        ) -> HandlerFuture<'a> {
            Box::pin($f(payload, ctx, engine))
        }
        shim
    }};
}

const REGISTERED: &[(PacketType, HandlerFn)] = &[
    (PacketType::SessionCreate, handler!(handle_session_create)),
    (PacketType::SessionLookup, handler!(handle_session_lookup)),
    (PacketType::SessionJoin, handler!(handle_session_join)),
    (PacketType::SessionLeave, handler!(handle_session_leave)),
    (PacketType::SessionEnd, handler!(handle_session_end)),
    (PacketType::SessionReconnect, handler!(handle_session_reconnect)),
    (PacketType::WebrtcSdp, handler!(handle_webrtc_sdp)),
    (PacketType::WebrtcIce, handler!(handle_webrtc_ice)),
    (PacketType::ParticipantList, handler!(handle_participant_list)),
    (PacketType::RingCollect, handler!(handle_ring_collect)),
    (PacketType::NetworkQuality, handler!(handle_network_quality)),
    (PacketType::HostAnnouncement, handler!(handle_host_announcement)),
    (PacketType::HostLost, handler!(handle_host_lost)),
    (PacketType::FutureHostElected, handler!(handle_future_host_elected)),
    (PacketType::RekeyRequest, handler!(handle_rekey_request)),
    (PacketType::RekeyComplete, handler!(handle_rekey_complete)),
    (PacketType::KeyExchangeInit, handler!(handle_key_exchange_init)),
    (PacketType::KeyExchangeAck, handler!(handle_key_exchange_ack)),
];

/// Open-addressed table, power-of-two sized at ~50% max load (spec §4.3).
pub struct HandlerTable {
    slots: Vec<Option<(u16, HandlerFn)>>,
    mask: usize,
}

fn fib_hash(key: u16, mask: usize) -> usize {
    (key as usize).wrapping_mul(2_654_435_761) & mask
}

impl HandlerTable {
    pub fn build() -> Self {
        let size = (REGISTERED.len() * 2).next_power_of_two();
        let mask = size - 1;
        let mut slots: Vec<Option<(u16, HandlerFn)>> = vec![None; size];
        for &(packet_type, handler) in REGISTERED {
            let key = packet_type.as_u16();
            let mut idx = fib_hash(key, mask);
            while slots[idx].is_some() {
                idx = (idx + 1) & mask;
            }
            slots[idx] = Some((key, handler));
        }
        Self { slots, mask }
    }

    pub fn lookup(&self, packet_type: u16) -> Option<HandlerFn> {
        let start = fib_hash(packet_type, self.mask);
        let mut idx = start;
        loop {
            match self.slots[idx] {
                Some((k, h)) if k == packet_type => return Some(h),
                None => return None,
                _ => {
                    idx = (idx + 1) & self.mask;
                    if idx == start {
                        return None;
                    }
                }
            }
        }
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand_core::OsRng;
    use tokio::sync::mpsc;

    fn test_engine() -> Engine {
        Engine {
            sessions: Arc::new(crate::session::SessionStore::new()),
            relay: Arc::new(crate::relay::Relay::new()),
            ring: Arc::new(RingConsensus::new(300, 150)),
            auth_limiter: Arc::new(AuthFailureLimiter::new(10, 60)),
            replay_window_secs: 300,
            password_verify_timeout: Duration::from_secs(2),
        }
    }

    fn test_ctx() -> (ConnectionContext, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        (
            ConnectionContext {
                client_id: 1,
                peer_ip: "203.0.113.9".to_string(),
                identity_pubkey: None,
                session_id: None,
                participant_id: None,
                secure: None,
                outbox: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn scenario_two_join_with_wrong_password_is_rejected_with_zeroed_address() {
        let engine = test_engine();
        let host_sk = SigningKey::generate(&mut OsRng);

        let create = CreateCandidate {
            host_pubkey: host_sk.verifying_key().to_bytes(),
            capabilities: 0,
            max_participants: 4,
            session_type: 0,
            require_server_verify: false,
            require_client_verify: false,
            expose_ip: false,
            server_address: "10.0.0.1".to_string(),
            server_port: 27224,
            reserved_string: "scenario-two-room".to_string(),
            has_password: true,
            password_hash: crate::auth::hash_password(b"correct-horse".to_vec()).await.unwrap(),
        };
        engine.sessions.create(create).await.unwrap();

        let joiner_sk = SigningKey::generate(&mut OsRng);
        let now = now_secs();
        let sig = crate::auth::sign_join(&joiner_sk, now, "scenario-two-room");
        let req = SessionJoin {
            timestamp: now,
            identity_pubkey: joiner_sk.verifying_key().to_bytes(),
            session_string: "scenario-two-room".to_string(),
            password: b"wrong-password".to_vec(),
            signature: sig.to_bytes(),
        };

        let (mut ctx, mut rx) = test_ctx();
        let err = handle_session_join(&req.encode(), &mut ctx, &engine).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Join(crate::session::JoinError::InvalidPassword)
        ));

        let sent = rx.recv().await.unwrap();
        let (_, payload, _) = frame::decode(&sent).unwrap();
        let joined = SessionJoined::decode(&payload).unwrap();
        assert!(!joined.success);
        assert_eq!(joined.error_code, 3); // ErrorCode::InvalidPassword
        assert_eq!(joined.server_address, "");
        assert_eq!(joined.server_port, 0);
    }

    #[tokio::test]
    async fn scenario_three_join_signed_an_hour_ago_is_rejected_as_replay() {
        let engine = test_engine();
        let host_sk = SigningKey::generate(&mut OsRng);

        let create = CreateCandidate {
            host_pubkey: host_sk.verifying_key().to_bytes(),
            capabilities: 0,
            max_participants: 4,
            session_type: 0,
            require_server_verify: false,
            require_client_verify: false,
            expose_ip: false,
            server_address: "10.0.0.1".to_string(),
            server_port: 27224,
            reserved_string: "scenario-three-room".to_string(),
            has_password: false,
            password_hash: String::new(),
        };
        engine.sessions.create(create).await.unwrap();

        let joiner_sk = SigningKey::generate(&mut OsRng);
        let an_hour_ago = now_secs().saturating_sub(3600);
        // Correctly signed, but over the replay window: the signature
        // mathematically verifies, only the timestamp check must reject it.
        let sig = crate::auth::sign_join(&joiner_sk, an_hour_ago, "scenario-three-room");
        let req = SessionJoin {
            timestamp: an_hour_ago,
            identity_pubkey: joiner_sk.verifying_key().to_bytes(),
            session_string: "scenario-three-room".to_string(),
            password: Vec::new(),
            signature: sig.to_bytes(),
        };

        let (mut ctx, mut rx) = test_ctx();
        let err = handle_session_join(&req.encode(), &mut ctx, &engine).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Join(crate::session::JoinError::InvalidSignature)
        ));

        let sent = rx.recv().await.unwrap();
        let (_, payload, _) = frame::decode(&sent).unwrap();
        let joined = SessionJoined::decode(&payload).unwrap();
        assert!(!joined.success);
        assert_eq!(joined.error_code, 4); // ErrorCode::InvalidSignature
    }

    #[test]
    fn every_registered_type_resolves() {
        let table = HandlerTable::build();
        for &(packet_type, _) in REGISTERED {
            assert!(table.lookup(packet_type.as_u16()).is_some());
        }
    }

    #[test]
    fn unregistered_type_is_unhandled() {
        let table = HandlerTable::build();
        assert!(table.lookup(0x00F0).is_none());
    }

    #[test]
    fn table_size_is_power_of_two_at_roughly_half_load() {
        let table = HandlerTable::build();
        assert!(table.slots.len().is_power_of_two());
        assert!(table.slots.len() >= REGISTERED.len() * 2);
    }
}
