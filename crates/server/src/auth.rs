//! Ed25519 request authentication, Argon2id password hashing, and the
//! timestamp replay window (spec §4.4).

use std::time::Duration;

use acip_protocol::PacketType;
use anyhow::{Context, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params, Version};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

/// RFC 9106 "Argon2id low-memory" interactive profile.
const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

fn argon2_interactive() -> Argon2<'static> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        None,
    )
    .expect("interactive Argon2id params are always valid");
    Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a cleartext password into a self-contained Argon2id PHC string
/// (salt and parameters travel with the hash).
pub async fn hash_password(cleartext: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        argon2_interactive()
            .hash_password(&cleartext, &salt)
            .map(|h| h.to_string())
            .map_err(|e| anyhow::anyhow!("argon2 hash failed: {e}"))
    })
    .await
    .context("password hashing task panicked")?
}

/// Verify a cleartext password against a stored Argon2id hash, with a
/// wall-clock ceiling. A timeout is treated identically to a verification
/// failure so the two are not distinguishable to the caller (spec §5).
pub async fn verify_password(cleartext: Vec<u8>, stored_hash: String, timeout: Duration) -> bool {
    let verify = tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored_hash) else {
            return false;
        };
        argon2_interactive()
            .verify_password(&cleartext, &parsed)
            .is_ok()
    });

    match tokio::time::timeout(timeout, verify).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) | Err(_) => false,
    }
}

/// Timestamp is valid iff `now - W <= timestamp <= now + MAX_FUTURE_SKEW_SECS`,
/// computed with saturating arithmetic so that `now < W` never underflows.
pub fn timestamp_in_window(timestamp: u64, now: u64, replay_window_secs: u64) -> bool {
    let floor = now.saturating_sub(replay_window_secs);
    let ceiling = now.saturating_add(acip_protocol::constants::MAX_FUTURE_SKEW_SECS);
    (floor..=ceiling).contains(&timestamp)
}

fn type_tag(packet_type: PacketType) -> [u8; 2] {
    packet_type.as_u16().to_be_bytes()
}

fn create_message(timestamp: u64, capabilities: u8, max_participants: u8) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + 8 + 1 + 1);
    msg.extend_from_slice(&type_tag(PacketType::SessionCreate));
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.push(capabilities);
    msg.push(max_participants);
    msg
}

pub fn sign_create(sk: &SigningKey, timestamp: u64, capabilities: u8, max_participants: u8) -> Signature {
    sk.sign(&create_message(timestamp, capabilities, max_participants))
}

pub fn verify_create(
    pk: &VerifyingKey,
    timestamp: u64,
    capabilities: u8,
    max_participants: u8,
    sig: &Signature,
) -> bool {
    pk.verify(&create_message(timestamp, capabilities, max_participants), sig)
        .is_ok()
}

fn join_message(timestamp: u64, session_string: &str) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + 8 + session_string.len());
    msg.extend_from_slice(&type_tag(PacketType::SessionJoin));
    msg.extend_from_slice(&timestamp.to_be_bytes());
    msg.extend_from_slice(session_string.as_bytes());
    msg
}

pub fn sign_join(sk: &SigningKey, timestamp: u64, session_string: &str) -> Signature {
    sk.sign(&join_message(timestamp, session_string))
}

pub fn verify_join(pk: &VerifyingKey, timestamp: u64, session_string: &str, sig: &Signature) -> bool {
    pk.verify(&join_message(timestamp, session_string), sig).is_ok()
}

fn end_message(session_id: &[u8; 16]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + 16);
    msg.extend_from_slice(&type_tag(PacketType::SessionEnd));
    msg.extend_from_slice(session_id);
    msg
}

pub fn sign_end(sk: &SigningKey, session_id: &[u8; 16]) -> Signature {
    sk.sign(&end_message(session_id))
}

pub fn verify_end(pk: &VerifyingKey, session_id: &[u8; 16], sig: &Signature) -> bool {
    pk.verify(&end_message(session_id), sig).is_ok()
}

fn host_announcement_message(session_id: &[u8; 16], host_id: &[u8; 16]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + 16 + 16);
    msg.extend_from_slice(&type_tag(PacketType::HostAnnouncement));
    msg.extend_from_slice(session_id);
    msg.extend_from_slice(host_id);
    msg
}

pub fn sign_host_announcement(sk: &SigningKey, session_id: &[u8; 16], host_id: &[u8; 16]) -> Signature {
    sk.sign(&host_announcement_message(session_id, host_id))
}

pub fn verify_host_announcement(
    pk: &VerifyingKey,
    session_id: &[u8; 16],
    host_id: &[u8; 16],
    sig: &Signature,
) -> bool {
    pk.verify(&host_announcement_message(session_id, host_id), sig).is_ok()
}

fn reconnect_message(session_id: &[u8; 16], participant_id: &[u8; 16]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + 16 + 16);
    msg.extend_from_slice(&type_tag(PacketType::SessionReconnect));
    msg.extend_from_slice(session_id);
    msg.extend_from_slice(participant_id);
    msg
}

pub fn sign_reconnect(sk: &SigningKey, session_id: &[u8; 16], participant_id: &[u8; 16]) -> Signature {
    sk.sign(&reconnect_message(session_id, participant_id))
}

pub fn verify_reconnect(
    pk: &VerifyingKey,
    session_id: &[u8; 16],
    participant_id: &[u8; 16],
    sig: &Signature,
) -> bool {
    pk.verify(&reconnect_message(session_id, participant_id), sig).is_ok()
}
