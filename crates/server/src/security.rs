//! Optional encrypted channel: X25519 key agreement plus XSalsa20-Poly1305
//! envelopes (spec §4.2).

use acip_protocol::{PacketType, SecurityEnvelope};
use rand_core::{OsRng, RngCore};
use x25519_dalek::{EphemeralSecret, PublicKey};
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Key, XSalsa20Poly1305};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecurityError {
    #[error("ciphertext failed to authenticate under either the active or pending key")]
    DecryptionFailed,
    #[error("cleartext packet of type {0:#06x} arrived on an encrypted channel outside the handshake allow-list")]
    SecurityViolation(u16),
}

/// Generates an ephemeral X25519 keypair for a handshake or rekey step.
pub fn generate_ephemeral() -> (EphemeralSecret, [u8; 32]) {
    let secret = EphemeralSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);
    (secret, public.to_bytes())
}

/// Derives the symmetric key from our ephemeral secret and the peer's
/// public key. The raw X25519 shared secret is used directly as
/// XSalsa20-Poly1305 key material — a uniformly random 32-byte ECDH
/// output needs no further KDF for this scope (see DESIGN.md).
pub fn derive_shared_key(secret: EphemeralSecret, peer_public: [u8; 32]) -> [u8; 32] {
    secret
        .diffie_hellman(&PublicKey::from(peer_public))
        .to_bytes()
}

/// A channel's symmetric crypto state. Between `begin_rekey` and
/// `complete_rekey`, both the active and pending key are accepted on
/// receive (spec §4.2); only the active key is ever used to encrypt.
pub struct SecureChannel {
    active_key: [u8; 32],
    pending_key: Option<[u8; 32]>,
}

impl SecureChannel {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            active_key: key,
            pending_key: None,
        }
    }

    pub fn begin_rekey(&mut self, new_key: [u8; 32]) {
        self.pending_key = Some(new_key);
    }

    pub fn complete_rekey(&mut self) {
        if let Some(key) = self.pending_key.take() {
            self.active_key = key;
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> SecurityEnvelope {
        let cipher = XSalsa20Poly1305::new(Key::from_slice(&self.active_key));
        let mut nonce_bytes = [0u8; 24];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(&nonce_bytes.into(), plaintext)
            .expect("XSalsa20-Poly1305 encryption over an in-memory buffer cannot fail");
        SecurityEnvelope {
            nonce: nonce_bytes,
            ciphertext,
        }
    }

    pub fn decrypt(&self, envelope: &SecurityEnvelope) -> Result<Vec<u8>, SecurityError> {
        let nonce = envelope.nonce.into();
        let active = XSalsa20Poly1305::new(Key::from_slice(&self.active_key));
        if let Ok(plain) = active.decrypt(&nonce, envelope.ciphertext.as_slice()) {
            return Ok(plain);
        }
        if let Some(pending_key) = self.pending_key {
            let pending = XSalsa20Poly1305::new(Key::from_slice(&pending_key));
            if let Ok(plain) = pending.decrypt(&nonce, envelope.ciphertext.as_slice()) {
                return Ok(plain);
            }
        }
        Err(SecurityError::DecryptionFailed)
    }
}

/// Enforces the handshake allow-list: while a channel is encrypted, a
/// cleartext packet of any type outside the allow-list is a protocol
/// violation that closes the connection.
pub fn check_cleartext_allowed(channel_is_encrypted: bool, packet_type: PacketType) -> Result<(), SecurityError> {
    if channel_is_encrypted && !packet_type.is_handshake_type() {
        return Err(SecurityError::SecurityViolation(packet_type.as_u16()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agree() -> ([u8; 32], [u8; 32]) {
        let (a_secret, a_public) = generate_ephemeral();
        let (b_secret, b_public) = generate_ephemeral();
        let a_key = derive_shared_key(a_secret, b_public);
        let b_key = derive_shared_key(b_secret, a_public);
        (a_key, b_key)
    }

    #[test]
    fn x25519_agreement_yields_matching_keys() {
        let (a_key, b_key) = agree();
        assert_eq!(a_key, b_key);
    }

    #[test]
    fn encrypt_then_decrypt_roundtrips() {
        let (key, _) = agree();
        let channel = SecureChannel::new(key);
        let envelope = channel.encrypt(b"session-create-payload");
        let plain = channel.decrypt(&envelope).unwrap();
        assert_eq!(plain, b"session-create-payload");
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let (key, _) = agree();
        let channel = SecureChannel::new(key);
        let mut envelope = channel.encrypt(b"payload");
        envelope.ciphertext[0] ^= 0xFF;
        assert!(channel.decrypt(&envelope).is_err());
    }

    #[test]
    fn both_keys_accepted_during_rekey_window() {
        let (old_key, _) = agree();
        let mut channel = SecureChannel::new(old_key);
        let old_envelope = channel.encrypt(b"before rekey");

        let (new_key, _) = agree();
        channel.begin_rekey(new_key);

        // old key still decryptable mid-handshake
        assert!(channel.decrypt(&old_envelope).is_ok());

        // outgoing messages still use the active (old) key until complete
        let still_old = channel.encrypt(b"still old key");
        assert!(channel.decrypt(&still_old).is_ok());

        channel.complete_rekey();
        // after complete, the previous active key alone no longer authenticates
        let mut other = SecureChannel::new(old_key);
        let after = channel.encrypt(b"after rekey");
        assert!(other.decrypt(&after).is_err());
    }

    #[test]
    fn handshake_types_are_allowed_cleartext_on_encrypted_channel() {
        assert!(check_cleartext_allowed(true, PacketType::RekeyRequest).is_ok());
        assert!(check_cleartext_allowed(true, PacketType::KeyExchangeInit).is_ok());
    }

    #[test]
    fn non_handshake_cleartext_on_encrypted_channel_is_a_violation() {
        assert!(check_cleartext_allowed(true, PacketType::SessionCreate).is_err());
    }

    #[test]
    fn plain_channel_accepts_anything() {
        assert!(check_cleartext_allowed(false, PacketType::SessionCreate).is_ok());
    }
}
