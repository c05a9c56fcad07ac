//! Per-connection outbound delivery and the SDP/ICE/participant-lifecycle
//! fan-out (spec §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use acip_protocol::{ParticipantJoined, ParticipantLeft, SignalingRelay};
use tokio::sync::{mpsc, RwLock};

/// A connection's bounded outbound queue. `try_send` is used for
/// broadcasts (dropped + logged when full); `send().await` for unicast
/// responses, which back-pressure the sender instead of dropping (§5).
pub type Outbox = mpsc::Sender<Vec<u8>>;

/// Registry of live connections, keyed by (session, participant).
#[derive(Default)]
pub struct Relay {
    connections: RwLock<HashMap<[u8; 16], HashMap<[u8; 16], Outbox>>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session_id: [u8; 16], participant_id: [u8; 16], outbox: Outbox) {
        self.connections
            .write()
            .await
            .entry(session_id)
            .or_default()
            .insert(participant_id, outbox);
    }

    pub async fn unregister(&self, session_id: [u8; 16], participant_id: [u8; 16]) {
        let mut connections = self.connections.write().await;
        if let Some(participants) = connections.get_mut(&session_id) {
            participants.remove(&participant_id);
            if participants.is_empty() {
                connections.remove(&session_id);
            }
        }
    }

    /// Best-effort unicast. Never blocks the caller past the queue's
    /// capacity check — full queues drop the message and log a warning,
    /// matching the broadcast backpressure policy (relay traffic is not a
    /// client request-response path).
    async fn try_deliver(&self, session_id: [u8; 16], recipient: [u8; 16], payload: &[u8]) {
        let connections = self.connections.read().await;
        let Some(outbox) = connections
            .get(&session_id)
            .and_then(|p| p.get(&recipient))
        else {
            return;
        };
        if outbox.try_send(payload.to_vec()).is_err() {
            tracing::warn!(
                session_id = ?session_id,
                recipient = ?recipient,
                "outbound queue full, dropping relayed packet"
            );
        }
    }

    /// SDP/ICE relay: one copy to every other participant when
    /// `recipient_id` is all-zero, otherwise exactly one copy to the
    /// addressed participant (silently dropped if not connected).
    pub async fn relay_signaling(
        &self,
        session_id: [u8; 16],
        encoded_packet: &[u8],
        relay: &SignalingRelay,
    ) {
        if relay.is_broadcast() {
            let recipients: Vec<[u8; 16]> = {
                let connections = self.connections.read().await;
                connections
                    .get(&session_id)
                    .map(|p| {
                        p.keys()
                            .copied()
                            .filter(|id| *id != relay.sender_id)
                            .collect()
                    })
                    .unwrap_or_default()
            };
            for recipient in recipients {
                self.try_deliver(session_id, recipient, encoded_packet).await;
            }
        } else {
            self.try_deliver(session_id, relay.recipient_id, encoded_packet)
                .await;
        }
    }

    /// Unicasts `PARTICIPANT_JOINED` to every other participant of the
    /// session (spec §4.6).
    pub async fn notify_joined(&self, session_id: [u8; 16], event: &ParticipantJoined) {
        let encoded = event.encode();
        let recipients: Vec<[u8; 16]> = {
            let connections = self.connections.read().await;
            connections
                .get(&session_id)
                .map(|p| {
                    p.keys()
                        .copied()
                        .filter(|id| *id != event.participant_id)
                        .collect()
                })
                .unwrap_or_default()
        };
        for recipient in recipients {
            self.try_deliver(session_id, recipient, &encoded).await;
        }
    }

    /// Unicasts `PARTICIPANT_LEFT` to every remaining participant.
    pub async fn notify_left(&self, session_id: [u8; 16], event: &ParticipantLeft) {
        let encoded = event.encode();
        let recipients: Vec<[u8; 16]> = {
            let connections = self.connections.read().await;
            connections
                .get(&session_id)
                .map(|p| p.keys().copied().collect())
                .unwrap_or_default()
        };
        for recipient in recipients {
            self.try_deliver(session_id, recipient, &encoded).await;
        }
    }

    /// Broadcasts an already-encoded packet to every participant of the
    /// session (used for `HOST_DESIGNATED`/`FUTURE_HOST_ELECTED`).
    pub async fn broadcast(&self, session_id: [u8; 16], encoded_packet: &[u8]) {
        let recipients: Vec<[u8; 16]> = {
            let connections = self.connections.read().await;
            connections
                .get(&session_id)
                .map(|p| p.keys().copied().collect())
                .unwrap_or_default()
        };
        for recipient in recipients {
            self.try_deliver(session_id, recipient, encoded_packet).await;
        }
    }

    /// Single addressed unicast, used by RING_COLLECT hop-by-hop delivery.
    pub async fn unicast(&self, session_id: [u8; 16], recipient: [u8; 16], encoded_packet: &[u8]) {
        self.try_deliver(session_id, recipient, encoded_packet).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u8) -> [u8; 16] {
        [n; 16]
    }

    #[tokio::test]
    async fn broadcast_reaches_every_registered_participant() {
        let relay = Relay::new();
        let session_id = ids(1);
        let (tx_a, mut rx_a) = mpsc::channel(8);
        let (tx_b, mut rx_b) = mpsc::channel(8);
        relay.register(session_id, ids(2), tx_a).await;
        relay.register(session_id, ids(3), tx_b).await;

        relay.broadcast(session_id, b"hello").await;

        assert_eq!(rx_a.recv().await.unwrap(), b"hello");
        assert_eq!(rx_b.recv().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn signaling_relay_broadcast_excludes_sender() {
        let relay = Relay::new();
        let session_id = ids(1);
        let (tx_sender, mut rx_sender) = mpsc::channel(8);
        let (tx_other, mut rx_other) = mpsc::channel(8);
        relay.register(session_id, ids(2), tx_sender).await;
        relay.register(session_id, ids(3), tx_other).await;

        let sdp = SignalingRelay {
            session_id,
            sender_id: ids(2),
            recipient_id: [0; 16],
            body: b"v=0".to_vec(),
        };
        relay.relay_signaling(session_id, &sdp.encode(), &sdp).await;

        assert!(rx_sender.try_recv().is_err());
        assert_eq!(rx_other.recv().await.unwrap(), sdp.encode());
    }

    #[tokio::test]
    async fn signaling_relay_unicast_drops_silently_if_recipient_absent() {
        let relay = Relay::new();
        let session_id = ids(1);
        let sdp = SignalingRelay {
            session_id,
            sender_id: ids(2),
            recipient_id: ids(9),
            body: b"candidate".to_vec(),
        };
        // No panic, no registered recipient — this should simply no-op.
        relay.relay_signaling(session_id, &sdp.encode(), &sdp).await;
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let relay = Relay::new();
        let session_id = ids(1);
        let (tx, _rx) = mpsc::channel(1);
        relay.register(session_id, ids(2), tx).await;
        relay.broadcast(session_id, b"first").await;
        // Second broadcast finds the queue full and must not hang.
        relay.broadcast(session_id, b"second").await;
    }
}
