//! Future-host election over the participant ring (spec §4.7).
//!
//! The quorum leader's `FUTURE_HOST_ELECTED` submission is not waited on:
//! the engine runs the scoring function itself once every report is in or
//! the round deadline passes, then broadcasts the result. This keeps ring
//! progress from stalling on an unresponsive leader client; see DESIGN.md.

use std::cmp::Reverse;
use std::time::{SystemTime, UNIX_EPOCH};

use acip_protocol::types::ice_candidate_bits;
use acip_protocol::NetworkQuality;

use crate::session::{RingState, Session};

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Everything `FUTURE_HOST_ELECTED` needs on the wire (spec §4.7/§4.8):
/// the winning participant plus the address/port/conn-type a future host
/// announcement from them would use, and the round that elected them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionResult {
    pub future_host_id: [u8; 16],
    pub address: String,
    pub port: u16,
    pub connection_type: u8,
    pub round_number: u64,
}

pub struct RingConsensus {
    pub tick_secs: u64,
    pub round_deadline_secs: u64,
}

impl RingConsensus {
    pub fn new(tick_secs: u64, round_deadline_secs: u64) -> Self {
        Self {
            tick_secs,
            round_deadline_secs,
        }
    }

    /// Called once per scheduler tick for every session with >=2
    /// participants. Starts a new round if the previous one is due or has
    /// hit its deadline; returns the freshly elected host's full
    /// announcement data, if any.
    pub fn drive(&self, session: &mut Session) -> Option<ElectionResult> {
        let now = now_secs();
        let participant_ids: Vec<[u8; 16]> = session.participants.keys().copied().collect();

        let round_due = now.saturating_sub(session.ring.round_started_at) >= self.tick_secs;
        let deadline_hit = session.ring.round_started_at != 0
            && now.saturating_sub(session.ring.round_started_at) >= self.round_deadline_secs;

        // Restart if the ring drifted from the current participant set —
        // a round is aborted and restarted on membership change (§4.7 edge cases).
        let ring_stale = {
            let mut current = session.ring.ring_order.clone();
            let mut live = participant_ids.clone();
            current.sort();
            live.sort();
            current != live
        };

        if session.ring.round_started_at == 0 || round_due || ring_stale {
            self.start_round(session, &participant_ids);
            return None;
        }

        if deadline_hit {
            let elected = self.elect(session);
            self.start_round(session, &participant_ids);
            return elected;
        }

        if session.ring.reports.len() >= participant_ids.len() && !participant_ids.is_empty() {
            let elected = self.elect(session);
            self.start_round(session, &participant_ids);
            return elected;
        }

        None
    }

    fn start_round(&self, session: &mut Session, participant_ids: &[[u8; 16]]) {
        let mut ring_order = participant_ids.to_vec();
        ring_order.sort();
        let quorum_leader = ring_order.last().copied();
        session.ring = RingState {
            round_number: session.ring.round_number + 1,
            collector_index: 0,
            reports: std::collections::HashMap::new(),
            quorum_leader,
            future_host: session.ring.future_host,
            round_started_at: now_secs(),
            ring_order,
        };
    }

    /// Records a quality report for the current round. A report tagged
    /// with an older round number is answered with the current round's
    /// already-known data by the caller (dispatch), not stored here.
    pub fn record_report(&self, session: &mut Session, report: NetworkQuality) -> bool {
        if report.round_number != session.ring.round_number {
            return false;
        }
        session.ring.reports.insert(report.participant_id, report);
        true
    }

    fn elect(&self, session: &mut Session) -> Option<ElectionResult> {
        let reports: Vec<&NetworkQuality> = session.ring.reports.values().collect();
        if reports.is_empty() {
            return None;
        }

        let has_turn = |nq: &NetworkQuality| nq.ice_candidate_types & ice_candidate_bits::RELAY != 0;
        let usable: Vec<&NetworkQuality> = reports
            .iter()
            .copied()
            .filter(|nq| !(nq.stun_nat_type == 4 && !has_turn(nq)))
            .collect();
        let pool = if usable.is_empty() { reports } else { usable };

        let winner = pool.into_iter().max_by_key(|nq| {
            (
                nq.has_public_ip as u8,
                Reverse(nq.stun_nat_type),
                nq.upload_kbps,
                Reverse(nq.rtt_to_acds_ms),
                Reverse(nq.packet_loss_pct),
                Reverse(nq.participant_id),
            )
        })?;

        session.ring.future_host = Some(winner.participant_id);
        Some(ElectionResult {
            future_host_id: winner.participant_id,
            address: winner.public_address.clone(),
            port: winner.public_port,
            connection_type: session.session_type,
            round_number: session.ring.round_number,
        })
    }
}
