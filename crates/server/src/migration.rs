//! Host announcement / designation and `HOST_LOST` bookkeeping (spec §4.8).

use crate::session::{HostState, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnouncementError {
    /// The announcing id matched neither the recorded future host nor,
    /// absent one, the session initiator.
    Unauthorized,
}

pub struct MigrationCoordinator;

impl MigrationCoordinator {
    /// Accepts a self-declared `HOST_ANNOUNCEMENT` if `host_id` matches the
    /// future-host record, or — absent one — the session initiator.
    /// Advances `HostState` and returns the accepted host id on success.
    pub fn accept_announcement(
        session: &mut Session,
        host_id: [u8; 16],
        initiator_id: Option<[u8; 16]>,
    ) -> Result<[u8; 16], AnnouncementError> {
        let authorized = match session.ring.future_host {
            Some(future_host) => future_host == host_id,
            None => initiator_id == Some(host_id),
        };
        if !authorized {
            return Err(AnnouncementError::Unauthorized);
        }
        session.host_state = HostState::HostActive(host_id);
        Ok(host_id)
    }

    /// Bookkeeping only: `HOST_LOST` never triggers a fresh election. The
    /// next scheduled ring tick is the only path to a new future host.
    pub fn record_host_lost(session: &mut Session) {
        if let HostState::HostActive(_) = session.host_state {
            session.host_state = match session.ring.future_host {
                Some(future_host) => HostState::FutureHostKnown(future_host),
                None => HostState::InitiatorOnly,
            };
        }
    }

    /// Called whenever `RingConsensus` elects a future host, to move the
    /// state machine from `InitiatorOnly`/`FutureHostKnown` forward.
    pub fn record_future_host_elected(session: &mut Session, future_host_id: [u8; 16]) {
        if !matches!(session.host_state, HostState::HostActive(_)) {
            session.host_state = HostState::FutureHostKnown(future_host_id);
        }
    }
}
