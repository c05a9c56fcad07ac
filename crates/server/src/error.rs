//! Server-side error taxonomy and propagation policy (spec §7).

use acip_protocol::types::ErrorCode;
use acip_protocol::{FrameError, ValidationError};

use crate::migration::AnnouncementError;
use crate::security::SecurityError;
use crate::session::{CreateError, JoinError};

/// What a connection task should do after a handler (or the codec) returns
/// an error. `JOIN` answers its own failures inline via `SESSION_JOINED`'s
/// `error_code` field, so its dispositions never carry a generic error to
/// send — only `CREATE`/validation/bare-signature failures, which have no
/// typed carrier of their own, do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Close the connection, no response packet.
    CloseSilently,
    /// Stay open. `error_to_send` is `Some` when the connection task must
    /// still emit `ACIP_ERROR(code)` itself; `None` when the handler
    /// already answered inline. `count_as_auth_failure` feeds the per-IP
    /// rate limiter regardless of which path sent the response.
    Continue {
        error_to_send: Option<ErrorCode>,
        count_as_auth_failure: bool,
    },
}

impl Disposition {
    fn continue_with(code: ErrorCode) -> Self {
        Disposition::Continue {
            error_to_send: Some(code),
            count_as_auth_failure: false,
        }
    }

    fn continue_silent() -> Self {
        Disposition::Continue {
            error_to_send: None,
            count_as_auth_failure: false,
        }
    }

    fn continue_and_count(error_to_send: Option<ErrorCode>) -> Self {
        Disposition::Continue {
            error_to_send,
            count_as_auth_failure: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("{0}")]
    Create(CreateError),
    #[error("join rejected: {0:?}")]
    Join(JoinError),
    #[error("announcement rejected: {0:?}")]
    Announcement(AnnouncementError),
    #[error("non-host attempted SESSION_END")]
    NotHost,
    #[error("rate limited")]
    RateLimited,
    /// Signature or timestamp failure on a request that has no dedicated
    /// error variant of its own (CREATE, END, RECONNECT, HOST_ANNOUNCEMENT).
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classifies this error per the spec §7 taxonomy.
    pub fn disposition(&self) -> Disposition {
        match self {
            AppError::Frame(_) => Disposition::CloseSilently,
            AppError::Validation(_) => Disposition::continue_with(ErrorCode::StringInvalid),
            AppError::Security(SecurityError::SecurityViolation(_)) => Disposition::CloseSilently,
            AppError::Security(SecurityError::DecryptionFailed) => Disposition::CloseSilently,
            AppError::Create(e) => Disposition::continue_with(e.error_code()),
            // SESSION_JOINED already carries success/error_code inline —
            // no generic ACIP_ERROR follows a join rejection.
            AppError::Join(e) => match e {
                JoinError::InvalidSignature | JoinError::InvalidPassword => {
                    Disposition::continue_and_count(None)
                }
                JoinError::SessionNotFound | JoinError::SessionFull => Disposition::continue_silent(),
            },
            AppError::Announcement(_) => Disposition::CloseSilently,
            AppError::NotHost => Disposition::CloseSilently,
            AppError::RateLimited => Disposition::continue_with(ErrorCode::RateLimited),
            AppError::InvalidSignature => Disposition::continue_and_count(Some(ErrorCode::InvalidSignature)),
            AppError::Internal(_) => Disposition::continue_with(ErrorCode::Internal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_errors_close_silently() {
        assert_eq!(
            AppError::Frame(FrameError::CleanEof).disposition(),
            Disposition::CloseSilently
        );
    }

    #[test]
    fn validation_errors_stay_open_and_send_a_generic_error() {
        let err = AppError::Validation(ValidationError::InvalidParam("bad"));
        match err.disposition() {
            Disposition::Continue { error_to_send, count_as_auth_failure } => {
                assert_eq!(error_to_send, Some(ErrorCode::StringInvalid));
                assert!(!count_as_auth_failure);
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn join_invalid_signature_counts_as_auth_failure_but_sends_nothing_generic() {
        let err = AppError::Join(JoinError::InvalidSignature);
        match err.disposition() {
            Disposition::Continue { error_to_send, count_as_auth_failure } => {
                assert_eq!(error_to_send, None);
                assert!(count_as_auth_failure);
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn session_full_does_not_count_as_auth_failure() {
        let err = AppError::Join(JoinError::SessionFull);
        assert_eq!(err.disposition(), Disposition::continue_silent());
    }

    #[test]
    fn bare_invalid_signature_sends_a_generic_error_and_counts_as_a_failure() {
        let err = AppError::InvalidSignature;
        match err.disposition() {
            Disposition::Continue { error_to_send, count_as_auth_failure } => {
                assert_eq!(error_to_send, Some(ErrorCode::InvalidSignature));
                assert!(count_as_auth_failure);
            }
            other => panic!("expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn security_violation_closes_the_connection() {
        let err = AppError::Security(SecurityError::SecurityViolation(0x0001));
        assert_eq!(err.disposition(), Disposition::CloseSilently);
    }
}
