//! Failure taxonomy for dispatched requests.
//!
//! # Design
//! Every dispatch resolves to exactly one `FailureReason` or one envelope,
//! never both. `ServerError` keeps the raw status and body so callers can
//! special-case statuses they care about; `is_not_found` exists because 404
//! gets a dedicated user-facing notification path. `Timeout` and
//! `NetworkFailure` are distinct variants: a request that exceeded its
//! deadline must never be reported as a connection problem.

use std::fmt;

/// Terminal failure of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No response was received at all.
    NetworkFailure(String),

    /// The configured deadline elapsed before a response arrived.
    Timeout,

    /// The caller signalled the descriptor's cancellation token.
    Cancelled(String),

    /// A response arrived with a non-2xx status.
    ServerError { status: u16, body: String },

    /// Anything else, including payload serialization problems.
    Unknown(String),
}

impl FailureReason {
    /// True for the one server error callers notify about specially.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FailureReason::ServerError { status: 404, .. })
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NetworkFailure(message) => {
                write!(f, "network failure: {message}")
            }
            FailureReason::Timeout => write!(f, "request timed out"),
            FailureReason::Cancelled(reason) => {
                write!(f, "request cancelled: {reason}")
            }
            FailureReason::ServerError { status, body } => {
                write!(f, "server returned HTTP {status}: {body}")
            }
            FailureReason::Unknown(message) => write!(f, "unknown failure: {message}"),
        }
    }
}

impl std::error::Error for FailureReason {}
