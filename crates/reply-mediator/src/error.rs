//! Error types for the mediator core and the transport port.
//!
//! A timeout is deliberately absent here: it is an expected outcome and is
//! reported as [`ReplyOutcome::TimedOut`](crate::ReplyOutcome::TimedOut),
//! not as an error.

use crate::domain::correlation::CorrelationToken;
use thiserror::Error;

/// Failures surfaced to a `send_and_await` caller.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// The caller supplied a correlation token that is still pending.
    #[error("correlation token {0} already has a pending call")]
    DuplicateToken(CorrelationToken),

    /// The outbound send failed; no reply will ever arrive, and the
    /// pending entry has already been cleaned up.
    #[error("outbound send failed")]
    SendFailed(#[source] TransportError),
}

/// Failures from a [`Transport`](crate::Transport) implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No destination was supplied and the transport has no default route.
    #[error("no destination for outbound message")]
    NoDestination,

    /// The destination is not known to the transport.
    #[error("unknown destination '{0}'")]
    UnknownDestination(String),

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,

    /// Adapter-specific failure.
    #[error("transport failure: {0}")]
    Adapter(String),
}
