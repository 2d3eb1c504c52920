//! Mediator configuration.

use crate::{CORRELATION_HEADER, DEFAULT_REAP_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS};
use std::time::Duration;

/// Configuration for a [`CorrelationMediator`](crate::CorrelationMediator).
#[derive(Debug, Clone)]
pub struct MediatorConfig {
    /// Wait applied when a call does not supply its own timeout.
    pub default_timeout: Duration,

    /// Interval between reaper sweeps over the pending table.
    pub reap_interval: Duration,

    /// Name of the header carrying the stringified correlation token.
    ///
    /// Both the outbound send and inbound matching use this name, so it
    /// must agree with whatever the remote endpoint echoes back.
    pub correlation_header: String,
}

impl MediatorConfig {
    /// Configuration with the given default timeout, everything else stock.
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            ..Self::default()
        }
    }
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            reap_interval: Duration::from_secs(DEFAULT_REAP_INTERVAL_SECS),
            correlation_header: CORRELATION_HEADER.to_string(),
        }
    }
}
