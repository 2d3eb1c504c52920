//! Domain types: correlation tokens, pending-call bookkeeping, configuration.

pub mod config;
pub mod correlation;
pub mod pending;

pub use config::MediatorConfig;
pub use correlation::CorrelationToken;
pub use pending::{PendingReply, PendingStats, PendingTable};
