//! Adapters sitting between the core and the host's transport wiring.

pub mod router;

pub use router::{ReplyRouter, RouteOutcome};
