//! # Reply Mediator - Request/Reply over Fire-and-Forget Transports
//!
//! Lets a caller send a request over an asynchronous, fire-and-forget
//! message transport and await the matching reply, even though the
//! transport delivers every reply as an independent inbound message on one
//! shared handler.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐  send_and_await   ┌────────────┐   send (out)   ┌───────────┐
//! │  Caller  │ ────────────────▶ │  Mediator  │ ─────────────▶ │ Transport │
//! └──────────┘                   └────────────┘                └───────────┘
//!       ▲                              │ insert                      │
//!       │ reply                        ▼                             │ inbound
//!       │                       ┌────────────┐   complete     ┌───────────┐
//!       └────────────────────── │ PendingTable│ ◀──────────── │ Dispatcher│
//!                               └────────────┘                └───────────┘
//! ```
//!
//! - [`CorrelationMediator::send_and_await`] mints a [`CorrelationToken`],
//!   registers a pending entry, sends, and awaits wake-or-timeout.
//! - [`ReplyDispatcher::on_reply`] is the single inbound handler: it matches
//!   each reply back to its waiting caller via the correlation header, with a
//!   best-effort most-recent-entry fallback when no header is present.
//! - [`PendingTable`] is the only shared mutable state; every exit path
//!   (reply, timeout, send failure, cancel, reap) removes its entry.
//!
//! Matching is guaranteed only on the local receiving side. Delivery,
//! durability, retries, and routing belong to the transport.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod dispatcher;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

// Re-export main types
pub use adapters::{ReplyRouter, RouteOutcome};
pub use dispatcher::{DispatchOutcome, ReplyDispatcher};
pub use domain::config::MediatorConfig;
pub use domain::correlation::CorrelationToken;
pub use domain::pending::{reap_task, Completion, PendingReply, PendingStats, PendingTable};
pub use error::{MediatorError, TransportError};
pub use ports::{InboundContext, SendOptions, Transport};
pub use service::{CallOptions, CorrelationMediator, ReplyOutcome};

/// Header carrying the stringified correlation token on the wire.
pub const CORRELATION_HEADER: &str = "CorrelationId";

/// Default wait for a reply when the caller does not supply a timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default interval between reaper sweeps over the pending table.
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 10;
