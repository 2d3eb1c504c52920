//! Inbound reply matching: one shared handler, many waiting callers.

use crate::domain::correlation::CorrelationToken;
use crate::domain::pending::{Completion, PendingTable};
use crate::ports::InboundContext;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// What happened to one inbound reply.
///
/// Informational only: nothing on the inbound path is an error, because
/// there is usually nobody left to report an error to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Matched a pending call and woke its caller.
    Delivered,
    /// Nobody waiting at all; reply discarded.
    NoneWaiting,
    /// A token was resolved but its call is already gone (timed out,
    /// cancelled, or completed by an earlier delivery); reply discarded.
    Orphaned,
    /// Matched an entry whose caller had already gone away.
    WaiterGone,
}

/// The single inbound handler for one mediator's reply type.
///
/// The host invokes [`on_reply`](Self::on_reply) once per inbound reply,
/// from whatever concurrency context the transport delivers on. The call
/// never blocks beyond fine-grained table locking and never panics.
pub struct ReplyDispatcher<R> {
    table: Arc<PendingTable<R>>,
    correlation_header: String,
}

impl<R> Clone for ReplyDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            correlation_header: self.correlation_header.clone(),
        }
    }
}

impl<R: Send> ReplyDispatcher<R> {
    /// Dispatcher over an existing table, matching on the given header.
    pub fn new(table: Arc<PendingTable<R>>, correlation_header: String) -> Self {
        Self {
            table,
            correlation_header,
        }
    }

    /// Match one inbound reply to its pending call and wake the caller.
    ///
    /// Resolution order:
    /// 1. Nobody waiting at all: discard silently.
    /// 2. Parseable correlation header: exact token match.
    /// 3. No usable header: fall back to the most recently registered
    ///    entry. Best-effort only — with several headerless calls in
    ///    flight the reply can reach the wrong caller, so attach the
    ///    header whenever the transport allows it.
    ///
    /// Unmatched replies (prior timeout, cancellation, duplicate
    /// delivery) are normal no-ops, logged at debug level.
    pub fn on_reply(&self, reply: R, context: InboundContext) -> DispatchOutcome {
        if self.table.is_empty() {
            debug!("Inbound reply with no calls pending, discarded");
            return DispatchOutcome::NoneWaiting;
        }

        let token = match context.correlation(&self.correlation_header) {
            Some(token) => token,
            None => match self.table.last_inserted() {
                Some(token) => {
                    self.table
                        .stats()
                        .fallback_matched
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(
                        correlation_id = %token,
                        "Reply without correlation header, matched most recent pending call"
                    );
                    token
                }
                None => {
                    debug!("Inbound reply with no calls pending, discarded");
                    return DispatchOutcome::NoneWaiting;
                }
            },
        };

        match self.table.complete(&token, reply, context) {
            Completion::Delivered => DispatchOutcome::Delivered,
            Completion::WaiterGone => DispatchOutcome::WaiterGone,
            Completion::NotFound => {
                self.table.stats().orphaned.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %token,
                    "Orphan reply (call already resolved), discarded"
                );
                DispatchOutcome::Orphaned
            }
        }
    }

    /// Header this dispatcher matches on.
    pub fn correlation_header(&self) -> &str {
        &self.correlation_header
    }
}
