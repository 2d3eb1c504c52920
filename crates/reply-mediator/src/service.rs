//! The request/reply engine: send a message, await its correlated reply.

use crate::dispatcher::ReplyDispatcher;
use crate::domain::config::MediatorConfig;
use crate::domain::correlation::CorrelationToken;
use crate::domain::pending::{reap_task, PendingReply, PendingStats, PendingTable};
use crate::error::MediatorError;
use crate::ports::{InboundContext, SendOptions, Transport};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-call knobs for [`CorrelationMediator::send_and_await`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Reuse a caller-supplied token instead of minting a fresh one.
    pub correlation_override: Option<CorrelationToken>,
    /// Route the send to an explicit destination.
    pub destination: Option<String>,
    /// Wait bound; falls back to the mediator's default when `None`.
    /// `Duration::ZERO` means poll once, no wait.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    /// Stock options: fresh token, default routing, default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing correlation token.
    #[must_use]
    pub fn with_token(mut self, token: CorrelationToken) -> Self {
        self.correlation_override = Some(token);
        self
    }

    /// Route to an explicit destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Bound the wait for the reply.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Terminal outcome of one mediated call.
///
/// A timeout is an expected result, not an error, so callers match on this
/// rather than unwrap.
#[derive(Debug)]
pub enum ReplyOutcome<R> {
    /// The correlated reply arrived within the wait.
    Reply {
        /// Reply payload.
        reply: R,
        /// Delivery metadata from the inbound transport context.
        context: InboundContext,
    },
    /// No reply arrived within the wait; the pending entry is gone.
    TimedOut,
}

impl<R> ReplyOutcome<R> {
    /// True for the timeout case.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// The reply payload, if one arrived.
    pub fn into_reply(self) -> Option<R> {
        match self {
            Self::Reply { reply, .. } => Some(reply),
            Self::TimedOut => None,
        }
    }
}

/// Correlates outbound requests with their inbound replies.
///
/// Owns the [`PendingTable`]; construct one mediator per reply type you
/// await on, hand its [`dispatcher`](Self::dispatcher) to the inbound
/// wiring, and call [`send_and_await`](Self::send_and_await) from any
/// number of concurrent tasks. Instances are independent: tests can build
/// as many as they like without cross-talk.
pub struct CorrelationMediator<R> {
    table: Arc<PendingTable<R>>,
    config: MediatorConfig,
}

impl<R: Send + 'static> CorrelationMediator<R> {
    /// Mediator with stock configuration.
    pub fn new() -> Self {
        Self::with_config(MediatorConfig::default())
    }

    /// Mediator with explicit configuration.
    pub fn with_config(config: MediatorConfig) -> Self {
        Self {
            table: Arc::new(PendingTable::new()),
            config,
        }
    }

    /// Send `message` and await its correlated reply.
    ///
    /// The pending entry is registered before the send goes out, so a
    /// reply can never arrive ahead of the bookkeeping. Every exit path
    /// removes the entry: reply, timeout, and send failure alike.
    ///
    /// If the reply and the timeout race, the reply wins: a reply that
    /// claimed the entry before the timed-out caller could remove it is
    /// still returned.
    ///
    /// # Errors
    ///
    /// - [`MediatorError::DuplicateToken`] if `opts` reuses a token that is
    ///   still pending (no send is attempted).
    /// - [`MediatorError::SendFailed`] if the transport rejects the send.
    pub async fn send_and_await<M, T>(
        &self,
        transport: &T,
        message: M,
        opts: CallOptions,
    ) -> Result<ReplyOutcome<R>, MediatorError>
    where
        M: Send + 'static,
        T: Transport<M> + ?Sized,
    {
        let token = opts
            .correlation_override
            .unwrap_or_else(CorrelationToken::new);
        let timeout = opts.timeout.unwrap_or(self.config.default_timeout);

        // Register first: a reply must never find the table empty because
        // the send beat the bookkeeping.
        let mut rx = self.table.register(token, timeout)?;

        let mut options = SendOptions::new();
        options.set_header(&self.config.correlation_header, token.to_string());
        if let Some(destination) = opts.destination {
            options.set_destination(destination);
        }

        if let Err(err) = transport.send(message, options).await {
            // No reply will ever arrive for a send that never completed.
            self.table.cancel(&token);
            return Err(MediatorError::SendFailed(err));
        }

        if timeout.is_zero() {
            // Poll once, no wait.
            return Ok(match rx.try_recv() {
                Ok(delivered) => ReplyOutcome::Reply {
                    reply: delivered.reply,
                    context: delivered.context,
                },
                Err(_) => self.claim_timeout(&token, rx).await,
            });
        }

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(delivered)) => Ok(ReplyOutcome::Reply {
                reply: delivered.reply,
                context: delivered.context,
            }),
            Ok(Err(_closed)) => {
                // Entry dropped out from under us (reaper or cancel).
                debug!(correlation_id = %token, "Pending entry removed while waiting");
                self.table.time_out(&token);
                Ok(ReplyOutcome::TimedOut)
            }
            Err(_elapsed) => Ok(self.claim_timeout(&token, rx).await),
        }
    }

    /// Resolve an elapsed wait against a possibly concurrent reply.
    ///
    /// Removing the entry is the claim on the outcome. If we removed it,
    /// the call timed out. If it was already gone, a completing reply (or
    /// cancel/reaper) beat us: its send into the channel is imminent, or
    /// the sender is already dropped, so awaiting the receiver is bounded.
    /// A reply found there wins over reporting a timeout.
    async fn claim_timeout(
        &self,
        token: &CorrelationToken,
        rx: tokio::sync::oneshot::Receiver<PendingReply<R>>,
    ) -> ReplyOutcome<R> {
        if self.table.time_out(token) {
            return ReplyOutcome::TimedOut;
        }
        match rx.await {
            Ok(delivered) => ReplyOutcome::Reply {
                reply: delivered.reply,
                context: delivered.context,
            },
            Err(_closed) => ReplyOutcome::TimedOut,
        }
    }

    /// [`send_and_await`](Self::send_and_await) with stock options.
    pub async fn call<M, T>(
        &self,
        transport: &T,
        message: M,
    ) -> Result<ReplyOutcome<R>, MediatorError>
    where
        M: Send + 'static,
        T: Transport<M> + ?Sized,
    {
        self.send_and_await(transport, message, CallOptions::new())
            .await
    }

    /// Cancel an outstanding call. A reply arriving afterwards is
    /// discarded as an orphan.
    pub fn cancel(&self, token: &CorrelationToken) -> bool {
        self.table.cancel(token)
    }

    /// The inbound handler matching replies back to this mediator's
    /// pending calls. Hand it to the transport wiring (directly or via a
    /// [`ReplyRouter`](crate::ReplyRouter)).
    pub fn dispatcher(&self) -> ReplyDispatcher<R> {
        ReplyDispatcher::new(
            Arc::clone(&self.table),
            self.config.correlation_header.clone(),
        )
    }

    /// Spawn the background reaper for abandoned entries.
    ///
    /// Optional insurance: every registered entry already carries its
    /// caller's timeout as a deadline, so the reaper only matters for
    /// waiters whose task was dropped before observing their outcome.
    pub fn start_reaper(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(reap_task(
            Arc::clone(&self.table),
            self.config.reap_interval,
        ))
    }

    /// The shared pending table (wiring and introspection).
    pub fn table(&self) -> Arc<PendingTable<R>> {
        Arc::clone(&self.table)
    }

    /// Observability counters.
    pub fn stats(&self) -> &PendingStats {
        self.table.stats()
    }

    /// Number of calls currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.table.len()
    }
}

impl<R: Send + 'static> Default for CorrelationMediator<R> {
    fn default() -> Self {
        Self::new()
    }
}
